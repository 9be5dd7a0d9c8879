use std::ffi::OsString;
use std::io;
use std::path::Path;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use super::{CoverError, CoverResult};

/// Suffix of the temporary files covers are written to before they are renamed into place.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Writes covers to their destination all-or-nothing.
///
/// The body is streamed into a temporary file in the destination's directory, which is then
/// renamed over the destination. A failed or cancelled write leaves the destination untouched
/// and removes the temporary file.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriter;

impl AtomicWriter {
    /// Writes the whole `stream` to `destination`, returning the number of bytes written.
    ///
    /// A stream without any data is rejected with [`CoverError::EmptyBody`].
    pub async fn write<S>(&self, destination: &Path, stream: S) -> CoverResult<u64>
    where
        S: Stream<Item = CoverResult<Bytes>> + Unpin,
    {
        let (temp_file, file) = {
            let destination = destination.to_owned();
            blocking(move || {
                let temp_file = tempfile_for(&destination)?;
                let file = temp_file.reopen()?;
                Ok((temp_file, file))
            })
            .await?
        };

        let result = copy_stream(file.into(), stream).await;
        match result {
            Ok(0) => {
                discard(temp_file).await;
                Err(CoverError::EmptyBody)
            }
            Ok(written) => {
                let target = destination.to_owned();
                blocking(move || match temp_file.persist(&target) {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        discard_blocking(e.file);
                        Err(e.error)
                    }
                })
                .await?;
                tracing::trace!("Wrote {} bytes to {}", written, destination.display());
                Ok(written)
            }
            Err(err) => {
                discard(temp_file).await;
                Err(err)
            }
        }
    }
}

/// Runs blocking file system work off the async workers.
async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Creates a temporary file next to `destination`, creating missing parent directories.
fn tempfile_for(destination: &Path) -> io::Result<NamedTempFile> {
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut prefix = OsString::from(destination.file_name().unwrap_or_default());
    prefix.push(".");

    let create = || {
        tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(parent)
    };

    match create() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::fs::create_dir_all(parent)?;
            create()
        }
        result => result,
    }
}

async fn copy_stream<S>(mut file: tokio::fs::File, mut stream: S) -> CoverResult<u64>
where
    S: Stream<Item = CoverResult<Bytes>> + Unpin,
{
    let mut written = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

async fn discard(temp_file: NamedTempFile) {
    if let Err(e) = tokio::task::spawn_blocking(move || discard_blocking(temp_file)).await {
        tracing::warn!(
            error = &e as &dyn std::error::Error,
            "Failed to discard temporary file"
        );
    }
}

fn discard_blocking(temp_file: NamedTempFile) {
    let path = temp_file.path().to_owned();
    if let Err(e) = temp_file.close() {
        tracing::warn!(
            error = &e as &dyn std::error::Error,
            "Failed to remove temporary file {}",
            path.display()
        );
    }
}
