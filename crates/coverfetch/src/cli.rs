//! Exposes the command line application.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use coverfetch_service::config::Config;
use coverfetch_service::covers::{Cover, CoverService};
use coverfetch_service::sources::{self, DeferredSources};
use coverfetch_service::{logging, metrics};
use coverfetch_sources::Entity;

/// Coverfetch commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the cover of an entity and write it to a file or stdout.
    Fetch {
        /// JSON file describing the entity.
        #[arg(long, value_name = "FILE")]
        entity: PathBuf,

        /// Fetch the cover from this reference instead of the entity's own.
        #[arg(long, value_name = "REFERENCE")]
        origin: Option<String>,

        /// Where to write the cover, defaults to stdout.
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the cache key of an entity's cover.
    Key {
        /// JSON file describing the entity.
        #[arg(long, value_name = "FILE")]
        entity: PathBuf,
    },

    /// Remove the cached cover of an entity.
    Purge {
        /// JSON file describing the entity.
        #[arg(long, value_name = "FILE")]
        entity: PathBuf,
    },
}

/// Command line interface parser.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: No other threads have been spawned at this point.
    unsafe { logging::init_logging(&config.logging) };

    if let Some(ref statsd) = config.metrics.statsd {
        let tags = config.metrics.custom_tags.clone();
        if let Err(error) = metrics::configure_statsd(&config.metrics.prefix, statsd.as_str(), tags)
        {
            tracing::warn!(%error, "Failed to set up statsd reporting");
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("coverfetch")
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    runtime.block_on(run(config, cli.command))
}

async fn run(config: Config, command: Command) -> Result<()> {
    let catalog = Arc::new(DeferredSources::new());
    let service = CoverService::from_config(&config, catalog.clone())?;

    // Reading a sources file happens in the background. Only requests to remote origins wait
    // for it.
    let install = async {
        let loaded = tokio::task::spawn_blocking(move || sources::from_config(&config))
            .await
            .context("failed to load sources")??;
        if catalog.install(loaded).is_err() {
            tracing::warn!("Sources were installed twice");
        }
        Ok::<_, anyhow::Error>(())
    };

    let command = async {
        match command {
            Command::Fetch {
                entity,
                origin,
                output,
            } => fetch(&service, &entity, origin.as_deref(), output.as_deref()).await,
            Command::Key { entity } => {
                let entity = read_entity(&entity)?;
                println!("{}", service.cache_key(&entity));
                Ok(())
            }
            Command::Purge { entity } => {
                let entity = read_entity(&entity)?;
                if service.purge(&entity).await? {
                    tracing::info!("Purged cached cover of entity {}", entity.id);
                } else {
                    tracing::info!("Entity {} has no cached cover", entity.id);
                }
                Ok(())
            }
        }
    };

    tokio::try_join!(install, command)?;
    Ok(())
}

fn read_entity(path: &Path) -> Result<Entity> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open entity file {}", path.display()))?;
    serde_json::from_reader(file).context("failed to parse entity JSON")
}

async fn fetch(
    service: &CoverService,
    entity: &Path,
    origin: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let entity = read_entity(entity)?;
    let cover = service
        .resolve(&entity, origin)
        .await
        .with_context(|| format!("failed to resolve the cover of entity {}", entity.id))?;
    let served_from = cover.served_from();

    let written = match output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_cover(cover, file).await?
        }
        None => write_cover(cover, tokio::io::stdout()).await?,
    };

    tracing::info!("Wrote {} bytes, served from {}", written, served_from);
    Ok(())
}

async fn write_cover(cover: Cover, mut output: impl AsyncWrite + Unpin) -> Result<u64> {
    let mut body = cover.into_stream();
    let mut written = 0;

    while let Some(chunk) = body.try_next().await? {
        output.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    output.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "coverfetch",
            "--config",
            "config.yml",
            "fetch",
            "--entity",
            "entity.json",
            "--origin",
            "https://example.com/other.jpg",
            "-o",
            "cover.jpg",
        ])
        .unwrap();

        assert_eq!(cli.config(), Some(Path::new("config.yml")));
        let Command::Fetch {
            entity,
            origin,
            output,
        } = cli.command
        else {
            panic!("expected the fetch command");
        };
        assert_eq!(entity, PathBuf::from("entity.json"));
        assert_eq!(origin.as_deref(), Some("https://example.com/other.jpg"));
        assert_eq!(output, Some(PathBuf::from("cover.jpg")));
    }

    #[test]
    fn test_read_entity() {
        let dir = coverfetch_test::tempdir();
        let path = dir.path().join("entity.json");
        std::fs::write(
            &path,
            r#"{"id": 3, "kept": true, "origin_reference": "https://example.com/3.jpg"}"#,
        )
        .unwrap();

        let entity = read_entity(&path).unwrap();
        assert_eq!(entity.id.get(), 3);
        assert!(entity.kept);

        assert!(read_entity(&dir.path().join("missing.json")).is_err());
    }

    #[tokio::test]
    async fn test_fetch_local_cover() {
        let dir = coverfetch_test::tempdir();
        let local = dir.path().join("local.png");
        std::fs::write(&local, b"local cover").unwrap();

        let entity = dir.path().join("entity.json");
        let json = format!(
            r#"{{"id": 1, "origin_reference": "file://{}"}}"#,
            local.display()
        );
        std::fs::write(&entity, json).unwrap();

        let config = Config {
            covers_dir: dir.path().join("covers"),
            ..Config::default()
        };
        let output = dir.path().join("out.png");

        // local covers are served without waiting for the sources
        let sources = Arc::new(DeferredSources::new());
        let service = CoverService::from_config(&config, sources).unwrap();
        fetch(&service, &entity, None, Some(&output)).await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"local cover");
    }
}
