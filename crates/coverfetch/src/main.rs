//! Coverfetch.
//!
//! Coverfetch resolves the cover image of a library entity. Covers of entities in the user's
//! collection are cached on disk, all others are streamed from their origin. Covers that live in
//! local files are served directly.

#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

mod cli;

use coverfetch_service::logging;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
