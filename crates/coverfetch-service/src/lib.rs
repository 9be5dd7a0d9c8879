#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod covers;
pub mod download;
pub mod logging;
pub mod sources;
pub mod utils;
