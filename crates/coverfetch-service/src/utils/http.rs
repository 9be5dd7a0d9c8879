use std::time::Duration;

use reqwest::redirect;

use crate::config::Config;

/// The `User-Agent` sent to origins that do not get an explicit one from their source.
pub const USER_AGENT: &str = concat!("coverfetch/", env!("CARGO_PKG_VERSION"));

/// Various timeouts for origin downloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DownloadTimeouts {
    /// The timeout for establishing a connection.
    pub connect: Duration,
    /// The timeout for receiving the first headers.
    pub head: Duration,
    /// Global timeout for one download.
    pub max_download: Duration,
}

impl DownloadTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect: config.connect_timeout,
            head: config.head_timeout,
            max_download: config.max_download_timeout,
        }
    }
}

impl Default for DownloadTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            head: Duration::from_secs(10),
            max_download: Duration::from_secs(60),
        }
    }
}

/// Creates a [`reqwest::Client`] with the provided options.
///
/// * `timeouts` controls connection and download timeouts.
/// * `accept_invalid_certs` determines whether the client accepts invalid
///   SSL certificates.
pub fn create_client(
    timeouts: &DownloadTimeouts,
    accept_invalid_certs: bool,
) -> reqwest::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .hickory_dns(true)
        .user_agent(USER_AGENT)
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.max_download)
        .pool_idle_timeout(Duration::from_secs(30))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .redirect(redirect::Policy::limited(10))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_from_config() {
        let config = Config {
            connect_timeout: Duration::from_secs(1),
            head_timeout: Duration::from_secs(2),
            max_download_timeout: Duration::from_secs(3),
            ..Config::default()
        };

        assert_eq!(
            DownloadTimeouts::from_config(&config),
            DownloadTimeouts {
                connect: Duration::from_secs(1),
                head: Duration::from_secs(2),
                max_download: Duration::from_secs(3),
            }
        );
    }
}
