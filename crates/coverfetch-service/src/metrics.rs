//! Provides access to the metrics system.
use std::collections::BTreeMap;
use std::io;
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::OnceLock;

use cadence::{Metric, MetricBuilder, StatsdClient, UdpMetricSink};

static METRICS_CLIENT: OnceLock<MetricsClient> = OnceLock::new();

/// The metrics prelude that is necessary to use the client.
pub mod prelude {
    pub use cadence::prelude::*;
}

/// Sends cover pipeline metrics to statsd.
#[derive(Debug)]
pub struct MetricsClient {
    /// The raw statsd client.
    pub statsd: StatsdClient,

    /// Tags sent along with every metric, from `metrics.custom_tags`.
    tags: BTreeMap<String, String>,
}

impl MetricsClient {
    #[inline(always)]
    pub fn send_metric<'a, T>(&'a self, mut metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        for (tag, value) in self.tags.iter() {
            metric = metric.with_tag(tag, value);
        }
        metric.send()
    }
}

/// Tell the metrics system to report to statsd.
///
/// Only the first successful call installs a client, later calls are ignored.
pub fn configure_statsd<A: ToSocketAddrs>(
    prefix: &str,
    host: A,
    tags: BTreeMap<String, String>,
) -> io::Result<()> {
    let addrs: Vec<_> = host.to_socket_addrs()?.collect();
    if let Some(addr) = addrs.first() {
        tracing::info!("Reporting metrics to statsd at {}", addr);
    }
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;
    let sink = UdpMetricSink::from(&addrs[..], socket)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let statsd = StatsdClient::from_sink(prefix, sink);

    if METRICS_CLIENT.set(MetricsClient { statsd, tags }).is_err() {
        tracing::warn!("statsd client was already configured");
    }
    Ok(())
}

/// Invoke a callback with the current statsd client.
///
/// If statsd is not configured the callback is not invoked. For the most part
/// the [`metric!`](crate::metric) macro should be used instead.
#[inline(always)]
pub fn with_client<F, R>(f: F) -> R
where
    F: FnOnce(&MetricsClient) -> R,
    R: Default,
{
    match METRICS_CLIENT.get() {
        Some(client) => f(client),
        None => Default::default(),
    }
}

/// Emits a metric.
///
/// Counters count events, `timer` records a [`Duration`](std::time::Duration) and `time_raw`
/// records a plain number such as a file size. Tags follow the value as `"key" => value`.
#[macro_export]
macro_rules! metric {
    (counter($id:expr) += $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.statsd.count_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    (timer($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.statsd.time_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    (time_raw($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        $crate::metric!(timer($id) = $value $(, $k => $v)*)
    }};
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_statsd_reporting() {
        // without a client, metrics are dropped
        metric!(counter("covers.access") += 1);

        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let tags = BTreeMap::from([("env".to_owned(), "test".to_owned())]);
        configure_statsd("coverfetch", receiver.local_addr().unwrap(), tags).unwrap();

        metric!(counter("covers.access") += 1, "kind" => "unit");

        // other tests in this binary report through the same client
        let line = loop {
            let mut buf = [0; 512];
            let len = receiver.recv(&mut buf).unwrap();
            let line = String::from_utf8_lossy(&buf[..len]).into_owned();
            if line.contains("kind:unit") {
                break line;
            }
        };
        assert!(line.starts_with("coverfetch.covers.access:1|c|#"), "{line}");
        assert!(line.contains("kind:unit"), "{line}");
        assert!(line.contains("env:test"), "{line}");
    }
}
