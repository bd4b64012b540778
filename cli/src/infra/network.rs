//! Network infrastructure: implements `NetworkProbe` using `spawn_blocking`.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::NetworkProbe;

/// Connect timeout of a single probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Production implementation that performs real network checks.
pub struct TokioNetworkProbe;

impl NetworkProbe for TokioNetworkProbe {
    async fn check_tcp_connectivity(&self, host: &str, port: u16) -> Result<bool> {
        let addr = format!("{host}:{port}");
        let result = tokio::task::spawn_blocking(move || {
            use std::net::ToSocketAddrs;
            let addrs = addr
                .to_socket_addrs()
                .map_err(|e| anyhow::anyhow!("invalid address {addr}: {e}"))?;
            Ok::<bool, anyhow::Error>(
                addrs
                    .into_iter()
                    .any(|a| std::net::TcpStream::connect_timeout(&a, PROBE_TIMEOUT).is_ok()),
            )
        })
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking panicked: {e}"))??;
        Ok(result)
    }
}
