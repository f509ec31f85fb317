//! Plain TCP connector

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use synprobe_common::{Connector, Endpoint, ProbeError, ProbeResult};

/// Opens OS-level TCP connections with a bounded connect timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    /// A pending connect that times out is dropped, which releases the socket.
    #[instrument(skip(self), fields(addr = %endpoint.socket_addr()))]
    async fn connect(&self, endpoint: &Endpoint, connect_timeout: Duration) -> ProbeResult<TcpStream> {
        if connect_timeout.is_zero() {
            return Err(ProbeError::Config("connect timeout must be positive".into()));
        }

        let addr = endpoint.socket_addr();
        match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                // Probes are tiny; send them immediately.
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("set_nodelay failed: {}", e);
                }
                Ok(stream)
            }
            Ok(Err(source)) => {
                debug!("connect failed: {}", source);
                Err(ProbeError::Connection { addr, source })
            }
            Err(_) => {
                debug!("connect timed out after {:?}", connect_timeout);
                Err(ProbeError::ConnectTimeout(addr))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn connects_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("localhost", LOCALHOST, port).unwrap();

        let stream = TcpConnector::new()
            .connect(&endpoint, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn refused_connect_is_connection_error() {
        // Bind then drop to obtain a port with nothing listening.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let endpoint = Endpoint::new("localhost", LOCALHOST, port).unwrap();

        let err = TcpConnector::new()
            .connect(&endpoint, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let endpoint = Endpoint::new("localhost", LOCALHOST, 80).unwrap();
        let err = TcpConnector::new()
            .connect(&endpoint, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }
}
