// crates/scanner_tcp/src/scanner.rs
//! TCP connect scanner implementation

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::connector::TcpConnector;
use synprobe_common::{close, Connector, Endpoint, PortScanner};

/// Connect-and-close port scanner. No bytes are read or written.
pub struct TcpScanner {
    connector: TcpConnector,
    timeout: Duration,
}

impl TcpScanner {
    /// Create a new scanner with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One bounded connect attempt; the stream is shut down straight away.
    #[instrument(skip(self), fields(port = endpoint.port()))]
    async fn try_connect(&self, endpoint: &Endpoint) -> bool {
        match self.connector.connect(endpoint, self.timeout).await {
            Ok(stream) => {
                close(stream, self.timeout).await;
                true
            }
            Err(e) => {
                debug!("port closed: {}", e);
                false
            }
        }
    }
}

impl Default for TcpScanner {
    fn default() -> Self {
        Self {
            connector: TcpConnector::new(),
            timeout: Duration::from_secs(1),
        }
    }
}

#[async_trait]
impl PortScanner for TcpScanner {
    async fn is_open(&self, endpoint: &Endpoint) -> bool {
        self.try_connect(endpoint).await
    }

    fn name(&self) -> &str {
        "TCP Connect Scanner"
    }
}
