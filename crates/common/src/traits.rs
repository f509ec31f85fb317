//! Core traits for synprobe components
//!
//! The fingerprinting engine only sees these seams: it opens streams through
//! a [`Connector`], reads and writes anything implementing [`ByteStream`],
//! and is itself driven through [`Fingerprinter`].

use crate::error::ProbeResult;
use crate::types::{Endpoint, FingerprintResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// A duplex byte channel, plain or TLS-wrapped.
///
/// Deadlines are applied per operation by the caller with
/// `tokio::time::timeout`.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Close a stream, bounded by `timeout`.
///
/// Takes the stream by value so it cannot be used after closing. The
/// descriptor is released on drop even when shutdown fails or times out.
pub async fn close<S: ByteStream>(mut stream: S, timeout: Duration) {
    let _ = tokio::time::timeout(timeout, stream.shutdown()).await;
}

/// Opens byte streams to endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: ByteStream + 'static;

    /// Open a connection, failing if it is not established within `timeout`.
    async fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeResult<Self::Stream>;
}

/// Finds which ports accept TCP connections.
#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Bare connect-and-close probe of one endpoint.
    async fn is_open(&self, endpoint: &Endpoint) -> bool;

    /// Ordered sub-list of `endpoints` that accepted a connection.
    async fn open_ports(&self, endpoints: &[Endpoint]) -> Vec<u16> {
        let mut open = Vec::new();
        for endpoint in endpoints {
            if self.is_open(endpoint).await {
                open.push(endpoint.port());
            }
        }
        open
    }

    fn name(&self) -> &str;
}

/// Classifies the service behind one open port.
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    /// Never fails: unreachable ports come back with an unknown transport.
    async fn fingerprint(&self, endpoint: &Endpoint) -> FingerprintResult;
}
