//! Error types for synprobe
//!
//! Network-level failures are per-port conditions; callers contain them
//! instead of aborting a multi-port run.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection to {addr} failed: {source}")]
    Connection {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("connection to {0} timed out")]
    ConnectTimeout(SocketAddr),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TLS setup error: {0}")]
    Tls(String),
}

impl ProbeError {
    /// True for failures that mean "nothing is listening or reachable here".
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ProbeError::Connection { .. } | ProbeError::ConnectTimeout(_)
        )
    }
}

/// Result type alias for synprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;
