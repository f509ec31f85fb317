//! synprobe common - shared types and traits
//!
//! Core types, traits, and errors used across the synprobe crates:
//! - endpoint, outcome and result types for per-port fingerprinting
//! - the `Connector` / `PortScanner` / `Fingerprinter` seams
//! - the `ByteStream` capability shared by plain and TLS streams

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ProbeError, ProbeResult};
pub use traits::{close, ByteStream, Connector, Fingerprinter, PortScanner};
pub use types::{
    Conversation, Endpoint, FingerprintResult, ProbeOutcome, Sample, ScanJob, ScanOptions,
    ScanReport, Transport, DEFAULT_CAPTURE_LIMIT, DEFAULT_PORTS,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
