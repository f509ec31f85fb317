//! Fingerprint Engine - protocol posture detection for open TCP ports
//!
//! This crate provides:
//! - TLS detection by a verification-free client handshake
//! - conversation classification (server-first, client-first, generic)
//! - the per-port strategy combining both

mod classifier;
mod engine;
mod tls;

pub use classifier::{ConversationClassifier, GENERIC_PROBE, HTTP_PROBE};
pub use engine::ServiceFingerprinter;
pub use tls::{NotTls, TlsProber, TlsStream};
