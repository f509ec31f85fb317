//! TCP connect scanning and connection setup
//!
//! - [`TcpConnector`]: bounded-timeout connects handing out owned streams
//! - [`TcpScanner`]: connect-and-close port discovery

mod connector;
mod scanner;

pub use connector::TcpConnector;
pub use scanner::TcpScanner;
