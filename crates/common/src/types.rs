//! Core data types for the fingerprinting engine
//!
//! Results are built once and never mutated afterwards, so the builders
//! consume `self` and the result types expose read-only accessors.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{ProbeError, ProbeResult};

/// Default number of response bytes kept per probe.
pub const DEFAULT_CAPTURE_LIMIT: usize = 1024;

/// Well-known ports scanned when no port specification is given.
pub const DEFAULT_PORTS: [u16; 13] = [21, 22, 23, 25, 80, 110, 143, 443, 587, 853, 993, 3389, 8080];

/// Single connection target: the host as given by the user, the address it
/// resolved to, and a TCP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    ip: IpAddr,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, ip: IpAddr, port: u16) -> ProbeResult<Self> {
        if port == 0 {
            return Err(ProbeError::InvalidTarget(
                "port 0 is not a valid TCP port".to_string(),
            ));
        }
        Ok(Self {
            host: normalize_host(&host.into()),
            ip,
            port,
        })
    }

    /// Host name used for TLS server-name indication, trimmed and with any
    /// IPv6 brackets removed.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
        .to_string()
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host == self.ip.to_string() {
            write!(f, "{}", self.socket_addr())
        } else {
            write!(f, "{} ({})", self.host, self.socket_addr())
        }
    }
}

/// Transport the service was reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Tls,
    PlainTcp,
    Unknown,
}

impl Transport {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Transport::Tls => "TLS",
            Transport::PlainTcp => "TCP",
            Transport::Unknown => "unknown",
        }
    }
}

/// Conversational posture of the service behind a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversation {
    /// Sent data before we wrote anything (SSH, FTP and SMTP banners).
    ServerInitiated,
    /// Answered an HTTP/1.0 request line.
    ClientInitiated,
    /// Answered blank lines, or accepted the connection and stayed silent.
    GenericServer,
    /// No classification was possible.
    None,
}

/// Captured response bytes, bounded by the capture limit it was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample(Vec<u8>);

impl Sample {
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Copy at most `limit` bytes of `bytes`.
    #[must_use]
    pub fn capture(bytes: &[u8], limit: usize) -> Self {
        let n = bytes.len().min(limit);
        Self(bytes[..n].to_vec())
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Printable rendering: ASCII escapes for control and non-ASCII bytes.
    #[must_use]
    pub fn escaped(&self) -> String {
        self.0.escape_ascii().to_string()
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.escaped())
    }
}

/// Label plus the bytes that earned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    label: Conversation,
    sample: Sample,
}

impl ProbeOutcome {
    #[inline]
    #[must_use]
    pub fn new(label: Conversation, sample: Sample) -> Self {
        Self { label, sample }
    }

    /// Outcome for a port nothing could be learned about.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::new(Conversation::None, Sample::empty())
    }

    #[inline]
    #[must_use]
    pub const fn label(&self) -> Conversation {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn sample(&self) -> &Sample {
        &self.sample
    }
}

/// Terminal artifact for one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerprintResult {
    port: u16,
    transport: Transport,
    outcome: ProbeOutcome,
}

impl FingerprintResult {
    #[inline]
    #[must_use]
    pub fn new(port: u16, transport: Transport, outcome: ProbeOutcome) -> Self {
        Self {
            port,
            transport,
            outcome,
        }
    }

    /// The port accepted during scanning but could not be reached again.
    #[inline]
    #[must_use]
    pub fn unreachable(port: u16) -> Self {
        Self::new(port, Transport::Unknown, ProbeOutcome::none())
    }

    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.transport
    }

    #[inline]
    #[must_use]
    pub fn outcome(&self) -> &ProbeOutcome {
        &self.outcome
    }

    /// Human label, e.g. "TLS client-initiated" or "Generic TCP server".
    #[must_use]
    pub fn label(&self) -> String {
        let transport = self.transport.as_str();
        match (self.transport, self.outcome.label) {
            (Transport::Unknown, _) | (_, Conversation::None) => "unknown".to_string(),
            (_, Conversation::ServerInitiated) => format!("{transport} server-initiated"),
            (_, Conversation::ClientInitiated) => format!("{transport} client-initiated"),
            (_, Conversation::GenericServer) => format!("Generic {transport} server"),
        }
    }
}

/// One scan request: a resolved host and the ports to consider, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub host: String,
    pub ip: IpAddr,
    pub ports: Vec<u16>,
    pub options: ScanOptions,
    pub created_at: SystemTime,
}

impl ScanJob {
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, ip: IpAddr, ports: Vec<u16>) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.into(),
            ip,
            ports,
            options: ScanOptions::default(),
            created_at: SystemTime::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Endpoint for one of this job's ports.
    pub fn endpoint(&self, port: u16) -> ProbeResult<Endpoint> {
        Endpoint::new(self.host.clone(), self.ip, port)
    }
}

/// Timeouts and limits for scanning and probing.
///
/// Every network operation is bounded by one of these; a zero value is
/// rejected by [`ScanOptions::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Bare connect during the port-scan phase.
    pub scan_timeout: Duration,
    /// Connect before fingerprinting.
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Applied to each probe read independently.
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub capture_limit: usize,
    /// Worker count; 1 keeps the sequential schedule.
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            concurrency: 1,
        }
    }
}

impl ScanOptions {
    #[inline]
    #[must_use]
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn validate(&self) -> ProbeResult<()> {
        let timeouts = [
            ("scan_timeout", self.scan_timeout),
            ("connect_timeout", self.connect_timeout),
            ("handshake_timeout", self.handshake_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ProbeError::Config(format!("{name} must be positive")));
            }
        }
        if self.capture_limit == 0 {
            return Err(ProbeError::Config("capture_limit must be positive".into()));
        }
        if self.concurrency == 0 {
            return Err(ProbeError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Everything a finished job produced, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub job_id: Uuid,
    pub host: String,
    pub ip: Option<IpAddr>,
    pub scanned_ports: Vec<u16>,
    pub open_ports: Vec<u16>,
    pub results: Vec<FingerprintResult>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ScanReport {
    /// Report for a host that could not be resolved; nothing was reachable.
    #[must_use]
    pub fn unresolved(host: impl Into<String>, ports: Vec<u16>, elapsed: Duration) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            host: host.into(),
            ip: None,
            scanned_ports: ports,
            open_ports: Vec::new(),
            results: Vec::new(),
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn endpoint_rejects_port_zero() {
        assert!(Endpoint::new("localhost", LOCALHOST, 0).is_err());
        let ep = Endpoint::new("localhost", LOCALHOST, 22).unwrap();
        assert_eq!(ep.port(), 22);
        assert_eq!(ep.host(), "localhost");
        assert_eq!(ep.socket_addr(), SocketAddr::new(LOCALHOST, 22));
    }

    #[test]
    fn endpoint_display() {
        let named = Endpoint::new("localhost", LOCALHOST, 443).unwrap();
        assert_eq!(named.to_string(), "localhost (127.0.0.1:443)");
        let literal = Endpoint::new("127.0.0.1", LOCALHOST, 443).unwrap();
        assert_eq!(literal.to_string(), "127.0.0.1:443");
    }

    #[test]
    fn endpoint_host_is_normalized() {
        let v6 = IpAddr::V6(std::net::Ipv6Addr::LOCALHOST);
        let bracketed = Endpoint::new("[::1]", v6, 443).unwrap();
        assert_eq!(bracketed.host(), "::1");
        assert_eq!(bracketed.to_string(), "[::1]:443");

        let padded = Endpoint::new("  localhost\n", LOCALHOST, 443).unwrap();
        assert_eq!(padded.host(), "localhost");
    }

    #[test]
    fn sample_is_bounded_by_limit() {
        let bytes = vec![b'a'; 4096];
        let sample = Sample::capture(&bytes, DEFAULT_CAPTURE_LIMIT);
        assert_eq!(sample.len(), DEFAULT_CAPTURE_LIMIT);
        assert_eq!(Sample::capture(b"short", 1024).as_bytes(), b"short");
    }

    #[test]
    fn sample_escapes_non_printable_bytes() {
        let sample = Sample::capture(b"SSH-2.0-OpenSSH_8.9\r\n\x00\xff", 1024);
        assert_eq!(sample.escaped(), "SSH-2.0-OpenSSH_8.9\\r\\n\\x00\\xff");
        assert_eq!(sample.to_string(), sample.escaped());
    }

    #[test]
    fn result_labels() {
        let sample = Sample::capture(b"x", 8);
        let tls = FingerprintResult::new(
            443,
            Transport::Tls,
            ProbeOutcome::new(Conversation::ClientInitiated, sample.clone()),
        );
        assert_eq!(tls.label(), "TLS client-initiated");

        let plain = FingerprintResult::new(
            22,
            Transport::PlainTcp,
            ProbeOutcome::new(Conversation::ServerInitiated, sample),
        );
        assert_eq!(plain.label(), "TCP server-initiated");

        let generic = FingerprintResult::new(
            9,
            Transport::PlainTcp,
            ProbeOutcome::new(Conversation::GenericServer, Sample::empty()),
        );
        assert_eq!(generic.label(), "Generic TCP server");

        let unreachable = FingerprintResult::unreachable(9);
        assert_eq!(unreachable.transport(), Transport::Unknown);
        assert_eq!(unreachable.outcome().label(), Conversation::None);
        assert_eq!(unreachable.label(), "unknown");
    }

    #[test]
    fn result_serializes_sample_as_escaped_text() {
        let result = FingerprintResult::new(
            22,
            Transport::PlainTcp,
            ProbeOutcome::new(Conversation::ServerInitiated, Sample::capture(b"hi\r\n", 16)),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["transport"], "plain_tcp");
        assert_eq!(value["outcome"]["label"], "server_initiated");
        assert_eq!(value["outcome"]["sample"], "hi\\r\\n");
    }

    #[test]
    fn options_validation() {
        let opts = ScanOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.capture_limit, 1024);
        assert_eq!(opts.read_timeout, Duration::from_secs(3));

        assert!(opts.clone().with_read_timeout(Duration::ZERO).validate().is_err());
        assert!(opts.clone().with_capture_limit(0).validate().is_err());
        assert!(opts.with_concurrency(0).validate().is_err());
    }

    #[test]
    fn unresolved_report_is_empty() {
        let report = ScanReport::unresolved("nowhere.invalid", vec![22, 80], Duration::from_millis(5));
        assert!(report.ip.is_none());
        assert_eq!(report.scanned_ports, vec![22, 80]);
        assert!(report.open_ports.is_empty());
        assert!(report.results.is_empty());
    }

    #[test]
    fn job_endpoints() {
        let job = ScanJob::new("localhost", LOCALHOST, vec![22, 80]);
        assert_eq!(job.endpoint(80).unwrap().port(), 80);
        assert!(job.endpoint(0).is_err());
        assert_eq!(job.options, ScanOptions::default());
    }
}
