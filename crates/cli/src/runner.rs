// runner.rs
use anyhow::{anyhow, Context, Result};
use clap::CommandFactory;
use std::io::{self, Write};
use std::{sync::Arc, time::{Duration, Instant}};
use tracing::{debug, warn};
use synprobe_common::{ScanJob, ScanOptions, ScanReport, DEFAULT_PORTS};
use synprobe_fingerprint::ServiceFingerprinter;
use synprobe_orchestrator::Orchestrator;
use synprobe_scanner_tcp::{TcpConnector, TcpScanner};
use synprobe_target_resolver::TargetResolver;
use crate::args::Cli;
use crate::output::{print_report, print_scan_start};

/// Exit status after printing usage for a missing target.
pub const USAGE_EXIT_STATUS: i32 = 2;

const TARGET_REQUIRED: &str = "Host IP required to scan. e.g. 192.168.0.1 or www.example.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// No target was given; usage was written and nothing was scanned.
    MissingTarget,
}

/// Run the command line. Usage for a missing target goes to `out`.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<RunStatus> {
    let Some(target) = cli.target.clone() else {
        write_usage(out)?;
        return Ok(RunStatus::MissingTarget);
    };
    run_scan(ScanRequest::from_cli(target, cli)).await?;
    Ok(RunStatus::Completed)
}

fn write_usage<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", TARGET_REQUIRED)?;
    writeln!(out, "{}", Cli::command().render_usage())?;
    out.flush()
}

/// Everything a run needs, taken from the command line.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub target: String,
    pub ports: Option<String>,
    pub options: ScanOptions,
    pub output_format: String,
}

impl ScanRequest {
    pub fn from_cli(target: String, cli: &Cli) -> Self {
        let options = ScanOptions::default()
            .with_scan_timeout(Duration::from_millis(cli.scan_timeout))
            .with_connect_timeout(Duration::from_millis(cli.connect_timeout))
            .with_handshake_timeout(Duration::from_millis(cli.handshake_timeout))
            .with_read_timeout(Duration::from_millis(cli.read_timeout))
            .with_write_timeout(Duration::from_millis(cli.write_timeout))
            .with_capture_limit(cli.capture_limit)
            .with_concurrency(cli.concurrency);
        Self {
            target: target.trim().to_string(),
            ports: cli.ports.clone(),
            options,
            output_format: cli.output_format.clone(),
        }
    }
}

pub async fn run_scan(request: ScanRequest) -> Result<()> {
    let port_list = match request.ports.as_deref() {
        Some(spec) => parse_ports(spec)?,
        None => DEFAULT_PORTS.to_vec(),
    };
    request.options.validate().context("Invalid options")?;

    debug!(
        target = %request.target,
        ports = port_list.len(),
        concurrency = request.options.concurrency,
        "scan request"
    );
    print_scan_start(&request.target, &port_list, &request.output_format);

    let scan_start = Instant::now();

    // An unresolvable host is reported like a host with nothing open.
    let ip = match TargetResolver::resolve_host(&request.target).await {
        Ok(ip) => ip,
        Err(e) => {
            warn!("{:#}", e);
            let report = ScanReport::unresolved(request.target, port_list, scan_start.elapsed());
            return print_report(&report, &request.output_format);
        }
    };

    let scanner = TcpScanner::new().with_timeout(request.options.scan_timeout);
    let fingerprinter = ServiceFingerprinter::new(TcpConnector::new(), &request.options)
        .context("Failed to initialize fingerprinter")?;
    let orchestrator = Orchestrator::new(Arc::new(scanner), Arc::new(fingerprinter));

    let job = ScanJob::new(request.target, ip, port_list).with_options(request.options);
    let report = orchestrator.run(job).await?;

    print_report(&report, &request.output_format)
}

/// Parses a port string like "80", "1-1024" or "22,80-90" into a vector
/// of ports in the order given.
fn parse_ports(ports_str: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();

    for part in ports_str.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if part.contains('-') {
            let range: Vec<&str> = part.split('-').collect();
            if range.len() != 2 {
                return Err(anyhow!("Invalid port range: {}", part));
            }

            let start = parse_port(range[0].trim())?;
            let end = parse_port(range[1].trim())?;

            if start > end {
                return Err(anyhow!("Invalid range: start > end"));
            }

            ports.extend(start..=end);
        } else {
            ports.push(parse_port(part)?);
        }
    }

    if ports.is_empty() {
        Err(anyhow!("No ports specified"))
    } else {
        Ok(ports)
    }
}

fn parse_port(s: &str) -> Result<u16> {
    let port: u16 = s.parse().context(format!("Invalid port: {}", s))?;
    if port == 0 {
        return Err(anyhow!("Port 0 is not a valid TCP port"));
    }
    Ok(port)
}
