//! Output formatting for scan reports

use anyhow::Result;
use serde_json::json;
use std::io::{self, Write};
use std::time::Duration;
use synprobe_common::{FingerprintResult, ScanReport, Transport};

/// Announce the scan before any network activity (text format only).
pub fn print_scan_start(target: &str, ports: &[u16], format: &str) {
    if is_text(format) {
        println!("Scanning {} on port(s) {:?}", target, ports);
    }
}

/// Print a finished report in the specified format
pub fn print_report(report: &ScanReport, format: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if is_text(format) {
        write_text(&mut out, report)?;
    } else {
        write_json(&mut out, report)?;
    }
    out.flush()?;
    Ok(())
}

fn is_text(format: &str) -> bool {
    !format.trim().eq_ignore_ascii_case("json")
}

/// Per open port: a progress line, the label line, then the escaped sample.
fn write_text<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    if report.ip.is_none() {
        writeln!(out, "Could not resolve {}", report.host)?;
    }
    writeln!(out, "Open ports: {:?}", report.open_ports)?;

    for result in &report.results {
        write_result(out, result)?;
    }

    let tls = report
        .results
        .iter()
        .filter(|r| r.transport() == Transport::Tls)
        .count();
    writeln!(out)?;
    writeln!(out, "Summary:")?;
    writeln!(out, "  Ports scanned: {}", report.scanned_ports.len())?;
    writeln!(out, "  Open ports: {}", report.open_ports.len())?;
    writeln!(out, "  TLS services: {}", tls)?;
    writeln!(out, "  Scan duration: {}", format_duration(report.elapsed))?;
    Ok(())
}

fn write_result<W: Write>(out: &mut W, result: &FingerprintResult) -> io::Result<()> {
    writeln!(out, "Fingerprinting port {}.", result.port())?;
    if result.transport() == Transport::Unknown {
        return writeln!(out, "Port {}: unknown (connection failed)", result.port());
    }
    writeln!(out, "Port {}: {}", result.port(), result.label())?;
    let sample = result.outcome().sample();
    if sample.is_empty() {
        writeln!(out, "Data: (none)")
    } else {
        writeln!(out, "Data: {}", sample)
    }
}

fn write_json<W: Write>(out: &mut W, report: &ScanReport) -> Result<()> {
    let output = json!({
        "scan_info": {
            "duration_seconds": report.elapsed.as_secs_f64(),
            "duration_formatted": format_duration(report.elapsed),
            "total_scanned": report.scanned_ports.len(),
            "total_open": report.open_ports.len(),
        },
        "report": report,
    });

    writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

/// Format duration in a human-readable way
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}
