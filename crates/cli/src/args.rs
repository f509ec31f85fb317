use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "synprobe")]
#[command(version = "0.1.0")]
#[command(about = "Finds open TCP ports and fingerprints the services behind them", long_about = None)]
pub struct Cli {
    /// Target host or IP. Example: 192.168.0.1 or www.example.com
    pub target: Option<String>,

    /// Port, inclusive range, or list to scan. Examples: 22 or 1-1024 or 22,80-90
    /// [default: 21,22,23,25,80,110,143,443,587,853,993,3389,8080]
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Connect timeout for the port scan, in milliseconds
    #[arg(long, default_value = "1000")]
    pub scan_timeout: u64,

    /// Connect timeout before fingerprinting, in milliseconds
    #[arg(long, default_value = "3000")]
    pub connect_timeout: u64,

    /// TLS handshake timeout in milliseconds
    #[arg(long, default_value = "3000")]
    pub handshake_timeout: u64,

    /// Per-probe read timeout in milliseconds
    #[arg(long, default_value = "3000")]
    pub read_timeout: u64,

    /// Per-probe write timeout in milliseconds
    #[arg(long, default_value = "3000")]
    pub write_timeout: u64,

    /// Maximum response bytes kept per port
    #[arg(long, default_value = "1024")]
    pub capture_limit: usize,

    /// Ports probed at once (1 keeps the scan strictly sequential)
    #[arg(short, long, default_value = "1")]
    pub concurrency: usize,

    /// Output format: text, json
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub output_format: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
