use std::path::PathBuf;

use portprobe::config::{
    PortSelection, ScanConfig, DEFAULT_END_PORT, DEFAULT_START_PORT, DEFAULT_TIMEOUT_MS,
    DEFAULT_WORKERS,
};
use portprobe::export::{self, ExportFormat};
use portprobe::scanner::ScanEngine;
use portprobe::types::ScanResult;
use portprobe::{ports, target};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// portprobe: fast multi-worker TCP connect port scanner with optional banner grabbing.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portprobe",
    version,
    about = "Fast multi-worker TCP connect port scanner with optional banner grabbing.",
    after_help = "Only scan systems you own or have permission to test."
)]
struct Cli {
    /// Target host name or IP address.
    host: String,

    /// First port of the range to scan.
    #[arg(default_value_t = DEFAULT_START_PORT)]
    start_port: u32,

    /// Last port of the range to scan (inclusive).
    #[arg(default_value_t = DEFAULT_END_PORT)]
    end_port: u32,

    /// Scan the curated list of common ports instead of a range.
    #[arg(long = "top-ports", conflicts_with_all = ["ports", "ports_file"])]
    top_ports: bool,

    /// Explicit ports to scan, e.g. `22,80,8000-8010`. Overrides the range.
    #[arg(short = 'p', long, conflicts_with = "ports_file")]
    ports: Option<String>,

    /// File with one port or range per line (`#` starts a comment). Overrides the range.
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Connection timeout in milliseconds (clamped to 50..=5000).
    #[arg(short = 't', long = "timeout", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Number of concurrent workers (clamped to 1..=500).
    #[arg(short = 'c', long = "threads", default_value_t = DEFAULT_WORKERS)]
    threads: usize,

    /// Read the initial banner from open ports.
    #[arg(short = 'b', long)]
    banner: bool,

    /// Print every probed port and enable debug logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable the progress display.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Export results to a report file in this format.
    #[arg(short = 'o', long, value_enum)]
    output: Option<ExportFormat>,

    /// Directory for exported reports.
    #[arg(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let builder = ScanConfig::builder(cli.host.clone())
        .timeout_ms(cli.timeout_ms)
        .workers(cli.threads)
        .grab_banner(cli.banner)
        .show_progress(!cli.quiet)
        .verbose(cli.verbose);

    let builder = if cli.top_ports {
        builder.ports(ports::top_ports())
    } else if let Some(spec) = cli.ports.as_deref() {
        builder.ports(ports::parse_ports_str(spec)?)
    } else if let Some(path) = cli.ports_file.as_deref() {
        builder.ports(ports::load_ports_from_path(path)?)
    } else {
        builder.range(cli.start_port, cli.end_port)
    };
    let config = builder.build()?;

    // Unresolvable targets fail here, before anything is printed or probed.
    let addr = target::resolve_host(config.host()).await?;

    print_header(&config, cli.top_ports);
    let engine = ScanEngine::new();
    let result = match engine.execute_on(addr, &config).await {
        Ok(result) => result,
        Err(e) => {
            if let Some(partial) = e.partial_result() {
                print_results(partial);
            }
            return Err(e.into());
        }
    };
    print_results(&result);

    if let Some(format) = cli.output {
        match export::write_report(&result, format, &cli.output_dir) {
            Ok(path) => println!("✓ Results exported to: {}", path.display()),
            Err(e) => eprintln!("✗ Failed to export results: {e:#}"),
        }
    }

    Ok(())
}

fn print_header(config: &ScanConfig, top_ports: bool) {
    let rule = "═".repeat(47);
    println!("{rule}");
    println!("        MULTI-WORKER PORT SCANNER");
    println!("{rule}");
    println!();
    println!("Target: {}", config.host());
    match config.ports() {
        PortSelection::Range { start, end } => {
            println!("Ports: {start} - {end} ({} ports)", config.port_count())
        }
        PortSelection::List(_) if top_ports => {
            println!("Scanning top {} common ports", config.port_count())
        }
        PortSelection::List(_) => println!("Scanning {} selected ports", config.port_count()),
    }
    println!("Timeout: {} ms", config.timeout().as_millis());
    println!("Threads: {}", config.workers());
    println!(
        "Banner Grabbing: {}",
        if config.grab_banner() { "Enabled" } else { "Disabled" }
    );
    println!();
    println!("Starting scan...");
    println!("{}", "─".repeat(47));
}

fn print_results(result: &ScanResult) {
    let rule = "═".repeat(47);
    println!();
    println!("{rule}");
    println!("           SCAN RESULTS");
    println!("{rule}");
    println!();

    if result.open_ports.is_empty() {
        println!("No open TCP ports found in the specified range.");
    } else {
        println!("Open Ports: {}", result.open_ports.len());
        println!();
        for p in &result.open_ports {
            println!("  {p}");
        }
    }

    if !result.is_complete() {
        println!();
        println!(
            "Warning: only {} of {} ports were probed before the scan stopped.",
            result.completed, result.total_ports
        );
    }

    println!();
    println!("{}", "─".repeat(47));
    println!("Scan completed in {} ms", result.duration_ms());
    println!("{rule}");
}
