use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 200;
pub const MIN_TIMEOUT_MS: u64 = 50;
pub const MAX_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_WORKERS: usize = 100;
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 500;

pub const DEFAULT_START_PORT: u32 = 1;
pub const DEFAULT_END_PORT: u32 = 1024;

/// Configuration problems detected before any probe is submitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target host must not be empty")]
    EmptyHost,
    #[error("invalid port range {start}-{end}: start port must be <= end port")]
    InvertedRange { start: u16, end: u16 },
    #[error("no ports selected for scanning")]
    NoPorts,
}

/// Which ports a scan covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    /// Inclusive range, `start <= end`.
    Range { start: u16, end: u16 },
    /// Explicit ports in scan order, without duplicates.
    List(Vec<u16>),
}

impl PortSelection {
    fn len(&self) -> usize {
        match self {
            PortSelection::Range { start, end } => (*end as usize) - (*start as usize) + 1,
            PortSelection::List(ports) => ports.len(),
        }
    }
}

/// Immutable scan parameters. Construct with [`ScanConfig::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    host: String,
    ports: PortSelection,
    timeout: Duration,
    workers: usize,
    grab_banner: bool,
    show_progress: bool,
    verbose: bool,
}

impl ScanConfig {
    pub fn builder(host: impl Into<String>) -> ScanConfigBuilder {
        ScanConfigBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ports(&self) -> &PortSelection {
        &self.ports
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn grab_banner(&self) -> bool {
        self.grab_banner
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}

#[derive(Debug, Clone)]
enum RawPorts {
    Range(u32, u32),
    List(Vec<u16>),
}

/// Collects raw, possibly out-of-bounds settings and clamps them on `build`.
#[derive(Debug, Clone)]
pub struct ScanConfigBuilder {
    host: String,
    ports: RawPorts,
    timeout_ms: u64,
    workers: usize,
    grab_banner: bool,
    show_progress: bool,
    verbose: bool,
}

impl ScanConfigBuilder {
    fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: RawPorts::Range(DEFAULT_START_PORT, DEFAULT_END_PORT),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            workers: DEFAULT_WORKERS,
            grab_banner: false,
            show_progress: true,
            verbose: false,
        }
    }

    /// Inclusive range; each bound is clamped into 1..=65535 on build.
    pub fn range(mut self, start: u32, end: u32) -> Self {
        self.ports = RawPorts::Range(start, end);
        self
    }

    pub fn ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = RawPorts::List(ports.into_iter().collect());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn grab_banner(mut self, on: bool) -> Self {
        self.grab_banner = on;
        self
    }

    pub fn show_progress(mut self, on: bool) -> Self {
        self.show_progress = on;
        self
    }

    pub fn verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    pub fn build(self) -> Result<ScanConfig, ConfigError> {
        let host = self.host.trim().to_string();
        if host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let ports = match self.ports {
            RawPorts::Range(start, end) => {
                let start = clamp_port(start);
                let end = clamp_port(end);
                if start > end {
                    return Err(ConfigError::InvertedRange { start, end });
                }
                PortSelection::Range { start, end }
            }
            RawPorts::List(list) => {
                let mut seen = HashSet::new();
                let ports: Vec<u16> = list
                    .into_iter()
                    .filter(|&p| p != 0 && seen.insert(p))
                    .collect();
                if ports.is_empty() {
                    return Err(ConfigError::NoPorts);
                }
                PortSelection::List(ports)
            }
        };

        Ok(ScanConfig {
            host,
            ports,
            timeout: Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)),
            workers: self.workers.clamp(MIN_WORKERS, MAX_WORKERS),
            grab_banner: self.grab_banner,
            show_progress: self.show_progress,
            verbose: self.verbose,
        })
    }
}

fn clamp_port(p: u32) -> u16 {
    p.clamp(1, u16::MAX as u32) as u16
}
