use crate::config::ConfigError;
use crate::types::ScanResult;
use thiserror::Error;

/// Fatal scan failures. Per-port networking failures never show up here;
/// they are reported as `ProbeOutcome::NotOpen`.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("host {host} resolved to no addresses")]
    NoAddress { host: String },

    #[error("worker pool unavailable: {0}")]
    Pool(#[from] tokio::sync::AcquireError),

    #[error("scan aborted after {} of {} probes: {source}", .partial.completed, .partial.total_ports)]
    Aborted {
        #[source]
        source: tokio::task::JoinError,
        partial: Box<ScanResult>,
    },
}

impl ScanError {
    /// Outcomes gathered before the scan was aborted, if any.
    pub fn partial_result(&self) -> Option<&ScanResult> {
        match self {
            ScanError::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
