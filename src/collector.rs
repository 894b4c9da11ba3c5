use crate::types::{ProbeOutcome, ScanResult};
use std::time::Duration;

/// Turn the raw outcomes of a finished scan into the final ordered result.
///
/// Runs after all probe tasks have joined; keeps only open ports and sorts
/// them ascending by port number regardless of completion order.
pub fn collect(
    host: &str,
    outcomes: Vec<ProbeOutcome>,
    total_ports: usize,
    duration: Duration,
) -> ScanResult {
    let completed = outcomes.len();
    let mut open_ports: Vec<_> = outcomes
        .into_iter()
        .filter_map(|o| match o {
            ProbeOutcome::Open(open) => Some(open),
            ProbeOutcome::NotOpen { .. } => None,
        })
        .collect();
    open_ports.sort_unstable_by_key(|p| p.port);

    ScanResult {
        host: host.to_string(),
        open_ports,
        total_ports,
        completed,
        duration,
    }
}
