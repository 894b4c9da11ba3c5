use crate::collector;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::ports;
use crate::prober;
use crate::progress::{ProgressReporter, ProgressState};
use crate::target::resolve_host;
use crate::types::{ProbeOutcome, ProbeTask, ScanResult};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, error, trace, warn};

/// Longest the engine waits for a scan before returning what it has.
pub const SCAN_CEILING: Duration = Duration::from_secs(30 * 60);

/// Runs one probe per enumerated port on a bounded pool and gathers the outcomes.
///
/// - Pool size is `config.workers()`, enforced with a `Semaphore`.
/// - Tasks complete in any order; ordering happens once, in the collector.
/// - The completion counter is the only state shared between tasks.
#[derive(Debug, Clone)]
pub struct ScanEngine {
    ceiling: Duration,
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

enum FanOutError {
    Pool(AcquireError),
    Task(JoinError, Vec<ProbeOutcome>),
}

impl ScanEngine {
    pub fn new() -> Self {
        Self {
            ceiling: SCAN_CEILING,
        }
    }

    /// Engine with a different safety ceiling on the overall wait.
    pub fn with_ceiling(ceiling: Duration) -> Self {
        Self { ceiling }
    }

    /// Resolve the configured host, then scan it. Resolution failures abort
    /// before any probe is submitted.
    pub async fn execute(&self, config: &ScanConfig) -> Result<ScanResult, ScanError> {
        let addr = resolve_host(config.host()).await?;
        self.execute_on(addr, config).await
    }

    /// Scan an already-resolved address.
    pub async fn execute_on(
        &self,
        addr: IpAddr,
        config: &ScanConfig,
    ) -> Result<ScanResult, ScanError> {
        self.execute_with(addr, config, prober::probe).await
    }

    async fn execute_with<F, Fut>(
        &self,
        addr: IpAddr,
        config: &ScanConfig,
        run: F,
    ) -> Result<ScanResult, ScanError>
    where
        F: Fn(ProbeTask) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = ProbeOutcome> + Send + 'static,
    {
        let start = Instant::now();
        let deadline = start + self.ceiling;
        let ports = ports::enumerate(config);
        let total = ports.len();

        debug!(
            host = config.host(),
            %addr,
            total,
            workers = config.workers(),
            timeout_ms = config.timeout().as_millis() as u64,
            "scan started"
        );

        let progress = ProgressState::new();
        let reporter = config
            .show_progress()
            .then(|| ProgressReporter::start(progress.clone(), total));

        let gathered = fan_out(addr, config, ports, &progress, deadline, run).await;

        if let Some(reporter) = reporter {
            reporter.stop().await;
        }
        let duration = start.elapsed();

        match gathered {
            Ok(outcomes) => {
                let result = collector::collect(config.host(), outcomes, total, duration);
                debug!(
                    open = result.open_ports.len(),
                    completed = result.completed,
                    elapsed_ms = result.duration_ms() as u64,
                    "scan finished"
                );
                Ok(result)
            }
            Err(FanOutError::Pool(e)) => Err(ScanError::Pool(e)),
            Err(FanOutError::Task(source, outcomes)) => {
                error!(error = %source, collected = outcomes.len(), "probe task failed, aborting scan");
                let partial = collector::collect(config.host(), outcomes, total, duration);
                Err(ScanError::Aborted {
                    source,
                    partial: Box::new(partial),
                })
            }
        }
    }
}

async fn fan_out<F, Fut>(
    addr: IpAddr,
    config: &ScanConfig,
    ports: Vec<u16>,
    progress: &ProgressState,
    deadline: Instant,
    run: F,
) -> Result<Vec<ProbeOutcome>, FanOutError>
where
    F: Fn(ProbeTask) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ProbeOutcome> + Send + 'static,
{
    let total = ports.len();
    let sem = Arc::new(Semaphore::new(config.workers()));
    let mut set = JoinSet::new();
    let mut outcomes = Vec::with_capacity(total);
    let mut expired = false;

    for port in ports {
        // Blocks while the pool is saturated.
        let permit = match time::timeout_at(deadline, sem.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => return Err(FanOutError::Pool(e)),
            Err(_) => {
                expired = true;
                break;
            }
        };
        let task = ProbeTask {
            addr,
            port,
            timeout: config.timeout(),
            grab_banner: config.grab_banner(),
            verbose: config.verbose(),
        };
        let progress = progress.clone();
        let run = run.clone();

        set.spawn(async move {
            let _permit = permit; // held until the probe finishes
            let outcome = run(task).await;
            progress.record();
            outcome
        });
    }

    while !expired {
        match time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok(outcome))) => {
                trace!(port = outcome.port(), open = outcome.is_open(), "task joined");
                outcomes.push(outcome);
            }
            Ok(Some(Err(e))) => {
                drain_finished(&mut set, &mut outcomes);
                return Err(FanOutError::Task(e, outcomes));
            }
            Ok(None) => break,
            Err(_) => expired = true,
        }
    }

    if expired {
        if let Some(e) = drain_finished(&mut set, &mut outcomes) {
            return Err(FanOutError::Task(e, outcomes));
        }
        warn!(
            completed = outcomes.len(),
            total,
            "scan ceiling reached; returning partial results"
        );
        // Outstanding probes keep running to completion in the background.
        set.detach_all();
    }

    Ok(outcomes)
}

/// Move every already-finished task's outcome into `outcomes` without waiting.
/// Returns the first task failure seen, if any.
fn drain_finished(
    set: &mut JoinSet<ProbeOutcome>,
    outcomes: &mut Vec<ProbeOutcome>,
) -> Option<JoinError> {
    let mut failure = None;
    while let Some(res) = set.try_join_next() {
        match res {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpenPort;
    use std::net::Ipv4Addr;

    fn open(port: u16) -> ProbeOutcome {
        ProbeOutcome::Open(OpenPort {
            port,
            service: "Unknown".into(),
            banner: String::new(),
        })
    }

    #[tokio::test]
    async fn panicking_task_aborts_with_finished_outcomes() {
        let cfg = ScanConfig::builder("127.0.0.1")
            .ports([1, 2, 3])
            .workers(3)
            .show_progress(false)
            .build()
            .unwrap();
        let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let err = ScanEngine::new()
            .execute_with(addr, &cfg, |task: ProbeTask| async move {
                if task.port == 2 {
                    panic!("worker crashed on port 2");
                }
                open(task.port)
            })
            .await
            .unwrap_err();

        let partial = err.partial_result().expect("partial result kept");
        assert!(matches!(err, ScanError::Aborted { .. }));
        assert_eq!(partial.total_ports, 3);
        let ports: Vec<u16> = partial.open_ports.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![1, 3]);
        assert!(!partial.is_complete());
    }

    #[tokio::test]
    async fn injected_outcomes_are_collected_in_port_order() {
        let cfg = ScanConfig::builder("127.0.0.1")
            .ports([30, 10, 20])
            .workers(2)
            .show_progress(false)
            .build()
            .unwrap();
        let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let result = ScanEngine::new()
            .execute_with(addr, &cfg, |task: ProbeTask| async move {
                // Later ports finish first.
                time::sleep(Duration::from_millis(40 - task.port as u64)).await;
                if task.port == 20 {
                    ProbeOutcome::NotOpen { port: task.port }
                } else {
                    open(task.port)
                }
            })
            .await
            .unwrap();

        let ports: Vec<u16> = result.open_ports.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![10, 30]);
        assert_eq!(result.completed, 3);
    }
}
