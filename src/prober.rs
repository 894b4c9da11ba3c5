use crate::services::service_name;
use crate::types::{OpenPort, ProbeOutcome, ProbeTask};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::info;

/// Maximum number of banner lines kept.
pub const BANNER_MAX_LINES: usize = 3;
/// Upper bound on bytes read while grabbing a banner.
pub const BANNER_MAX_BYTES: u64 = 1024;
/// After the first line, wait at most `timeout / BANNER_IDLE_DIVISOR` for each further line.
pub const BANNER_IDLE_DIVISOR: u32 = 10;
/// Floor for the per-line idle window.
pub const BANNER_MIN_IDLE: Duration = Duration::from_millis(20);

/// Probe one port with a single TCP connect bounded by `task.timeout`.
///
/// - Any connect failure (refused, unreachable, timed out) yields `NotOpen`.
/// - On success, optionally reads a short banner from the same connection.
/// - The socket is owned by this call and dropped on every return path.
pub async fn probe(task: ProbeTask) -> ProbeOutcome {
    let addr = SocketAddr::new(task.addr, task.port);
    let mut stream = match time::timeout(task.timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        _ => {
            if task.verbose {
                info!(port = task.port, "[CLOSED] Port {}", task.port);
            }
            return ProbeOutcome::NotOpen { port: task.port };
        }
    };

    if task.verbose {
        info!(port = task.port, "[OPEN] Port {}", task.port);
    }

    let banner = if task.grab_banner {
        read_banner(&mut stream, task.timeout).await
    } else {
        String::new()
    };

    ProbeOutcome::Open(OpenPort {
        port: task.port,
        service: service_name(task.port).to_string(),
        banner,
    })
}

/// Read whatever the service sends on its own: up to `BANNER_MAX_LINES` lines,
/// at most `BANNER_MAX_BYTES` bytes, all within `budget`.
///
/// The first line may take the whole budget; each later line must arrive within a
/// short idle window. Silence, EOF and read errors end the read early and are not errors.
async fn read_banner(stream: &mut TcpStream, budget: Duration) -> String {
    let deadline = Instant::now() + budget;
    let idle = (budget / BANNER_IDLE_DIVISOR).max(BANNER_MIN_IDLE);
    let mut reader = BufReader::new(stream).take(BANNER_MAX_BYTES);
    let mut lines: Vec<String> = Vec::with_capacity(BANNER_MAX_LINES);

    while lines.len() < BANNER_MAX_LINES {
        let until = if lines.is_empty() {
            deadline
        } else {
            deadline.min(Instant::now() + idle)
        };
        let mut buf = Vec::new();
        // read_until is cancel safe: bytes read before the deadline stay in `buf`.
        let res = time::timeout_at(until, reader.read_until(b'\n', &mut buf)).await;
        let done = !matches!(res, Ok(Ok(n)) if n > 0 && buf.ends_with(b"\n"));
        if !buf.is_empty() {
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }
        if done {
            break;
        }
    }

    clean_banner(&lines)
}

/// Trim each line, drop control characters and blank lines, join with single spaces.
pub fn clean_banner<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|l| {
            l.as_ref()
                .chars()
                .filter(|c| !c.is_control())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
