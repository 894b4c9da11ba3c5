use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// One unit of work: probe a single port on an already-resolved address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTask {
    pub addr: IpAddr,
    pub port: u16,
    pub timeout: Duration,
    pub grab_banner: bool,
    pub verbose: bool,
}

/// An open port discovered by a probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenPort {
    pub port: u16,
    pub service: String,
    pub banner: String,
}

impl fmt::Display for OpenPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Port {}", self.port)?;
        if !self.service.is_empty() {
            write!(f, " ({})", self.service)?;
        }
        if !self.banner.is_empty() {
            write!(f, " - Banner: {}", self.banner)?;
        }
        Ok(())
    }
}

/// Result of executing exactly one `ProbeTask`.
///
/// Refused, filtered and timed-out connections all collapse into `NotOpen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Open(OpenPort),
    NotOpen { port: u16 },
}

impl ProbeOutcome {
    pub fn port(&self) -> u16 {
        match self {
            ProbeOutcome::Open(open) => open.port,
            ProbeOutcome::NotOpen { port } => *port,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ProbeOutcome::Open(_))
    }
}

/// Final, ordered result of a scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanResult {
    pub host: String,
    /// Open ports, strictly ascending by port number.
    pub open_ports: Vec<OpenPort>,
    pub total_ports: usize,
    /// Number of probes that reported back before the engine stopped waiting.
    pub completed: usize,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl ScanResult {
    /// False only when the safety ceiling expired with probes still outstanding.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total_ports
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_service_and_banner() {
        let p = OpenPort {
            port: 22,
            service: "SSH".into(),
            banner: "SSH-2.0-OpenSSH_9.6".into(),
        };
        assert_eq!(p.to_string(), "Port 22 (SSH) - Banner: SSH-2.0-OpenSSH_9.6");
    }

    #[test]
    fn display_omits_empty_banner() {
        let p = OpenPort {
            port: 8080,
            service: "HTTP-Proxy".into(),
            banner: String::new(),
        };
        assert_eq!(p.to_string(), "Port 8080 (HTTP-Proxy)");
    }

    #[test]
    fn outcome_port_accessor() {
        assert_eq!(ProbeOutcome::NotOpen { port: 7 }.port(), 7);
        assert!(!ProbeOutcome::NotOpen { port: 7 }.is_open());
    }

    #[test]
    fn duration_serializes_as_millis() {
        let r = ScanResult {
            host: "h".into(),
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["duration"], 1500);
    }
}
