use crate::config::{PortSelection, ScanConfig};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Expand a scan configuration into the ports to probe, in probe-submission order.
///
/// Ranges yield `start..=end`; explicit lists are returned as configured, not re-sorted.
pub fn enumerate(config: &ScanConfig) -> Vec<u16> {
    match config.ports() {
        PortSelection::Range { start, end } => (*start..=*end).collect(),
        PortSelection::List(ports) => ports.clone(),
    }
}

/// Parse a port specification into a deduplicated list of TCP ports (1..=65535).
///
/// Entries are separated by newlines or commas:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
/// - whitespace and blank entries are ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");

        for item in line.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if let Some((a, b)) = item.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                out.extend((start..=end).filter(|p| seen.insert(*p)));
                continue;
            }

            let p = parse_port_str(item)
                .with_context(|| format!("line {line_no}: invalid port value: {item}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// Load a ports list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

/// Curated list of commonly exposed TCP ports for quick scans.
pub fn top_ports() -> Vec<u16> {
    const TOP: &[u16] = &[
        21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389,
        5432, 5900, 8080, 27017,
    ];
    TOP.to_vec()
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_separated() {
        let ports = parse_ports_str("443, 22,80").unwrap();
        assert_eq!(ports, vec![443, 22, 80]);
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let input = "8000-8002\n80\n8001\n";
        let ports = parse_ports_str(input).unwrap();
        assert_eq!(ports, vec![8000, 8001, 8002, 80]);
    }

    #[test]
    fn inverted_range_errors() {
        assert!(parse_ports_str("90-80").is_err());
    }

    #[test]
    fn invalid_values_error() {
        assert!(parse_ports_str("70000\n").is_err());
        assert!(parse_ports_str("http").is_err());
    }

    #[test]
    fn enumerate_range_is_inclusive() {
        let cfg = ScanConfig::builder("h").range(8000, 8100).build().unwrap();
        let ports = enumerate(&cfg);
        assert_eq!(ports.len(), 101);
        assert_eq!(ports.first(), Some(&8000));
        assert_eq!(ports.last(), Some(&8100));
    }

    #[test]
    fn enumerate_list_keeps_configured_order() {
        let cfg = ScanConfig::builder("h").ports(top_ports()).build().unwrap();
        assert_eq!(enumerate(&cfg), top_ports());
    }
}
