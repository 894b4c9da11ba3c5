use crate::types::ScanResult;
use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Report file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Txt,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    scan_info: ScanInfo<'a>,
    open_ports: &'a [crate::types::OpenPort],
}

#[derive(Serialize)]
struct ScanInfo<'a> {
    target: &'a str,
    timestamp: String,
    duration_ms: u64,
    total_open_ports: usize,
}

/// Write `result` into `dir` as `scan_<host>_<unix-millis>.<ext>` and return the path.
pub fn write_report(result: &ScanResult, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    let now = OffsetDateTime::now_utc();
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let name = format!(
        "scan_{}_{}.{}",
        result.host.replace(['.', ':'], "_"),
        millis,
        format.extension()
    );
    let path = dir.join(name);
    let file = File::create(&path)
        .with_context(|| format!("failed to create report file: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    match format {
        ExportFormat::Txt => write_text(&mut w, result, &rfc3339(now))?,
        ExportFormat::Csv => write_csv(&mut w, result)?,
        ExportFormat::Json => write_json(&mut w, result, &rfc3339(now))?,
    }
    w.flush()?;
    Ok(path)
}

pub fn write_text<W: Write>(w: &mut W, result: &ScanResult, timestamp: &str) -> Result<()> {
    let rule = "═".repeat(47);
    let thin = "─".repeat(47);
    writeln!(w, "{rule}")?;
    writeln!(w, "           PORT SCAN REPORT")?;
    writeln!(w, "{rule}")?;
    writeln!(w)?;
    writeln!(w, "Target Host: {}", result.host)?;
    writeln!(w, "Scan Date: {timestamp}")?;
    writeln!(w, "Duration: {} ms", result.duration_ms())?;
    writeln!(w, "Total Open Ports: {}", result.open_ports.len())?;
    writeln!(w)?;
    writeln!(w, "{thin}")?;
    writeln!(w, "OPEN PORTS:")?;
    writeln!(w, "{thin}")?;
    for p in &result.open_ports {
        writeln!(w, "{p}")?;
    }
    writeln!(w)?;
    writeln!(w, "{rule}")?;
    writeln!(w, "End of Report")?;
    writeln!(w, "{rule}")?;
    Ok(())
}

pub fn write_csv<W: Write>(w: W, result: &ScanResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(["Port", "Service", "Banner", "Status"])?;
    for p in &result.open_ports {
        let port = p.port.to_string();
        wtr.write_record([port.as_str(), p.service.as_str(), p.banner.as_str(), "OPEN"])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(w: W, result: &ScanResult, timestamp: &str) -> Result<()> {
    let report = JsonReport {
        scan_info: ScanInfo {
            target: &result.host,
            timestamp: timestamp.to_string(),
            duration_ms: result.duration_ms() as u64,
            total_open_ports: result.open_ports.len(),
        },
        open_ports: &result.open_ports,
    };
    serde_json::to_writer_pretty(w, &report)?;
    Ok(())
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpenPort;
    use std::time::Duration;

    fn sample() -> ScanResult {
        ScanResult {
            host: "10.0.0.5".into(),
            open_ports: vec![
                OpenPort {
                    port: 22,
                    service: "SSH".into(),
                    banner: "SSH-2.0-OpenSSH_9.6 \"test\"".into(),
                },
                OpenPort {
                    port: 80,
                    service: "HTTP".into(),
                    banner: String::new(),
                },
            ],
            total_ports: 100,
            completed: 100,
            duration: Duration::from_millis(321),
        }
    }

    #[test]
    fn csv_escapes_quotes() {
        let mut out = Vec::new();
        write_csv(&mut out, &sample()).unwrap();
        let s = String::from_utf8(out).unwrap();
        let mut lines = s.lines();
        assert_eq!(lines.next(), Some("Port,Service,Banner,Status"));
        assert_eq!(
            lines.next(),
            Some("22,SSH,\"SSH-2.0-OpenSSH_9.6 \"\"test\"\"\",OPEN")
        );
        assert_eq!(lines.next(), Some("80,HTTP,,OPEN"));
    }

    #[test]
    fn json_shape() {
        let mut out = Vec::new();
        write_json(&mut out, &sample(), "2026-01-01T00:00:00Z").unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v["scan_info"]["target"], "10.0.0.5");
        assert_eq!(v["scan_info"]["duration_ms"], 321);
        assert_eq!(v["scan_info"]["total_open_ports"], 2);
        assert_eq!(v["open_ports"][0]["port"], 22);
        assert_eq!(v["open_ports"][1]["service"], "HTTP");
    }

    #[test]
    fn write_report_creates_named_file_per_format() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample();

        for (format, ext) in [
            (ExportFormat::Txt, "txt"),
            (ExportFormat::Csv, "csv"),
            (ExportFormat::Json, "json"),
        ] {
            let path = write_report(&result, format, dir.path()).unwrap();
            assert_eq!(path.parent(), Some(dir.path()));
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some(ext));
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("scan_10_0_0_5_"), "unexpected name {name}");

            let written = std::fs::read(&path).unwrap();
            let mut expected = Vec::new();
            match format {
                ExportFormat::Csv => {
                    write_csv(&mut expected, &result).unwrap();
                    assert_eq!(written, expected);
                }
                ExportFormat::Txt => {
                    let text = String::from_utf8(written).unwrap();
                    let stamp = text
                        .lines()
                        .find_map(|l| l.strip_prefix("Scan Date: "))
                        .expect("date line");
                    write_text(&mut expected, &result, stamp).unwrap();
                    assert_eq!(text.as_bytes(), expected.as_slice());
                }
                ExportFormat::Json => {
                    let got: serde_json::Value = serde_json::from_slice(&written).unwrap();
                    let stamp = got["scan_info"]["timestamp"].as_str().unwrap();
                    write_json(&mut expected, &result, stamp).unwrap();
                    let want: serde_json::Value = serde_json::from_slice(&expected).unwrap();
                    assert_eq!(got, want);
                }
            }
        }
    }

    #[test]
    fn text_lists_ports() {
        let mut out = Vec::new();
        write_text(&mut out, &sample(), "now").unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("Target Host: 10.0.0.5"));
        assert!(s.contains("Port 80 (HTTP)\n"));
        assert!(s.contains("Total Open Ports: 2"));
    }
}
