use crate::error::ScanError;
use std::net::IpAddr;
use tokio::net::lookup_host;

/// Resolve a target host (IP literal or DNS name) to the address every probe connects to.
///
/// IPv4 addresses are preferred when a name resolves to both families.
pub async fn resolve_host(host: &str) -> Result<IpAddr, ScanError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = lookup_host((host, 0))
        .await
        .map_err(|source| ScanError::Resolve {
            host: host.to_string(),
            source,
        })?
        .map(|sa| sa.ip())
        .collect();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ScanError::NoAddress {
            host: host.to_string(),
        })
}
