/// Name reported for ports missing from the table.
pub const UNKNOWN_SERVICE: &str = "Unknown";

const SERVICES: &[(u16, &str)] = &[
    (20, "FTP-Data"),
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (111, "RPC"),
    (135, "MS-RPC"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (465, "SMTPS"),
    (587, "SMTP-Submission"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MS-SQL"),
    (1521, "Oracle-DB"),
    (1723, "PPTP"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8080, "HTTP-Proxy"),
    (8443, "HTTPS-Alt"),
    (9090, "WebSphere"),
    (27017, "MongoDB"),
];

/// Look up the conventional service name for a TCP port.
pub fn service_name(port: u16) -> &'static str {
    SERVICES
        .binary_search_by_key(&port, |&(p, _)| p)
        .map(|i| SERVICES[i].1)
        .unwrap_or(UNKNOWN_SERVICE)
}
