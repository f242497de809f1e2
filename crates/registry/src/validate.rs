//! Public URI validation: a Node's `publicUri` must be an absolute
//! `http(s)` URL whose host is a bare IP address — no DNS names, since the
//! audit engine dials this URI directly and a resolvable hostname would
//! let a Node's apparent address drift between registration and audit.

use chronicle_types::RegistryError;
use std::net::IpAddr;
use std::str::FromStr;

/// Validates `uri` against the Node Registry's rules, returning the
/// normalized (lowercased scheme/host) form on success.
pub fn validate_public_uri(uri: &str) -> Result<String, RegistryError> {
    let (scheme, rest) = uri
    .split_once("://")
    .ok_or_else(|| RegistryError::InvalidArgument(format!("not an absolute URL: {uri}")))?;
    let scheme = scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(RegistryError::InvalidArgument(format!(
                    "unsupported scheme: {scheme}"
        )));
    }

    let authority = rest.split('/').next().unwrap_or(rest);
    let host = strip_port(authority);
    let ip = IpAddr::from_str(host)
    .map_err(|_| RegistryError::InvalidArgument(format!("host is not a bare IP: {host}")))?;

    if ip.is_loopback() || ip.is_unspecified() {
        return Err(RegistryError::InvalidArgument(format!(
                    "host {ip} is loopback or unspecified"
        )));
    }
    if is_private(&ip) {
        return Err(RegistryError::InvalidArgument(format!(
                    "host {ip} is a private-range address"
        )));
    }

    Ok(format!("{scheme}://{authority}"))
}

fn strip_port(authority: &str) -> &str {
    if let Some(stripped) = authority.strip_prefix('[') {
        // IPv6 literal: `[::1]:8080`.
        return stripped.split(']').next().unwrap_or(stripped);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00 || v6.is_unicast_link_local(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_https_ip_uri() {
        assert_eq!(
            validate_public_uri("https://203.0.113.10:8443/node").unwrap(),
            "https://203.0.113.10:8443"
        );
    }

    #[test]
    fn rejects_hostname_instead_of_ip() {
        assert!(validate_public_uri("https://node.example.com/").is_err());
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(validate_public_uri("ftp://203.0.113.10/").is_err());
    }

    #[test]
    fn rejects_loopback() {
        assert!(validate_public_uri("http://127.0.0.1:8080/").is_err());
    }

    #[test]
    fn rejects_unspecified() {
        assert!(validate_public_uri("http://0.0.0.0:8080/").is_err());
    }

    #[test]
    fn rejects_private_range() {
        assert!(validate_public_uri("http://10.0.0.5/").is_err());
        assert!(validate_public_uri("http://192.168.1.5/").is_err());
    }
}
