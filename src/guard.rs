//! Outbound-address guard.
//!
//! Blocks requests whose target URL points at internal infrastructure
//! (loopback, RFC 1918, link-local, unique-local and similar ranges) before
//! any socket is opened, so a caller-controlled endpoint cannot be used to
//! reach services behind the host's network boundary.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::warn;
use url::{Host, Url};

use crate::error::ApiClientError;

const BLOCKED_HOSTS: [&str; 5] = ["localhost", "127.0.0.1", "0.0.0.0", "::1", "::ffff:127.0.0.1"];

/// Hostname fragments that often indicate internal infrastructure. These are
/// heuristic signals only: such names can belong to legitimate external
/// domains, so a match is logged but never blocked.
const INTERNAL_HOST_TOKENS: [&str; 7] = [
    "internal",
    "intranet",
    "corp",
    "private",
    ".local",
    ".localhost",
    ".internal",
];

enum IpBlockReason {
    PrivateOrReserved,
    LinkLocal,
    UniqueLocal,
}

/// Validates a fully resolved target URL before any network I/O.
///
/// URLs without a scheme are relative to the client base URL and trusted by
/// construction; unparseable strings are left for the URL check in `execute`
/// to report.
pub(crate) fn validate_outbound_url(target: &str) -> Result<(), ApiClientError> {
    let Ok(parsed) = Url::parse(target) else {
        return Ok(());
    };

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ApiClientError::validation(format!(
                "Invalid URL scheme: {other}. Only http/https allowed"
            )));
        }
    }

    let Some(host) = parsed.host() else {
        return Ok(());
    };

    let host_text = parsed
        .host_str()
        .unwrap_or_default()
        .trim_matches(['[', ']'])
        .to_ascii_lowercase();
    if BLOCKED_HOSTS.contains(&host_text.as_str()) {
        return Err(ApiClientError::validation(format!(
            "Blocked internal host: {host_text}"
        )));
    }

    match host {
        Host::Domain(domain) => {
            let lowered = domain.to_ascii_lowercase();
            for token in INTERNAL_HOST_TOKENS {
                if lowered.contains(token) {
                    warn!(host = %domain, token, "potentially internal hostname detected");
                }
            }
            Ok(())
        }
        Host::Ipv4(address) => check_ip(IpAddr::V4(address), &host_text),
        Host::Ipv6(address) => check_ip(IpAddr::V6(address), &host_text),
    }
}

fn check_ip(address: IpAddr, host_text: &str) -> Result<(), ApiClientError> {
    match ip_block_reason(address) {
        None => Ok(()),
        Some(IpBlockReason::PrivateOrReserved) => Err(ApiClientError::validation(format!(
            "Blocked private/reserved IP: {host_text}"
        ))),
        Some(IpBlockReason::LinkLocal) => Err(ApiClientError::validation(format!(
            "Blocked link-local IP: {host_text}"
        ))),
        Some(IpBlockReason::UniqueLocal) => Err(ApiClientError::validation(format!(
            "Blocked IPv6 unique local address: {host_text}"
        ))),
    }
}

fn ip_block_reason(address: IpAddr) -> Option<IpBlockReason> {
    match address {
        IpAddr::V4(address) => ipv4_block_reason(address),
        IpAddr::V6(address) => ipv6_block_reason(address),
    }
}

fn ipv4_block_reason(address: Ipv4Addr) -> Option<IpBlockReason> {
    if address.is_loopback()
        || address.is_private()
        || address.is_unspecified()
        || address.is_multicast()
        || address.is_broadcast()
        || address.is_documentation()
        || address.octets()[0] >= 240
    {
        return Some(IpBlockReason::PrivateOrReserved);
    }
    if address.is_link_local() {
        return Some(IpBlockReason::LinkLocal);
    }
    None
}

fn ipv6_block_reason(address: Ipv6Addr) -> Option<IpBlockReason> {
    // IPv4-mapped addresses smuggle a v4 target inside a v6 literal.
    if let Some(mapped) = address.to_ipv4_mapped() {
        return ipv4_block_reason(mapped);
    }
    if address.is_loopback() || address.is_unspecified() || address.is_multicast() {
        return Some(IpBlockReason::PrivateOrReserved);
    }
    // fe80::/10
    if (address.segments()[0] & 0xffc0) == 0xfe80 {
        return Some(IpBlockReason::LinkLocal);
    }
    // fc00::/7
    if address.octets()[0] & 0xfe == 0xfc {
        return Some(IpBlockReason::UniqueLocal);
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::error::ApiClientError;

    use super::validate_outbound_url;

    fn assert_blocked(target: &str) {
        let error = validate_outbound_url(target)
            .expect_err(&format!("{target} should have been blocked"));
        assert!(
            matches!(error, ApiClientError::Validation { .. }),
            "{target} produced a non-validation error"
        );
    }

    #[test]
    fn blocks_loopback_and_localhost_forms() {
        assert_blocked("http://localhost/admin");
        assert_blocked("http://127.0.0.1/admin");
        assert_blocked("http://0.0.0.0/admin");
        assert_blocked("http://[::1]/admin");
        assert_blocked("http://[::ffff:127.0.0.1]/admin");
        assert_blocked("https://LOCALHOST/metrics");
    }

    #[test]
    fn blocks_private_ranges() {
        assert_blocked("http://10.0.0.1/");
        assert_blocked("http://192.168.1.1/");
        assert_blocked("http://172.16.0.1/");
    }

    #[test]
    fn blocks_link_local_and_unique_local() {
        assert_blocked("http://169.254.169.254/latest/meta-data");
        assert_blocked("http://[fe80::1]/");
        assert_blocked("http://[fc00::1]/");
        assert_blocked("http://[fd12:3456::1]/");
    }

    #[test]
    fn blocks_reserved_and_multicast() {
        assert_blocked("http://240.0.0.1/");
        assert_blocked("http://224.0.0.1/");
        assert_blocked("http://[ff02::1]/");
    }

    #[test]
    fn allows_public_targets() {
        assert!(validate_outbound_url("https://example.com/api").is_ok());
        assert!(validate_outbound_url("http://8.8.8.8/dns").is_ok());
        assert!(validate_outbound_url("https://api.github.com/repos").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert_blocked("ftp://example.com/file");
        assert_blocked("file:///etc/passwd");
        assert_blocked("gopher://example.com/");
    }

    #[test]
    fn skips_relative_urls() {
        assert!(validate_outbound_url("/v1/users").is_ok());
        assert!(validate_outbound_url("users?active=true").is_ok());
    }

    #[test]
    fn internal_sounding_hostnames_warn_but_pass() {
        assert!(validate_outbound_url("https://corp.example.com/api").is_ok());
        assert!(validate_outbound_url("https://intranet.example.com/").is_ok());
        assert!(validate_outbound_url("https://service.internal.example.com/").is_ok());
    }
}
