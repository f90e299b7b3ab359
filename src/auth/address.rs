//! Caller address extraction
//!
//! The address verifier keys on the caller's network address. Behind a proxy
//! that address arrives in a header; the lookup order is the trusted proxy
//! header, then `X-Forwarded-For`, then the socket peer.

use hyper::HeaderMap;
use std::net::SocketAddr;

/// Standard forwarded-for header
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve and normalize the caller address for a request
pub fn client_address(headers: &HeaderMap, trusted_header: &str, peer: SocketAddr) -> String {
    let raw = header_value(headers, trusted_header)
        .or_else(|| header_value(headers, FORWARDED_FOR_HEADER))
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string());

    normalize_address(&raw)
}

/// Normalize a raw address value
///
/// A forwarded list keeps only its last hop. When a `:` appears past the
/// second character, only the text after the last `:` is kept; this strips
/// ports and the `::ffff:` prefix of IPv4-mapped addresses.
pub fn normalize_address(raw: &str) -> String {
    let hop = raw.rsplit(',').next().unwrap_or(raw).trim();

    match hop.rfind(':') {
        Some(pos) if pos > 1 => hop[pos + 1..].to_string(),
        _ => hop.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.10:53211".parse().unwrap()
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("10.1.2.3"), "10.1.2.3");
        assert_eq!(normalize_address("::ffff:10.1.2.3"), "10.1.2.3");
        assert_eq!(normalize_address("10.1.2.3, 172.16.0.4"), "172.16.0.4");
        assert_eq!(normalize_address(" 10.1.2.3 ,  ::ffff:172.16.0.4 "), "172.16.0.4");
        // a colon at position 0 or 1 is not treated as a separator
        assert_eq!(normalize_address("::1"), "::1");
    }

    #[test]
    fn test_peer_address_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(client_address(&headers, "x-real-ip", peer()), "192.0.2.10");
    }

    #[test]
    fn test_header_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        assert_eq!(client_address(&headers, "x-real-ip", peer()), "10.0.0.2");

        headers.insert("x-real-ip", HeaderValue::from_static("10.9.9.9"));
        assert_eq!(client_address(&headers, "x-real-ip", peer()), "10.9.9.9");

        headers.insert("x-real-ip", HeaderValue::from_static("  "));
        assert_eq!(client_address(&headers, "x-real-ip", peer()), "10.0.0.2");
    }
}
