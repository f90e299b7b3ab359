//! HTTP basic authentication header parsing

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Username and password carried in an `Authorization: Basic` header
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parse an `Authorization` header value
///
/// Returns None for other schemes, undecodable payloads, or when either half
/// of the pair is empty.
pub fn parse_basic_auth(header: Option<&str>) -> Option<BasicCredentials> {
    let header = header?.trim();
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    if username.is_empty() || password.is_empty() {
        return None;
    }

    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(pair: &str) -> String {
        format!("Basic {}", STANDARD.encode(pair))
    }

    #[test]
    fn test_parse_valid_header() {
        let creds = parse_basic_auth(Some(&encode("alice:s3cr:et"))).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "s3cr:et");

        let lower = encode("bob:pw").replacen("Basic", "basic", 1);
        assert_eq!(parse_basic_auth(Some(&lower)).unwrap().username, "bob");
    }

    #[test]
    fn test_reject_malformed_headers() {
        assert!(parse_basic_auth(None).is_none());
        assert!(parse_basic_auth(Some("Bearer abc.def")).is_none());
        assert!(parse_basic_auth(Some("Basic !!!")).is_none());
        assert!(parse_basic_auth(Some(&encode("no-colon"))).is_none());
        assert!(parse_basic_auth(Some(&encode(":pw"))).is_none());
        assert!(parse_basic_auth(Some(&encode("alice:"))).is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = parse_basic_auth(Some(&encode("alice:hunter2"))).unwrap();
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
