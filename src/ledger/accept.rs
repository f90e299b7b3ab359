//! Accept header negotiation

/// The caller's declared response format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accept(String);

impl Accept {
    pub fn new(header: Option<&str>) -> Self {
        Self(header.unwrap_or_default().to_ascii_lowercase())
    }

    /// Caller asked for a raw binary stream
    pub fn is_octet_stream(&self) -> bool {
        self.0.contains("octet-stream")
    }

    /// Caller should receive the token as a file download
    ///
    /// Browsers navigating to the endpoint send `text/html`.
    pub fn wants_attachment(&self) -> bool {
        self.is_octet_stream() || self.0.contains("html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation() {
        let binary = Accept::new(Some("Application/Octet-Stream"));
        assert!(binary.is_octet_stream());
        assert!(binary.wants_attachment());

        let browser = Accept::new(Some("text/html,application/xhtml+xml;q=0.9"));
        assert!(!browser.is_octet_stream());
        assert!(browser.wants_attachment());

        for json in [Accept::new(Some("application/json")), Accept::new(None)] {
            assert!(!json.is_octet_stream());
            assert!(!json.wants_attachment());
        }
    }
}
