//! External link validation
//!
//! Only absolute `http` and `https` URLs may be followed. Anything else,
//! including `javascript:`, `data:` and `file:` URLs as well as relative
//! paths, is rejected before it reaches analytics or a browser.

use url::Url;

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// Check whether `candidate` is an absolute URL with an `http` or `https` scheme.
#[must_use]
pub fn is_valid_external_url(candidate: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    Url::parse(candidate).is_ok_and(|url| ALLOWED_SCHEMES.contains(&url.scheme()))
}

/// Return `candidate` unchanged if it is a valid external URL.
#[must_use]
pub fn sanitize_url(candidate: Option<&str>) -> Option<&str> {
    candidate.filter(|url| is_valid_external_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_https_urls() {
        for url in [
            "https://example.com",
            "https://subdomain.example.com/path",
            "https://example.com:8080",
            "https://example.com/path?query=1",
            "https://example.com#hash",
        ] {
            assert!(is_valid_external_url(url), "{url}");
        }
    }

    #[test]
    fn test_accepts_http_urls() {
        assert!(is_valid_external_url("http://example.com"));
        assert!(is_valid_external_url("http://localhost:3000"));
    }

    #[test]
    fn test_rejects_script_schemes() {
        assert!(!is_valid_external_url("javascript:alert(1)"));
        assert!(!is_valid_external_url("javascript:void(0)"));
        assert!(!is_valid_external_url("vbscript:msgbox(\"XSS\")"));
    }

    #[test]
    fn test_rejects_data_urls() {
        assert!(!is_valid_external_url(
            "data:text/html,<script>alert(1)</script>"
        ));
        assert!(!is_valid_external_url(
            "data:text/html;base64,PHNjcmlwdD5hbGVydCgxKTwvc2NyaXB0Pg=="
        ));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(!is_valid_external_url("file:///etc/passwd"));
        assert!(!is_valid_external_url("file://localhost/path"));
        assert!(!is_valid_external_url("ftp://files.example.com"));
        assert!(!is_valid_external_url("mailto:user@example.com"));
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        assert!(!is_valid_external_url(""));
        assert!(!is_valid_external_url("not-a-url"));
        assert!(!is_valid_external_url("example.com"));
    }

    #[test]
    fn test_rejects_relative_urls() {
        assert!(!is_valid_external_url("/path/to/page"));
        assert!(!is_valid_external_url("./relative"));
        assert!(!is_valid_external_url("../parent"));
    }

    #[test]
    fn test_accepts_encoded_and_international_urls() {
        assert!(is_valid_external_url(
            "https://example.com/path%20with%20spaces"
        ));
        assert!(is_valid_external_url("https://example.com/?q=%3Cscript%3E"));
        assert!(is_valid_external_url("https://例え.jp"));
        assert!(is_valid_external_url("https://münchen.de"));
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url(Some("https://example.com/path")),
            Some("https://example.com/path")
        );
        assert_eq!(
            sanitize_url(Some("http://localhost:3000")),
            Some("http://localhost:3000")
        );
        assert_eq!(sanitize_url(Some("javascript:alert(1)")), None);
        assert_eq!(sanitize_url(Some("")), None);
        assert_eq!(sanitize_url(None), None);
    }
}
