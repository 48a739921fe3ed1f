use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
///
/// Covers parse failures and the SSRF policy applied to feed sources added
/// from the command line.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL string for use as a feed source.
///
/// Rejects non-HTTP(S) schemes, localhost and private address ranges.
///
/// # Examples
///
/// ```
/// use feedcrawl::util::validate_url;
///
/// assert!(validate_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host == "localhost" {
            return Err(UrlValidationError::Localhost);
        }

        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_unspecified() {
                return true;
            }
            let first = ipv6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Splits a URL into its scheme and the remainder after `://`.
///
/// Returns `None` for strings without a scheme separator.
fn split_scheme(url: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = url.trim().split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c));
    valid.then_some((scheme, rest))
}

fn is_web_scheme(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// Scheme-insensitive comparison key for entry links.
///
/// `http://x/a` and `https://x/a` share a key; anything else about the link
/// (host case, path, query, fragment) is compared exactly.
///
/// ```
/// use feedcrawl::util::link_key;
///
/// assert_eq!(link_key("http://x/a"), link_key("https://x/a"));
/// assert_ne!(link_key("http://x/a"), link_key("http://x/A"));
/// ```
pub fn link_key(link: &str) -> String {
    match split_scheme(link) {
        Some((scheme, rest)) if is_web_scheme(scheme) => rest.to_string(),
        _ => link.trim().to_string(),
    }
}

/// Both scheme spellings of an http(s) link, used to look up stored items
/// whose link differs only by protocol.
pub fn scheme_variants(link: &str) -> Vec<String> {
    match split_scheme(link) {
        Some((scheme, rest)) if is_web_scheme(scheme) => {
            vec![format!("http://{rest}"), format!("https://{rest}")]
        }
        _ => vec![link.trim().to_string()],
    }
}

/// True when both strings name the same resource once parsed, so that
/// `http://src` and `http://src/` compare equal.
pub fn same_location(a: &str, b: &str) -> bool {
    match (Url::parse(a.trim()), Url::parse(b.trim())) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}

/// True when `to` is `from` with only the http/https scheme swapped.
///
/// Host, port, path and query must otherwise be identical. Identical URLs
/// are not a protocol change.
pub fn is_protocol_change(from: &str, to: &str) -> bool {
    if let (Ok(from), Ok(to)) = (Url::parse(from.trim()), Url::parse(to.trim())) {
        return is_web_scheme(from.scheme())
            && is_web_scheme(to.scheme())
            && from.scheme() != to.scheme()
            && from.username() == to.username()
            && from.host_str() == to.host_str()
            && from.port() == to.port()
            && from.path() == to.path()
            && from.query() == to.query();
    }

    let (Some((from_scheme, from_rest)), Some((to_scheme, to_rest))) =
        (split_scheme(from), split_scheme(to))
    else {
        return false;
    };

    is_web_scheme(from_scheme)
        && is_web_scheme(to_scheme)
        && !from_scheme.eq_ignore_ascii_case(to_scheme)
        && from_rest == to_rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://news.example.org").is_ok());
        assert!(validate_url("https://example.com:443/feed.xml").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_local_and_private_rejected() {
        assert!(matches!(
            validate_url("http://localhost/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(validate_url("http://127.0.0.1/feed").is_err());
        assert!(validate_url("http://[::1]/feed").is_err());
        assert!(matches!(
            validate_url("http://10.0.0.1:3000/feed"),
            Err(UrlValidationError::PrivateIp(_))
        ));
        assert!(validate_url("http://169.254.1.1/feed").is_err());
        assert!(validate_url("http://[fe80::1]/feed").is_err());
        assert!(validate_url("http://0.0.0.0/feed").is_err());
    }

    #[test]
    fn test_link_key_ignores_scheme_only() {
        assert_eq!(link_key("http://x/a"), "x/a");
        assert_eq!(link_key("https://x/a"), "x/a");
        assert_eq!(link_key("HTTPS://x/a"), "x/a");
        assert_ne!(link_key("http://x/a"), link_key("http://x/a/"));
        assert_eq!(link_key("ftp://x/a"), "ftp://x/a");
        assert_eq!(link_key("not a url"), "not a url");
    }

    #[test]
    fn test_scheme_variants() {
        assert_eq!(
            scheme_variants("https://x/a?b=1"),
            vec!["http://x/a?b=1".to_string(), "https://x/a?b=1".to_string()]
        );
        assert_eq!(scheme_variants("mailto:a@b"), vec!["mailto:a@b".to_string()]);
    }

    #[test]
    fn test_protocol_change_detection() {
        assert!(is_protocol_change(
            "http://www.whitehouse.gov/feed/blog/white-house",
            "https://www.whitehouse.gov/feed/blog/white-house"
        ));
        assert!(is_protocol_change("https://a/b?c", "http://a/b?c"));
        assert!(!is_protocol_change("http://src", "http://other-host"));
        assert!(!is_protocol_change("http://a/b", "https://a/c"));
        assert!(!is_protocol_change("http://a/b", "http://a/b"));
        assert!(!is_protocol_change("http://a/b", "ftp://a/b"));
        assert!(is_protocol_change("http://src", "https://src/"));
        assert!(!is_protocol_change("http://a:8080/b", "https://a/b"));
    }

    #[test]
    fn test_same_location() {
        assert!(same_location("http://src", "http://src/"));
        assert!(same_location("HTTP://Src/feed", "http://src/feed"));
        assert!(!same_location("http://src", "https://src"));
        assert!(!same_location("http://src/a", "http://src/b"));
    }

    proptest! {
        #[test]
        fn prop_link_key_scheme_insensitive(rest in "[a-z0-9./?=&-]{1,40}") {
            let http = format!("http://{rest}");
            let https = format!("https://{rest}");
            prop_assert_eq!(link_key(&http), link_key(&https));
            prop_assert!(is_protocol_change(&http, &https));
        }
    }
}
