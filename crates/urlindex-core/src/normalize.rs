//! Normalizer (§4.1): a pure function from a raw URL string to a
//! [`CanonicalUrl`]. No shared state, no I/O past process start, where
//! the bundled Public Suffix List snapshot is parsed once.

use std::sync::LazyLock;

use publicsuffix::{List, Psl};
use url::Url;
use urlindex_types::model::CanonicalUrl;

/// Bundled at build time; refreshed offline, not fetched at runtime.
const PUBLIC_SUFFIX_LIST: &str = include_str!("../data/public_suffix_list.dat");

static SUFFIX_LIST: LazyLock<List> = LazyLock::new(|| {
    PUBLIC_SUFFIX_LIST
        .parse()
        .expect("bundled public suffix list must parse")
});

/// Why a raw string could not be normalized (§4.1 "Rejection conditions").
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NormalizeError {
    Empty,
    Unparseable,
    NoHost,
    NoRegistrableDomain,
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::Empty => write!(f, "empty input"),
            NormalizeError::Unparseable => write!(f, "could not parse as a URL"),
            NormalizeError::NoHost => write!(f, "URL has no host"),
            NormalizeError::NoRegistrableDomain => write!(f, "host has no registrable domain"),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Normalizes `raw` per §4.1. Pure and allocation-light; the only
/// shared state touched is the read-only [`SUFFIX_LIST`].
pub fn normalize(raw: &str) -> Result<CanonicalUrl, NormalizeError> {
    if raw.trim().is_empty() {
        return Err(NormalizeError::Empty);
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&with_scheme).map_err(|_| NormalizeError::Unparseable)?;
    let host = url.host_str().ok_or(NormalizeError::NoHost)?.to_lowercase();
    let scheme = url.scheme().to_lowercase();

    let domain = registrable_domain(&host).ok_or(NormalizeError::NoRegistrableDomain)?;

    let host_with_port = match (url.port(), default_port(&scheme)) {
        (Some(port), Some(default)) if port == default => host,
        (Some(port), _) => format!("{host}:{port}"),
        (None, _) => host,
    };

    let path = collapse_path(url.path());
    let query = normalize_query(url.query());
    let path_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    };

    Ok(CanonicalUrl {
        scheme,
        host: host_with_port,
        path_query,
        domain,
    })
}

/// Normalizes a bare domain string (as given to the query endpoints)
/// down to its registrable domain, the same value [`normalize`] stores
/// in [`CanonicalUrl::domain`]. Case-insensitive; rejects the same
/// inputs `registrable_domain` would reject.
pub fn normalize_domain(raw: &str) -> Result<String, NormalizeError> {
    if raw.trim().is_empty() {
        return Err(NormalizeError::Empty);
    }
    let host = raw.trim().trim_end_matches('.').to_lowercase();
    registrable_domain(&host).ok_or(NormalizeError::NoRegistrableDomain)
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

fn registrable_domain(host: &str) -> Option<String> {
    let domain = SUFFIX_LIST.domain(host.as_bytes())?;
    Some(String::from_utf8_lossy(domain.as_bytes()).into_owned())
}

/// Percent-decodes where safe, collapses repeated slashes, resolves
/// `.`/`..` segments without climbing above root, keeps a trailing
/// slash. `url::Url` does none of this on its own (§4.1).
fn collapse_path(path: &str) -> String {
    let decoded = percent_decode_safe(path);
    let had_trailing_slash = decoded.len() > 1 && decoded.ends_with('/');

    let mut stack: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    let mut rebuilt = String::from("/");
    rebuilt.push_str(&stack.join("/"));
    if had_trailing_slash && rebuilt != "/" {
        rebuilt.push('/');
    }
    rebuilt
}

/// Percent-decodes octets that are safe to reveal (unreserved
/// characters per RFC 3986); leaves `%2F`/`%00`/reserved-delimiter
/// encodings untouched so path segmentation is not corrupted.
fn percent_decode_safe(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(value) = u8::from_str_radix(hex, 16) {
                    if is_unreserved(value) {
                        out.push(value);
                        i += 3;
                        continue;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Parses into key/value pairs, sorts by key (stable, so duplicate
/// keys keep their relative order), and re-serializes.
fn normalize_query(query: Option<&str>) -> String {
    let Some(query) = query else {
        return String::new();
    };
    if query.is_empty() {
        return String::new();
    }

    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input() {
        assert_eq!(normalize(""), Err(NormalizeError::Empty));
        assert_eq!(normalize("   "), Err(NormalizeError::Empty));
    }

    #[test]
    fn lowercases_scheme_and_host() {
        let url = normalize("HTTPS://Example.COM/Path").unwrap();
        assert_eq!(url.scheme, "https");
        assert_eq!(url.host, "example.com");
        assert_eq!(url.domain, "example.com");
    }

    #[test]
    fn strips_default_port_keeps_nonstandard() {
        let url = normalize("http://example.com:80/").unwrap();
        assert_eq!(url.host, "example.com");

        let url = normalize("http://example.com:8080/").unwrap();
        assert_eq!(url.host, "example.com:8080");
    }

    #[test]
    fn collapses_slashes_and_resolves_dot_segments() {
        let url = normalize("http://example.com/a//b/./c/../d").unwrap();
        assert_eq!(url.path_query, "/a/b/d");
    }

    #[test]
    fn never_climbs_above_root() {
        let url = normalize("http://example.com/../../a").unwrap();
        assert_eq!(url.path_query, "/a");
    }

    #[test]
    fn keeps_trailing_slash() {
        let url = normalize("http://example.com/a/b/").unwrap();
        assert_eq!(url.path_query, "/a/b/");
    }

    #[test]
    fn sorts_query_keys_and_preserves_duplicate_order() {
        let url = normalize("http://example.com/?b=2&a=1&a=0").unwrap();
        assert_eq!(url.path_query, "/?a=1&a=0&b=2");
    }

    #[test]
    fn drops_fragment() {
        let url = normalize("http://example.com/page#section").unwrap();
        assert_eq!(url.path_query, "/page");
    }

    #[test]
    fn rejects_host_without_registrable_domain() {
        assert_eq!(
            normalize("http://localhost/"),
            Err(NormalizeError::NoRegistrableDomain)
        );
    }

    #[test]
    fn subdomains_resolve_to_the_registrable_domain() {
        let url = normalize("http://deep.sub.example.co.uk/x").unwrap();
        assert_eq!(url.domain, "example.co.uk");
        assert_eq!(url.host, "deep.sub.example.co.uk");
    }

    #[test]
    fn normalize_domain_lowercases_and_resolves_subdomains() {
        assert_eq!(normalize_domain("Example.COM").unwrap(), "example.com");
        assert_eq!(normalize_domain("sub.example.com").unwrap(), "example.com");
    }

    #[test]
    fn normalize_domain_rejects_bare_suffix() {
        assert_eq!(normalize_domain("localhost"), Err(NormalizeError::NoRegistrableDomain));
    }
}
