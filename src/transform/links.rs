use tracing::warn;
use url::Url;

use crate::common::constants::DEFAULT_FRAGMENT_PATH;

/// Make a scraped link absolute against the site's base URL.
///
/// - absolute URLs are kept
/// - `//host/path` gets `https:`
/// - `/path` is joined to the origin
/// - `#frag` lands under `fragment_path` (sites that render listings as anchors on one page)
/// - anything else is treated as relative to the origin root
pub fn resolve_url(value: &str, base_url: &str, fragment_path: Option<&str>) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if Url::parse(value).is_ok() {
        return Some(value.to_string());
    }
    if let Some(rest) = value.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }

    let origin = match Url::parse(base_url) {
        Ok(base) => base.origin().ascii_serialization(),
        Err(e) => {
            warn!("Cannot resolve '{}' against base URL '{}': {}", value, base_url, e);
            return Some(value.to_string());
        }
    };

    let resolved = if value.starts_with('/') {
        format!("{origin}{value}")
    } else if value.starts_with('#') {
        let path = fragment_path.unwrap_or(DEFAULT_FRAGMENT_PATH);
        let path = path.trim_start_matches('/');
        format!("{origin}/{path}{value}")
    } else {
        format!("{origin}/{}", value.trim_start_matches("./"))
    };
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_is_unchanged() {
        assert_eq!(
            resolve_url("https://tickets.example/e/1", "https://x.com", None),
            Some("https://tickets.example/e/1".into())
        );
    }

    #[test]
    fn test_protocol_relative() {
        assert_eq!(
            resolve_url("//cdn.x.com/a.jpg", "https://x.com", None),
            Some("https://cdn.x.com/a.jpg".into())
        );
    }

    #[test]
    fn test_root_relative() {
        assert_eq!(
            resolve_url("/events/1", "https://x.com", None),
            Some("https://x.com/events/1".into())
        );
        assert_eq!(
            resolve_url("/events/1", "https://x.com/whats-on/", None),
            Some("https://x.com/events/1".into())
        );
    }

    #[test]
    fn test_fragment() {
        assert_eq!(
            resolve_url("#e1", "https://x.com", None),
            Some("https://x.com/whats-on/#e1".into())
        );
        assert_eq!(
            resolve_url("#e1", "https://x.com", Some("/gigs/")),
            Some("https://x.com/gigs/#e1".into())
        );
    }

    #[test]
    fn test_bare_relative() {
        assert_eq!(
            resolve_url("event/abc", "https://x.com/listing", None),
            Some("https://x.com/event/abc".into())
        );
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(resolve_url("  ", "https://x.com", None), None);
    }
}
