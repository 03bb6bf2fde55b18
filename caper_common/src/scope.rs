//! Endpoint classification for captured requests

use crate::constants::TARGET_PATH_FRAGMENT;
use url::Url;

/// Resolve a possibly-relative URL against the page location
pub fn resolve_url(url: &str, base: &Url) -> Option<Url> {
    if url.trim().is_empty() {
        return None;
    }
    base.join(url).ok()
}

/// Absolute form of `url`, or the input unchanged if it cannot be resolved
pub fn absolutify_url(url: &str, base: &Url) -> String {
    resolve_url(url, base)
        .map(|u| u.to_string())
        .unwrap_or_else(|| url.to_string())
}

/// Whether a request should be captured: a POST to the lesson store endpoint
pub fn is_in_scope(url: &str, method: &str, base: &Url) -> bool {
    if !method.eq_ignore_ascii_case("POST") {
        return false;
    }

    match resolve_url(url, base) {
        Some(resolved) => resolved.path().contains(TARGET_PATH_FRAGMENT),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://x/y/").unwrap()
    }

    #[test]
    fn test_post_to_store_is_in_scope() {
        assert!(is_in_scope("https://x/y/lesson/store", "post", &base()));
        assert!(is_in_scope("https://x/y/lesson/store", "POST", &base()));
    }

    #[test]
    fn test_other_paths_and_methods_are_out_of_scope() {
        assert!(!is_in_scope("https://x/y/other", "POST", &base()));
        assert!(!is_in_scope("https://x/y/lesson/store", "GET", &base()));
        assert!(!is_in_scope("https://x/y/lesson/store", "", &base()));
    }

    #[test]
    fn test_relative_urls_resolve_against_page() {
        assert!(is_in_scope("lesson/store", "POST", &base()));
        assert!(is_in_scope("/iip/lesson/store?x=1", "POST", &base()));
        assert_eq!(
            absolutify_url("lesson/store", &base()),
            "https://x/y/lesson/store"
        );
    }

    #[test]
    fn test_query_string_does_not_count() {
        assert!(!is_in_scope("https://x/other?next=/lesson/store", "POST", &base()));
    }

    #[test]
    fn test_malformed_urls_are_out_of_scope() {
        assert!(!is_in_scope("http://[::1", "POST", &base()));
        assert!(!is_in_scope("", "POST", &base()));
        assert_eq!(absolutify_url("http://[::1", &base()), "http://[::1");
    }
}
