//! Candidate URL filtering
//!
//! Pure functions: no side effects, no network access.

use url::Url;

/// Decide whether a candidate URL should be visited.
///
/// Rejects candidates whose scheme is not http/https, that fail to parse
/// or have no host, that match the blacklist, or that point back at the
/// page they were found on (self-loop guard).
pub fn should_accept(candidate: &str, blacklist: &[String], current_url: &str) -> bool {
    let Ok(parsed) = Url::parse(candidate) else {
        return false;
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return false;
    }
    if is_blacklisted(candidate, blacklist) {
        return false;
    }
    candidate != current_url
}

/// Case-insensitive substring match against the blacklist patterns.
pub fn is_blacklisted(url: &str, blacklist: &[String]) -> bool {
    let url = url.to_ascii_lowercase();
    blacklist
        .iter()
        .any(|pattern| url.contains(&pattern.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: &str = "http://a.test/page";

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accepts_plain_http_and_https() {
        assert!(should_accept("http://a.test/other", &[], CURRENT));
        assert!(should_accept("https://b.test/", &[], CURRENT));
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(!should_accept("ftp://a.test/file", &[], CURRENT));
        assert!(!should_accept("mailto:x@a.test", &[], CURRENT));
        assert!(!should_accept("javascript:void(0)", &[], CURRENT));
        assert!(!should_accept("data:text/plain,hi", &[], CURRENT));
    }

    #[test]
    fn test_rejects_unparseable_urls() {
        assert!(!should_accept("http://", &[], CURRENT));
        assert!(!should_accept("not a url", &[], CURRENT));
        assert!(!should_accept("", &[], CURRENT));
    }

    #[test]
    fn test_blacklist_is_case_insensitive_substring() {
        let blacklist = patterns(&[".CSS", "t.co"]);
        assert!(!should_accept("http://a.test/style.css", &blacklist, CURRENT));
        assert!(!should_accept("https://T.CO/xyz", &blacklist, CURRENT));
        assert!(should_accept("http://a.test/page2", &blacklist, CURRENT));
    }

    #[test]
    fn test_blacklist_matches_anywhere_in_url() {
        let blacklist = patterns(&["tracker"]);
        assert!(is_blacklisted("http://ads.tracker.test/p", &blacklist));
        assert!(is_blacklisted("http://a.test/tracker?id=1", &blacklist));
        assert!(!is_blacklisted("http://a.test/track", &blacklist));
    }

    #[test]
    fn test_rejects_self_loop() {
        assert!(!should_accept(CURRENT, &[], CURRENT));
        // Same page with a different query is a different URL.
        assert!(should_accept("http://a.test/page?x=1", &[], CURRENT));
    }

    #[test]
    fn test_empty_blacklist_accepts_everything_valid() {
        assert!(should_accept("http://a.test/anything", &[], CURRENT));
    }
}
