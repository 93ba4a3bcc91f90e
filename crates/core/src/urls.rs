//! URL detection for channel messages.

use std::sync::OnceLock;

use regex::Regex;

// Permissive on purpose: posters paste anything from full https:// links to
// bare `www.` domains, and a false positive only costs one extra prompt.
const URL_PATTERN: &str = r"(([A-Za-z]{3,9}:(?://)?)(?:[-;:&=+$,\w]+@)?[A-Za-z0-9.\-]+|(?:www\.|[-;:&=+$,\w]+@)[A-Za-z0-9.\-]+)((?:/[+~%/.\w\-]*)?\??(?:[-+=&;%@.\w]*)#?(?:[.!/\\\w]*))?";

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("url pattern is a valid constant"))
}

/// First URL-looking substring of `text`, if any.
pub fn extract_url(text: &str) -> Option<&str> {
    url_regex().find(text).map(|found| found.as_str())
}
