//! Text parsing and extraction utilities for Twitter content.
//!
//! These are the fallbacks used when a payload arrives without entity lists:
//! hashtags and mentions are pulled straight out of the tweet body.

use regex::Regex;

/// Trims every entry and drops the ones that were only whitespace.
fn all_non_blank<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts every `#hashtag` in `text`, in order of appearance, `#` included.
///
/// # Example
///
/// ```rust
/// use twivility::twitter::extract_hashtags;
///
/// assert_eq!(extract_hashtags("shipping #rust and #tokio"), vec!["#rust", "#tokio"]);
/// ```
pub fn extract_hashtags(text: &str) -> Vec<String> {
    extract_tokens(r"#\w+\b", text)
}

/// Extracts every `@mention` in `text`, in order of appearance, `@` included.
pub fn extract_mentions(text: &str) -> Vec<String> {
    extract_tokens(r"@\w+\b", text)
}

fn extract_tokens(pattern: &str, text: &str) -> Vec<String> {
    match Regex::new(pattern) {
        Ok(re) => all_non_blank(re.find_iter(text).map(|m| m.as_str())),
        Err(_) => Vec::new(),
    }
}
