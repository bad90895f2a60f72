//! Deduplicating token sets used to build the live-stream track list.

use std::collections::BTreeSet;
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};

/// A sorted, duplicate-free set of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueTokenSet {
    tokens: BTreeSet<String>,
}

impl UniqueTokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `token`; returns `false` if it was already present.
    pub fn add(&mut self, token: impl Into<String>) -> bool {
        self.tokens.insert(token.into())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The tokens in ascending byte order.
    pub fn strings(&self) -> Vec<String> {
        self.tokens.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for UniqueTokenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = UniqueTokenSet::new();
        for token in iter {
            set.add(token);
        }
        set
    }
}

impl<S: Into<String>> Extend<S> for UniqueTokenSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for token in iter {
            self.add(token);
        }
    }
}

/// Normalizes an account name into its `@handle` form.
pub fn as_handle(account: &str) -> String {
    if account.starts_with('@') {
        account.to_string()
    } else {
        format!("@{}", account)
    }
}

/// Normalizes a track token: anything not already `#tag` or `@handle` becomes a hashtag.
pub fn as_track_token(token: &str) -> String {
    if token.starts_with('#') || token.starts_with('@') {
        token.to_string()
    } else {
        format!("#{}", token)
    }
}

/// Reads whitespace-delimited hashtags from `path`.
///
/// Every entry is normalized with [`as_track_token`]; the result is sorted and
/// duplicate-free. A `None` path or a missing file yields an empty list.
pub async fn read_hashtags(path: Option<&Path>) -> Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Hashtag file {} not found, tracking accounts only", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(Error::io(path, e)),
    };

    let tags: UniqueTokenSet = contents.split_whitespace().map(as_track_token).collect();
    info!("Loaded {} hashtags from {}", tags.len(), path.display());
    Ok(tags.strings())
}

/// Builds the track list for `accounts` plus the configured `hashtags`.
pub fn build_track_list(accounts: &[String], hashtags: &[String]) -> Vec<String> {
    let mut gather: UniqueTokenSet = accounts.iter().map(|a| as_handle(a)).collect();
    gather.extend(hashtags.iter().map(|t| as_track_token(t)));
    gather.strings()
}
