//! Configuration module for the twivility service.
//!
//! This module contains configuration structures and environment variable
//! handling for the Twitter API client and the local service (file paths,
//! listen address, refresh schedule).

use log::{debug, error, info, warn};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/1.1";
pub const DEFAULT_STREAM_BASE: &str = "https://stream.twitter.com/1.1";
pub const DEFAULT_DATA_FILE: &str = "tweetstore.json";
pub const DEFAULT_MENTIONS_FILE: &str = "mentions.json";
pub const DEFAULT_HOST: &str = "127.0.0.1:8484";
/// Every 5 minutes, on the minute.
pub const DEFAULT_REFRESH_SCHEDULE: &str = "0 0/5 * * * * *";

/// Masks a secret for logging, keeping at most the first and last 8 characters.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let len = chars.len();
    let prefix: String = chars.iter().take(8.min(len)).collect();
    if len > 16 {
        let suffix: String = chars[len - 8..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        format!("{}...", prefix)
    }
}

/// Configuration struct for Twitter API access.
///
/// The service authenticates every request with a pre-issued bearer token;
/// obtaining that token is outside this crate.
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    /// Bearer token sent on every request
    pub access_token: String,
    /// Base URL of the REST API (timeline, search, verify_credentials)
    pub api_base: String,
    /// Base URL of the streaming API
    pub stream_base: String,
}

impl TwitterConfig {
    /// Creates a new `TwitterConfig` from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `TWITTER_ACCESS_TOKEN`: Bearer token for the Twitter API
    ///
    /// # Optional Environment Variables
    ///
    /// - `TWITTER_API_BASE`: REST base URL (defaults to `https://api.twitter.com/1.1`)
    /// - `TWITTER_STREAM_BASE`: streaming base URL (defaults to `https://stream.twitter.com/1.1`)
    ///
    /// # Example
    ///
    /// ```rust
    /// use twivility::TwitterConfig;
    ///
    /// std::env::set_var("TWITTER_ACCESS_TOKEN", "your_access_token");
    /// let config = TwitterConfig::from_env().unwrap();
    /// assert_eq!(config.access_token, "your_access_token");
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        info!("Loading Twitter configuration from environment variables");

        let access_token = match lookup("TWITTER_ACCESS_TOKEN") {
            Some(token) if !token.trim().is_empty() => {
                info!(
                    "Found TWITTER_ACCESS_TOKEN environment variable with length: {}",
                    token.len()
                );
                debug!("Access token (masked): {}", mask_token(&token));
                if token.len() < 10 {
                    warn!(
                        "Access token seems unusually short ({} characters)",
                        token.len()
                    );
                }
                token
            }
            Some(_) => {
                error!("Access token is empty");
                return Err(Error::Config("TWITTER_ACCESS_TOKEN cannot be empty".into()));
            }
            None => {
                error!("Make sure TWITTER_ACCESS_TOKEN environment variable is set");
                return Err(Error::Config(
                    "Missing TWITTER_ACCESS_TOKEN environment variable".into(),
                ));
            }
        };

        let api_base = lookup("TWITTER_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let stream_base = lookup("TWITTER_STREAM_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_STREAM_BASE.to_string());
        debug!("API base: {}, stream base: {}", api_base, stream_base);

        info!("Twitter configuration loaded successfully");
        Ok(TwitterConfig {
            access_token,
            api_base,
            stream_base,
        })
    }
}

/// Local service configuration: where data lives and how often to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Store of harvested timeline tweets
    pub data_file: PathBuf,
    /// Append-only log of captured mentions
    pub mentions_file: PathBuf,
    /// Optional whitespace-delimited list of extra hashtags to track
    pub hashtag_file: Option<PathBuf>,
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Cron expression for the refresh job
    pub refresh_schedule: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            mentions_file: PathBuf::from(DEFAULT_MENTIONS_FILE),
            hashtag_file: None,
            listen_addr: DEFAULT_HOST.to_string(),
            refresh_schedule: DEFAULT_REFRESH_SCHEDULE.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Loads the service configuration from environment variables.
    ///
    /// # Optional Environment Variables
    ///
    /// - `TWIVILITY_DATA_FILE`: timeline store (defaults to `tweetstore.json`)
    /// - `TWIVILITY_MENTIONS_FILE`: mentions log (defaults to `mentions.json`)
    /// - `TWIVILITY_HASHTAG_FILE`: extra hashtags to track (none by default)
    /// - `TWIVILITY_HOST`: listen address (defaults to `127.0.0.1:8484`)
    /// - `TWIVILITY_REFRESH_SCHEDULE`: cron expression (defaults to every 5 minutes)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            data_file: non_blank("TWIVILITY_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            mentions_file: non_blank("TWIVILITY_MENTIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.mentions_file),
            hashtag_file: non_blank("TWIVILITY_HASHTAG_FILE").map(PathBuf::from),
            listen_addr: non_blank("TWIVILITY_HOST").unwrap_or_else(|| {
                info!("No host specified: using default {}", DEFAULT_HOST);
                defaults.listen_addr
            }),
            refresh_schedule: non_blank("TWIVILITY_REFRESH_SCHEDULE")
                .unwrap_or(defaults.refresh_schedule),
        };

        info!(
            "Service configuration: data file {}, mentions file {}, hashtag file {:?}",
            config.data_file.display(),
            config.mentions_file.display(),
            config.hashtag_file
        );
        config
    }
}
