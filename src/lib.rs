//! # Twivility Library
//!
//! Incrementally harvests a Twitter home timeline into a deduplicated local
//! store, serves it to readers while refreshes are in flight, and captures
//! live mentions of the harvested accounts to an append-only log.
//!
//! ## Components
//!
//! - [`store`]: the on-disk record set (canonical order, atomic rewrite)
//! - [`ingest`]: windowed, dedup-aware timeline pagination
//! - [`cache`]: the concurrent read façade with its per-account index
//! - [`mentions`]: restartable live-stream-to-file capture with backfill
//! - [`cronjob`]: periodic refresh and stream supervision
//! - [`handlers`]: JSON routes over the cache
//!
//! ## Configuration
//!
//! - `TWITTER_ACCESS_TOKEN`: bearer token (required for anything that talks to Twitter)
//! - `TWIVILITY_DATA_FILE`, `TWIVILITY_MENTIONS_FILE`, `TWIVILITY_HASHTAG_FILE`
//! - `TWIVILITY_HOST`: listen address (defaults to `127.0.0.1:8484`)
//! - `TWIVILITY_REFRESH_SCHEDULE`: cron expression (defaults to every 5 minutes)
//!
//! ## API Endpoints
//!
//! - `GET /accts`: account handles with cached tweets
//! - `GET /tweets/:acct`: tweets for one account, newest first
//! - `GET /dump`: every cached tweet as `{"TweetList": [...]}`
//! - `GET /health`: service health status

pub mod cache;
pub mod config;
pub mod cronjob;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod mentions;
pub mod oauth;
pub mod store;
pub mod tokens;
pub mod twitter;

// Re-export commonly used types and functions
pub use cache::TweetCache;
pub use config::{ServiceConfig, TwitterConfig};
pub use cronjob::{run_refresh_cycle, start_refresh_cronjob, StreamSupervisor};
pub use error::{Error, Result};
pub use handlers::{router, AppState};
pub use ingest::{update, TimelineSource};
pub use mentions::{LiveStream, MentionSource, MentionStreamer};
pub use oauth::build_bearer_auth_header;
pub use store::{to_json, Record};
pub use tokens::{read_hashtags, UniqueTokenSet};
pub use twitter::TwitterClient;
