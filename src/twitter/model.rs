//! Payload types for the Twitter v1.1 REST and streaming endpoints.
//!
//! Only the fields the service actually keeps are modelled; everything else in
//! the remote JSON is ignored by serde.

use serde::Deserialize;

/// A tweet as returned by the timeline, search and filter endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tweet {
    pub id: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub text: String,
    /// Present instead of a truncated `text` when `tweet_mode=extended` is used.
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub retweeted_status: Option<Box<Tweet>>,
    #[serde(default)]
    pub favorite_count: i64,
    #[serde(default)]
    pub retweet_count: i64,
    #[serde(default)]
    pub entities: Option<Entities>,
}

impl Tweet {
    /// The untruncated text of this tweet.
    pub fn body(&self) -> &str {
        self.full_text.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id_str: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub screen_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<HashtagEntity>,
    #[serde(default)]
    pub user_mentions: Vec<MentionEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HashtagEntity {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentionEntity {
    pub screen_name: String,
}

/// Envelope of `search/tweets.json`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub statuses: Vec<Tweet>,
}

/// One message from the filtered live stream.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// A tweet matching the track list.
    Tweet(Box<Tweet>),
    /// The stream is matching more than it can deliver.
    Limit { track: i64 },
    /// The remote side is closing the connection.
    Disconnect { code: i64, reason: String },
    /// The client is falling behind.
    StallWarning {
        code: String,
        message: String,
        percent_full: i64,
    },
    /// Anything else (friends lists, deletes, scrub_geo, ...).
    Other(serde_json::Value),
}

#[derive(Deserialize)]
struct LimitNotice {
    limit: LimitBody,
}

#[derive(Deserialize)]
struct LimitBody {
    #[serde(default)]
    track: i64,
}

#[derive(Deserialize)]
struct DisconnectNotice {
    disconnect: DisconnectBody,
}

#[derive(Deserialize)]
struct DisconnectBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct WarningNotice {
    warning: WarningBody,
}

#[derive(Deserialize)]
struct WarningBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    percent_full: i64,
}

impl StreamMessage {
    /// Classifies one newline-delimited message from the stream.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(line)?;

        if value.get("limit").is_some() {
            let notice: LimitNotice = serde_json::from_value(value)?;
            return Ok(StreamMessage::Limit {
                track: notice.limit.track,
            });
        }
        if value.get("disconnect").is_some() {
            let notice: DisconnectNotice = serde_json::from_value(value)?;
            return Ok(StreamMessage::Disconnect {
                code: notice.disconnect.code,
                reason: notice.disconnect.reason,
            });
        }
        if value.get("warning").is_some() {
            let notice: WarningNotice = serde_json::from_value(value)?;
            return Ok(StreamMessage::StallWarning {
                code: notice.warning.code,
                message: notice.warning.message,
                percent_full: notice.warning.percent_full,
            });
        }
        if value.get("id").is_some() && value.get("text").is_some() {
            let tweet: Tweet = serde_json::from_value(value)?;
            return Ok(StreamMessage::Tweet(Box::new(tweet)));
        }

        Ok(StreamMessage::Other(value))
    }
}
