//! Production Twitter client.
//!
//! [`TwitterClient`] talks to the v1.1 REST and streaming endpoints and is the
//! real implementation behind [`TimelineSource`] and [`MentionSource`].

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use tokio::sync::mpsc;

use crate::config::TwitterConfig;
use crate::error::{Error, Result};
use crate::ingest::TimelineSource;
use crate::mentions::{LiveStream, MentionSource};
use crate::oauth::build_bearer_auth_header;

use super::api::{fetch_text, send_authenticated};
use super::model::{SearchResponse, Tweet, User};
use super::stream::read_stream;

/// Capacity of the channel between the stream reader task and the consumer.
const STREAM_CHANNEL_CAPACITY: usize = 256;

/// Maximum results the search endpoint returns per call.
const SEARCH_COUNT: usize = 100;

pub struct TwitterClient {
    http: Client,
    config: TwitterConfig,
}

impl TwitterClient {
    pub fn new(config: TwitterConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn auth_header(&self) -> String {
        build_bearer_auth_header(&self.config.access_token)
    }

    /// Checks the credentials and returns the authenticated user.
    pub async fn verify_credentials(&self) -> Result<User> {
        let url = format!(
            "{}/account/verify_credentials.json?skip_status=true",
            self.config.api_base
        );
        info!("Verifying user...");
        let request = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header());
        let body = fetch_text(request, "verify_credentials").await?;
        let user: User = serde_json::from_str(&body)?;
        info!("User Verified: {} (@{})", user.name, user.screen_name);
        Ok(user)
    }

    /// Fetches one page of the home timeline.
    ///
    /// `since_id` and `max_id` are only sent when non-zero.
    pub async fn home_timeline(&self, count: usize, since_id: i64, max_id: i64) -> Result<Vec<Tweet>> {
        let mut url = format!(
            "{}/statuses/home_timeline.json?count={}&trim_user=false&tweet_mode=extended",
            self.config.api_base, count
        );
        if since_id > 0 {
            url.push_str(&format!("&since_id={}", since_id));
        }
        if max_id > 0 {
            url.push_str(&format!("&max_id={}", max_id));
        }
        info!(
            "GET Home Timeline => Count:{}, Max:{}, Since:{}",
            count, max_id, since_id
        );

        let request = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header());
        let body = fetch_text(request, "home_timeline").await?;
        let tweets: Vec<Tweet> = serde_json::from_str(&body)?;
        debug!("Home timeline returned {} tweets", tweets.len());
        Ok(tweets)
    }

    /// Runs one recent-tweets search for `query`.
    pub async fn search_tweets(&self, query: &str) -> Result<Vec<Tweet>> {
        let url = format!(
            "{}/search/tweets.json?q={}&count={}&result_type=recent&tweet_mode=extended",
            self.config.api_base,
            urlencoding::encode(query),
            SEARCH_COUNT
        );
        info!("Search query: {}", query);

        let request = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header());
        let body = fetch_text(request, "search_tweets").await?;
        let response: SearchResponse = serde_json::from_str(&body)?;
        Ok(response.statuses)
    }

    /// Opens the filtered stream for `track` and spawns its reader task.
    pub async fn open_filter(&self, track: &[String]) -> Result<LiveStream> {
        let url = format!("{}/statuses/filter.json", self.config.stream_base);
        let body = format!(
            "track={}&stall_warnings=true",
            urlencoding::encode(&track.join(","))
        );
        debug!("Stream filter body: {}", body);

        let request = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body);
        let response = send_authenticated(request, "stream_filter").await?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_stream(response, tx));
        info!("Mentions: live stream connected");
        Ok(LiveStream {
            messages: rx,
            connection: reader,
        })
    }
}

#[async_trait]
impl TimelineSource for TwitterClient {
    async fn fetch_page(&self, count: usize, since_id: i64, max_id: i64) -> Result<Vec<Tweet>> {
        self.home_timeline(count, since_id, max_id)
            .await
            .map_err(|e| Error::Fetch(e.to_string()))
    }
}

#[async_trait]
impl MentionSource for TwitterClient {
    async fn search(&self, query: &str) -> Result<Vec<Tweet>> {
        self.search_tweets(query)
            .await
            .map_err(|e| Error::Search(e.to_string()))
    }

    async fn filter(&self, track: &[String]) -> Result<LiveStream> {
        self.open_filter(track).await.map_err(|e| {
            error!("Could not open filtered stream: {}", e);
            Error::StreamOpen(e.to_string())
        })
    }
}
