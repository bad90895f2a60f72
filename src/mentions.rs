//! Live mention capture.
//!
//! [`MentionStreamer`] subscribes to the filtered live stream for a set of
//! accounts and hashtags and appends every matching tweet to an append-only
//! file, one JSON record per line. Each (re)start first backfills through a
//! one-shot search so the gap between connections is not lost.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::store::{self, Record};
use crate::tokens::build_track_list;
use crate::twitter::{StreamMessage, Tweet};

/// An open filtered subscription.
///
/// `messages` closes once `connection` is aborted or the remote side hangs up.
pub struct LiveStream {
    pub messages: mpsc::Receiver<StreamMessage>,
    pub connection: JoinHandle<()>,
}

/// Remote search and filtered-stream capabilities.
#[async_trait]
pub trait MentionSource: Send + Sync {
    /// One-shot keyword search.
    async fn search(&self, query: &str) -> Result<Vec<Tweet>>;

    /// Opens a live subscription on `track`.
    async fn filter(&self, track: &[String]) -> Result<LiveStream>;
}

pub type MentionCallback = Box<dyn Fn(&Record) + Send + Sync>;

pub struct MentionStreamer {
    source: Arc<dyn MentionSource>,
    mentions_file: PathBuf,
    hashtags: Vec<String>,
    count: AtomicU64,
    on_mention: Option<MentionCallback>,
    live: Mutex<Option<JoinHandle<()>>>,
}

impl MentionStreamer {
    /// Creates a streamer writing to `mentions_file`. `hashtags` are tracked
    /// in addition to whatever accounts each [`stream`](Self::stream) call gets.
    pub fn new(
        source: Arc<dyn MentionSource>,
        mentions_file: impl Into<PathBuf>,
        hashtags: Vec<String>,
    ) -> Self {
        Self {
            source,
            mentions_file: mentions_file.into(),
            hashtags,
            count: AtomicU64::new(0),
            on_mention: None,
            live: Mutex::new(None),
        }
    }

    /// Registers a callback invoked once per captured tweet.
    pub fn with_mention_callback(mut self, callback: impl Fn(&Record) + Send + Sync + 'static) -> Self {
        self.on_mention = Some(Box::new(callback));
        self
    }

    /// Number of tweets captured so far, including lines already in the file
    /// when the first stream started.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub async fn is_streaming(&self) -> bool {
        self.live.lock().await.is_some()
    }

    /// Streams mentions of `accounts` (plus the configured hashtags) into the
    /// mentions file until [`stop`](Self::stop) is called or the connection drops.
    ///
    /// Any previous connection is stopped first, so calling this again
    /// restarts the stream on the new account list.
    ///
    /// # Errors
    ///
    /// - [`Error::StreamOpen`] if the live subscription cannot be opened; the
    ///   caller should retry later.
    /// - [`Error::StreamAlreadyRunning`] if another `stream` call registered a
    ///   connection while this one was starting. Two writers on the same file
    ///   would interleave lines, so this is fatal.
    pub async fn stream(&self, accounts: &[String]) -> Result<()> {
        self.stop().await?;

        let track = build_track_list(accounts, &self.hashtags);
        if track.is_empty() {
            return Err(Error::StreamOpen(
                "no accounts or hashtags to track".to_string(),
            ));
        }
        info!("Mentions: starting stream on {:?}", track);

        let path = self.mentions_file.clone();
        let seed_count = self.count() == 0;
        let initial = store::run_blocking(move || {
            store::ensure_exists(&path)?;
            if seed_count {
                store::count_lines(&path).map(Some)
            } else {
                Ok(None)
            }
        })
        .await?;
        if let Some(initial) = initial {
            self.count.store(initial, Ordering::SeqCst);
        }

        let mut output = OpenOptions::new()
            .append(true)
            .open(&self.mentions_file)
            .await
            .map_err(|e| Error::io(&self.mentions_file, e))?;

        self.backfill(&track, &mut output).await;

        let LiveStream {
            mut messages,
            connection,
        } = match self.source.filter(&track).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Could not start Mention stream: {}", e);
                self.flush(&mut output).await;
                return Err(e);
            }
        };

        let connection_id = connection.id();
        {
            let mut live = self.live.lock().await;
            if live.is_some() {
                connection.abort();
                error!("Stream found an already running instance: RACE CONDITION");
                self.flush(&mut output).await;
                return Err(Error::StreamAlreadyRunning);
            }
            *live = Some(connection);
        }

        while let Some(message) = messages.recv().await {
            self.dispatch(message, &mut output).await;
        }

        {
            // A restart may already have registered its own connection.
            let mut live = self.live.lock().await;
            if live.as_ref().is_some_and(|handle| handle.id() == connection_id) {
                live.take();
            }
        }

        self.flush(&mut output).await;
        info!("Mentions: stream ended, {} mentions recorded", self.count());
        Ok(())
    }

    /// Severs the live connection, if any. Safe to call from any task and
    /// any number of times.
    pub async fn stop(&self) -> Result<()> {
        let mut live = self.live.lock().await;
        if let Some(connection) = live.take() {
            connection.abort();
            info!("Mentions: stopped stream");
        }
        Ok(())
    }

    async fn flush(&self, output: &mut File) {
        if let Err(e) = output.flush().await {
            warn!(
                "Mentions: could not flush {}: {}",
                self.mentions_file.display(),
                e
            );
        }
    }

    async fn backfill(&self, track: &[String], output: &mut File) {
        let query = track.join(" OR ");
        match self.source.search(&query).await {
            Ok(tweets) => {
                info!("Mentions: backfilling {} tweets", tweets.len());
                for tweet in &tweets {
                    if let Err(e) = self.write_tweet(tweet, output).await {
                        error!(
                            "Mentions: could not write backfill tweet to {}: {}",
                            self.mentions_file.display(),
                            e
                        );
                    }
                }
            }
            Err(e) => {
                warn!("Mentions: backfill search failed, continuing with live stream: {}", e);
            }
        }
    }

    async fn dispatch(&self, message: StreamMessage, output: &mut File) {
        match message {
            StreamMessage::Tweet(tweet) => {
                if let Err(e) = self.write_tweet(&tweet, output).await {
                    error!(
                        "Mentions: could not write stream tweet to {}: {}",
                        self.mentions_file.display(),
                        e
                    );
                }
            }
            StreamMessage::Limit { track } => {
                warn!("Mentions: stream limit - {} undelivered matches", track);
            }
            StreamMessage::Disconnect { code, reason } => {
                warn!("Mentions: Disconnect [{}] {}", code, reason);
            }
            StreamMessage::StallWarning {
                code,
                message,
                percent_full,
            } => {
                warn!(
                    "Mentions: Stall Warning ({}%) [{}] {}",
                    percent_full, code, message
                );
            }
            StreamMessage::Other(_) => {}
        }
    }

    /// Appends `tweet` as one JSON line, bumps the counter and fires the callback.
    ///
    /// The line is flushed to the file before it is counted.
    async fn write_tweet(&self, tweet: &Tweet, output: &mut File) -> Result<()> {
        let record = Record::from(tweet);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        output
            .write_all(&line)
            .await
            .map_err(|e| Error::io(&self.mentions_file, e))?;
        output
            .flush()
            .await
            .map_err(|e| Error::io(&self.mentions_file, e))?;

        self.count.fetch_add(1, Ordering::SeqCst);
        if let Some(callback) = &self.on_mention {
            callback(&record);
        }
        Ok(())
    }
}
