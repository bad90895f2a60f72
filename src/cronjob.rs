//! Cronjob module for scheduled tasks.
//!
//! This module contains the periodic refresh job: every tick pulls new
//! timeline tweets into the cache and then makes sure the mention stream is
//! running on the current account list, restarting it when the list changed
//! or the previous stream ended.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::cache::TweetCache;
use crate::error::{Error, Result};
use crate::mentions::MentionStreamer;

/// Owns the task running [`MentionStreamer::stream`] and restarts it when needed.
pub struct StreamSupervisor {
    streamer: Arc<MentionStreamer>,
    accounts: Vec<String>,
    task: Option<JoinHandle<Result<()>>>,
}

impl StreamSupervisor {
    pub fn new(streamer: Arc<MentionStreamer>) -> Self {
        Self {
            streamer,
            accounts: Vec::new(),
            task: None,
        }
    }

    /// Whether a stream task is currently alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Accounts the current (or last) stream was started with, sorted.
    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    /// Ensures a stream is running for `accounts`.
    ///
    /// Nothing happens if a stream is alive and the account set is unchanged.
    /// Otherwise the old task is torn down and a new one spawned.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: a new stream task was started
    /// - `Ok(false)`: the running stream was left alone
    /// - `Err(_)`: the previous stream ended with a fatal error
    pub async fn sync(&mut self, mut accounts: Vec<String>) -> Result<bool> {
        accounts.sort();
        accounts.dedup();
        if self.is_running() && accounts == self.accounts {
            return Ok(false);
        }

        self.reap().await?;
        self.streamer.stop().await?;

        info!(
            "Starting mention stream for {} accounts (previously {})",
            accounts.len(),
            self.accounts.len()
        );
        self.accounts = accounts.clone();
        let streamer = self.streamer.clone();
        self.task = Some(tokio::spawn(async move { streamer.stream(&accounts).await }));
        Ok(true)
    }

    /// Stops the stream and waits for its task to finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.streamer.stop().await?;
        self.reap().await
    }

    /// Collects the previous task, aborting it if it is still starting up.
    async fn reap(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        if !task.is_finished() {
            task.abort();
        }
        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_fatal() => {
                error!("Mention stream failed fatally: {}", e);
                Err(e)
            }
            Ok(Err(e)) => {
                warn!("Mention stream ended with error, restarting: {}", e);
                Ok(())
            }
            Err(join_error) if join_error.is_cancelled() => Ok(()),
            Err(join_error) => {
                error!("Mention stream task panicked: {}", join_error);
                Ok(())
            }
        }
    }
}

/// Runs one refresh: timeline update, then stream supervision.
///
/// Recoverable errors are logged and swallowed so the next tick can retry;
/// only fatal errors are returned.
pub async fn run_refresh_cycle(
    cache: &TweetCache,
    supervisor: Option<&Mutex<StreamSupervisor>>,
) -> Result<()> {
    info!("Starting scheduled timeline refresh");
    match cache.refresh().await {
        Ok(added) => info!("Scheduled refresh completed, {} new tweets", added),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => warn!("Scheduled refresh failed, keeping previous data: {}", e),
    }

    if let Some(supervisor) = supervisor {
        let accounts = cache.accounts().await;
        let mut supervisor = supervisor.lock().await;
        if supervisor.sync(accounts).await? {
            info!("Mention stream (re)started after refresh");
        }
    }
    Ok(())
}

/// Creates the refresh scheduler.
///
/// The job runs on `schedule` (a 7-field cron expression, e.g. the default
/// `"0 0/5 * * * * *"`: second 0 of every fifth minute). Fatal errors from a
/// cycle are sent on `fatal_tx` so the process can shut down.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use twivility::{start_refresh_cronjob, TweetCache, TwitterClient, TwitterConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let client = Arc::new(TwitterClient::new(TwitterConfig::from_env().unwrap()));
///     let cache = Arc::new(TweetCache::new(client, "tweetstore.json"));
///     let (fatal_tx, mut fatal_rx) = tokio::sync::mpsc::unbounded_channel();
///
///     let scheduler = start_refresh_cronjob(cache, None, "0 0/5 * * * * *", fatal_tx)
///         .await
///         .unwrap();
///     scheduler.start().await.unwrap();
///     let _ = fatal_rx.recv().await;
/// }
/// ```
pub async fn start_refresh_cronjob(
    cache: Arc<TweetCache>,
    supervisor: Option<Arc<Mutex<StreamSupervisor>>>,
    schedule: &str,
    fatal_tx: mpsc::UnboundedSender<Error>,
) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    sched
        .add(Job::new_async(schedule, move |_uuid, _l| {
            let cache = cache.clone();
            let supervisor = supervisor.clone();
            let fatal_tx = fatal_tx.clone();
            Box::pin(async move {
                if let Err(e) = run_refresh_cycle(&cache, supervisor.as_deref()).await {
                    error!("Scheduled refresh hit a fatal error: {}", e);
                    let _ = fatal_tx.send(e);
                }
            })
        })?)
        .await?;

    info!("Cronjob scheduler configured to refresh on schedule '{}'", schedule);
    Ok(sched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::{make_tweet, ScriptedTimeline};
    use crate::mentions::tests::FakeMentions;
    use std::time::Duration;

    async fn wait_until_streaming(streamer: &MentionStreamer) {
        for _ in 0..500 {
            if streamer.is_streaming().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("stream never started");
    }

    fn setup(
        dir: &tempfile::TempDir,
    ) -> (
        Arc<ScriptedTimeline>,
        Arc<FakeMentions>,
        TweetCache,
        Arc<MentionStreamer>,
    ) {
        let timeline = Arc::new(ScriptedTimeline::standard());
        let mentions = Arc::new(FakeMentions::default());
        let cache = TweetCache::new(timeline.clone(), dir.path().join("tweetstore.json"));
        let streamer = Arc::new(MentionStreamer::new(
            mentions.clone(),
            dir.path().join("mentions.json"),
            Vec::new(),
        ));
        (timeline, mentions, cache, streamer)
    }

    #[tokio::test]
    async fn test_refresh_cycle_starts_stream_once() {
        let dir = tempfile::tempdir().unwrap();
        let (_timeline, mentions, cache, streamer) = setup(&dir);
        let supervisor = Mutex::new(StreamSupervisor::new(streamer.clone()));

        run_refresh_cycle(&cache, Some(&supervisor)).await.unwrap();
        wait_until_streaming(&streamer).await;
        assert_eq!(
            supervisor.lock().await.accounts(),
            &["@CoolUser", "@User1", "@User2"]
        );

        run_refresh_cycle(&cache, Some(&supervisor)).await.unwrap();
        assert_eq!(mentions.tracks.lock().unwrap().len(), 1);

        supervisor.lock().await.shutdown().await.unwrap();
        assert!(!streamer.is_streaming().await);
    }

    #[tokio::test]
    async fn test_new_account_restarts_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (timeline, mentions, cache, streamer) = setup(&dir);
        let supervisor = Mutex::new(StreamSupervisor::new(streamer.clone()));

        run_refresh_cycle(&cache, Some(&supervisor)).await.unwrap();
        wait_until_streaming(&streamer).await;

        timeline.push(make_tweet(10, "hello", 404, "@Newcomer"));
        run_refresh_cycle(&cache, Some(&supervisor)).await.unwrap();
        wait_until_streaming(&streamer).await;

        let tracks = mentions.tracks.lock().unwrap().clone();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[1].contains(&"@Newcomer".to_string()));

        supervisor.lock().await.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_stream_is_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let (_timeline, mentions, cache, streamer) = setup(&dir);
        let supervisor = Mutex::new(StreamSupervisor::new(streamer.clone()));

        run_refresh_cycle(&cache, Some(&supervisor)).await.unwrap();
        wait_until_streaming(&streamer).await;

        // Simulate the connection dropping on its own.
        streamer.stop().await.unwrap();
        for _ in 0..500 {
            if !supervisor.lock().await.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        run_refresh_cycle(&cache, Some(&supervisor)).await.unwrap();
        wait_until_streaming(&streamer).await;
        assert_eq!(mentions.tracks.lock().unwrap().len(), 2);

        supervisor.lock().await.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_cycle_without_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (_timeline, _mentions, cache, _streamer) = setup(&dir);
        run_refresh_cycle(&cache, None).await.unwrap();
        assert_eq!(cache.accounts().await.len(), 3);
    }

    #[tokio::test]
    async fn test_corrupt_store_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (_timeline, _mentions, cache, _streamer) = setup(&dir);
        std::fs::write(cache.data_file(), "{\"TweetID\": oops").unwrap();

        let err = run_refresh_cycle(&cache, None).await.unwrap_err();
        assert!(matches!(err, Error::CorruptStore { .. }));
    }
}
