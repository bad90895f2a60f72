//! Concurrency-safe tweet cache.
//!
//! [`TweetCache`] holds the current canonical-order snapshot of the store and a
//! per-account index derived from it. Readers share a `tokio::sync::RwLock`;
//! a refresh holds the write side for one complete fetch-merge-persist cycle,
//! so readers always see either the pre- or post-refresh snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::ingest::{self, TimelineSource};
use crate::store::{self, Record};

#[derive(Debug, Default)]
struct CacheState {
    records: Vec<Record>,
    account_index: HashMap<String, Vec<Record>>,
}

impl CacheState {
    /// Replaces the snapshot and rebuilds the account index from scratch.
    ///
    /// Must only be called while holding the write lock.
    fn replace(&mut self, records: Vec<Record>) {
        let mut index: HashMap<String, Vec<Record>> = HashMap::new();
        for record in &records {
            index
                .entry(record.author_handle.clone())
                .or_default()
                .push(record.clone());
        }
        self.records = records;
        self.account_index = index;
    }
}

pub struct TweetCache {
    source: Arc<dyn TimelineSource>,
    data_file: PathBuf,
    state: RwLock<CacheState>,
}

impl TweetCache {
    /// Creates an empty cache backed by `data_file`. Nothing is read until the
    /// first [`refresh`](Self::refresh) or [`reload_from_disk`](Self::reload_from_disk).
    pub fn new(source: Arc<dyn TimelineSource>, data_file: impl Into<PathBuf>) -> Self {
        Self {
            source,
            data_file: data_file.into(),
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Pulls new tweets from the remote timeline into the store and swaps in
    /// the new snapshot.
    ///
    /// On error the previous snapshot is kept and the error is returned for
    /// the scheduler to log; the next tick retries.
    pub async fn refresh(&self) -> Result<usize> {
        let mut state = self.state.write().await;

        let path = self.data_file.clone();
        store::run_blocking(move || store::ensure_exists(&path)).await?;
        let added = match ingest::update(&self.data_file, self.source.as_ref()).await {
            Ok(added) => added,
            Err(e) => {
                error!("Refresh of {} failed: {}", self.data_file.display(), e);
                return Err(e);
            }
        };

        let mut records = self.read_store().await?;
        store::sort_canonical(&mut records);
        state.replace(records);

        info!(
            "Refresh added {} tweets, cache now holds {} tweets across {} accounts",
            added,
            state.records.len(),
            state.account_index.len()
        );
        Ok(added)
    }

    /// Re-reads the store without contacting the remote API.
    pub async fn reload_from_disk(&self) -> Result<Vec<Record>> {
        let mut state = self.state.write().await;

        let path = self.data_file.clone();
        store::run_blocking(move || store::ensure_exists(&path)).await?;
        let mut records = self.read_store().await?;
        store::sort_canonical(&mut records);
        state.replace(records);

        info!(
            "Read {} records from {}",
            state.records.len(),
            self.data_file.display()
        );
        Ok(state.records.clone())
    }

    async fn read_store(&self) -> Result<Vec<Record>> {
        let path = self.data_file.clone();
        store::run_blocking(move || store::read_all(&path)).await
    }

    /// All account handles with at least one cached tweet. Order is not significant.
    pub async fn accounts(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.account_index.keys().cloned().collect()
    }

    /// Tweets by `handle`, newest first.
    ///
    /// Matching is exact and case-sensitive against the handle as the API
    /// reported it. Unknown handles yield an empty list.
    pub async fn tweets_for(&self, handle: &str) -> Vec<Record> {
        let state = self.state.read().await;
        match state.account_index.get(handle) {
            Some(records) => records.clone(),
            None => {
                debug!("No map entry found for acct {}", handle);
                Vec::new()
            }
        }
    }

    /// The full cached snapshot, newest first.
    pub async fn records(&self) -> Vec<Record> {
        self.state.read().await.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::{make_tweet, FailingTimeline, ScriptedTimeline};

    fn cache_with(source: Arc<dyn TimelineSource>, dir: &tempfile::TempDir) -> TweetCache {
        TweetCache::new(source, dir.path().join("tweetstore.json"))
    }

    #[tokio::test]
    async fn test_refresh_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(Arc::new(ScriptedTimeline::standard()), &dir);

        assert_eq!(cache.refresh().await.unwrap(), 4);
        assert_eq!(cache.refresh().await.unwrap(), 0);

        let mut accounts = cache.accounts().await;
        accounts.sort();
        assert_eq!(accounts, vec!["@CoolUser", "@User1", "@User2"]);

        let cool = cache.tweets_for("@CoolUser").await;
        assert_eq!(cool.len(), 1);
        assert_eq!(cool[0].id, 4);
        assert_eq!(cool[0].body, "Last Tweet");

        let user2 = cache.tweets_for("@User2").await;
        assert_eq!(user2.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);

        assert!(cache.tweets_for("nonexistent").await.is_empty());
        assert!(cache.tweets_for("@cooluser").await.is_empty());
    }

    #[tokio::test]
    async fn test_records_stay_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedTimeline::standard());
        let cache = cache_with(source.clone(), &dir);
        cache.refresh().await.unwrap();

        source.push(make_tweet(9, "newest", 101, "@User1"));
        cache.refresh().await.unwrap();

        let records = cache.records().await;
        assert!(records.windows(2).all(|w| w[0].id >= w[1].id));
        assert_eq!(records[0].id, 9);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let good = cache_with(Arc::new(ScriptedTimeline::standard()), &dir);
        good.refresh().await.unwrap();

        let bad = cache_with(Arc::new(FailingTimeline), &dir);
        assert!(bad.refresh().await.is_err());
        assert!(bad.accounts().await.is_empty());
        assert_eq!(bad.reload_from_disk().await.unwrap().len(), 4);
        assert_eq!(bad.accounts().await.len(), 3);

        assert!(bad.refresh().await.is_err());
        assert_eq!(bad.records().await.len(), 4);
    }

    #[tokio::test]
    async fn test_reload_from_disk_on_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(Arc::new(FailingTimeline), &dir);
        assert!(cache.reload_from_disk().await.unwrap().is_empty());
        assert!(cache.data_file().exists());
    }

    #[tokio::test]
    async fn test_readers_run_during_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(cache_with(Arc::new(ScriptedTimeline::standard()), &dir));
        cache.refresh().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.refresh().await }));
        }
        for _ in 0..8 {
            let accounts = cache.accounts().await;
            assert_eq!(accounts.len(), 3);
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 0);
        }
    }
}
