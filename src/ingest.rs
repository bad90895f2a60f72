//! Timeline ingestion module.
//!
//! This module contains the windowed, dedup-aware pagination that grows the
//! record store with everything newer than the newest tweet already on disk,
//! without re-walking history that was fetched on an earlier run.

use std::path::Path;

use async_trait::async_trait;
use log::{debug, error, info};

use crate::error::Result;
use crate::store::{self, Record};
use crate::twitter::Tweet;

/// Number of tweets requested per page; stays under the per-call ceiling.
pub const PAGE_SIZE: usize = 190;

/// Upper bound on tweets added by a single [`update`] call.
pub const MAX_ADDED_PER_UPDATE: usize = 700;

/// Remote capability that returns one page of the home timeline.
///
/// `since_id == 0` leaves the lower edge unbounded and `max_id == 0` leaves
/// the upper edge unbounded. The production implementation is
/// [`TwitterClient`](crate::twitter::TwitterClient); tests substitute fakes.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    async fn fetch_page(&self, count: usize, since_id: i64, max_id: i64) -> Result<Vec<Tweet>>;
}

/// Pulls new tweets from `source` and merges them into the store at `path`.
///
/// The query window starts at `since = newest stored ID` with no upper bound
/// and walks backwards: after each page the upper bound drops to the oldest
/// new ID seen. The walk ends when a page adds nothing, the window collapses,
/// or [`MAX_ADDED_PER_UPDATE`] is exceeded.
///
/// A failed page fetch aborts the whole call and leaves the store untouched.
///
/// # Returns
///
/// The number of records added, or the fetch/store error.
pub async fn update(path: &Path, source: &dyn TimelineSource) -> Result<usize> {
    let store_path = path.to_path_buf();
    let mut existing = store::run_blocking(move || store::read_all(&store_path)).await?;
    store::sort_canonical(&mut existing);
    let mut seen = store::seen(&existing);
    let (min_id, max_id) = store::min_max(&existing);
    info!(
        "Found {} tweets in file {} - ID range {}<->{}",
        existing.len(),
        path.display(),
        min_id,
        max_id
    );

    let since = if existing.is_empty() { 0 } else { max_id };
    let mut max = 0i64;
    let mut total_added = 0usize;
    let mut page_count = 0usize;

    loop {
        page_count += 1;
        debug!(
            "Fetching timeline page {} => count:{}, since:{}, max:{}",
            page_count, PAGE_SIZE, since, max
        );

        let tweets = match source.fetch_page(PAGE_SIZE, since, max).await {
            Ok(tweets) => tweets,
            Err(e) => {
                error!("Error getting home timeline page {}: {}", page_count, e);
                return Err(e);
            }
        };

        let mut added = 0usize;
        let mut batch_min = 0i64;
        for tweet in &tweets {
            if seen.insert(tweet.id) {
                existing.push(Record::from(tweet));
                added += 1;
                if batch_min == 0 || tweet.id < batch_min {
                    batch_min = tweet.id;
                }
            }
        }
        debug!(
            "Page {} returned {} tweets, {} new",
            page_count,
            tweets.len(),
            added
        );

        total_added += added;
        if total_added > MAX_ADDED_PER_UPDATE {
            info!(
                "Added {} tweets this run, stopping at the per-update cap",
                total_added
            );
            break;
        }

        if added == 0 {
            break;
        }

        max = batch_min;
        if max <= since + 1 {
            break;
        }
    }

    if total_added > 0 {
        info!(
            "Added {} records: rewriting file {}",
            total_added,
            path.display()
        );
        let store_path = path.to_path_buf();
        store::run_blocking(move || store::write_all(&store_path, &mut existing)).await?;
    } else {
        info!("No new tweets found after {} page(s)", page_count);
    }

    Ok(total_added)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::twitter::User;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves a fixed timeline, honouring `count`, `since_id` and `max_id`
    /// the way the remote API does.
    pub(crate) struct ScriptedTimeline {
        tweets: Mutex<Vec<Tweet>>,
        pub(crate) calls: AtomicUsize,
    }

    pub(crate) fn make_tweet(id: i64, text: &str, uid: i64, handle: &str) -> Tweet {
        Tweet {
            id,
            created_at: format!("testTime+{}", id),
            text: text.to_string(),
            user: Some(User {
                id_str: uid.to_string(),
                name: handle.trim_start_matches('@').to_string(),
                screen_name: handle.to_string(),
            }),
            ..Default::default()
        }
    }

    impl ScriptedTimeline {
        pub(crate) fn new(tweets: Vec<Tweet>) -> Self {
            Self {
                tweets: Mutex::new(tweets),
                calls: AtomicUsize::new(0),
            }
        }

        /// IDs 1..4 spread over three accounts.
        pub(crate) fn standard() -> Self {
            Self::new(vec![
                make_tweet(1, "First tweet", 101, "@User1"),
                make_tweet(2, "Second tweet A", 202, "@User2"),
                make_tweet(3, "Second tweet B", 202, "@User2"),
                make_tweet(4, "Last Tweet", 42, "@CoolUser"),
            ])
        }

        pub(crate) fn push(&self, tweet: Tweet) {
            self.tweets.lock().unwrap().push(tweet);
        }
    }

    #[async_trait]
    impl TimelineSource for ScriptedTimeline {
        async fn fetch_page(&self, count: usize, since_id: i64, max_id: i64) -> Result<Vec<Tweet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut page: Vec<Tweet> = self
                .tweets
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.id > since_id && (max_id == 0 || t.id <= max_id))
                .cloned()
                .collect();
            page.sort_by(|a, b| b.id.cmp(&a.id));
            page.truncate(count);
            Ok(page)
        }
    }

    pub(crate) struct FailingTimeline;

    #[async_trait]
    impl TimelineSource for FailingTimeline {
        async fn fetch_page(&self, _: usize, _: i64, _: i64) -> Result<Vec<Tweet>> {
            Err(Error::Fetch("I always fail.".to_string()))
        }
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let source = ScriptedTimeline::standard();

        assert_eq!(update(&path, &source).await.unwrap(), 4);
        let after_first = store::read_all(&path).unwrap();
        assert_eq!(update(&path, &source).await.unwrap(), 0);
        assert_eq!(store::read_all(&path).unwrap(), after_first);

        assert_eq!(ids(&after_first), vec![4, 3, 2, 1]);
        assert_eq!(store::min_max(&after_first), (1, 4));
        let seen = store::seen(&after_first);
        assert!(seen.contains(&2));
        assert!(seen.contains(&3));
    }

    #[tokio::test]
    async fn test_empty_first_page_makes_one_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let source = ScriptedTimeline::new(Vec::new());

        assert_eq!(update(&path, &source).await.unwrap(), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failing_source_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        assert!(update(&path, &FailingTimeline).await.is_err());
        assert!(store::read_all(&path).unwrap().is_empty());

        update(&path, &ScriptedTimeline::standard()).await.unwrap();
        let before = store::read_all(&path).unwrap();

        let err = update(&path, &FailingTimeline).await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(store::read_all(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_only_fetches_newer_and_keeps_old() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let source = ScriptedTimeline::standard();
        update(&path, &source).await.unwrap();

        source.push(make_tweet(7, "later", 101, "@User1"));
        source.push(make_tweet(6, "later still", 303, "@User3"));
        assert_eq!(update(&path, &source).await.unwrap(), 2);

        let records = store::read_all(&path).unwrap();
        assert_eq!(ids(&records), vec![7, 6, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_pagination_walks_backwards_across_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let tweets = (1..=500)
            .map(|id| make_tweet(id, "bulk", id % 5, &format!("@u{}", id % 5)))
            .collect();
        let source = ScriptedTimeline::new(tweets);

        assert_eq!(update(&path, &source).await.unwrap(), 500);
        let records = store::read_all(&path).unwrap();
        assert_eq!(records.len(), 500);
        assert!(records.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(store::min_max(&records), (1, 500));
    }

    #[tokio::test]
    async fn test_update_stops_at_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let tweets = (1..=2000)
            .map(|id| make_tweet(id, "bulk", 1, "@bulk"))
            .collect();
        let source = ScriptedTimeline::new(tweets);

        let added = update(&path, &source).await.unwrap();
        assert!(added > MAX_ADDED_PER_UPDATE);
        assert!(added <= MAX_ADDED_PER_UPDATE + PAGE_SIZE);
        assert_eq!(store::read_all(&path).unwrap().len(), added);
    }
}
