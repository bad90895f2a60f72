//! Record store module.
//!
//! This module owns the on-disk representation of the harvested timeline: a
//! file of JSON [`Record`] objects written back-to-back, always in canonical
//! order (tweet ID descending). It has no locking of its own; the
//! [`TweetCache`](crate::cache::TweetCache) serializes access to it.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::twitter::{extract_hashtags, extract_mentions, Tweet};

/// A single harvested tweet.
///
/// Field names on the wire match the historical data files so existing stores
/// and front-ends keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "TweetID")]
    pub id: i64,
    #[serde(rename = "UserID")]
    pub author_id: String,
    #[serde(rename = "UserName")]
    pub author_name: String,
    #[serde(rename = "UserScreenName")]
    pub author_handle: String,
    #[serde(rename = "Text")]
    pub body: String,
    #[serde(rename = "IsRetweet", default)]
    pub is_reshare: bool,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "FavoriteCount", default)]
    pub favorite_count: i64,
    #[serde(rename = "RetweetCount", default)]
    pub reshare_count: i64,
    #[serde(rename = "Hashtags", default)]
    pub hashtags: Vec<String>,
    #[serde(rename = "Mentions", default)]
    pub mentions: Vec<String>,
}

impl From<&Tweet> for Record {
    fn from(tweet: &Tweet) -> Self {
        // A retweet keeps the poster's identity but the original's text and entities.
        let (source, is_reshare) = match tweet.retweeted_status.as_deref() {
            Some(original) => (original, true),
            None => (tweet, false),
        };
        let body = source.body().to_string();

        let (hashtags, mentions) = match &source.entities {
            Some(entities) if !entities.hashtags.is_empty() || !entities.user_mentions.is_empty() => (
                entities
                    .hashtags
                    .iter()
                    .map(|h| format!("#{}", h.text))
                    .collect(),
                entities
                    .user_mentions
                    .iter()
                    .map(|m| format!("@{}", m.screen_name))
                    .collect(),
            ),
            _ => (extract_hashtags(&body), extract_mentions(&body)),
        };

        let user = tweet.user.clone().unwrap_or_default();

        Record {
            id: tweet.id,
            author_id: user.id_str,
            author_name: user.name,
            author_handle: user.screen_name,
            body,
            is_reshare,
            timestamp: tweet.created_at.clone(),
            favorite_count: tweet.favorite_count,
            reshare_count: tweet.retweet_count,
            hashtags,
            mentions,
        }
    }
}

/// Top-level shape of the JSON dump.
#[derive(Serialize)]
struct TweetListEnvelope<'a> {
    #[serde(rename = "TweetList")]
    tweet_list: &'a [Record],
}

/// Ensures `path` exists, creating an empty file if it does not.
///
/// Never truncates an existing file.
pub fn ensure_exists(path: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Reads every record stored in `path`.
///
/// A missing or zero-byte file reads as an empty collection. Anything that
/// fails to decode is reported as [`Error::CorruptStore`], which is fatal: a
/// partially read store would silently shrink the dedup set.
pub fn read_all(path: &Path) -> Result<Vec<Record>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Store {} does not exist yet, treating as empty", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(Error::io(path, e)),
    };

    let mut records = Vec::with_capacity(512);
    let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<Record>();
    for record in stream {
        let record = record.map_err(|source| {
            if source.is_io() {
                Error::io(path, std::io::Error::other(source))
            } else {
                Error::CorruptStore {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        records.push(record);
    }

    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Sorts `records` into canonical order and atomically rewrites `path` with them.
///
/// The records are written to a sibling `.tmp` file, flushed to disk and then
/// renamed over the target, so a concurrent reader sees either the old or the
/// new store and never a torn one. `records` is left sorted.
pub fn write_all(path: &Path, records: &mut [Record]) -> Result<()> {
    sort_canonical(records);

    let tmp_path = temp_path_for(path);
    let mut buf = Vec::with_capacity(records.len() * 256);
    for record in records.iter() {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }

    let mut file = File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
    file.write_all(&buf).map_err(|e| Error::io(&tmp_path, e))?;
    file.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Sorts `records` in place by ID descending (newest first).
pub fn sort_canonical(records: &mut [Record]) {
    records.sort_unstable_by(|a, b| b.id.cmp(&a.id));
}

/// Builds the set of IDs already present in `records`.
pub fn seen(records: &[Record]) -> HashSet<i64> {
    records.iter().map(|r| r.id).collect()
}

/// Returns `(oldest, newest)` ID of a canonically sorted collection.
///
/// Only the first and last element are consulted, so the input must already be
/// in canonical order. An empty collection yields `(0, 0)`.
pub fn min_max(records: &[Record]) -> (i64, i64) {
    match (records.last(), records.first()) {
        (Some(oldest), Some(newest)) => (oldest.id, newest.id),
        _ => (0, 0),
    }
}

/// Serializes `records` as the `{"TweetList": [...]}` JSON document.
pub fn to_json(records: &[Record]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&TweetListEnvelope {
        tweet_list: records,
    })?)
}

/// Runs synchronous store work on tokio's blocking thread pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Counts the newline-terminated lines in `path`.
pub fn count_lines(path: &Path) -> Result<u64> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut count = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| Error::io(path, e))?;
        if read == 0 {
            break;
        }
        if line.ends_with(b"\n") {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::twitter::{Entities, HashtagEntity, User};

    pub(crate) fn make_record(id: i64, handle: &str, body: &str) -> Record {
        Record {
            id,
            author_id: format!("{}", id * 100),
            author_name: handle.trim_start_matches('@').to_string(),
            author_handle: handle.to_string(),
            body: body.to_string(),
            is_reshare: false,
            timestamp: format!("testTime+{}", id),
            favorite_count: 0,
            reshare_count: 0,
            hashtags: Vec::new(),
            mentions: Vec::new(),
        }
    }

    #[test]
    fn test_empty_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        ensure_exists(&path).unwrap();
        assert!(path.is_file());

        let mut data = read_all(&path).unwrap();
        assert!(data.is_empty());
        assert_eq!(min_max(&data), (0, 0));
        assert!(seen(&data).is_empty());

        write_all(&path, &mut data).unwrap();
        assert!(read_all(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_all(&dir.path().join("nope.json")).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_exists_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut records = vec![make_record(5, "@a", "five")];
        write_all(&path, &mut records).unwrap();

        ensure_exists(&path).unwrap();
        ensure_exists(&path).unwrap();
        assert_eq!(read_all(&path).unwrap(), records);
    }

    #[test]
    fn test_write_sorts_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut records = vec![
            make_record(2, "@b", "two"),
            make_record(9, "@a", "nine"),
            make_record(4, "@b", "four"),
        ];

        write_all(&path, &mut records).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![9, 4, 2]);

        let back = read_all(&path).unwrap();
        assert_eq!(back, records);
        assert_eq!(min_max(&back), (2, 9));
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_corrupt_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut records = vec![make_record(1, "@a", "one")];
        write_all(&path, &mut records).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"TweetID\": 2, \"UserID\"").unwrap();

        let err = read_all(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptStore { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_record_from_retweet_uses_original_text() {
        let original = Tweet {
            id: 10,
            text: "original #news from @source".to_string(),
            ..Default::default()
        };
        let retweet = Tweet {
            id: 11,
            created_at: "Mon Oct 12 10:00:00 +0000 2026".to_string(),
            text: "RT @source: original #news fr…".to_string(),
            user: Some(User {
                id_str: "42".to_string(),
                name: "Cool User".to_string(),
                screen_name: "CoolUser".to_string(),
            }),
            retweeted_status: Some(Box::new(original)),
            retweet_count: 3,
            ..Default::default()
        };

        let record = Record::from(&retweet);
        assert_eq!(record.id, 11);
        assert!(record.is_reshare);
        assert_eq!(record.body, "original #news from @source");
        assert_eq!(record.author_handle, "CoolUser");
        assert_eq!(record.reshare_count, 3);
        assert_eq!(record.hashtags, vec!["#news"]);
        assert_eq!(record.mentions, vec!["@source"]);
    }

    #[test]
    fn test_record_prefers_entities() {
        let tweet = Tweet {
            id: 3,
            text: "text without markers".to_string(),
            entities: Some(Entities {
                hashtags: vec![HashtagEntity {
                    text: "rust".to_string(),
                }],
                user_mentions: Vec::new(),
            }),
            ..Default::default()
        };
        let record = Record::from(&tweet);
        assert!(!record.is_reshare);
        assert_eq!(record.hashtags, vec!["#rust"]);
        assert!(record.mentions.is_empty());
    }

    #[test]
    fn test_to_json_envelope() {
        let records = vec![make_record(3, "@a", "C"), make_record(2, "@b", "B")];
        let data = to_json(&records).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();

        let list = value["TweetList"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["TweetID"], 3);
        assert_eq!(list[1]["UserScreenName"], "@b");

        let parsed: Vec<Record> = serde_json::from_value(value["TweetList"].clone()).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_count_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mentions.json");
        fs::write(&path, "{}\n{}\n{}\n").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 3);

        fs::write(&path, "").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_blocking_returns_store_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut records = vec![make_record(1, "@a", "one"), make_record(2, "@b", "two")];
        write_all(&path, &mut records).unwrap();

        let read_path = path.clone();
        let read = run_blocking(move || read_all(&read_path)).await.unwrap();
        assert_eq!(read.len(), 2);

        fs::write(&path, "{\"TweetID\": nope").unwrap();
        let err = run_blocking(move || read_all(&path)).await.unwrap_err();
        assert!(matches!(err, Error::CorruptStore { .. }));
    }

    #[tokio::test]
    async fn test_run_blocking_panic_is_fatal() {
        let err = run_blocking(|| -> Result<()> { panic!("disk on fire") })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Blocking(_)));
        assert!(err.is_fatal());
    }
}
