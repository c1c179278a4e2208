//! Durable key-value storage engine
//!
//! `Store` owns a write-ahead log and three in-memory structures:
//!
//! - `kv`: the key → value map (the source of truth between restarts of
//!   the process; rebuilt from the WAL on open)
//! - `inverted`: lowercase token → set of keys whose value contains it
//! - `embeddings`: key → 16-dimension bag-of-words vector
//!
//! plus a `versions` map used by the quorum cluster for last-writer-wins
//! conflict resolution.
//!
//! ## Durability protocol
//!
//! Every mutation: serialize the record, append to the WAL, fsync, and only
//! then apply to memory. All four steps happen under one exclusive lock, so
//! no observer sees a partially applied bulk mutation and the WAL order
//! equals the in-memory apply order. If the append or fsync fails, memory is
//! untouched and the engine stays usable.
//!
//! ## Versioned applies
//!
//! A mutation carrying `version = Some(v)` is applied only if `v` is
//! strictly greater than the key's recorded version (absent keys are at
//! version 0). Stale mutations are successful no-ops, which makes versioned
//! writes idempotent under retries and tolerant of reordered arrival. The
//! record is still appended to the WAL; replay routes through the same gate,
//! so replayed state always matches live state.

use crate::search::embedding::{self, EmbeddingVector};
use crate::search::tokenizer;
use capstan_core::{validate_key, Result};
use capstan_durability::{SyncPolicy, Wal, WalRecord};
use parking_lot::Mutex;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Probability that a `set` with `unreliable: true` skips its fsync.
const UNRELIABLE_SKIP_PROBABILITY: f64 = 0.01;

/// Options for [`Store::set_opts`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Skip the fsync with probability 0.01, for durability testing only.
    /// The in-memory apply still happens, so acked state can diverge from
    /// replayed state after a crash — observing that divergence is the
    /// point of the mode.
    pub unreliable: bool,
    /// Coordinator-assigned version for last-writer-wins gating.
    pub version: Option<u64>,
}

#[derive(Debug)]
struct StoreInner {
    wal: Wal,
    kv: HashMap<String, String>,
    inverted: HashMap<String, HashSet<String>>,
    embeddings: HashMap<String, EmbeddingVector>,
    versions: HashMap<String, u64>,
}

/// A single-node, crash-safe key-value engine.
///
/// # Example
///
/// ```no_run
/// use capstan_engine::Store;
///
/// fn main() -> capstan_core::Result<()> {
///     let store = Store::open("data/node.wal")?;
///     store.set("greeting", "hello world")?;
///     assert_eq!(store.get("greeting").as_deref(), Some("hello world"));
///     let hits = store.search_full_text("hello");
///     assert!(hits.contains("greeting"));
///     store.close()
/// }
/// ```
#[derive(Debug)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    /// Open a store backed by the WAL at `path`, replaying any prior log.
    ///
    /// Replay applies records with the same logic as live writes (minus the
    /// WAL append and fsync), so the rebuilt map and indexes match the state
    /// at the time the tail was appended. A torn trailing record is
    /// discarded by the WAL layer; corruption anywhere else fails the open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut wal = Wal::open(path)?;
        let records = wal.replay()?;
        let mut inner = StoreInner {
            wal,
            kv: HashMap::new(),
            inverted: HashMap::new(),
            embeddings: HashMap::new(),
            versions: HashMap::new(),
        };
        let replayed = records.len();
        for record in &records {
            inner.apply(record);
        }
        tracing::info!(
            path = %inner.wal.path().display(),
            records = replayed,
            keys = inner.kv.len(),
            "store opened"
        );
        Ok(Store {
            inner: Mutex::new(inner),
        })
    }

    /// Write one key.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_opts(key, value, SetOptions::default())
    }

    /// Write one key with explicit options.
    pub fn set_opts(&self, key: &str, value: &str, opts: SetOptions) -> Result<()> {
        validate_key(key)?;
        let sync = if opts.unreliable
            && rand::thread_rng().gen::<f64>() < UNRELIABLE_SKIP_PROBABILITY
        {
            tracing::debug!(key, "unreliable mode: skipping fsync");
            SyncPolicy::Skip
        } else {
            SyncPolicy::Sync
        };
        let record = WalRecord::Set {
            key: key.to_string(),
            value: value.to_string(),
            version: opts.version,
        };
        let mut inner = self.inner.lock();
        inner.wal.append(&record, sync)?;
        inner.apply_set(key, value, opts.version);
        Ok(())
    }

    /// Read one key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().kv.get(key).cloned()
    }

    /// Read several keys under one lock acquisition (a consistent snapshot).
    pub fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        let inner = self.inner.lock();
        keys.iter().map(|k| inner.kv.get(*k).cloned()).collect()
    }

    /// Value and LWW version of a key. Absent keys report version 0.
    pub fn fetch_versioned(&self, key: &str) -> (Option<String>, u64) {
        let inner = self.inner.lock();
        (
            inner.kv.get(key).cloned(),
            inner.versions.get(key).copied().unwrap_or(0),
        )
    }

    /// Delete one key. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.delete_versioned(key, None)
    }

    /// Delete one key under the LWW version gate.
    pub fn delete_versioned(&self, key: &str, version: Option<u64>) -> Result<bool> {
        validate_key(key)?;
        let record = WalRecord::Delete {
            key: key.to_string(),
            version,
        };
        let mut inner = self.inner.lock();
        inner.wal.append(&record, SyncPolicy::Sync)?;
        Ok(inner.apply_delete(key, version))
    }

    /// Write a batch of keys atomically.
    ///
    /// Pairs apply in listed order (a later pair with the same key wins) and
    /// the whole batch becomes visible to other observers at once.
    pub fn bulk_set(&self, items: &[(String, String)]) -> Result<()> {
        self.bulk_set_versioned(items, None)
    }

    /// Write a batch atomically, each item gated by the LWW version rule.
    ///
    /// Items with stale versions are skipped; the batch still commits.
    pub fn bulk_set_versioned(
        &self,
        items: &[(String, String)],
        version: Option<u64>,
    ) -> Result<()> {
        for (key, _) in items {
            validate_key(key)?;
        }
        let record = WalRecord::BulkSet {
            items: items.to_vec(),
            version,
        };
        let mut inner = self.inner.lock();
        inner.wal.append(&record, SyncPolicy::Sync)?;
        inner.apply_bulk_set(items, version);
        Ok(())
    }

    /// Keys whose value contains every token of the query.
    ///
    /// An empty query (no tokens) matches nothing.
    pub fn search_full_text(&self, query: &str) -> HashSet<String> {
        let tokens = tokenizer::tokenize_unique(query);
        if tokens.is_empty() {
            return HashSet::new();
        }
        let inner = self.inner.lock();
        let mut matched: Option<HashSet<String>> = None;
        for token in &tokens {
            let posting = match inner.inverted.get(token) {
                Some(keys) => keys,
                None => return HashSet::new(),
            };
            matched = Some(match matched {
                None => posting.clone(),
                Some(acc) => acc.intersection(posting).cloned().collect(),
            });
            if matched.as_ref().is_some_and(|m| m.is_empty()) {
                return HashSet::new();
            }
        }
        matched.unwrap_or_default()
    }

    /// The `top_k` keys most similar to the query, by cosine similarity of
    /// bag-of-words vectors.
    ///
    /// Results are sorted by score descending, ties broken by key ascending.
    /// `top_k == 0` yields an empty result.
    pub fn search_embedding(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        if top_k == 0 {
            return Vec::new();
        }
        let query_vector = embedding::embed(query);
        let inner = self.inner.lock();
        let mut scored: Vec<(String, f64)> = inner
            .embeddings
            .iter()
            .map(|(key, vector)| (key.clone(), embedding::cosine(&query_vector, vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k);
        scored
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.lock().kv.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().kv.is_empty()
    }

    /// Sorted snapshot of all live keys.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys: Vec<String> = inner.kv.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Flush and fsync the log, consuming the store.
    pub fn close(self) -> Result<()> {
        let mut inner = self.inner.into_inner();
        inner.wal.sync()
    }
}

impl StoreInner {
    /// Apply a replayed record with the same logic as a live write.
    fn apply(&mut self, record: &WalRecord) {
        match record {
            WalRecord::Set {
                key,
                value,
                version,
            } => self.apply_set(key, value, *version),
            WalRecord::Delete { key, version } => {
                self.apply_delete(key, *version);
            }
            WalRecord::BulkSet { items, version } => self.apply_bulk_set(items, *version),
        }
    }

    /// LWW gate: unversioned mutations always pass; versioned mutations
    /// pass only when strictly newer than the key's recorded version.
    fn version_admits(&self, key: &str, version: Option<u64>) -> bool {
        match version {
            None => true,
            Some(v) => v > self.versions.get(key).copied().unwrap_or(0),
        }
    }

    fn apply_set(&mut self, key: &str, value: &str, version: Option<u64>) {
        if !self.version_admits(key, version) {
            return;
        }
        self.unindex(key);
        self.kv.insert(key.to_string(), value.to_string());
        self.index(key, value);
        if let Some(v) = version {
            self.versions.insert(key.to_string(), v);
        }
    }

    fn apply_delete(&mut self, key: &str, version: Option<u64>) -> bool {
        if !self.version_admits(key, version) {
            return false;
        }
        if let Some(v) = version {
            // Record the tombstone version even when the key is absent, so a
            // late-arriving older write cannot resurrect it.
            self.versions.insert(key.to_string(), v);
        }
        if self.kv.contains_key(key) {
            self.unindex(key);
            self.kv.remove(key);
            true
        } else {
            false
        }
    }

    fn apply_bulk_set(&mut self, items: &[(String, String)], version: Option<u64>) {
        // Collapse duplicate keys to their last occurrence first, so an
        // earlier pair cannot win the version gate against the final value.
        let mut last_index: HashMap<&str, usize> = HashMap::new();
        for (i, (key, _)) in items.iter().enumerate() {
            last_index.insert(key.as_str(), i);
        }
        for (i, (key, value)) in items.iter().enumerate() {
            if last_index.get(key.as_str()) == Some(&i) {
                self.apply_set(key, value, version);
            }
        }
    }

    /// Remove `key` from both indexes, based on its current value.
    fn unindex(&mut self, key: &str) {
        if let Some(old_value) = self.kv.get(key) {
            for token in tokenizer::tokenize_unique(old_value) {
                if let Some(keys) = self.inverted.get_mut(&token) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.inverted.remove(&token);
                    }
                }
            }
            self.embeddings.remove(key);
        }
    }

    /// Index `key`'s new value in both indexes.
    fn index(&mut self, key: &str, value: &str) {
        for token in tokenizer::tokenize_unique(value) {
            self.inverted
                .entry(token)
                .or_default()
                .insert(key.to_string());
        }
        self.embeddings
            .insert(key.to_string(), embedding::embed(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> Store {
        Store::open(dir.path().join("test.wal")).unwrap()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_set_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));

        assert!(store.delete("k").unwrap());
        assert_eq!(store.get("k"), None);
        assert!(!store.delete("k").unwrap());
    }

    #[test]
    fn test_empty_key_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.set("", "v").is_err());
        assert!(store.delete("").is_err());
        assert!(store.bulk_set(&pairs(&[("", "v")])).is_err());
    }

    #[test]
    fn test_reopen_recovers_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.wal");

        let store = Store::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.delete("a").unwrap();
        store.set("b", "3").unwrap();
        store.close().unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b").as_deref(), Some("3"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reopen_rebuilds_indexes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.wal");

        let store = Store::open(&path).unwrap();
        store.set("doc", "rust systems programming").unwrap();
        store.close().unwrap();

        let store = Store::open(&path).unwrap();
        assert!(store.search_full_text("systems").contains("doc"));
        let results = store.search_embedding("rust", 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "doc");
        assert!(results[0].1 > 0.0);
    }

    #[test]
    fn test_bulk_set_later_pair_wins() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .bulk_set(&pairs(&[("k", "first"), ("other", "x"), ("k", "last")]))
            .unwrap();
        assert_eq!(store.get("k").as_deref(), Some("last"));
        // Indexes reflect the final value only.
        assert!(store.search_full_text("first").is_empty());
        assert!(store.search_full_text("last").contains("k"));
    }

    #[test]
    fn test_overwrite_updates_indexes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("k", "old words here").unwrap();
        store.set("k", "new words there").unwrap();

        assert!(store.search_full_text("old").is_empty());
        assert!(store.search_full_text("new").contains("k"));
        // Shared token still matches.
        assert!(store.search_full_text("words").contains("k"));
    }

    #[test]
    fn test_delete_removes_from_indexes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("k", "ephemeral content").unwrap();
        store.delete("k").unwrap();

        assert!(store.search_full_text("ephemeral").is_empty());
        assert!(store.search_embedding("ephemeral", 5).is_empty());
    }

    #[test]
    fn test_search_full_text_and_semantics() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("d1", "alpha beta gamma").unwrap();
        store.set("d2", "alpha beta").unwrap();
        store.set("d3", "alpha").unwrap();

        let hits = store.search_full_text("alpha beta");
        assert_eq!(
            hits,
            ["d1", "d2"].iter().map(|s| s.to_string()).collect()
        );
        assert!(store.search_full_text("").is_empty());
        assert!(store.search_full_text("missing").is_empty());
    }

    #[test]
    fn test_search_embedding_top_k_and_ties() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        // Identical values score identically; ties order by key ascending.
        store.set("b", "same words").unwrap();
        store.set("a", "same words").unwrap();
        store.set("c", "unrelated thing").unwrap();

        let results = store.search_embedding("same words", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "b");
        assert!((results[0].1 - results[1].1).abs() < 1e-12);

        assert!(store.search_embedding("same words", 0).is_empty());
    }

    #[test]
    fn test_versioned_set_lww() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let v2 = SetOptions {
            version: Some(2),
            ..Default::default()
        };
        let v1 = SetOptions {
            version: Some(1),
            ..Default::default()
        };
        store.set_opts("k", "newer", v2).unwrap();
        // Stale write arrives late: successful no-op.
        store.set_opts("k", "older", v1).unwrap();

        assert_eq!(store.get("k").as_deref(), Some("newer"));
        assert_eq!(store.fetch_versioned("k"), (Some("newer".to_string()), 2));
    }

    #[test]
    fn test_versioned_reapply_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let v1 = SetOptions {
            version: Some(1),
            ..Default::default()
        };
        store.set_opts("k", "v", v1).unwrap();
        store.set_opts("k", "v", v1).unwrap();
        assert_eq!(store.fetch_versioned("k"), (Some("v".to_string()), 1));
    }

    #[test]
    fn test_versioned_delete_tombstone_blocks_older_write() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .set_opts(
                "k",
                "v",
                SetOptions {
                    version: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.delete_versioned("k", Some(3)).unwrap());
        // A write older than the tombstone cannot resurrect the key.
        store
            .set_opts(
                "k",
                "zombie",
                SetOptions {
                    version: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_versioned_bulk_skips_stale_items_only() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .set_opts(
                "fresh",
                "old",
                SetOptions {
                    version: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .set_opts(
                "pinned",
                "kept",
                SetOptions {
                    version: Some(9),
                    ..Default::default()
                },
            )
            .unwrap();

        // Batch at version 5: updates "fresh", skips "pinned", creates "new".
        store
            .bulk_set_versioned(
                &pairs(&[("fresh", "updated"), ("pinned", "clobbered"), ("new", "born")]),
                Some(5),
            )
            .unwrap();

        assert_eq!(store.get("fresh").as_deref(), Some("updated"));
        assert_eq!(store.get("pinned").as_deref(), Some("kept"));
        assert_eq!(store.get("new").as_deref(), Some("born"));
    }

    #[test]
    fn test_versioned_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.wal");

        let store = Store::open(&path).unwrap();
        store
            .set_opts(
                "k",
                "newer",
                SetOptions {
                    version: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .set_opts(
                "k",
                "older",
                SetOptions {
                    version: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        store.close().unwrap();

        // Replay runs both records through the same gate.
        let store = Store::open(&path).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("newer"));
        assert_eq!(store.fetch_versioned("k").1, 2);
    }

    #[test]
    fn test_get_many_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .bulk_set(&pairs(&[("a", "1"), ("b", "2")]))
            .unwrap();
        let values = store.get_many(&["a", "b", "c"]);
        assert_eq!(
            values,
            vec![Some("1".to_string()), Some("2".to_string()), None]
        );
    }

    #[test]
    fn test_unreliable_set_still_applies_in_memory() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let opts = SetOptions {
            unreliable: true,
            ..Default::default()
        };
        for i in 0..50 {
            store
                .set_opts(&format!("k{i}"), "v", opts)
                .unwrap();
        }
        assert_eq!(store.len(), 50);
    }

    #[test]
    fn test_keys_sorted() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
