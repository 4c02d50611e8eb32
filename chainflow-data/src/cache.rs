//! Fixed-TTL memoisation of raw chain documents.
//!
//! One entry per [`ChainKey`], replaced on expiry by whichever caller gets
//! there first. This map is the only shared mutable state in the pipeline:
//! read-mostly behind a [`parking_lot::RwLock`], with a single-flight refresh
//! guard so concurrent callers of an expired key do not issue duplicate
//! in-flight fetches.

use crate::client::{ChainClient, ChainKey};
use crate::error::DataError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long a fetched document stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    document: Arc<Value>,
    fetched_at: Instant,
}

/// TTL cache of raw option-chain documents, keyed by `(symbol, index/equity)`.
pub struct ChainCache {
    ttl: Duration,
    entries: RwLock<HashMap<ChainKey, CacheEntry>>,
    refresh: tokio::sync::Mutex<()>,
}

impl Default for ChainCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ChainCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Return the cached document for `key` if it is still fresh.
    pub fn lookup(&self, key: &ChainKey) -> Option<Arc<Value>> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.document))
    }

    /// Store a freshly fetched document, replacing any previous entry.
    pub fn insert(&self, key: ChainKey, document: Value) -> Arc<Value> {
        let document = Arc::new(document);
        self.entries.write().insert(
            key,
            CacheEntry {
                document: Arc::clone(&document),
                fetched_at: Instant::now(),
            },
        );
        document
    }

    /// Return a fresh document for `key`, fetching through `client` on a miss
    /// or an expired entry.
    pub async fn get_or_fetch(
        &self,
        client: &ChainClient,
        key: &ChainKey,
    ) -> Result<Arc<Value>, DataError> {
        if let Some(document) = self.lookup(key) {
            debug!(%key, "chain cache hit");
            return Ok(document);
        }

        let _guard = self.refresh.lock().await;

        // A caller that held the guard first may have refreshed this key already
        if let Some(document) = self.lookup(key) {
            return Ok(document);
        }

        debug!(%key, "chain cache miss, fetching");
        let document = client.fetch(key).await?;
        Ok(self.insert(key.clone(), document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_entry_is_returned() {
        let cache = ChainCache::new(Duration::from_secs(3600));
        let key = ChainKey::index("NIFTY");

        assert!(cache.lookup(&key).is_none());
        cache.insert(key.clone(), json!({"data": []}));

        let document = cache.lookup(&key).expect("entry should be fresh");
        assert_eq!(*document, json!({"data": []}));
    }

    #[test]
    fn test_expired_entry_is_not_fresh() {
        let cache = ChainCache::new(Duration::ZERO);
        let key = ChainKey::index("NIFTY");

        cache.insert(key.clone(), json!({"data": []}));
        assert!(cache.lookup(&key).is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = ChainCache::new(Duration::from_secs(3600));
        cache.insert(ChainKey::index("NIFTY"), json!({"kind": "index"}));
        cache.insert(ChainKey::equity("NIFTY"), json!({"kind": "equity"}));

        let index_doc = cache.lookup(&ChainKey::index("NIFTY")).unwrap();
        let equity_doc = cache.lookup(&ChainKey::equity("NIFTY")).unwrap();
        assert_ne!(*index_doc, *equity_doc);
    }

    #[tokio::test]
    async fn test_get_or_fetch_serves_cached_document_without_network() {
        let cache = ChainCache::new(Duration::from_secs(3600));
        let key = ChainKey::index("NIFTY");
        cache.insert(key.clone(), json!({"data": [{"strikePrice": 100.0}]}));

        // Points at an unroutable host: any fetch attempt would error
        let client = ChainClient::with_base_url("http://127.0.0.1:9").unwrap();
        let document = cache.get_or_fetch(&client, &key).await.unwrap();
        assert_eq!(document["data"][0]["strikePrice"], json!(100.0));
    }
}
