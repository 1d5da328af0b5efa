use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::http::Transport;
use crate::models::CacheKey;
use crate::store::Store;

/// Read-through cache for JSON documents.
///
/// A cached entry wins whenever it exists and no refresh was asked for.
/// Otherwise the remote is fetched and the entry overwritten; if the fetch
/// fails, whatever was cached before is served instead.
pub struct CacheStore {
    store: Arc<dyn Store>,
    transport: Arc<dyn Transport>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn Store>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    pub fn fetch(&self, url: &str, key: &CacheKey, force_refresh: bool) -> Option<String> {
        if !force_refresh {
            if let Some(content) = self.read_cached(key) {
                debug!(%key, "cache hit");
                return Some(content);
            }
        }

        match self.transport.get(url) {
            Ok(content) => {
                info!(url, %key, "fetched");
                // The fresh copy is still usable if we can't persist it
                if let Err(e) = self.store.put(key, content.as_bytes()) {
                    warn!(%key, error = %e, "failed to write cache entry");
                }
                Some(content)
            }
            Err(e) => {
                let stale = self.read_cached(key);
                if stale.is_some() {
                    warn!(url, %key, error = %e, "fetch failed, serving cached copy");
                } else {
                    warn!(url, %key, error = %e, "fetch failed and nothing cached");
                }
                stale
            }
        }
    }

    fn read_cached(&self, key: &CacheKey) -> Option<String> {
        let bytes = match self.store.get(key) {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(%key, error = %e, "unreadable cache entry");
                return None;
            }
        };

        match String::from_utf8(bytes) {
            Ok(content) => Some(content),
            Err(_) => {
                warn!(%key, "cache entry is not valid UTF-8");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeTransport;
    use crate::store::fake::FailingStore;
    use crate::store::MemoryStore;

    const URL: &str = "https://hacker-news.firebaseio.com/v0/beststories.json";

    fn setup() -> (Arc<MemoryStore>, Arc<FakeTransport>, CacheStore) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(FakeTransport::new());
        let cache = CacheStore::new(store.clone(), transport.clone());
        (store, transport, cache)
    }

    #[test]
    fn cached_entry_is_served_without_network() {
        let (store, transport, cache) = setup();
        let key = CacheKey::top_stories();
        store.put(&key, b"[1,2,3]").unwrap();
        transport.serve(URL, "[9,9,9]");

        assert_eq!(cache.fetch(URL, &key, false).as_deref(), Some("[1,2,3]"));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn miss_fetches_and_persists() {
        let (store, transport, cache) = setup();
        let key = CacheKey::top_stories();
        transport.serve(URL, "[4,5]");

        assert_eq!(cache.fetch(URL, &key, false).as_deref(), Some("[4,5]"));
        assert_eq!(store.get(&key).unwrap().unwrap(), b"[4,5]");

        // Second call is a hit
        cache.fetch(URL, &key, false);
        assert_eq!(transport.call_count(URL), 1);
    }

    #[test]
    fn force_refresh_overwrites_existing_entry() {
        let (store, transport, cache) = setup();
        let key = CacheKey::top_stories();
        store.put(&key, b"[1]").unwrap();
        transport.serve(URL, "[2]");

        assert_eq!(cache.fetch(URL, &key, true).as_deref(), Some("[2]"));
        assert_eq!(store.get(&key).unwrap().unwrap(), b"[2]");
    }

    #[test]
    fn failed_refresh_serves_stale_entry_unchanged() {
        let (store, transport, cache) = setup();
        let key = CacheKey::top_stories();
        store.put(&key, b"[1,2]").unwrap();
        transport.fail(URL);

        assert_eq!(cache.fetch(URL, &key, true).as_deref(), Some("[1,2]"));
        assert_eq!(store.get(&key).unwrap().unwrap(), b"[1,2]");
        assert_eq!(transport.call_count(URL), 1);
    }

    #[test]
    fn failed_fetch_without_entry_is_absent() {
        let (store, transport, cache) = setup();
        transport.fail(URL);

        assert_eq!(cache.fetch(URL, &CacheKey::top_stories(), false), None);
        assert!(store.is_empty());
    }

    #[test]
    fn non_utf8_entry_is_treated_as_missing() {
        let (store, transport, cache) = setup();
        let key = CacheKey::top_stories();
        store.put(&key, &[0xff, 0xfe]).unwrap();
        transport.serve(URL, "[3]");

        assert_eq!(cache.fetch(URL, &key, false).as_deref(), Some("[3]"));
    }

    #[test]
    fn write_failure_still_returns_fetched_body() {
        let store = Arc::new(FailingStore {
            fail_puts: true,
            ..FailingStore::default()
        });
        let transport = Arc::new(FakeTransport::new());
        let cache = CacheStore::new(store.clone(), transport.clone());
        transport.serve(URL, "[1]");

        let key = CacheKey::top_stories();
        assert_eq!(cache.fetch(URL, &key, false).as_deref(), Some("[1]"));
        assert!(!store.exists(&key));
    }
}
