//! Persistent table of proxies and the time each one last passed a check.
//!
//! Every record maps a `host:port` address to a unix timestamp in seconds.
//! Given a freshness window `W`, a record is *stale* when its check time is
//! strictly before `now - W` and *fresh* when it is strictly after. A record
//! checked exactly at `now - W` is neither; it is not re-checked on that tick
//! and not handed out either.

use std::path::Path;

use log::{debug, error, warn};
use rand::Rng;

use crate::error::Result;

const TREE_NAME: &str = "proxies";

/// Keyed store of proxy addresses backed by an embedded sled tree.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Clone)]
pub struct ProxyStore {
    db: sled::Db,
    proxies: sled::Tree,
    /// Freshness window in seconds.
    freshness_secs: i64,
}

impl ProxyStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>, freshness_secs: i64) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db, freshness_secs)
    }

    /// Open an in-memory store that is discarded when the last handle drops.
    pub fn temporary(freshness_secs: i64) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, freshness_secs)
    }

    fn from_db(db: sled::Db, freshness_secs: i64) -> Result<Self> {
        let proxies = db.open_tree(TREE_NAME)?;
        Ok(Self {
            db,
            proxies,
            freshness_secs,
        })
    }

    /// Add a record for `address`. Returns false if it already exists or
    /// the write failed.
    pub fn insert(&self, address: &str, check_time: i64) -> bool {
        let result = self.proxies.compare_and_swap(
            address,
            None as Option<&[u8]>,
            Some(encode_time(check_time).to_vec()),
        );
        match result {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                debug!("Proxy {} already stored", address);
                false
            }
            Err(e) => {
                error!("Failed to insert proxy {}: {}", address, e);
                false
            }
        }
    }

    /// Set the check time of `address`.
    ///
    /// Absent addresses are left absent and still count as success. The
    /// stored time never moves backwards.
    pub fn update(&self, address: &str, check_time: i64) -> bool {
        let result = self.proxies.fetch_and_update(address, |old| {
            old.map(|bytes| {
                let current = decode_time(bytes).unwrap_or(i64::MIN);
                encode_time(current.max(check_time)).to_vec()
            })
        });
        match result {
            Ok(_) => {
                debug!("Updated proxy {}", address);
                true
            }
            Err(e) => {
                error!("Failed to update proxy {}: {}", address, e);
                false
            }
        }
    }

    /// Remove `address` if present.
    pub fn delete(&self, address: &str) {
        match self.proxies.remove(address) {
            Ok(Some(_)) => debug!("Deleted proxy {}", address),
            Ok(None) => {}
            Err(e) => error!("Failed to delete proxy {}: {}", address, e),
        }
    }

    /// Whether `address` has a record.
    pub fn exists(&self, address: &str) -> bool {
        self.proxies.contains_key(address).unwrap_or_else(|e| {
            error!("Failed to look up proxy {}: {}", address, e);
            false
        })
    }

    /// Last check time of `address`, if stored.
    pub fn check_time(&self, address: &str) -> Option<i64> {
        match self.proxies.get(address) {
            Ok(value) => value.and_then(|bytes| decode_time(&bytes)),
            Err(e) => {
                error!("Failed to read proxy {}: {}", address, e);
                None
            }
        }
    }

    /// Total number of stored records, fresh or not.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Addresses whose last check is older than the freshness window.
    pub fn query_stale(&self, now: i64) -> Vec<String> {
        let threshold = now - self.freshness_secs;
        self.records()
            .filter(|(_, time)| *time < threshold)
            .map(|(address, _)| address)
            .collect()
    }

    /// Number of records checked within the freshness window.
    pub fn query_fresh_count(&self, now: i64) -> usize {
        let threshold = now - self.freshness_secs;
        self.records().filter(|(_, time)| *time > threshold).count()
    }

    /// One fresh address chosen uniformly at random.
    ///
    /// Reservoir sampling over a single scan keeps memory constant however
    /// large the table grows.
    pub fn query_random_fresh(&self, now: i64) -> Option<String> {
        let threshold = now - self.freshness_secs;
        let mut rng = rand::rng();
        let mut chosen = None;
        let mut seen = 0u64;
        for (address, time) in self.records() {
            if time <= threshold {
                continue;
            }
            seen += 1;
            if rng.random_range(0..seen) == 0 {
                chosen = Some(address);
            }
        }
        chosen
    }

    /// Flush pending writes and release the database.
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Iterate over decodable records, logging and skipping anything else.
    fn records(&self) -> impl Iterator<Item = (String, i64)> + '_ {
        self.proxies.iter().filter_map(|item| {
            let (key, value) = match item {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Failed to scan proxies: {}", e);
                    return None;
                }
            };
            let address = match std::str::from_utf8(&key) {
                Ok(address) => address.to_string(),
                Err(_) => {
                    warn!("Skipping proxy with non utf-8 key {:?}", key);
                    return None;
                }
            };
            match decode_time(&value) {
                Some(time) => Some((address, time)),
                None => {
                    warn!("Skipping proxy {} with corrupt check time", address);
                    None
                }
            }
        })
    }
}

fn encode_time(time: i64) -> [u8; 8] {
    time.to_be_bytes()
}

fn decode_time(bytes: &[u8]) -> Option<i64> {
    <[u8; 8]>::try_from(bytes).ok().map(i64::from_be_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const WINDOW: i64 = 10800;
    const NOW: i64 = 1_700_000_000;

    fn store() -> ProxyStore {
        ProxyStore::temporary(WINDOW).unwrap()
    }

    #[test]
    fn insert_twice_keeps_one_record() {
        let store = store();

        assert!(store.insert("10.0.0.1:80", NOW));
        assert!(!store.insert("10.0.0.1:80", NOW + 5));

        assert_eq!(store.len(), 1);
        assert_eq!(store.check_time("10.0.0.1:80"), Some(NOW));
    }

    #[test]
    fn update_sets_time_and_ignores_absent_keys() {
        let store = store();
        store.insert("10.0.0.1:80", NOW);

        assert!(store.update("10.0.0.1:80", NOW + 100));
        assert_eq!(store.check_time("10.0.0.1:80"), Some(NOW + 100));

        assert!(store.update("10.0.0.2:80", NOW));
        assert!(!store.exists("10.0.0.2:80"));
    }

    #[test]
    fn update_never_moves_time_backwards() {
        let store = store();
        store.insert("10.0.0.1:80", NOW);

        assert!(store.update("10.0.0.1:80", NOW - 60));
        assert_eq!(store.check_time("10.0.0.1:80"), Some(NOW));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = store();
        store.insert("10.0.0.1:80", NOW);

        store.delete("10.0.0.1:80");
        store.delete("10.0.0.1:80");

        assert!(!store.exists("10.0.0.1:80"));
        assert!(store.is_empty());
    }

    #[test]
    fn boundary_is_neither_stale_nor_fresh() {
        let store = store();
        store.insert("stale:1", NOW - WINDOW - 1);
        store.insert("edge:1", NOW - WINDOW);
        store.insert("fresh:1", NOW - WINDOW + 1);

        assert_eq!(store.query_stale(NOW), vec!["stale:1".to_string()]);
        assert_eq!(store.query_fresh_count(NOW), 1);
        assert_eq!(store.query_random_fresh(NOW).as_deref(), Some("fresh:1"));
    }

    #[test]
    fn random_fresh_only_returns_fresh_addresses() {
        let store = store();
        for i in 0..20 {
            store.insert(&format!("fresh:{}", i), NOW);
            store.insert(&format!("stale:{}", i), NOW - WINDOW - 1);
        }

        let mut picked = HashSet::new();
        for _ in 0..200 {
            let address = store.query_random_fresh(NOW).unwrap();
            assert!(address.starts_with("fresh:"), "picked {}", address);
            picked.insert(address);
        }
        // 200 draws out of 20 should not keep landing on the same entry
        assert!(picked.len() > 1);
    }

    #[test]
    fn random_fresh_on_empty_set_is_none() {
        let store = store();
        assert_eq!(store.query_random_fresh(NOW), None);

        store.insert("old:1", NOW - WINDOW - 100);
        assert_eq!(store.query_random_fresh(NOW), None);
    }

    #[test]
    fn corrupt_values_are_skipped() {
        let store = store();
        store.insert("good:1", NOW);
        store.proxies.insert("bad:1", &b"xyz"[..]).unwrap();

        assert_eq!(store.query_fresh_count(NOW), 1);
        assert_eq!(store.query_stale(NOW + WINDOW * 2), vec!["good:1".to_string()]);
    }

    #[test]
    fn reopening_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.db");
        {
            let store = ProxyStore::open(&path, WINDOW).unwrap();
            assert!(store.insert("10.0.0.1:80", NOW));
            store.close().unwrap();
        }

        let store = ProxyStore::open(&path, WINDOW).unwrap();
        assert!(store.exists("10.0.0.1:80"));
        assert_eq!(store.check_time("10.0.0.1:80"), Some(NOW));
    }
}
