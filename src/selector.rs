//! Hands out one working proxy on request.

use crate::error::NoProxyAvailable;
use crate::store::ProxyStore;
use crate::utils;

/// Picks a random fresh proxy from the store. Never writes.
#[derive(Clone)]
pub struct Selector {
    store: ProxyStore,
}

impl Selector {
    pub fn new(store: ProxyStore) -> Self {
        Self { store }
    }

    /// A random proxy that passed a check within the freshness window.
    pub fn select(&self) -> Result<String, NoProxyAvailable> {
        self.select_at(utils::unix_now())
    }

    pub(crate) fn select_at(&self, now: i64) -> Result<String, NoProxyAvailable> {
        self.store.query_random_fresh(now).ok_or(NoProxyAvailable)
    }
}
