//! Concurrent proxy checks and how their outcome lands in the store.

use std::sync::Arc;

use futures::future;
use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::probe::Prober;
use crate::store::ProxyStore;
use crate::utils;

/// What a single check did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A stored proxy passed and its check time was refreshed.
    Refreshed,
    /// A stored proxy failed and was deleted.
    Removed,
    /// A candidate passed and was stored.
    Added,
    /// A candidate failed, or passed but could not be stored.
    Rejected,
    /// The proxy was not probed at all.
    Skipped,
}

/// Tally of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub refreshed: usize,
    pub removed: usize,
    pub added: usize,
    pub rejected: usize,
    pub skipped: usize,
    /// The batch was abandoned before every check finished.
    pub cancelled: bool,
}

impl BatchReport {
    fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Refreshed => self.refreshed += 1,
            CheckOutcome::Removed => self.removed += 1,
            CheckOutcome::Added => self.added += 1,
            CheckOutcome::Rejected => self.rejected += 1,
            CheckOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Number of checks that completed.
    pub fn total(&self) -> usize {
        self.refreshed + self.removed + self.added + self.rejected + self.skipped
    }
}

/// Runs probes under a global concurrency ceiling and applies the results.
#[derive(Clone)]
pub struct Checker {
    store: ProxyStore,
    prober: Arc<dyn Prober>,
    permits: Arc<Semaphore>,
}

impl Checker {
    pub fn new(store: ProxyStore, prober: Arc<dyn Prober>, max_concurrent: usize) -> Self {
        Self {
            store,
            prober,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Check one address.
    ///
    /// A stored proxy (`is_candidate == false`) is refreshed on success and
    /// deleted on failure. A candidate is stored on success and forgotten on
    /// failure.
    pub async fn check(&self, address: &str, is_candidate: bool) -> CheckOutcome {
        let passed = {
            // The permit is held for the probe only, store writes happen after.
            let _permit = match self.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Check permits closed, proxy {} not checked", address);
                    return CheckOutcome::Skipped;
                }
            };
            self.prober.probe(address).await
        };

        let now = utils::unix_now();
        match (passed, is_candidate) {
            (true, false) => {
                debug!("Proxy {} checked, status: OK", address);
                self.store.update(address, now);
                CheckOutcome::Refreshed
            }
            (false, false) => {
                debug!("Proxy {} checked, status: BAD, delete proxy from db", address);
                self.store.delete(address);
                CheckOutcome::Removed
            }
            (true, true) => {
                debug!("New proxy {} checked, status: OK", address);
                if self.store.insert(address, now) {
                    CheckOutcome::Added
                } else {
                    CheckOutcome::Rejected
                }
            }
            (false, true) => {
                debug!("New proxy {} checked, status: BAD", address);
                CheckOutcome::Rejected
            }
        }
    }

    /// Check every address of a batch and wait for all of them.
    ///
    /// Returns early, dropping the checks still in flight, when `cancel`
    /// fires.
    pub async fn check_batch(
        &self,
        addresses: Vec<String>,
        is_candidate: bool,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let kind = if is_candidate { "new" } else { "stored" };
        info!("Checking {} {} proxies", addresses.len(), kind);

        let checks = addresses
            .iter()
            .map(|address| self.check(address, is_candidate));

        let mut report = BatchReport::default();
        tokio::select! {
            outcomes = future::join_all(checks) => {
                for outcome in outcomes {
                    report.record(outcome);
                }
            }
            _ = cancel.cancelled() => {
                warn!("Check of {} {} proxies cancelled", addresses.len(), kind);
                report.cancelled = true;
            }
        }

        info!(
            "Checked {} proxies: {} refreshed, {} removed, {} added, {} rejected",
            report.total(),
            report.refreshed,
            report.removed,
            report.added,
            report.rejected
        );
        report
    }
}
