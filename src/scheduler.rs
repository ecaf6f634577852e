//! The refresh loop keeping the pool checked and topped up.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::checker::{BatchReport, Checker};
use crate::config::KeeperConfig;
use crate::fetcher::ProxySource;
use crate::store::ProxyStore;
use crate::utils;

/// Summary of one pass through the refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Result of re-checking stale proxies.
    pub stale: BatchReport,
    /// Fresh proxies counted after the stale check.
    pub working: usize,
    /// Whether the provider was asked for more proxies.
    pub replenished: bool,
    /// Candidates that went to the checker, after dropping known ones.
    pub candidates: usize,
    /// Result of checking the candidates, if any were checked.
    pub new: Option<BatchReport>,
}

/// Periodically re-checks stale proxies and replenishes a thin pool.
///
/// Only one scheduler should run against a store at a time.
pub struct Scheduler {
    store: ProxyStore,
    checker: Checker,
    source: Arc<dyn ProxySource>,
    min_working_proxies: usize,
    check_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: ProxyStore,
        checker: Checker,
        source: Arc<dyn ProxySource>,
        config: &KeeperConfig,
    ) -> Self {
        Self {
            store,
            checker,
            source,
            min_working_proxies: config.min_working_proxies,
            check_interval: config.check_interval,
        }
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Each cycle is followed by a fixed pause, however long the cycle took.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Refresh scheduler started, interval {:?}, minimum {} working proxies",
            self.check_interval, self.min_working_proxies
        );
        while !cancel.is_cancelled() {
            self.run_cycle(&cancel).await;

            tokio::select! {
                _ = time::sleep(self.check_interval) => {}
                _ = cancel.cancelled() => {}
            }
        }
        info!("Refresh scheduler stopped");
    }

    /// One pass: re-check stale proxies, count what works, replenish if short.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();

        info!("Checking outdated proxies");
        let stale = self.store.query_stale(utils::unix_now());
        report.stale = self.checker.check_batch(stale, false, cancel).await;
        if cancel.is_cancelled() {
            return report;
        }

        report.working = self.store.query_fresh_count(utils::unix_now());
        info!("Count actual proxies: {}", report.working);
        if report.working >= self.min_working_proxies {
            return report;
        }

        report.replenished = true;
        let fetched = match self.source.fetch().await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Failed to fetch new proxies, skipping replenishment: {}", e);
                return report;
            }
        };

        let candidates = self.new_candidates(fetched);
        report.candidates = candidates.len();
        info!("Fetched {} new candidate proxies", candidates.len());
        if !candidates.is_empty() {
            report.new = Some(self.checker.check_batch(candidates, true, cancel).await);
        }
        report
    }

    /// Drop blank entries, duplicates and addresses already in the store.
    fn new_candidates(&self, fetched: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        fetched
            .into_iter()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .filter(|address| seen.insert(address.clone()))
            .filter(|address| !self.store.exists(address))
            .collect()
    }
}
