//! Configuration for the proxy keeper.

use std::time::Duration;

use crate::probe::TRUST_URLS;

/// Default provider of fresh proxy lists.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.proxyscrape.com/";

/// Configuration shared by the store, checker, scheduler and fetcher.
#[derive(Debug, Clone)]
pub struct KeeperConfig {
    /// How long a successful check keeps a proxy fresh.
    pub freshness_window: Duration,
    /// Below this many fresh proxies the scheduler asks the provider for more.
    pub min_working_proxies: usize,
    /// Pause between two refresh cycles.
    pub check_interval: Duration,
    /// Total timeout of a single probe.
    pub probe_timeout: Duration,
    /// Maximum number of probes in flight at once.
    pub max_concurrent_checks: usize,
    /// Targets a probe picks from.
    pub trust_urls: Vec<String>,
    /// Endpoint of the proxy list provider.
    pub provider_url: String,
    /// Timeout for the provider request.
    pub provider_timeout: Duration,
}

impl KeeperConfig {
    /// Create a new configuration builder.
    pub fn builder() -> KeeperConfigBuilder {
        KeeperConfigBuilder::new()
    }

    /// Freshness window in whole seconds, as stored alongside check times.
    pub fn freshness_secs(&self) -> i64 {
        self.freshness_window.as_secs() as i64
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        KeeperConfigBuilder::new().build()
    }
}

/// Builder for `KeeperConfig`.
pub struct KeeperConfigBuilder {
    freshness_window: Option<Duration>,
    min_working_proxies: Option<usize>,
    check_interval: Option<Duration>,
    probe_timeout: Option<Duration>,
    max_concurrent_checks: Option<usize>,
    trust_urls: Option<Vec<String>>,
    provider_url: Option<String>,
    provider_timeout: Option<Duration>,
}

impl KeeperConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            freshness_window: None,
            min_working_proxies: None,
            check_interval: None,
            probe_timeout: None,
            max_concurrent_checks: None,
            trust_urls: None,
            provider_url: None,
            provider_timeout: None,
        }
    }

    /// Set how long a successful check keeps a proxy fresh.
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = Some(window);
        self
    }

    /// Set the fresh-proxy count below which the pool is replenished.
    pub fn min_working_proxies(mut self, count: usize) -> Self {
        self.min_working_proxies = Some(count);
        self
    }

    /// Set the pause between refresh cycles.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Set the total timeout of a single probe.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of concurrent probes. Zero is treated as one.
    pub fn max_concurrent_checks(mut self, count: usize) -> Self {
        self.max_concurrent_checks = Some(count.max(1));
        self
    }

    /// Replace the probe targets.
    pub fn trust_urls(mut self, urls: Vec<impl Into<String>>) -> Self {
        self.trust_urls = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    /// Set the endpoint of the proxy list provider.
    pub fn provider_url(mut self, url: impl Into<String>) -> Self {
        self.provider_url = Some(url.into());
        self
    }

    /// Set the timeout for the provider request.
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> KeeperConfig {
        KeeperConfig {
            // 3 hours
            freshness_window: self.freshness_window.unwrap_or(Duration::from_secs(10800)),
            min_working_proxies: self.min_working_proxies.unwrap_or(100),
            check_interval: self.check_interval.unwrap_or(Duration::from_secs(30)),
            probe_timeout: self.probe_timeout.unwrap_or(Duration::from_secs(5)),
            max_concurrent_checks: self.max_concurrent_checks.unwrap_or(50),
            trust_urls: self
                .trust_urls
                .filter(|urls| !urls.is_empty())
                .unwrap_or_else(|| TRUST_URLS.iter().map(|u| u.to_string()).collect()),
            provider_url: self
                .provider_url
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            provider_timeout: self.provider_timeout.unwrap_or(Duration::from_secs(30)),
        }
    }
}

impl Default for KeeperConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_constants() {
        let config = KeeperConfig::default();

        assert_eq!(config.freshness_secs(), 10800);
        assert_eq!(config.min_working_proxies, 100);
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_checks, 50);
        assert_eq!(config.trust_urls.len(), TRUST_URLS.len());
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
    }

    #[test]
    fn builder_overrides_and_guards() {
        let config = KeeperConfig::builder()
            .freshness_window(Duration::from_secs(60))
            .max_concurrent_checks(0)
            .trust_urls(Vec::<String>::new())
            .build();

        assert_eq!(config.freshness_secs(), 60);
        assert_eq!(config.max_concurrent_checks, 1);
        // an empty target list would make every probe fail
        assert!(!config.trust_urls.is_empty());
    }
}
