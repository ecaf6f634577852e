//! Single reachability test of a proxy.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rand::seq::IndexedRandom;

use crate::config::KeeperConfig;

/// Well known, highly available sites a probe may be sent to.
pub const TRUST_URLS: &[&str] = &[
    "http://ebay.com/",
    "http://facebook.com/",
    "http://google.co.uk/",
    "http://google.com/",
    "http://google.de/",
    "http://google.es/",
    "http://google.fr/",
    "http://google.it/",
    "http://google.pl/",
    "http://google.ru/",
    "http://instagram.com/",
    "http://mail.ru/",
    "http://microsoft.com/",
    "http://office.com/",
    "http://ok.ru/",
    "http://twitter.com/",
    "http://vk.com/",
    "http://wikipedia.org/",
    "http://ya.ru/",
    "http://yandex.ru/",
    "http://youtube.com/",
];

/// Something that can tell whether a proxy currently works.
///
/// Implementations must resolve every failure to `false`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str) -> bool;
}

/// Probes a proxy by fetching one trusted page through it over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpProber {
    trust_urls: Vec<String>,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(trust_urls: Vec<String>, timeout: Duration) -> Self {
        Self {
            trust_urls,
            timeout,
        }
    }

    pub fn from_config(config: &KeeperConfig) -> Self {
        Self::new(config.trust_urls.clone(), config.probe_timeout)
    }

    fn pick_target(&self) -> Option<&str> {
        self.trust_urls
            .choose(&mut rand::rng())
            .map(String::as_str)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, address: &str) -> bool {
        let Some(target) = self.pick_target() else {
            debug!("No probe targets configured, proxy {} not checked", address);
            return false;
        };
        debug!("Send request to {} with proxy {}", target, address);

        let proxy = match reqwest::Proxy::all(format!("http://{}", address)) {
            Ok(proxy) => proxy,
            Err(e) => {
                debug!("Proxy {} check Fail: invalid address: {}", address, e);
                return false;
            }
        };

        // Create a client using this proxy
        let client = match reqwest::Client::builder()
            .timeout(self.timeout)
            .proxy(proxy)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                debug!("Proxy {} check Fail: {}", address, e);
                return false;
            }
        };

        match client.get(target).send().await {
            Ok(resp) => {
                let status = resp.status();
                debug!("Proxy {} answered {} for {}", address, status, target);
                status.as_u16() < 400
            }
            Err(e) => {
                debug!("Proxy {} check Fail: {}", address, e);
                false
            }
        }
    }
}
