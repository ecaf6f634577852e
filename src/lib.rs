//! # proxy-keeper
//!
//! A self-refreshing pool of free HTTP proxies.
//!
//! Proxies live in an embedded store together with the time they last passed
//! a check. A background scheduler re-checks proxies whose check has gone
//! stale, drops the ones that fail, and pulls new candidates from a listing
//! provider whenever the number of working proxies runs low. A selector hands
//! out a random working proxy, over HTTP if wanted.

pub mod checker;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod probe;
pub mod scheduler;
pub mod selector;
pub mod server;
pub mod store;
mod utils;

pub use checker::{BatchReport, CheckOutcome, Checker};
pub use config::{KeeperConfig, KeeperConfigBuilder};
pub use error::{Error, NoProxyAvailable};
pub use fetcher::{ProxyScrape, ProxySource};
pub use logging::{LogConfig, LogSink};
pub use probe::{HttpProber, Prober};
pub use scheduler::{CycleReport, Scheduler};
pub use selector::Selector;
pub use store::ProxyStore;
pub use utils::unix_now;
