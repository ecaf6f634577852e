//! Simple example of using proxy-keeper: one refresh cycle, then a pick.

use std::sync::Arc;
use std::time::Duration;

use proxy_keeper::{
    Checker, HttpProber, KeeperConfig, ProxyScrape, ProxyStore, Scheduler, Selector,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = KeeperConfig::builder()
        .probe_timeout(Duration::from_secs(5))
        // a handful is enough for a demo
        .min_working_proxies(5)
        .max_concurrent_checks(100)
        .build();

    let store = ProxyStore::temporary(config.freshness_secs())?;
    let checker = Checker::new(
        store.clone(),
        Arc::new(HttpProber::from_config(&config)),
        config.max_concurrent_checks,
    );
    let scheduler = Scheduler::new(
        store.clone(),
        checker,
        Arc::new(ProxyScrape::from_config(&config)?),
        &config,
    );

    println!("Running one refresh cycle...");
    let report = scheduler.run_cycle(&CancellationToken::new()).await;
    println!(
        "Fetched {} candidates, {} passed",
        report.candidates,
        report.new.map(|batch| batch.added).unwrap_or(0)
    );

    match Selector::new(store.clone()).select() {
        Ok(proxy) => println!("Use proxy: {}", proxy),
        Err(e) => println!("{}", e),
    }

    store.close()?;
    Ok(())
}
