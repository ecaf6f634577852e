use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, LevelFilter};
use tokio_util::sync::CancellationToken;

use proxy_keeper::{
    logging, server, Checker, HttpProber, KeeperConfig, LogConfig, LogSink, ProxyScrape,
    ProxyStore, Scheduler, Selector,
};

#[derive(Debug, Parser)]
#[command(version, about = "Keeps a pool of working HTTP proxies and serves one on request")]
struct Args {
    /// Directory of the proxy database.
    #[arg(long, default_value = "./db_data/proxy.db")]
    db_path: PathBuf,

    /// Address the HTTP endpoint listens on.
    #[arg(long, default_value = "0.0.0.0:7878")]
    listen: SocketAddr,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Write logs to this file instead of the console.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Fetch new proxies when fewer than this many are working.
    #[arg(long, default_value_t = 100)]
    min_working: usize,

    /// Seconds to wait between refresh cycles.
    #[arg(long, default_value_t = 30)]
    check_interval_secs: u64,

    /// Maximum number of proxy checks in flight.
    #[arg(long, default_value_t = 50)]
    max_concurrent: usize,
}

impl Args {
    fn keeper_config(&self) -> KeeperConfig {
        KeeperConfig::builder()
            .min_working_proxies(self.min_working)
            .check_interval(Duration::from_secs(self.check_interval_secs))
            .max_concurrent_checks(self.max_concurrent)
            .build()
    }

    fn log_config(&self) -> LogConfig {
        LogConfig {
            sink: match &self.log_file {
                Some(path) => LogSink::File(path.clone()),
                None => LogSink::Console,
            },
            level: self.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args.log_config()).context("failed to set up logging")?;

    let config = args.keeper_config();
    let store = ProxyStore::open(&args.db_path, config.freshness_secs())
        .with_context(|| format!("failed to open database at {}", args.db_path.display()))?;
    info!("Opened proxy database with {} entries", store.len());

    let prober = Arc::new(HttpProber::from_config(&config));
    let checker = Checker::new(store.clone(), prober, config.max_concurrent_checks);
    let source = Arc::new(ProxyScrape::from_config(&config)?);
    let scheduler = Scheduler::new(store.clone(), checker, source, &config);

    let cancel = CancellationToken::new();
    let refresh = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!("Serving proxies on http://{}/http_proxy", args.listen);

    let app = server::router(Selector::new(store.clone()));
    let shutdown = cancel.clone();
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
            _ = shutdown.cancelled() => {}
        }
        shutdown.cancel();
    })
    .await;

    cancel.cancel();
    if let Err(e) = refresh.await {
        log::error!("Refresh scheduler task failed: {}", e);
    }
    store.close().context("failed to flush the proxy database")?;
    info!("Stopped");

    served.context("http server failed")
}
