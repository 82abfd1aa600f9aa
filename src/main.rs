use std::net::SocketAddr;

use anyhow::Context;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ua_test_server::address_space::FIRST_CUSTOM_NAMESPACE;
use ua_test_server::cli::{self, CliArgs};
use ua_test_server::config::Config;
use ua_test_server::export;
use ua_test_server::http;
use ua_test_server::observability::Metrics;
use ua_test_server::server::UaServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::parse_args(std::env::args().skip(1));
    if args.help {
        print!("{}", cli::USAGE);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())))
        .init();

    // Failures are reported, never turned into a non-zero exit status.
    if let Err(e) = run(args).await {
        error!("server terminated: {e:#}");
    }
    Ok(())
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config_path = args
        .config_path
        .clone()
        .or_else(|| std::env::var("UA_TEST_SERVER_CONFIG").ok());
    let mut cfg = match &config_path {
        Some(path) => {
            let cfg = Config::from_path(path).context("loading config")?;
            info!(%path, "loaded config");
            cfg
        }
        None => Config::default(),
    };
    args.apply(&mut cfg);

    let count = cfg.simulation.object_count;
    info!("Create ManyObjects:var1 to ManyObjects:var{count}");
    info!("Update (ms): {}", cfg.simulation.tick_interval_ms);

    if cfg.export.enabled {
        let path = cfg.export.path.as_path();
        if let Err(e) = export::emit_to_file(path, count, FIRST_CUSTOM_NAMESPACE) {
            error!(error=%e, "export failed");
        }
    }

    let mut server = UaServer::new(cfg.server.clone());
    server.start();
    let sim = server.populate(count).await.context("building address space")?;

    let space = server.space().clone();
    let metrics = Metrics::new();

    if args.verbosity > 1 {
        tokio::spawn(log_changes(space.subscribe()));
    }

    match cfg.server.bind_http.parse::<SocketAddr>() {
        Ok(addr) => {
            http::spawn(addr, space.clone(), metrics.clone());
        }
        Err(e) => error!(bind_http=%cfg.server.bind_http, error=%e, "invalid server.bind_http; inspection surface disabled"),
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler = sim.into_scheduler(space, &cfg.simulation, metrics);
    let mut update_loop = tokio::spawn(scheduler.run(stop_rx));
    info!("Ctrl-C to exit");

    let outcome = tokio::select! {
        r = &mut update_loop => r.context("update loop panicked")?.map(|_| ()).map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            let _ = stop_tx.send(true);
            let ticks = update_loop.await.context("update loop panicked")??;
            info!(ticks, "update loop finished");
            Ok(())
        }
    };

    server.stop();
    outcome
}

async fn log_changes(mut changes: broadcast::Receiver<ua_test_server::DataChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => debug!(node=%change.node, value=%change.value, seq = change.sequence, "data change"),
            Err(broadcast::error::RecvError::Lagged(missed)) => warn!(missed, "change log lagging"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
