use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use waybl_common::event_loop;
use waybl_common::{
    BlurCache, CommandBuilder, ErrorReporting, OutputContext, ProcessExecutor, Reconciler, SwayIpc, TreeClient,
    WallpaperApplicator,
};
use waybl_config::Config;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    log::info!("Starting waybl...");

    let config = Config::load().map_err(|e| {
        log::error!("Configuration error: {}", e.user_friendly_message());
        anyhow::anyhow!("Configuration error: {}", e.user_friendly_message())
    })?;

    config.ensure_cache_dir().map_err(|e| {
        log::error!("{}", e.user_friendly_message());
        anyhow::anyhow!("{}", e.user_friendly_message())
    })?;
    log::info!("Caching blurred wallpapers in {:?}", config.cache_dir);

    let ipc = SwayIpc::from_env().map_err(|e| {
        log::error!("{}", e.user_friendly_message());
        anyhow::anyhow!("{}", e.user_friendly_message())
    })?;
    log::debug!("Using sway socket {:?}", ipc.socket_path());

    let builder = CommandBuilder::discover();
    let runner = Arc::new(ProcessExecutor::new());
    let context = OutputContext {
        cache: BlurCache::new(config.cache_dir.clone(), config.blur.clone(), builder.clone(), runner.clone()),
        applicator: WallpaperApplicator::new(builder, runner, config.retry),
        wallpapers: config.wallpapers.clone(),
    };
    let mut reconciler = Reconciler::new(context);

    let (tx, rx) = mpsc::unbounded_channel();
    // Detached: it exits on its own once the receiver is dropped.
    let _subscription = event_loop::spawn_subscription(ipc.clone(), config.retry.delay, tx);

    let trees = Arc::new(Mutex::new(TreeClient::new(ipc)));
    tokio::select! {
        _ = event_loop::run(trees, &mut reconciler, rx) => {
            log::warn!("Event stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, shutting down");
        }
    }

    reconciler.shutdown().await;
    Ok(())
}
