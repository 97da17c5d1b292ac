use clap::Parser;
use crab_sync::store::StoreControl;
use crab_sync::{Credential, SyncConfig, logger};
use shared::{ResourceType, Room};
use std::time::Duration;

/// Headless dashboard sync runner
#[derive(Debug, Parser)]
#[command(name = "crab-sync", version, about)]
struct Args {
    /// Bearer token for the vendor session
    #[arg(long, env = "SYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Outlet rooms to join (repeatable)
    #[arg(long = "outlet", env = "SYNC_OUTLETS", value_delimiter = ',')]
    outlets: Vec<String>,

    /// Log level or filter directive
    #[arg(long, env = "LOG_LEVEL", default_value = "crab_sync=info,shared=info")]
    log_level: String,

    /// Directory for daily rotating log files
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<String>,

    /// Seconds between store summaries
    #[arg(long, env = "STATUS_INTERVAL_SECS", default_value_t = 30)]
    status_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env) 与命令行参数
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // 2. 日志
    logger::init_logger(&args.log_level, args.log_dir.as_deref())?;
    tracing::info!("🦀 Crab dashboard sync starting...");

    // 3. 配置并启动引擎
    let config = SyncConfig::from_env();
    tracing::info!(api = %config.api_url, ws = %config.ws_url, "Configuration loaded");
    let handle = crab_sync::start(&config)?;

    handle.login(Credential::new(args.token))?;
    for outlet in &args.outlets {
        handle.subscribe(Room::outlet(outlet.as_str()))?;
    }

    // 4. 周期输出状态，直到 Ctrl+C
    let mut status_interval =
        tokio::time::interval(Duration::from_secs(args.status_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status_interval.tick() => log_status(&handle),
        }
    }

    tracing::info!("Shutting down");
    handle.close(Duration::from_secs(5)).await?;
    Ok(())
}

fn log_status(handle: &crab_sync::SyncHandle) {
    let connection = handle.connection();
    let state = handle.state();
    tracing::info!(
        status = %connection.status,
        attempts = connection.reconnection_attempts,
        rooms = connection.subscribed_rooms.len(),
        orders = state.orders().len(),
        payments = state.payments().len(),
        menu_items = state.menu_items().len(),
        outlets = state.outlets().len(),
        "Dashboard state"
    );
    for resource in ResourceType::ALL {
        if let Some(error) = state.store(resource).error() {
            tracing::warn!(resource = %resource, "Last sync error: {error}");
        }
    }
}
