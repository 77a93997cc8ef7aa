use clap::Parser;
use mirrorsync_lib::logging::init_logging;
use mirrorsync_lib::{Cli, Scheduler, SyncEngine, TracingSink};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 参数错误在初始化日志前直接退出
    let (sync_config, log_config) = Cli::parse().into_configs()?;
    let _guard = init_logging(&log_config)?;

    let engine = SyncEngine::new(sync_config, Arc::new(TracingSink));
    let scheduler = Scheduler::new(engine);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("收到退出信号，正在停止...");
                cancel.cancel();
            }
        }
    });

    scheduler.run(cancel).await;
    Ok(())
}
