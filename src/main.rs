// ==========================================
// 生产订单追踪系统 - 主入口
// ==========================================
// 用法:
//   order-tracking-engine                 初始化数据库并输出配置摘要
//   order-tracking-engine watch <job_id>  轮询工单详情,Ctrl-C 退出
// ==========================================

use anyhow::Context;
use order_tracking_engine::app::{get_default_db_path, AppState};
use order_tracking_engine::poller::PollUpdate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    order_tracking_engine::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", order_tracking_engine::APP_NAME);
    tracing::info!("系统版本: {}", order_tracking_engine::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("watch") => {
            let job_id = args.get(1).context("用法: watch <job_id>")?;
            watch(&state, job_id).await
        }
        Some(other) => anyhow::bail!("未知命令: {}", other),
        None => {
            let snapshot = state.config_manager.get_config_snapshot()?;
            tracing::info!("配置快照: {}", snapshot);
            Ok(())
        }
    }
}

async fn watch(state: &AppState, job_id: &str) -> anyhow::Result<()> {
    let mut handle = state.watch_job(job_id, |update| match update {
        PollUpdate::Data { value, next_poll_in } => {
            tracing::info!(
                job_id = %value.job.id,
                state = %value.job.state,
                revision = value.job.revision,
                audit_count = value.audit.len(),
                next_poll_ms = next_poll_in.as_millis() as u64,
                "工单快照"
            );
        }
        PollUpdate::Failed { message, next_poll_in } => {
            tracing::warn!(next_poll_ms = next_poll_in.as_millis() as u64, "拉取失败: {}", message);
        }
    })?;

    tokio::signal::ctrl_c().await?;
    handle.stop();
    tracing::info!("轮询已停止");
    Ok(())
}
