//! mqsink：订阅 MQTT broker，把每条消息写入 PostgreSQL。

mod service;

use mqsink_config::Settings;
use mqsink_telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let settings = Settings::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 进程级取消信号：Ctrl-C / SIGTERM
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    service::run(settings, cancel).await?;
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    shutdown_signal().await;
    info!(target: "mqsink.service", "shutdown_requested");
    cancel.cancel();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
