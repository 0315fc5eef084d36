//! KB Chat
//!
//! 入口：加载 .env 与配置、初始化日志、启动编排器与 TUI，并运行主循环。

use anyhow::Context;
use kbchat::{config::load_config, config::AppConfig, core::spawn_runtime, core::ChatRuntime, ui::run_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 可选
    let _ = dotenvy::dotenv();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let (cfg, config_err) = match load_config(config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    kbchat::observability::init(&cfg.log).context("Failed to init logging")?;
    if let Some(e) = config_err {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }
    tracing::info!(title = %cfg.app.title, "Starting");

    // 创建运行时：返回命令发送端、状态接收端
    let (cmd_tx, state_rx) = spawn_runtime(ChatRuntime::from_config(&cfg));

    // 启动 TUI 主循环（消费 state，向 cmd_tx 发送用户指令）
    run_app(state_rx, cmd_tx).await.context("App run failed")?;

    Ok(())
}
