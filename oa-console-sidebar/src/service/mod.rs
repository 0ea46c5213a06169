use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use oa_console_core::config::ConsoleAppConfig;
use oa_console_core::tracing::init_tracing_from_config;
use oa_console_core::utils::{ManualClock, current_epoch_seconds};
use oa_console_core::load_config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::application::commands::SidebarCommand;
use crate::config::SidebarConfig;
use crate::domain::repository::TimerSnapshotStore;
use crate::infrastructure::notification::TracingNotifier;
use crate::infrastructure::persistence::{FileTimerSnapshotStore, InMemoryTimerSnapshotStore};
use crate::infrastructure::source::InMemorySidebarSource;
use crate::infrastructure::transport::LineDelimitedChannel;

pub mod replay;
pub mod runtime;
pub mod wire;

pub use replay::{ReplayDriver, ReplayStep};
pub use runtime::{RuntimeStats, SidebarRuntime};
pub use wire::{ApplicationContext, ContextParts};

/// 运行模式
#[derive(Debug, Clone)]
pub enum RunMode {
    /// 标准输入读取推送帧，标准输出写回通道命令；可选的本地命令文件
    Bridge { commands: Option<PathBuf> },
    /// 按脚本回放
    Replay { script: PathBuf },
}

/// 应用启动器
pub struct ApplicationBootstrap;

impl ApplicationBootstrap {
    /// 运行应用的主入口点
    pub async fn run(mode: RunMode) -> Result<()> {
        let app_config = load_config(None);
        init_tracing_from_config(Some(&app_config.logging));
        info!(app = app_config.app_name(), mode = ?mode, "Starting oa-console-sidebar");

        match mode {
            RunMode::Bridge { commands } => Self::run_bridge(app_config, commands).await,
            RunMode::Replay { script } => Self::run_replay(app_config, script).await,
        }
    }

    async fn run_bridge(app_config: &ConsoleAppConfig, commands: Option<PathBuf>) -> Result<()> {
        let context = wire::initialize(app_config).await?;

        let (command_tx, command_rx) = mpsc::channel(64);
        if let Some(path) = commands {
            tokio::spawn(forward_local_commands(path, command_tx));
        } else {
            drop(command_tx);
        }

        let mut channel =
            LineDelimitedChannel::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
        let runtime = SidebarRuntime::new(context.command_handler, context.config.tick_interval);

        let shutdown = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        runtime.run(&mut channel, command_rx, shutdown).await?;
        Ok(())
    }

    async fn run_replay(app_config: &ConsoleAppConfig, script: PathBuf) -> Result<()> {
        let config = SidebarConfig::from_app_config(app_config)
            .context("Failed to load sidebar service configuration")?;

        let clock = ManualClock::new(current_epoch_seconds());
        let snapshot_store: Arc<dyn TimerSnapshotStore> = match &config.snapshot_path {
            Some(path) => Arc::new(FileTimerSnapshotStore::new(path.clone())),
            None => Arc::new(InMemoryTimerSnapshotStore::new()),
        };
        let context = wire::initialize_with(
            config,
            ContextParts {
                clock: Arc::new(clock.clone()),
                source: Arc::new(InMemorySidebarSource::default()),
                snapshot_store,
                notifier: Arc::new(TracingNotifier),
            },
        );

        let file = tokio::fs::File::open(&script)
            .await
            .with_context(|| format!("Failed to open replay script {}", script.display()))?;
        let driver = ReplayDriver::new(context.command_handler, context.query_handler, clock);
        let mut stdout = tokio::io::stdout();
        let snapshot = driver.run(BufReader::new(file), &mut stdout).await?;

        info!(
            conversations = snapshot.conversations.len(),
            timers = snapshot.timers.len(),
            "Replay finished"
        );
        Ok(())
    }
}

/// 从文件（或命名管道）逐行读取本地命令
async fn forward_local_commands(path: PathBuf, tx: mpsc::Sender<SidebarCommand>) {
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Cannot open local command source");
            return;
        }
    };

    let mut lines = BufReader::new(file).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "Local command source read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SidebarCommand>(&line) {
            Ok(command) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!(error = %err, "Skipping unreadable local command"),
        }
    }
}
