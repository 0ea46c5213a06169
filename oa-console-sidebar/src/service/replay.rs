//! 脚本回放
//!
//! 每行一个步骤：推送事件 `{"event": ...}`、本地命令 `{"local": ...}`、
//! 时钟前进 `{"advance_secs": n}`（随后执行一次 tick）。回放使用手动时钟，结果可复现。
//! 通道命令与渲染帧（计时、线程加载）按行写出，结束时写出一行侧边栏快照。

use anyhow::{Context, Result};
use oa_console_core::utils::ManualClock;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::application::commands::SidebarCommand;
use crate::application::handlers::SidebarCommandHandler;
use crate::application::queries::{SidebarQueryHandler, SidebarSnapshot, SidebarSnapshotQuery};
use crate::domain::model::{RawEvent, RenderFrame};
use crate::domain::service::SidebarEffects;

/// 回放步骤
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReplayStep {
    Event(RawEvent),
    Local(SidebarCommand),
    Advance { advance_secs: i64 },
}

pub struct ReplayDriver {
    command_handler: SidebarCommandHandler,
    query_handler: SidebarQueryHandler,
    clock: ManualClock,
}

impl ReplayDriver {
    pub fn new(
        command_handler: SidebarCommandHandler,
        query_handler: SidebarQueryHandler,
        clock: ManualClock,
    ) -> Self {
        Self {
            command_handler,
            query_handler,
            clock,
        }
    }

    /// 执行脚本，返回最终快照
    pub async fn run<R, W>(&self, script: R, output: &mut W) -> Result<SidebarSnapshot>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let effects = self.command_handler.handle_startup().await;
        write_effects(output, &effects).await?;

        let mut lines = script.lines();
        let mut line_no = 0usize;
        while let Some(line) = lines.next_line().await.context("Failed to read replay script")? {
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let step: ReplayStep = match serde_json::from_str(trimmed) {
                Ok(step) => step,
                Err(err) => {
                    warn!(line = line_no, error = %err, "Skipping unreadable replay step");
                    continue;
                }
            };
            self.apply(step, output).await?;
        }

        self.command_handler.handle_shutdown().await;

        let snapshot = self
            .query_handler
            .handle_sidebar_snapshot(SidebarSnapshotQuery)
            .await;
        write_line(output, &serde_json::json!({ "sidebar": &snapshot })).await?;
        output.flush().await?;
        Ok(snapshot)
    }

    async fn apply<W>(&self, step: ReplayStep, output: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match step {
            ReplayStep::Event(raw) => {
                let effects = self.command_handler.handle_raw_event(raw).await;
                write_effects(output, &effects).await
            }
            ReplayStep::Local(command) => {
                let name = command.name();
                match self.command_handler.handle_command(command).await {
                    Ok(effects) => write_effects(output, &effects).await,
                    Err(err) => {
                        warn!(command = name, error = %err, "Local command rejected");
                        Ok(())
                    }
                }
            }
            ReplayStep::Advance { advance_secs } => {
                self.clock.advance(advance_secs);
                let updates = self.command_handler.handle_tick().await;
                debug!(advance_secs, timers = updates.len(), "Replay clock advanced");
                if updates.is_empty() {
                    return Ok(());
                }
                write_line(output, &RenderFrame::Timers(updates)).await
            }
        }
    }
}

async fn write_effects<W>(output: &mut W, effects: &SidebarEffects) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for command in &effects.commands {
        write_line(output, command).await?;
    }
    for frame in effects.render_frames() {
        write_line(output, &frame).await?;
    }
    Ok(())
}

async fn write_line<W, T>(output: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    Ok(())
}
