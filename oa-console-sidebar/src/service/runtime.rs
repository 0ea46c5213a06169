//! 事件循环
//!
//! 单任务串行处理推送事件、本地命令与固定周期 tick。刷新请求在循环内等待完成，
//! 之后的事件不会先于刷新结果被应用。

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::application::commands::SidebarCommand;
use crate::application::handlers::SidebarCommandHandler;
use crate::domain::model::RenderFrame;
use crate::domain::repository::{RealtimeChannel, RenderSink};
use crate::domain::service::SidebarEffects;

/// 运行统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub events: u64,
    pub dropped_frames: u64,
    pub local_commands: u64,
    pub ticks: u64,
}

pub struct SidebarRuntime {
    command_handler: SidebarCommandHandler,
    tick_interval: Duration,
}

impl SidebarRuntime {
    pub fn new(command_handler: SidebarCommandHandler, tick_interval: Duration) -> Self {
        Self {
            command_handler,
            tick_interval,
        }
    }

    /// 运行直到通道关闭或收到关闭信号
    pub async fn run<C, F>(
        &self,
        channel: &mut C,
        mut local_commands: mpsc::Receiver<SidebarCommand>,
        shutdown: F,
    ) -> Result<RuntimeStats>
    where
        C: RealtimeChannel + RenderSink + ?Sized,
        F: Future<Output = ()>,
    {
        let mut stats = RuntimeStats::default();

        let effects = self.command_handler.handle_startup().await;
        dispatch(channel, effects).await;

        let mut ticker = time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut local_open = true;

        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Sidebar runtime started"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }

                frame = channel.next_event() => match frame {
                    Ok(Some(raw)) => {
                        stats.events += 1;
                        let effects = self.command_handler.handle_raw_event(raw).await;
                        dispatch(channel, effects).await;
                    }
                    Ok(None) => {
                        info!("Realtime channel closed");
                        break;
                    }
                    Err(err) if err.is_event_level() => {
                        stats.dropped_frames += 1;
                        warn!(error = %err, "Dropping unreadable frame");
                    }
                    Err(err) => {
                        error!(error = %err, "Realtime channel failed");
                        break;
                    }
                },

                command = local_commands.recv(), if local_open => match command {
                    Some(command) => {
                        stats.local_commands += 1;
                        let name = command.name();
                        match self.command_handler.handle_command(command).await {
                            Ok(effects) => dispatch(channel, effects).await,
                            Err(err) => warn!(command = name, error = %err, "Local command rejected"),
                        }
                    }
                    None => {
                        debug!("Local command source closed");
                        local_open = false;
                    }
                },

                _ = ticker.tick() => {
                    stats.ticks += 1;
                    let updates = self.command_handler.handle_tick().await;
                    if !updates.is_empty() {
                        debug!(timers = updates.len(), "Unread timers ticked");
                        if let Err(err) = channel.render(&RenderFrame::Timers(updates)).await {
                            warn!(error = %err, "Failed to render timer frame");
                        }
                    }
                }
            }
        }

        self.command_handler.handle_shutdown().await;
        info!(
            events = stats.events,
            dropped = stats.dropped_frames,
            local_commands = stats.local_commands,
            "Sidebar runtime stopped"
        );
        Ok(stats)
    }
}

/// 将副作用交给通道：先发出通道命令，再写出渲染帧
pub async fn dispatch<C>(channel: &mut C, effects: SidebarEffects)
where
    C: RealtimeChannel + RenderSink + ?Sized,
{
    for command in &effects.commands {
        if let Err(err) = channel.emit(command).await {
            warn!(command = command.name(), error = %err, "Failed to emit channel command");
        }
    }
    for frame in effects.render_frames() {
        if let Err(err) = channel.render(&frame).await {
            warn!(error = %err, "Failed to render frame");
        }
    }
    for message in &effects.thread_appends {
        debug!(
            user_id = %message.key.user_id,
            message_id = ?message.id,
            "Message appended to open thread"
        );
    }
    if effects.list_changed || !effects.timer_updates.is_empty() {
        debug!(
            list_changed = effects.list_changed,
            timer_updates = effects.timer_updates.len(),
            "Sidebar repaint requested"
        );
    }
}
