use async_trait::async_trait;
use oa_console_core::{ConsoleError, ConsoleResult};
use tokio::sync::mpsc;

use crate::domain::model::{ChannelCommand, RawEvent, RenderFrame};
use crate::domain::repository::{RealtimeChannel, RenderSink};

/// 进程内通道，供回放脚本与测试驱动
pub struct MemoryChannel {
    events: mpsc::Receiver<RawEvent>,
    commands: mpsc::UnboundedSender<ChannelCommand>,
    frames: mpsc::UnboundedSender<RenderFrame>,
}

/// 通道对端：推送事件、接收命令与渲染帧
pub struct MemoryChannelPeer {
    pub events: mpsc::Sender<RawEvent>,
    pub commands: mpsc::UnboundedReceiver<ChannelCommand>,
    pub frames: mpsc::UnboundedReceiver<RenderFrame>,
}

pub fn memory_channel(buffer: usize) -> (MemoryChannel, MemoryChannelPeer) {
    let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    (
        MemoryChannel {
            events: event_rx,
            commands: command_tx,
            frames: frame_tx,
        },
        MemoryChannelPeer {
            events: event_tx,
            commands: command_rx,
            frames: frame_rx,
        },
    )
}

#[async_trait]
impl RealtimeChannel for MemoryChannel {
    async fn next_event(&mut self) -> ConsoleResult<Option<RawEvent>> {
        Ok(self.events.recv().await)
    }

    async fn emit(&mut self, command: &ChannelCommand) -> ConsoleResult<()> {
        self.commands
            .send(command.clone())
            .map_err(|_| ConsoleError::Transport("command receiver dropped".to_string()))
    }
}

#[async_trait]
impl RenderSink for MemoryChannel {
    async fn render(&mut self, frame: &RenderFrame) -> ConsoleResult<()> {
        self.frames
            .send(frame.clone())
            .map_err(|_| ConsoleError::Transport("frame receiver dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_through_peer() {
        let (mut channel, mut peer) = memory_channel(4);

        peer.events
            .send(RawEvent::new("new_message", json!({"user_id": "U1"})))
            .await
            .unwrap();
        let event = channel.next_event().await.unwrap().unwrap();
        assert_eq!(event.name, "new_message");

        channel
            .emit(&ChannelCommand::Leave {
                room: "chat_U1_1".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            peer.commands.recv().await,
            Some(ChannelCommand::Leave {
                room: "chat_U1_1".into()
            })
        );

        let frame = RenderFrame::Timers(Vec::new());
        channel.render(&frame).await.unwrap();
        assert_eq!(peer.frames.recv().await, Some(frame));

        drop(peer);
        assert!(channel.next_event().await.unwrap().is_none());
        assert!(channel
            .emit(&ChannelCommand::Join { room: "x".into() })
            .await
            .is_err());
    }
}
