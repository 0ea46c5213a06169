//! 行分隔 JSON 通道
//!
//! 由外部桥接进程（socket.io 客户端等）通过管道转发推送事件：
//! 每行一个 `{"event": "...", "data": {...}}`，命令以
//! `{"command": "...", "data": {...}}` 写回，渲染帧（`{"timers": [...]}` 等）写在同一输出上。

use async_trait::async_trait;
use oa_console_core::{ConsoleError, ConsoleResult};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::domain::model::{ChannelCommand, RawEvent, RenderFrame};
use crate::domain::repository::{RealtimeChannel, RenderSink};

pub struct LineDelimitedChannel<R, W> {
    lines: Lines<R>,
    writer: W,
}

impl<R, W> LineDelimitedChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
        }
    }
}

#[async_trait]
impl<R, W> RealtimeChannel for LineDelimitedChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_event(&mut self) -> ConsoleResult<Option<RawEvent>> {
        loop {
            // Lines::next_line 可取消安全
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|err| ConsoleError::Transport(err.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str::<RawEvent>(trimmed)
                .map(Some)
                .map_err(|err| ConsoleError::MalformedEvent(format!("invalid frame: {err}")));
        }
    }

    async fn emit(&mut self, command: &ChannelCommand) -> ConsoleResult<()> {
        self.write_line(command).await
    }
}

#[async_trait]
impl<R, W> RenderSink for LineDelimitedChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn render(&mut self, frame: &RenderFrame) -> ConsoleResult<()> {
        self.write_line(frame).await
    }
}

impl<R, W> LineDelimitedChannel<R, W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_line<T: Serialize + Sync>(&mut self, value: &T) -> ConsoleResult<()> {
        let mut frame =
            serde_json::to_vec(value).map_err(|err| ConsoleError::Transport(err.to_string()))?;
        frame.push(b'\n');
        self.writer
            .write_all(&frame)
            .await
            .map_err(|err| ConsoleError::Transport(err.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|err| ConsoleError::Transport(err.to_string()))
    }
}
