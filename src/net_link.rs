use crate::config::Config;
use crate::event::EventSink;
use crate::protocol::{ServerMessage, SetupMessage, TransportEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use url::Url;

#[derive(Debug)]
pub enum NetCommand {
    SendText(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Connecting, setup not yet acknowledged.
    Pending,
    /// Setup acknowledged; outbound frames are delivered.
    Ready,
    Closed,
    Failed,
}

/// Session-side handle on one live connection.
///
/// Frames are only forwarded while the handle is `Ready`. Nothing is queued
/// for a connection that has not opened yet.
pub struct TransportHandle {
    state: TransportState,
    cmd_tx: mpsc::Sender<NetCommand>,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn new(cmd_tx: mpsc::Sender<NetCommand>, task: Option<JoinHandle<()>>) -> Self {
        Self {
            state: TransportState::Pending,
            cmd_tx,
            task,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == TransportState::Ready
    }

    pub fn mark_ready(&mut self) {
        if self.state == TransportState::Pending {
            self.state = TransportState::Ready;
        }
    }

    pub fn mark_failed(&mut self) {
        if matches!(self.state, TransportState::Pending | TransportState::Ready) {
            self.state = TransportState::Failed;
        }
    }

    /// Hand one text frame to the connection without waiting.
    /// Returns false if the frame was dropped.
    pub fn send_text(&self, text: String) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.cmd_tx.try_send(NetCommand::SendText(text)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Transport backlog full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Close the connection. A pending connect is abandoned, an open one is
    /// closed with a normal close frame. Calling it again does nothing.
    pub fn close(&mut self) {
        let previous = self.state;
        self.state = TransportState::Closed;

        match previous {
            TransportState::Pending => {
                if let Some(task) = self.task.take() {
                    task.abort();
                }
            }
            TransportState::Ready => {
                if self.cmd_tx.try_send(NetCommand::Close).is_err() {
                    if let Some(task) = self.task.take() {
                        task.abort();
                    }
                }
                // The link task sends the close frame and exits on its own.
                self.task = None;
            }
            TransportState::Closed => {}
            TransportState::Failed => {
                if let Some(task) = self.task.take() {
                    task.abort();
                }
            }
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct NetLink {
    config: Config,
    sink: EventSink,
    rx_cmd: mpsc::Receiver<NetCommand>,
}

impl NetLink {
    /// Start connecting in the background and return the handle right away.
    pub fn spawn(config: &Config, sink: EventSink) -> TransportHandle {
        let (cmd_tx, rx_cmd) = mpsc::channel(64);
        let link = NetLink {
            config: config.clone(),
            sink,
            rx_cmd,
        };
        let task = tokio::spawn(link.run());
        TransportHandle::new(cmd_tx, Some(task))
    }

    // 单次连接，不做自动重连：断开后由会话决定下一步
    async fn run(mut self) {
        let last = match self.connect_and_loop().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                log::info!("Transport closed locally");
                return;
            }
            Err(e) => {
                log::error!("Transport error: {:#}", e);
                TransportEvent::Error(format!("{:#}", e))
            }
        };
        let _ = self.sink.transport(last).await;
    }

    /// Ok(Some) carries the terminal event for the session, Ok(None) means the
    /// session asked for the close.
    async fn connect_and_loop(&mut self) -> anyhow::Result<Option<TransportEvent>> {
        let key = self
            .config
            .credential()
            .ok_or_else(|| anyhow::anyhow!("missing credential"))?;
        let url = Url::parse_with_params(self.config.ws_url, &[("key", key)])?;

        log::info!("Connecting to {}...", self.config.ws_url);
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        log::info!("Websocket connected, sending setup");

        let (mut write, mut read) = ws_stream.split();

        let setup_json = serde_json::to_string(&SetupMessage::from_config(&self.config))?;
        log::debug!("Sending setup: {}", setup_json);
        write.send(Message::Text(setup_json.into())).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            let parsed = match msg {
                                Message::Text(text) => ServerMessage::parse(text.as_bytes()),
                                Message::Binary(data) => ServerMessage::parse(&data),
                                Message::Close(frame) => {
                                    log::info!("Server closed connection: {:?}", frame);
                                    let (code, reason) = match frame {
                                        Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_string()),
                                        None => (None, String::new()),
                                    };
                                    return Ok(Some(TransportEvent::Closed { code, reason }));
                                }
                                _ => continue,
                            };
                            match parsed {
                                Ok(server_msg) => {
                                    for event in server_msg.into_events() {
                                        if !self.sink.transport(event).await {
                                            // Session is gone.
                                            return Ok(None);
                                        }
                                    }
                                }
                                Err(e) => log::warn!("Unparseable server message: {}", e),
                            }
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Ok(Some(TransportEvent::Closed {
                                code: None,
                                reason: String::new(),
                            }))
                        }
                    }
                }
                cmd = self.rx_cmd.recv() => {
                    match cmd {
                        Some(NetCommand::SendText(text)) => {
                            write.send(Message::Text(text.into())).await?;
                        }
                        Some(NetCommand::Close) | None => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "client disconnect".into(),
                            };
                            if let Err(e) = write.send(Message::Close(Some(frame))).await {
                                log::debug!("Close frame not delivered: {}", e);
                            }
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_are_dropped_until_ready() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut handle = TransportHandle::new(tx, None);

        assert!(!handle.send_text("early".into()));
        assert!(rx.try_recv().is_err());

        handle.mark_ready();
        assert!(handle.send_text("late".into()));
        match rx.try_recv() {
            Ok(NetCommand::SendText(text)) => assert_eq!(text, "late"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn close_from_ready_requests_close_frame_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut handle = TransportHandle::new(tx, None);
        handle.mark_ready();

        handle.close();
        handle.close();

        assert!(matches!(rx.try_recv(), Ok(NetCommand::Close)));
        assert!(rx.try_recv().is_err());
        assert_eq!(handle.state(), TransportState::Closed);
        assert!(!handle.send_text("after".into()));
    }

    #[tokio::test]
    async fn close_while_pending_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut handle = TransportHandle::new(tx, None);
        handle.close();
        assert!(rx.try_recv().is_err());
    }
}
