use crate::config::Config;
use crate::protocol::Speaker;
use crate::session::SessionSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Commands a front-end may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlEvent {
    Connect,
    Disconnect,
    /// Manual barge-in.
    Stop,
    Visibility { visible: bool },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutboundMessage<'a> {
    Status {
        status: crate::session::SessionStatus,
        error: Option<&'a str>,
        speaking: bool,
    },
    Transcript {
        speaker: Speaker,
        text: &'a str,
    },
}

pub fn parse_command(raw: &str) -> serde_json::Result<ControlEvent> {
    serde_json::from_str(raw)
}

pub struct ControlBridge {
    socket: Arc<UdpSocket>,
    target_addr: String,
    buffer_size: usize,
    tx: mpsc::Sender<ControlEvent>,
}

// 前端进程和核心进程通过本地UDP通信，地址在配置中指定
impl ControlBridge {
    pub async fn new(config: &Config, tx: mpsc::Sender<ControlEvent>) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(format!(
            "{}:{}",
            config.control_local_ip, config.control_local_port
        ))
        .await?;
        let target_addr = format!("{}:{}", config.control_remote_ip, config.control_remote_port);

        Ok(Self {
            socket: Arc::new(socket),
            target_addr,
            buffer_size: config.control_buffer_size,
            tx,
        })
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let (len, _) = self.socket.recv_from(&mut buf).await?;
            if len == 0 {
                continue;
            }
            let Ok(msg) = std::str::from_utf8(&buf[..len]) else {
                log::warn!("Ignoring non-UTF-8 control datagram");
                continue;
            };
            match parse_command(msg) {
                Ok(event) => {
                    if let Err(e) = self.tx.send(event).await {
                        log::error!("Failed to forward control event: {}", e);
                        break;
                    }
                }
                Err(e) => log::warn!("Ignoring control message {:?}: {}", msg, e),
            }
        }
        Ok(())
    }

    pub async fn send_status(&self, snapshot: &SessionSnapshot) -> anyhow::Result<()> {
        let msg = serde_json::to_string(&OutboundMessage::Status {
            status: snapshot.status,
            error: snapshot.last_error.as_deref(),
            speaking: snapshot.is_remote_speaking,
        })?;
        self.send_message(&msg).await
    }

    pub async fn send_transcript(&self, speaker: Speaker, text: &str) -> anyhow::Result<()> {
        let msg = serde_json::to_string(&OutboundMessage::Transcript { speaker, text })?;
        self.send_message(&msg).await
    }

    async fn send_message(&self, msg: &str) -> anyhow::Result<()> {
        self.socket
            .send_to(msg.as_bytes(), &self.target_addr)
            .await?;
        Ok(())
    }
}
