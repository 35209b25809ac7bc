use live_voice_rs::config::Config;
use live_voice_rs::control_bridge::{ControlBridge, ControlEvent};
use live_voice_rs::event::SessionEvent;
use live_voice_rs::platform::SystemPlatform;
use live_voice_rs::session::VoiceSession;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};

// 单线程事件循环：会话状态只在这里被修改
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 初始化日志，默认 info，可用 RUST_LOG 覆盖
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 加载配置
    let config = Config::new().map_err(|e| anyhow::anyhow!(e))?;
    log::info!(
        "{} {} starting (model {}, voice {})",
        config.app_name,
        config.app_version,
        config.model,
        config.voice_name
    );
    if config.credential().is_none() {
        log::warn!("{} is not set, connecting will fail", config.api_key_env);
    }

    let platform = SystemPlatform::new(&config);
    let (mut session, mut rx_session) = VoiceSession::new(config.clone(), platform);
    let mut status_rx = session.subscribe();
    let mut transcripts = session.transcripts();

    // 启动前端控制桥
    let (tx_control, mut rx_control) = mpsc::channel::<ControlEvent>(32);
    let control_bridge = Arc::new(ControlBridge::new(&config, tx_control).await?);
    let control_bridge_clone = control_bridge.clone();
    tokio::spawn(async move {
        if let Err(e) = control_bridge_clone.run().await {
            log::error!("ControlBridge error: {}", e);
        }
    });

    if let Err(e) = control_bridge.send_status(&session.snapshot()).await {
        log::warn!("Failed to send status to front-end: {}", e);
    }

    if config.auto_connect {
        if let Err(e) = session.connect().await {
            log::error!("Auto-connect failed: {}", e);
        }
    }

    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }

            // 会话收件箱：传输、采集、解码、播放完成
            Some(event) = rx_session.recv() => {
                session.handle_event(event).await;
            }

            // 前端命令
            Some(cmd) = rx_control.recv() => {
                log::debug!("Control command: {:?}", cmd);
                match cmd {
                    ControlEvent::Connect => {
                        if let Err(e) = session.connect().await {
                            log::error!("Connect failed: {}", e);
                        }
                    }
                    ControlEvent::Disconnect => session.disconnect(),
                    ControlEvent::Stop => session.stop_playback(),
                    ControlEvent::Visibility { visible } => {
                        if visible {
                            session.handle_event(SessionEvent::Foreground).await;
                        }
                    }
                }
            }

            // 状态变化推送给前端
            Ok(()) = status_rx.changed() => {
                let snapshot = status_rx.borrow_and_update().clone();
                log::info!(
                    "Status: {:?}, speaking: {}, error: {}",
                    snapshot.status,
                    snapshot.is_remote_speaking,
                    snapshot.last_error.as_deref().unwrap_or("-")
                );
                if let Err(e) = control_bridge.send_status(&snapshot).await {
                    log::warn!("Failed to send status to front-end: {}", e);
                }
            }

            // 转写文本转发给前端
            line = transcripts.recv() => {
                match line {
                    Ok(line) => {
                        log::info!("{:?}: {}", line.speaker, line.text);
                        if let Err(e) = control_bridge.send_transcript(line.speaker, &line.text).await {
                            log::warn!("Failed to send transcript to front-end: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("Dropped {} transcript lines", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    session.shutdown();
    log::info!("Bye");
    Ok(())
}
