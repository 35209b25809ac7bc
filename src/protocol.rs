//! Gemini Live wire format.
//!
//! Outbound: one `setup` message right after the websocket opens, then a
//! stream of `realtimeInput` audio chunks. Inbound: `setupComplete`, then
//! `serverContent` messages carrying audio parts, interruption and turn
//! markers, and transcriptions.

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Who a transcript line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

/// What the transport reports to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The service acknowledged the setup message.
    Opened,
    /// One inline audio part, still base64 encoded.
    Fragment { data: String },
    /// The user barged in; local playback must stop.
    Interrupted,
    TurnComplete,
    Transcript { speaker: Speaker, text: String },
    /// The websocket closed. `code` is absent when the stream just ended.
    Closed { code: Option<u16>, reason: String },
    Error(String),
}

impl TransportEvent {
    /// Close codes 1000/1001 (or no close frame at all) are an orderly end.
    pub fn is_orderly_close(code: Option<u16>) -> bool {
        matches!(code, None | Some(1000) | Some(1001))
    }
}

// ======================== Outbound ========================

#[derive(Serialize)]
pub struct SetupMessage {
    setup: Setup,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup {
    model: String,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    input_audio_transcription: Empty,
    output_audio_transcription: Empty,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Serialize)]
struct Empty {}

impl SetupMessage {
    pub fn from_config(config: &Config) -> Self {
        let instruction = config.system_instruction.trim();
        let system_instruction = if instruction.is_empty() {
            None
        } else {
            Some(Content {
                parts: vec![Part {
                    text: Some(instruction.to_string()),
                    inline_data: None,
                }],
            })
        };

        Self {
            setup: Setup {
                model: format!("models/{}", config.model),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO"],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: config.voice_name.to_string(),
                            },
                        },
                    },
                },
                system_instruction,
                input_audio_transcription: Empty {},
                output_audio_transcription: Empty {},
            },
        }
    }
}

/// One outbound capture frame: `{mimeType, data}` wrapped for the service.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    realtime_input: MediaChunks,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaChunks {
    media_chunks: Vec<Blob>,
}

impl RealtimeInput {
    pub fn audio(mime_type: String, data: String) -> Self {
        Self {
            realtime_input: MediaChunks {
                media_chunks: vec![Blob { mime_type, data }],
            },
        }
    }
}

// ======================== Inbound ========================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    pub time_left: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiError {
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub go_away: Option<GoAway>,
    pub error: Option<ApiError>,
}

impl ServerMessage {
    pub fn parse(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }

    /// Flatten one server message into transport events, in wire order.
    pub fn into_events(self) -> Vec<TransportEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(TransportEvent::Opened);
        }

        if let Some(content) = self.server_content {
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(blob) = part.inline_data {
                        if blob.mime_type.starts_with("audio/") {
                            events.push(TransportEvent::Fragment { data: blob.data });
                        } else {
                            log::debug!("Ignoring inline data of type {}", blob.mime_type);
                        }
                    }
                }
            }
            if content.interrupted {
                events.push(TransportEvent::Interrupted);
            }
            if let Some(t) = content.input_transcription {
                if !t.text.trim().is_empty() {
                    events.push(TransportEvent::Transcript {
                        speaker: Speaker::User,
                        text: t.text,
                    });
                }
            }
            if let Some(t) = content.output_transcription {
                if !t.text.trim().is_empty() {
                    events.push(TransportEvent::Transcript {
                        speaker: Speaker::Model,
                        text: t.text,
                    });
                }
            }
            if content.turn_complete {
                events.push(TransportEvent::TurnComplete);
            }
        }

        if let Some(go_away) = self.go_away {
            log::warn!(
                "Server is going away, time left: {}",
                go_away.time_left.as_deref().unwrap_or("unknown")
            );
        }

        if let Some(error) = self.error {
            events.push(TransportEvent::Error(
                error.message.unwrap_or_else(|| "unspecified server error".to_string()),
            ));
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_carries_voice_and_audio_modality() {
        let config = Config::default();
        let json = serde_json::to_value(SetupMessage::from_config(&config)).unwrap();
        let setup = &json["setup"];

        assert_eq!(setup["model"], format!("models/{}", config.model));
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            config.voice_name
        );
        assert!(setup["outputAudioTranscription"].is_object());
    }

    #[test]
    fn realtime_input_shape() {
        let msg = RealtimeInput::audio("audio/pcm;rate=16000".into(), "AAA=".into());
        let json = serde_json::to_value(msg).unwrap();
        let chunk = &json["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(chunk["data"], "AAA=");
    }
}
