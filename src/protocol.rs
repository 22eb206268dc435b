//! Wire events exchanged with the realtime backend.
//!
//! Field names and `type` discriminators are the backend's contract and are
//! reproduced exactly. Client events are built once and never mutated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

// =============================================================================
// Client events
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: NewItem },

    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },

    #[serde(rename = "response.create")]
    ResponseCreate,

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// The `type` discriminator this event is sent with.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferClear => "input_audio_buffer.clear",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ConversationItemTruncate { .. } => "conversation.item.truncate",
            ClientEvent::ResponseCreate => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
        }
    }

    /// A user text message, optionally with a caller-chosen item id.
    pub fn user_text(id: Option<String>, text: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: NewItem::Message {
                id,
                role: Role::User,
                content: vec![InputContent::InputText { text: text.into() }],
            },
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: NewItem::FunctionCallOutput {
                call_id: call_id.into(),
                output: output.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: InputAudioTranscription,
    /// `null` on the wire means the client decides when a turn ends.
    pub turn_detection: Option<TurnDetection>,
    pub tools: Vec<ToolDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
        create_response: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewItem {
    Message {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        role: Role,
        content: Vec<InputContent>,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    InputText { text: String },
}

// =============================================================================
// Server events
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: serde_json::Value,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: serde_json::Value,
    },

    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated { item: ServerItem },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted { item_id: String, transcript: String },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { item_id: String, delta: String },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: ServerItem },

    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseBody },

    #[serde(other)]
    Other,
}

impl ServerEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// A conversation item as the backend reports it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerItem {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ServerItem {
    /// First displayable text of the item: typed text or an audio transcript.
    pub fn display_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find_map(|part| part.text.as_deref().or(part.transcript.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub output: Vec<ServerItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unit_events_serialize_as_bare_type() {
        let value = serde_json::to_value(ClientEvent::ResponseCancel).unwrap();
        assert_eq!(value, json!({"type": "response.cancel"}));
        let value = serde_json::to_value(ClientEvent::InputAudioBufferCommit).unwrap();
        assert_eq!(value, json!({"type": "input_audio_buffer.commit"}));
    }

    #[test]
    fn truncate_carries_item_and_offset() {
        let event = ClientEvent::ConversationItemTruncate {
            item_id: "item_1".to_string(),
            content_index: 0,
            audio_end_ms: 1500,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "conversation.item.truncate",
                "item_id": "item_1",
                "content_index": 0,
                "audio_end_ms": 1500
            })
        );
    }

    #[test]
    fn user_text_without_id_omits_it() {
        let value = serde_json::to_value(ClientEvent::user_text(None, "hello")).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "message",
                    "role": "user",
                    "content": [{"type": "input_text", "text": "hello"}]
                }
            })
        );
    }

    #[test]
    fn push_to_talk_session_sends_null_turn_detection() {
        let session = SessionConfig {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: String::new(),
            voice: "coral".to_string(),
            input_audio_format: "pcm16".to_string(),
            output_audio_format: "pcm16".to_string(),
            input_audio_transcription: InputAudioTranscription {
                model: "whisper-1".to_string(),
            },
            turn_detection: None,
            tools: Vec::new(),
        };
        let value = serde_json::to_value(ClientEvent::SessionUpdate { session }).unwrap();
        assert!(value["session"]["turn_detection"].is_null());
        assert_eq!(value["session"]["tools"], json!([]));
    }

    #[test]
    fn response_done_exposes_function_calls() {
        let event = ServerEvent::parse(
            r#"{
                "type": "response.done",
                "event_id": "evt_1",
                "response": {
                    "id": "resp_1",
                    "output": [{
                        "id": "item_9",
                        "type": "function_call",
                        "call_id": "call_1",
                        "name": "addSlide",
                        "arguments": "{\"slug\":\"intro\"}"
                    }]
                }
            }"#,
        )
        .unwrap();
        match event {
            ServerEvent::ResponseDone { response } => {
                assert_eq!(response.output.len(), 1);
                assert_eq!(response.output[0].name.as_deref(), Some("addSlide"));
                assert_eq!(response.output[0].call_id.as_deref(), Some("call_1"));
            }
            other => panic!("expected response.done, got {:?}", other),
        }
    }

    #[test]
    fn unknown_server_events_are_tolerated() {
        let event = ServerEvent::parse(r#"{"type": "rate_limits.updated", "rate_limits": []}"#)
            .unwrap();
        assert!(matches!(event, ServerEvent::Other));
    }

    #[test]
    fn display_text_prefers_first_part_with_text() {
        let item = ServerItem {
            content: vec![
                ContentPart {
                    content_type: "input_audio".to_string(),
                    text: None,
                    transcript: None,
                },
                ContentPart {
                    content_type: "audio".to_string(),
                    text: None,
                    transcript: Some("spoken".to_string()),
                },
            ],
            ..Default::default()
        };
        assert_eq!(item.display_text(), Some("spoken"));
    }

    #[test]
    fn system_items_from_the_backend_parse() {
        let event = ServerEvent::parse(
            r#"{
                "type": "conversation.item.created",
                "item": {
                    "id": "item_sys",
                    "type": "message",
                    "role": "system",
                    "content": [{"type": "input_text", "text": "be brief"}]
                }
            }"#,
        )
        .unwrap();
        match event {
            ServerEvent::ConversationItemCreated { item } => {
                assert_eq!(item.role, Some(Role::System));
                assert_eq!(item.display_text(), Some("be brief"));
            }
            other => panic!("expected conversation.item.created, got {:?}", other),
        }
    }
}
