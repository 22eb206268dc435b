//! Turn taking between the user and the assistant.
//!
//! In push-to-talk mode the client decides when a user turn ends and asks for
//! a response itself; in voice-activity mode the backend detects the end of
//! speech and answers on its own.

use uuid::Uuid;

use crate::agent::AgentConfig;
use crate::channel::Outbound;
use crate::protocol::{ClientEvent, InputAudioTranscription, Role, SessionConfig, TurnDetection};
use crate::session::SessionState;
use crate::transcript::{ItemStatus, Transcript, now_ms};

const VOICE: &str = "coral";
const AUDIO_FORMAT: &str = "pcm16";
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const GREETING: &str = "hi";

const VAD_THRESHOLD: f32 = 0.5;
const VAD_PREFIX_PADDING_MS: u32 = 300;
const VAD_SILENCE_DURATION_MS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    PushToTalk,
    VoiceActivity,
}

impl TurnMode {
    pub fn from_push_to_talk(push_to_talk: bool) -> Self {
        if push_to_talk {
            TurnMode::PushToTalk
        } else {
            TurnMode::VoiceActivity
        }
    }

    pub fn is_push_to_talk(&self) -> bool {
        matches!(self, TurnMode::PushToTalk)
    }

    fn turn_detection(&self) -> Option<TurnDetection> {
        match self {
            TurnMode::PushToTalk => None,
            TurnMode::VoiceActivity => Some(TurnDetection::ServerVad {
                threshold: VAD_THRESHOLD,
                prefix_padding_ms: VAD_PREFIX_PADDING_MS,
                silence_duration_ms: VAD_SILENCE_DURATION_MS,
                create_response: true,
            }),
        }
    }
}

/// Whether an interruption had anything to cut off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    NoAssistantMessage,
    AlreadyDone,
    Truncated { item_id: String, audio_end_ms: u64 },
}

#[derive(Debug)]
pub struct TurnController {
    mode: TurnMode,
    user_speaking: bool,
}

impl TurnController {
    pub fn new(mode: TurnMode) -> Self {
        Self {
            mode,
            user_speaking: false,
        }
    }

    pub fn mode(&self) -> TurnMode {
        self.mode
    }

    pub fn is_user_speaking(&self) -> bool {
        self.user_speaking
    }

    pub fn session_config(&self, agent: Option<&AgentConfig>) -> SessionConfig {
        SessionConfig {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: agent
                .map(|agent| agent.instructions.clone())
                .unwrap_or_default(),
            voice: VOICE.to_string(),
            input_audio_format: AUDIO_FORMAT.to_string(),
            output_audio_format: AUDIO_FORMAT.to_string(),
            input_audio_transcription: InputAudioTranscription {
                model: TRANSCRIPTION_MODEL.to_string(),
            },
            turn_detection: self.mode.turn_detection(),
            tools: agent.map(AgentConfig::wire_tools).unwrap_or_default(),
        }
    }

    /// Pushes the current agent and turn policy to the backend. The input
    /// audio buffer is always cleared first.
    pub fn configure_session(
        &self,
        out: &Outbound<'_>,
        transcript: &mut Transcript,
        agent: Option<&AgentConfig>,
        trigger_greeting: bool,
    ) {
        out.send_with(
            &ClientEvent::InputAudioBufferClear,
            "clear audio buffer on session update",
        );
        out.send(&ClientEvent::SessionUpdate {
            session: self.session_config(agent),
        });

        if trigger_greeting {
            self.send_simulated_user_message(out, transcript, GREETING);
        }
    }

    /// Sends `text` as if the user had typed it, without showing it.
    pub fn send_simulated_user_message(
        &self,
        out: &Outbound<'_>,
        transcript: &mut Transcript,
        text: &str,
    ) {
        let id = Uuid::new_v4().simple().to_string();
        transcript.add_message(&id, Role::User, text, true);

        out.send_with(
            &ClientEvent::user_text(Some(id), text),
            "(simulated user text message)",
        );
        out.send_with(
            &ClientEvent::ResponseCreate,
            "(trigger response after simulated user text message)",
        );
    }

    /// Sends a typed user message. Returns false for blank input, which sends
    /// nothing.
    pub fn send_user_text(
        &self,
        out: &Outbound<'_>,
        transcript: &Transcript,
        text: &str,
    ) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.cancel_assistant_speech(out, transcript);

        out.send_with(&ClientEvent::user_text(None, text), "(send user text message)");
        out.send_with(&ClientEvent::ResponseCreate, "trigger response");
        true
    }

    pub fn talk_down(&mut self, state: SessionState, out: &Outbound<'_>, transcript: &Transcript) {
        if !self.mode.is_push_to_talk() || state != SessionState::Connected || !out.is_open() {
            return;
        }
        self.cancel_assistant_speech(out, transcript);

        self.user_speaking = true;
        out.send_with(&ClientEvent::InputAudioBufferClear, "clear PTT buffer");
    }

    pub fn talk_up(&mut self, state: SessionState, out: &Outbound<'_>) {
        if state != SessionState::Connected || !out.is_open() || !self.user_speaking {
            return;
        }

        self.user_speaking = false;
        out.send_with(&ClientEvent::InputAudioBufferCommit, "commit PTT");
        out.send_with(&ClientEvent::ResponseCreate, "trigger response PTT");
    }

    pub fn cancel_assistant_speech(
        &self,
        out: &Outbound<'_>,
        transcript: &Transcript,
    ) -> Interruption {
        self.cancel_assistant_speech_at(out, transcript, now_ms())
    }

    /// Truncates the latest assistant message at `now_ms` and cancels the
    /// response producing it. Truncate always goes out before cancel.
    pub fn cancel_assistant_speech_at(
        &self,
        out: &Outbound<'_>,
        transcript: &Transcript,
        now_ms: u64,
    ) -> Interruption {
        let Some(message) = transcript.latest_assistant() else {
            tracing::warn!("can't cancel, no recent assistant message found");
            return Interruption::NoAssistantMessage;
        };
        if message.status == ItemStatus::Done {
            tracing::debug!(item_id = %message.item_id, "No truncation needed, message is DONE");
            return Interruption::AlreadyDone;
        }

        let audio_end_ms = now_ms.saturating_sub(message.created_at_ms);
        out.send(&ClientEvent::ConversationItemTruncate {
            item_id: message.item_id.clone(),
            content_index: 0,
            audio_end_ms,
        });
        out.send_with(&ClientEvent::ResponseCancel, "(cancel due to user interruption)");

        Interruption::Truncated {
            item_id: message.item_id.clone(),
            audio_end_ms,
        }
    }

    /// Switches turn policy. While connected the new policy is pushed at once,
    /// without a greeting. Returns whether the mode changed.
    pub fn set_mode(
        &mut self,
        mode: TurnMode,
        state: SessionState,
        out: &Outbound<'_>,
        transcript: &mut Transcript,
        agent: Option<&AgentConfig>,
    ) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        tracing::info!(?mode, "turn mode changed");

        if state == SessionState::Connected {
            self.configure_session(out, transcript, agent, false);
        }
        true
    }

    pub fn reset(&mut self) {
        self.user_speaking = false;
    }
}
