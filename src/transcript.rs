//! Transcript correlation.
//!
//! Tracks conversation messages by the backend's item id so an interruption
//! can name the assistant message in flight and how long it has been playing.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::protocol::{Role, ServerEvent, ServerItem};

const TRANSCRIBING_PLACEHOLDER: &str = "[Transcribing...]";
const INAUDIBLE_PLACEHOLDER: &str = "[inaudible]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptItem {
    pub id: String,
    pub item_id: String,
    pub role: Role,
    pub text: String,
    pub status: ItemStatus,
    pub created_at_ms: u64,
    pub hidden: bool,
}

/// Messages in creation order. Items are never removed within a session.
#[derive(Debug, Default)]
pub struct Transcript {
    items: Vec<TranscriptItem>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[TranscriptItem] {
        &self.items
    }

    pub fn get(&self, item_id: &str) -> Option<&TranscriptItem> {
        self.items.iter().find(|item| item.item_id == item_id)
    }

    pub fn add_message(&mut self, item_id: &str, role: Role, text: &str, hidden: bool) {
        self.add_message_at(item_id, role, text, hidden, now_ms());
    }

    pub fn add_message_at(
        &mut self,
        item_id: &str,
        role: Role,
        text: &str,
        hidden: bool,
        created_at_ms: u64,
    ) {
        if self.get(item_id).is_some() {
            tracing::warn!(item_id, "message already in transcript");
            return;
        }
        self.items.push(TranscriptItem {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            role,
            text: text.to_string(),
            status: ItemStatus::InProgress,
            created_at_ms,
            hidden,
        });
    }

    pub fn append_text(&mut self, item_id: &str, delta: &str) {
        if let Some(item) = self.get_mut(item_id) {
            item.text.push_str(delta);
        }
    }

    pub fn replace_text(&mut self, item_id: &str, text: &str) {
        if let Some(item) = self.get_mut(item_id) {
            item.text = text.to_string();
        }
    }

    pub fn mark_done(&mut self, item_id: &str) {
        if let Some(item) = self.get_mut(item_id) {
            item.status = ItemStatus::Done;
        }
    }

    /// Most recently created assistant message.
    pub fn latest_assistant(&self) -> Option<&TranscriptItem> {
        self.items
            .iter()
            .rev()
            .find(|item| item.role == Role::Assistant)
    }

    /// Folds one message/status event into the transcript. Other events are ignored.
    pub fn observe(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::ConversationItemCreated { item } => self.observe_created(item),
            ServerEvent::InputAudioTranscriptionCompleted {
                item_id,
                transcript,
            } => {
                let text = if transcript.trim().is_empty() {
                    INAUDIBLE_PLACEHOLDER
                } else {
                    transcript.as_str()
                };
                self.replace_text(item_id, text);
            }
            ServerEvent::AudioTranscriptDelta { item_id, delta } => {
                self.append_text(item_id, delta);
            }
            ServerEvent::OutputItemDone { item } => self.mark_done(&item.id),
            _ => {}
        }
    }

    fn observe_created(&mut self, item: &ServerItem) {
        if item.item_type != "message" {
            return;
        }
        let Some(role) = item.role else {
            return;
        };
        let text = match item.display_text() {
            Some(text) => text,
            None if role == Role::User => TRANSCRIBING_PLACEHOLDER,
            None => "",
        };
        self.add_message(&item.id, role, text, false);
    }

    fn get_mut(&mut self, item_id: &str) -> Option<&mut TranscriptItem> {
        self.items.iter_mut().find(|item| item.item_id == item_id)
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(json: &str) -> ServerEvent {
        ServerEvent::parse(json).unwrap()
    }

    #[test]
    fn latest_assistant_is_by_recency() {
        let mut transcript = Transcript::new();
        transcript.add_message("z_first", Role::Assistant, "one", false);
        transcript.add_message("a_second", Role::Assistant, "two", false);
        transcript.add_message("u_1", Role::User, "three", false);

        assert_eq!(transcript.latest_assistant().unwrap().item_id, "a_second");
    }

    #[test]
    fn duplicate_item_ids_are_ignored() {
        let mut transcript = Transcript::new();
        transcript.add_message("item_1", Role::User, "hi", true);
        transcript.add_message("item_1", Role::User, "again", false);

        assert_eq!(transcript.items().len(), 1);
        assert_eq!(transcript.items()[0].text, "hi");
    }

    #[test]
    fn assistant_message_accumulates_deltas_and_completes() {
        let mut transcript = Transcript::new();
        transcript.observe(&created(
            r#"{"type":"conversation.item.created","item":{"id":"item_a","type":"message","role":"assistant","content":[]}}"#,
        ));
        transcript.observe(&created(
            r#"{"type":"response.audio_transcript.delta","item_id":"item_a","delta":"Hel"}"#,
        ));
        transcript.observe(&created(
            r#"{"type":"response.audio_transcript.delta","item_id":"item_a","delta":"lo"}"#,
        ));

        let item = transcript.get("item_a").unwrap();
        assert_eq!(item.text, "Hello");
        assert_eq!(item.status, ItemStatus::InProgress);

        transcript.observe(&created(
            r#"{"type":"response.output_item.done","item":{"id":"item_a","type":"message","role":"assistant"}}"#,
        ));
        assert_eq!(transcript.get("item_a").unwrap().status, ItemStatus::Done);
    }

    #[test]
    fn user_audio_shows_placeholder_until_transcribed() {
        let mut transcript = Transcript::new();
        transcript.observe(&created(
            r#"{"type":"conversation.item.created","item":{"id":"item_u","type":"message","role":"user","content":[{"type":"input_audio"}]}}"#,
        ));
        assert_eq!(transcript.get("item_u").unwrap().text, "[Transcribing...]");

        transcript.observe(&created(
            r#"{"type":"conversation.item.input_audio_transcription.completed","item_id":"item_u","content_index":0,"transcript":"  "}"#,
        ));
        assert_eq!(transcript.get("item_u").unwrap().text, "[inaudible]");
    }

    #[test]
    fn function_call_items_are_not_messages() {
        let mut transcript = Transcript::new();
        transcript.observe(&created(
            r#"{"type":"conversation.item.created","item":{"id":"fc_1","type":"function_call","name":"addSlide"}}"#,
        ));
        assert!(transcript.items().is_empty());
    }
}
