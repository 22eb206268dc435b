//! Event channel contract and the outbound send discipline.
//!
//! A send on a channel that is not open is dropped and reported as an
//! `error.data_channel_not_open` diagnostic. Nothing is queued for later.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::error::ChannelError;
use crate::protocol::ClientEvent;

const EVENT_LOG_CAPACITY: usize = 512;

/// Duplex, ordered, reliable message channel carrying JSON control events.
pub trait EventChannel: Send + Sync {
    fn is_open(&self) -> bool;

    fn send_text(&self, text: String) -> Result<(), ChannelError>;

    fn close(&self);
}

/// What a channel reports back to the session, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    Open,
    Message(String),
    Close,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Client,
    Server,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    pub direction: Direction,
    pub name: String,
    pub payload: serde_json::Value,
}

/// Broadcast log of every client and server event, for an events pane.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: broadcast::Sender<LoggedEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_LOG_CAPACITY);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoggedEvent> {
        self.events.subscribe()
    }

    pub fn log_client(&self, payload: serde_json::Value, suffix: &str) {
        self.publish(Direction::Client, payload, suffix);
    }

    pub fn log_server(&self, payload: serde_json::Value, suffix: &str) {
        self.publish(Direction::Server, payload, suffix);
    }

    fn publish(&self, direction: Direction, payload: serde_json::Value, suffix: &str) {
        let name = event_name(&payload, suffix);
        tracing::debug!(?direction, %name, "event");
        // No subscribers is fine.
        let _ = self.events.send(LoggedEvent {
            direction,
            name,
            payload,
        });
    }
}

fn event_name(payload: &serde_json::Value, suffix: &str) -> String {
    let event_type = payload
        .get("type")
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    format!("{} {}", event_type, suffix).trim().to_string()
}

/// Borrowed view of the current channel used for every outbound event.
pub struct Outbound<'a> {
    channel: Option<&'a dyn EventChannel>,
    log: &'a EventLog,
}

impl<'a> Outbound<'a> {
    pub fn new(channel: Option<&'a dyn EventChannel>, log: &'a EventLog) -> Self {
        Self { channel, log }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some_and(|channel| channel.is_open())
    }

    pub fn send(&self, event: &ClientEvent) {
        self.send_with(event, "");
    }

    /// Sends `event`, labelling it in the log with `suffix`. Never fails.
    pub fn send_with(&self, event: &ClientEvent, suffix: &str) {
        let channel = match self.channel {
            Some(channel) if channel.is_open() => channel,
            _ => {
                tracing::error!(
                    event_type = event.event_type(),
                    "Failed to send message - no data channel available"
                );
                self.log.log_client(
                    json!({ "attemptedEvent": event.event_type() }),
                    "error.data_channel_not_open",
                );
                return;
            }
        };

        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("Failed to serialize event: {}", err);
                return;
            }
        };

        match channel.send_text(payload.to_string()) {
            Ok(()) => self.log.log_client(payload, suffix),
            Err(err) => {
                tracing::error!(event_type = event.event_type(), "Channel send failed: {}", err);
                self.log.log_client(
                    json!({ "attemptedEvent": event.event_type(), "error": err.to_string() }),
                    "error.data_channel_send_failed",
                );
            }
        }
    }
}

/// In-process channel that records every frame it is given.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    open: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened() -> Self {
        let channel = Self::new();
        channel.set_open(true);
        channel
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Sent frames decoded back to JSON.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    /// `type` of every sent frame, in send order.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .filter_map(|value| value["type"].as_str().map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: String) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen);
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text);
        Ok(())
    }

    fn close(&self) {
        self.set_open(false);
    }
}
