//! Session lifecycle and inbound routing.
//!
//! A [`Session`] is owned by one task. Everything that happens off that task
//! (credential fetch, transport establishment, channel frames) comes back as a
//! [`SessionInput`] through the session's inbox, and is applied by
//! [`Session::handle`] one input at a time, in arrival order.

use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::agent::AgentSelection;
use crate::channel::{ChannelSignal, EventChannel, EventLog, LoggedEvent, Outbound};
use crate::credential::CredentialSource;
use crate::deck::{Deck, DispatchOutcome};
use crate::error::ConnectError;
use crate::navigate::Navigator;
use crate::prefs::{AUDIO_PLAYBACK, LOGS_EXPANDED, PUSH_TO_TALK, Preferences, UiPreferences};
use crate::protocol::{ClientEvent, ServerEvent, ServerItem};
use crate::transcript::Transcript;
use crate::transport::{AudioSink, Connection, Connector, SignalSink};
use crate::turns::{Interruption, TurnController, TurnMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::Connecting => "CONNECTING",
            SessionState::Connected => "CONNECTED",
        })
    }
}

/// Work delivered to the session from other tasks. Every input carries the
/// connect attempt it belongs to; inputs from a superseded attempt are dropped.
pub enum SessionInput {
    Established {
        generation: u64,
        result: Result<Connection, ConnectError>,
    },
    Channel {
        generation: u64,
        signal: ChannelSignal,
    },
}

impl fmt::Debug for SessionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionInput::Established { generation, result } => f
                .debug_struct("Established")
                .field("generation", generation)
                .field("ok", &result.is_ok())
                .finish(),
            SessionInput::Channel { generation, signal } => f
                .debug_struct("Channel")
                .field("generation", generation)
                .field("signal", signal)
                .finish(),
        }
    }
}

/// Receiving end of a session's inbox.
#[derive(Debug)]
pub struct SessionInbox {
    inputs: mpsc::UnboundedReceiver<SessionInput>,
}

impl SessionInbox {
    /// Never yields `None` while the session is alive.
    pub async fn recv(&mut self) -> Option<SessionInput> {
        self.inputs.recv().await
    }
}

/// The collaborators a session is built from.
pub struct SessionParts {
    pub credentials: Arc<dyn CredentialSource>,
    pub connector: Arc<dyn Connector>,
    pub navigator: Arc<dyn Navigator>,
    pub agents: AgentSelection,
    pub preferences: Box<dyn Preferences>,
}

pub struct Session {
    state: SessionState,
    generation: u64,
    connection: Option<Connection>,
    /// Task fetching the credential and establishing the current attempt.
    establishing: Option<JoinHandle<()>>,
    /// The channel reported open before its establishment result was applied.
    pending_open: bool,
    inbox: mpsc::UnboundedSender<SessionInput>,
    log: EventLog,
    transcript: Transcript,
    deck: Deck,
    turns: TurnController,
    agents: AgentSelection,
    preferences: Box<dyn Preferences>,
    ui: UiPreferences,
    audio: AudioSink,
    credentials: Arc<dyn CredentialSource>,
    connector: Arc<dyn Connector>,
    navigator: Arc<dyn Navigator>,
    draft: String,
}

fn outbound<'a>(connection: &'a Option<Connection>, log: &'a EventLog) -> Outbound<'a> {
    let channel: Option<&'a dyn EventChannel> = connection
        .as_ref()
        .map(|connection| connection.channel.as_ref());
    Outbound::new(channel, log)
}

impl Session {
    pub fn new(parts: SessionParts) -> (Self, SessionInbox) {
        let (inbox, inputs) = mpsc::unbounded_channel();
        let ui = UiPreferences::load(parts.preferences.as_ref());

        let session = Self {
            state: SessionState::Disconnected,
            generation: 0,
            connection: None,
            establishing: None,
            pending_open: false,
            inbox,
            log: EventLog::new(),
            transcript: Transcript::new(),
            deck: Deck::new(),
            turns: TurnController::new(TurnMode::from_push_to_talk(ui.push_to_talk)),
            agents: parts.agents,
            preferences: parts.preferences,
            ui,
            audio: AudioSink::new(ui.audio_playback),
            credentials: parts.credentials,
            connector: parts.connector,
            navigator: parts.navigator,
            draft: String::new(),
        };
        (session, SessionInbox { inputs })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_channel_open(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.channel.is_open())
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<LoggedEvent> {
        self.log.subscribe()
    }

    pub fn agents(&self) -> &AgentSelection {
        &self.agents
    }

    pub fn turn_mode(&self) -> TurnMode {
        self.turns.mode()
    }

    pub fn is_user_speaking(&self) -> bool {
        self.turns.is_user_speaking()
    }

    pub fn preferences(&self) -> UiPreferences {
        self.ui
    }

    pub fn audio(&self) -> &AudioSink {
        &self.audio
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Starts a connect attempt. Does nothing unless DISCONNECTED.
    ///
    /// Must be called from within a tokio runtime; the attempt runs on its own
    /// task and reports back through the inbox.
    pub fn connect(&mut self) {
        if self.state != SessionState::Disconnected {
            return;
        }
        self.generation += 1;
        self.state = SessionState::Connecting;
        self.pending_open = false;

        let generation = self.generation;
        tracing::info!(generation, "connecting");
        self.log
            .log_client(json!({ "type": "fetch_session_token_request" }), "");

        let credentials = self.credentials.clone();
        let connector = self.connector.clone();
        let audio = self.audio.clone();
        let signals = SignalSink::new(generation, self.inbox.clone());
        let inbox = self.inbox.clone();

        self.establishing = Some(tokio::spawn(async move {
            let result = establish(credentials.as_ref(), connector.as_ref(), audio, signals).await;
            // The session may already be gone.
            let _ = inbox.send(SessionInput::Established { generation, result });
        }));
    }

    /// Releases the transport and returns to DISCONNECTED. Any attempt still in
    /// flight is superseded. Does nothing when already DISCONNECTED.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.generation += 1;
        if let Some(task) = self.establishing.take() {
            task.abort();
        }
        if let Some(connection) = self.connection.take() {
            connection.release();
        }
        self.pending_open = false;
        self.state = SessionState::Disconnected;
        self.turns.reset();

        tracing::info!("disconnected");
        self.log.log_client(json!({ "type": "disconnected" }), "");
    }

    pub fn toggle_connection(&mut self) {
        match self.state {
            SessionState::Disconnected => self.connect(),
            SessionState::Connecting | SessionState::Connected => self.disconnect(),
        }
    }

    /// Applies one input from the inbox.
    pub fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Established { generation, result } => {
                self.on_established(generation, result)
            }
            SessionInput::Channel { generation, signal } => {
                if generation != self.generation {
                    tracing::debug!(generation, current = self.generation, "dropping stale channel signal");
                    return;
                }
                self.on_signal(signal);
            }
        }
    }

    fn on_established(&mut self, generation: u64, result: Result<Connection, ConnectError>) {
        if generation != self.generation || self.state != SessionState::Connecting {
            tracing::debug!(generation, current = self.generation, "discarding stale connect result");
            if let Ok(connection) = result {
                connection.release();
            }
            return;
        }
        self.establishing = None;

        match result {
            Ok(connection) => {
                self.connection = Some(connection);
                if self.pending_open {
                    self.pending_open = false;
                    self.on_open();
                }
            }
            Err(err) => {
                tracing::error!("Error connecting: {}", err);
                let name = match err {
                    ConnectError::NoCredential => "error.no_ephemeral_key",
                    _ => "error.connect_failed",
                };
                self.log.log_client(json!({ "error": err.to_string() }), name);
                self.state = SessionState::Disconnected;
            }
        }
    }

    fn on_signal(&mut self, signal: ChannelSignal) {
        match signal {
            ChannelSignal::Open => {
                if self.connection.is_none() {
                    self.pending_open = true;
                } else {
                    self.on_open();
                }
            }
            ChannelSignal::Message(text) => self.on_message(&text),
            ChannelSignal::Close => {
                tracing::info!("data channel closed");
                self.log.log_client(json!({ "type": "data_channel.close" }), "");
            }
            ChannelSignal::Error(message) => {
                tracing::error!("data channel error: {}", message);
                self.log
                    .log_client(json!({ "type": "data_channel.error", "error": message }), "");
            }
        }
    }

    fn on_open(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.state = SessionState::Connected;
        tracing::info!(generation = self.generation, "connected");
        self.log.log_client(json!({ "type": "data_channel.open" }), "");

        if self.agents.current().is_some() {
            self.configure_session(true);
        }
    }

    // -------------------------------------------------------------------------
    // Inbound routing
    // -------------------------------------------------------------------------

    fn on_message(&mut self, text: &str) {
        let payload: serde_json::Value = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(err) => {
                self.unparseable(text, &err);
                return;
            }
        };
        self.log.log_server(payload.clone(), "");

        let event: ServerEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(err) => {
                self.unparseable(text, &err);
                return;
            }
        };
        self.route(event);
    }

    fn unparseable(&self, text: &str, err: &serde_json::Error) {
        tracing::warn!("Failed to parse server event: {}", err);
        self.log.log_client(
            json!({ "raw": text, "error": err.to_string() }),
            "error.unparseable_server_event",
        );
    }

    fn route(&mut self, event: ServerEvent) {
        self.transcript.observe(&event);

        match &event {
            ServerEvent::Error { error } => {
                tracing::error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    "server error: {}",
                    error.message
                );
            }
            ServerEvent::ResponseDone { response } => {
                for item in response
                    .output
                    .iter()
                    .filter(|item| item.item_type == "function_call")
                {
                    self.handle_function_call(item);
                }
            }
            _ => {}
        }
    }

    fn handle_function_call(&mut self, item: &ServerItem) {
        let name = item.name.as_deref().unwrap_or_default();
        let arguments = item.arguments.as_deref().unwrap_or("{}");

        let output = match self.deck.dispatch(name, arguments, self.navigator.as_ref()) {
            Ok(DispatchOutcome::Applied) => json!({ "success": true }),
            Ok(DispatchOutcome::Navigated(index)) => json!({ "success": true, "index": index }),
            Ok(DispatchOutcome::SlugNotFound) => json!({
                "success": false,
                "error": "No slide found with that slug",
            }),
            Ok(DispatchOutcome::Ignored) => json!({
                "success": false,
                "error": format!("Unknown function call: {}", name),
            }),
            Err(err) => {
                tracing::warn!(function = name, kind = %err.kind, field = %err.field, "{}", err);
                json!({
                    "success": false,
                    "error": err.message(),
                    "kind": err.kind.as_str(),
                    "field": err.field.as_str(),
                })
            }
        };

        let Some(call_id) = item.call_id.as_deref() else {
            tracing::warn!(function = name, "function call without call_id, not answering");
            return;
        };
        let out = outbound(&self.connection, &self.log);
        out.send_with(
            &ClientEvent::function_call_output(call_id, output.to_string()),
            &format!("({} result)", name),
        );
        out.send_with(&ClientEvent::ResponseCreate, "(trigger response after function call)");
    }

    // -------------------------------------------------------------------------
    // Turn taking
    // -------------------------------------------------------------------------

    /// Pushes the selected agent and the current turn policy to the backend.
    pub fn configure_session(&mut self, trigger_greeting: bool) {
        let out = outbound(&self.connection, &self.log);
        self.turns.configure_session(
            &out,
            &mut self.transcript,
            self.agents.current(),
            trigger_greeting,
        );
    }

    /// Sends the current draft and clears it once sent.
    pub fn send_draft(&mut self) -> bool {
        let text = std::mem::take(&mut self.draft);
        let sent = self.send_user_text(&text);
        if !sent {
            self.draft = text;
        }
        sent
    }

    pub fn send_user_text(&mut self, text: &str) -> bool {
        let out = outbound(&self.connection, &self.log);
        self.turns.send_user_text(&out, &self.transcript, text)
    }

    pub fn talk_down(&mut self) {
        let out = outbound(&self.connection, &self.log);
        self.turns.talk_down(self.state, &out, &self.transcript);
    }

    pub fn talk_up(&mut self) {
        let out = outbound(&self.connection, &self.log);
        self.turns.talk_up(self.state, &out);
    }

    pub fn cancel_assistant_speech(&mut self) -> Interruption {
        let out = outbound(&self.connection, &self.log);
        self.turns.cancel_assistant_speech(&out, &self.transcript)
    }

    // -------------------------------------------------------------------------
    // Preferences and agent selection
    // -------------------------------------------------------------------------

    pub fn set_push_to_talk(&mut self, enabled: bool) {
        let out = outbound(&self.connection, &self.log);
        self.turns.set_mode(
            TurnMode::from_push_to_talk(enabled),
            self.state,
            &out,
            &mut self.transcript,
            self.agents.current(),
        );
        self.ui.push_to_talk = enabled;
        self.preferences.set_bool(PUSH_TO_TALK, enabled);
    }

    pub fn set_audio_playback(&mut self, enabled: bool) {
        self.audio.set_playback_enabled(enabled);
        self.ui.audio_playback = enabled;
        self.preferences.set_bool(AUDIO_PLAYBACK, enabled);
    }

    pub fn set_logs_expanded(&mut self, expanded: bool) {
        self.ui.logs_expanded = expanded;
        self.preferences.set_bool(LOGS_EXPANDED, expanded);
    }

    /// Switches agent. While connected the new agent is pushed at once and
    /// greets the user.
    pub fn select_agent(&mut self, name: &str) -> bool {
        if self.agents.selected_name() == Some(name) {
            return true;
        }
        if !self.agents.select(name) {
            tracing::warn!(agent = name, "unknown agent");
            return false;
        }
        tracing::info!(agent = name, "agent selected");
        if self.state == SessionState::Connected {
            self.configure_session(true);
        }
        true
    }
}

async fn establish(
    credentials: &dyn CredentialSource,
    connector: &dyn Connector,
    audio: AudioSink,
    signals: SignalSink,
) -> Result<Connection, ConnectError> {
    let credential = credentials.fetch().await?.ok_or(ConnectError::NoCredential)?;
    connector.establish(credential, audio, signals).await
}
