//! Session core for a realtime voice/text presentation assistant.
//!
//! The assistant talks with the user over a realtime event channel and edits
//! a slide deck through function calls.

pub mod agent;
pub mod channel;
pub mod config;
pub mod credential;
pub mod deck;
pub mod error;
pub mod navigate;
pub mod prefs;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transcript;
pub mod transport;
pub mod turns;

pub use agent::{AgentCatalog, AgentConfig, AgentSelection};
pub use channel::{ChannelSignal, EventChannel, EventLog, LoggedEvent, MemoryChannel};
pub use config::Config;
pub use credential::{CredentialSource, HttpCredentialSource, StaticCredential};
pub use deck::{Deck, DispatchOutcome, SlideData, SlideTemplate};
pub use error::{ConnectError, ValidationError, ValidationKind};
pub use navigate::{Navigator, WatchNavigator};
pub use session::{Session, SessionInbox, SessionInput, SessionParts, SessionState};
pub use transport::{AudioSink, Connection, Connector, MediaTransport, SignalSink, WebSocketConnector};
pub use turns::{TurnController, TurnMode};
