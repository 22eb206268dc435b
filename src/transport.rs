//! Transport establishment.
//!
//! A [`Connector`] turns an ephemeral credential into a media transport plus
//! an [`EventChannel`]. Whatever the channel reports (open, frames, close,
//! errors) is pushed into the session inbox through a [`SignalSink`] that is
//! stamped with the connect attempt it belongs to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::channel::{ChannelSignal, EventChannel};
use crate::error::{ChannelError, ConnectError};
use crate::session::SessionInput;

pub const DEFAULT_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// How long the writer may take to flush queued frames after close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Handle to wherever assistant audio is played.
#[derive(Debug, Clone, Default)]
pub struct AudioSink {
    playback: Arc<AtomicBool>,
}

impl AudioSink {
    pub fn new(playback_enabled: bool) -> Self {
        Self {
            playback: Arc::new(AtomicBool::new(playback_enabled)),
        }
    }

    pub fn playback_enabled(&self) -> bool {
        self.playback.load(Ordering::SeqCst)
    }

    pub fn set_playback_enabled(&self, enabled: bool) {
        self.playback.store(enabled, Ordering::SeqCst);
    }
}

/// Delivers channel signals into the session inbox for one connect attempt.
#[derive(Debug, Clone)]
pub struct SignalSink {
    generation: u64,
    inbox: mpsc::UnboundedSender<SessionInput>,
}

impl SignalSink {
    pub(crate) fn new(generation: u64, inbox: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { generation, inbox }
    }

    /// Returns false once the session is gone.
    pub fn signal(&self, signal: ChannelSignal) -> bool {
        self.inbox
            .send(SessionInput::Channel {
                generation: self.generation,
                signal,
            })
            .is_ok()
    }
}

/// The media side of an established session.
pub trait MediaTransport: Send + Sync {
    /// Stops every outbound media source (microphone tracks).
    fn stop_tracks(&self);

    fn close(&self);
}

pub struct Connection {
    pub transport: Box<dyn MediaTransport>,
    pub channel: Arc<dyn EventChannel>,
}

impl Connection {
    /// Stops outbound media, then closes the channel before the transport so a
    /// close frame can still go out.
    pub fn release(self) {
        self.transport.stop_tracks();
        self.channel.close();
        self.transport.close();
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn establish(
        &self,
        credential: String,
        audio: AudioSink,
        signals: SignalSink,
    ) -> Result<Connection, ConnectError>;
}

// =============================================================================
// WebSocket connector
// =============================================================================

/// Opens the backend's realtime WebSocket endpoint with the ephemeral key.
///
/// Only the control-plane events travel here; this connector carries no
/// microphone track, so `stop_tracks` has nothing to stop.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    model: String,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REALTIME_URL, DEFAULT_REALTIME_MODEL)
    }
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}?model={}", self.url, self.model)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn establish(
        &self,
        credential: String,
        _audio: AudioSink,
        signals: SignalSink,
    ) -> Result<Connection, ConnectError> {
        let mut request = self.endpoint().into_client_request()?;
        let authorization = HeaderValue::from_str(&format!("Bearer {}", credential))
            .map_err(|err| ConnectError::Transport(err.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", authorization);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!(endpoint = %self.endpoint(), "connected to realtime endpoint");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let open = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(err) = ws_sink.send(message).await {
                    tracing::error!("Failed to send WebSocket message: {}", err);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_open = open.clone();
        let pong = outgoing.clone();
        let reader = tokio::spawn(async move {
            signals.signal(ChannelSignal::Open);
            while let Some(message) = ws_stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if !signals.signal(ChannelSignal::Message(text.as_str().to_string())) {
                            break;
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = pong.send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!("WebSocket error: {}", err);
                        reader_open.store(false, Ordering::SeqCst);
                        signals.signal(ChannelSignal::Error(err.to_string()));
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            signals.signal(ChannelSignal::Close);
        });

        Ok(Connection {
            transport: Box::new(WebSocketTransport {
                reader,
                writer: Mutex::new(Some(writer)),
            }),
            channel: Arc::new(WebSocketChannel { outgoing, open }),
        })
    }
}

struct WebSocketChannel {
    outgoing: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl EventChannel for WebSocketChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: String) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen);
        }
        self.outgoing
            .send(Message::Text(text.into()))
            .map_err(|_| ChannelError::NotOpen)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.outgoing.send(Message::Close(None));
        }
    }
}

struct WebSocketTransport {
    reader: JoinHandle<()>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl MediaTransport for WebSocketTransport {
    fn stop_tracks(&self) {}

    /// Stops reading at once. The writer exits by itself after sending the
    /// close frame; it is aborted only if that takes longer than the grace.
    fn close(&self) {
        self.reader.abort();

        let writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(mut writer) = writer else {
            return;
        };
        tokio::spawn(async move {
            if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                tracing::warn!("WebSocket writer did not finish closing, aborting");
                writer.abort();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn endpoint_carries_model() {
        let connector = WebSocketConnector::new("wss://rt.example/v1/realtime", "rt-model");
        assert_eq!(connector.endpoint(), "wss://rt.example/v1/realtime?model=rt-model");
    }

    #[test]
    fn audio_sink_clones_share_playback_flag() {
        let sink = AudioSink::new(false);
        let handle = sink.clone();
        handle.set_playback_enabled(true);
        assert!(sink.playback_enabled());
    }

    #[tokio::test]
    async fn signals_are_stamped_with_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = SignalSink::new(7, tx);
        assert!(sink.signal(ChannelSignal::Open));

        match rx.recv().await.unwrap() {
            SessionInput::Channel { generation, signal } => {
                assert_eq!(generation, 7);
                assert_eq!(signal, ChannelSignal::Open);
            }
            _ => panic!("expected channel input"),
        }
    }

    #[tokio::test]
    async fn release_sends_close_frame_before_teardown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut seen = Vec::new();
            while let Some(message) = ws.next().await {
                match message {
                    Ok(Message::Close(_)) => {
                        seen.push("close".to_string());
                        break;
                    }
                    Ok(other) => seen.push(format!("{:?}", other)),
                    Err(err) => {
                        seen.push(format!("error: {}", err));
                        break;
                    }
                }
            }
            seen
        });

        let connector = WebSocketConnector::new(format!("ws://{}/v1/realtime", addr), "rt-model");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = connector
            .establish("ek_test".to_string(), AudioSink::default(), SignalSink::new(1, tx))
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            SessionInput::Channel { signal, .. } => assert_eq!(signal, ChannelSignal::Open),
            _ => panic!("expected open signal"),
        }
        assert!(connection.channel.is_open());

        connection.release();

        let seen = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, vec!["close".to_string()]);
    }
}
