//! Error types shared across the session core.
//!
//! Connection errors are fatal to one connect attempt and always leave the
//! session DISCONNECTED. Validation errors are local to one function call and
//! never touch the deck. Channel errors are logged and dropped by the sender.

use std::fmt;

use thiserror::Error;

/// Failure of a single connect attempt.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The credential endpoint answered without a usable secret.
    #[error("No ephemeral key provided by the server")]
    NoCredential,

    /// The credential endpoint could not be reached or answered with an error status.
    #[error("Credential request failed: {0}")]
    Credential(String),

    /// The transport or event channel could not be established.
    #[error("Transport establishment failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ConnectError {
    fn from(err: reqwest::Error) -> Self {
        ConnectError::Credential(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ConnectError::Transport(err.to_string())
    }
}

/// Failure to hand a frame to an event channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Event channel is not open")]
    NotOpen,
}

/// Which rule a rejected slide edit broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// A paragraph and a non-empty item list on the same slide.
    ParagraphWithItems,
    /// The chosen template cannot show the supplied field.
    TemplateMismatch,
    /// The function arguments did not decode.
    MalformedArguments,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::ParagraphWithItems => "paragraph_with_items",
            ValidationKind::TemplateMismatch => "template_mismatch",
            ValidationKind::MalformedArguments => "malformed_arguments",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slide field a validation error points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideField {
    Items,
    Paragraph,
    Arguments,
}

impl SlideField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideField::Items => "items",
            SlideField::Paragraph => "paragraph",
            SlideField::Arguments => "arguments",
        }
    }
}

impl fmt::Display for SlideField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected slide edit. The deck is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub field: SlideField,
    message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationKind, field: SlideField, message: impl Into<String>) -> Self {
        Self {
            kind,
            field,
            message: message.into(),
        }
    }

    pub fn paragraph_with_items() -> Self {
        Self::new(
            ValidationKind::ParagraphWithItems,
            SlideField::Paragraph,
            "Can't provide both paragraph and items - choose only one",
        )
    }

    pub fn paragraph_template() -> Self {
        Self::new(
            ValidationKind::TemplateMismatch,
            SlideField::Paragraph,
            "If you add a paragraph of text, you need to pick a template that supports a paragraph",
        )
    }

    pub fn items_template() -> Self {
        Self::new(
            ValidationKind::TemplateMismatch,
            SlideField::Items,
            "If you add bullet items, you need to pick a template that supports bullets",
        )
    }

    pub fn malformed(err: serde_json::Error) -> Self {
        Self::new(
            ValidationKind::MalformedArguments,
            SlideField::Arguments,
            format!("Invalid function arguments: {}", err),
        )
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure to read or write the preference store.
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("Preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preference file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
