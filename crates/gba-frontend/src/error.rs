//! Error types, one per layer.
//!
//! The player is the only place these turn into user-facing text, so the
//! `Display` strings are written to be shown after "Save failed: " and
//! friends.

use thiserror::Error;

use crate::emulator::SaveSlot;

/// Failure reported by (or about) the emulation core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Canvas not attached")]
    SurfaceNotAttached,
    #[error("No ROM loaded")]
    NotLoaded,
    #[error("No save data in slot {0}")]
    NoSaveData(SaveSlot),
    #[error("core does not provide {0}")]
    Unsupported(&'static str),
    #[error("{method}: {message}")]
    Call { method: String, message: String },
    /// The host failed to create the core at all.
    #[error("{0}")]
    Init(String),
}

impl CoreError {
    /// Wrap a message thrown by a named core method.
    pub fn call(method: &str, message: impl Into<String>) -> Self {
        Self::Call {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

/// Failure in the save-state persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),
    #[error("stored save state is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("could not encode metadata: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected ROM upload.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("{0} is not a .gba file")]
    WrongExtension(String),
}

/// Screenshot encoding failure.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("PNG encode error: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("frame buffer is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("frame of {width}x{height} pixels is too large")]
    TooLarge { width: u32, height: u32 },
    #[error("surface: {0}")]
    Surface(String),
}

/// Configuration could not be parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid player config: {0}")]
    Json(#[from] serde_json::Error),
}

/// A button name outside the ten-button vocabulary.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown button '{0}'")]
pub struct ParseButtonError(pub String);

/// Anything a save or load round-trip through core and store can hit.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
