//! Core Capability Interface.
//!
//! The emulation engine itself is an opaque external binary. The player only
//! depends on the capability set below: lifecycle, button delivery, and
//! save/load by slot, plus best-effort audio and turbo controls that a core
//! may not provide.
//!
//! State saves and loads may finish after the call returns (a core whose
//! bytes API answers with a promise). They hand back a [`CoreFuture`] that
//! owns everything it needs, so the caller can let go of the core while it
//! waits.

pub mod module;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::button::GbaButton;
use crate::error::CoreError;

pub use module::{CoreModule, CoreValue, ModuleCore, ModuleFactory};

/// Emulator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmulatorStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl EmulatorStatus {
    /// Capitalised form for the status line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Paused => "Paused",
        }
    }
}

impl fmt::Display for EmulatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        })
    }
}

/// One of three save buckets per ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SaveSlot(u8);

impl SaveSlot {
    pub const ALL: [Self; 3] = [Self(1), Self(2), Self(3)];

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for SaveSlot {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u8> for SaveSlot {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        if (1..=3).contains(&n) {
            Ok(Self(n))
        } else {
            Err(format!("save slot must be 1, 2 or 3 (got {n})"))
        }
    }
}

impl From<SaveSlot> for u8 {
    fn from(slot: SaveSlot) -> Self {
        slot.0
    }
}

impl fmt::Display for SaveSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested emulation speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TurboRate {
    #[default]
    X1,
    X2,
    X4,
}

impl TurboRate {
    pub const ALL: [Self; 3] = [Self::X1, Self::X2, Self::X4];

    #[must_use]
    pub const fn multiplier(self) -> u8 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }
}

impl TryFrom<u8> for TurboRate {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            _ => Err(format!("turbo rate must be 1, 2 or 4 (got {n})")),
        }
    }
}

impl From<TurboRate> for u8 {
    fn from(rate: TurboRate) -> Self {
        rate.multiplier()
    }
}

impl fmt::Display for TurboRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

/// A core operation that may settle later.
pub type CoreFuture<T> = Pin<Box<dyn Future<Output = Result<T, CoreError>>>>;

/// A [`CoreFuture`] that has already settled.
pub fn ready<T: 'static>(result: Result<T, CoreError>) -> CoreFuture<T> {
    Box::pin(std::future::ready(result))
}

/// Outcome of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedState {
    /// The core handed the serialized state back to the caller.
    Bytes(Vec<u8>),
    /// The core kept the state in its own storage.
    Internal,
}

/// Capabilities the player expects of an emulation core.
///
/// Lifecycle and input methods are infallible from the caller's view: a core
/// that cannot honour them logs and carries on. Only ROM loading and state
/// save/load report failure.
pub trait GbaCore {
    /// Rendering target the core draws into.
    type Surface;

    fn status(&self) -> EmulatorStatus;

    fn attach_surface(&mut self, surface: Self::Surface);

    /// Load ROM bytes and start running.
    ///
    /// # Errors
    ///
    /// [`CoreError::SurfaceNotAttached`] when no surface was attached, or
    /// whatever the core reports while loading.
    fn load_rom(&mut self, rom: &[u8], file_name: Option<&str>) -> Result<(), CoreError>;

    fn start(&mut self);

    fn pause(&mut self);

    /// Reload the current ROM and run.
    fn reset(&mut self);

    fn press(&mut self, button: GbaButton);

    fn release(&mut self, button: GbaButton);

    /// Snapshot the machine state for `slot`. The future resolves to the
    /// core's own failure when the save is refused.
    fn save_state(&mut self, slot: SaveSlot) -> CoreFuture<SavedState>;

    /// Restore `slot`. `bytes` is the blob a previous save returned, when the
    /// core works with bytes; `None` asks the core to use its own storage.
    /// A slot the core has nothing for resolves to
    /// [`CoreError::NoSaveData`].
    fn load_state(&mut self, slot: SaveSlot, bytes: Option<&[u8]>) -> CoreFuture<()>;

    /// Whether [`save_state`](Self::save_state) hands back bytes.
    fn supports_state_bytes(&self) -> bool {
        false
    }

    fn set_audio_enabled(&mut self, _enabled: bool) {}

    fn set_turbo(&mut self, _rate: TurboRate) {}

    /// Rate the core reports it is running at, if it can tell. Cores that
    /// only accept a rate report the one last applied.
    fn turbo(&self) -> Option<TurboRate> {
        None
    }
}
