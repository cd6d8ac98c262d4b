//! Game Boy Advance player front-end.
//!
//! Emulation itself is delegated to an external core reached through the
//! [`GbaCore`] capability interface. This crate owns everything around it:
//! translating keyboard, gamepad, and touch input into [`GbaButton`]s,
//! persisting save states per ROM and slot, and the [`Player`] state machine
//! that ties them together.
//!
//! Platform glue (DOM listeners, `localStorage`, the JS core module) lives in
//! the `gba-frontend-wasm` crate. The `native` feature adds a `gilrs` gamepad
//! source, a directory-backed storage, and a system clock.

mod button;
pub mod capture;
mod clock;
mod config;
pub mod emulator;
mod error;
pub mod gamepad;
pub mod keymap;
mod player;
mod rom;
pub mod store;
pub mod touch;

pub use button::{ButtonEvent, GbaButton};
pub use capture::{FrameSurface, RenderSurface, Screenshot};
pub use clock::Clock;
#[cfg(feature = "native")]
pub use clock::SystemClock;
pub use config::{AutoSaveConfig, PlayerConfig};
pub use emulator::{
    CoreFuture, CoreModule, CoreValue, EmulatorStatus, GbaCore, ModuleCore, ModuleFactory,
    SaveSlot, SavedState, TurboRate,
};
pub use error::{
    CaptureError, ConfigError, CoreError, ParseButtonError, PlayerError, RomError, StoreError,
};
#[cfg(feature = "native")]
pub use gamepad::gilrs_source::GilrsSource;
pub use gamepad::{ControllerStatus, GamepadMapper, GamepadMapping, GamepadState};
pub use keymap::{KeyAction, KeyHint, Keymap};
pub use player::{PendingLoad, PendingSave, Player, SettledLoad, SettledSave};
pub use rom::{ROM_EXTENSION, RomIdentity, RomImage, format_byte_count};
#[cfg(feature = "native")]
pub use store::FileStorage;
pub use store::{MemoryStorage, SaveMeta, SaveStateStore, Storage};
pub use touch::{LAYOUT, PointerPhase, TouchButtonSpec, TouchGroup, TouchOverlay, TouchResponse};
