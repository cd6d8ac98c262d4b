//! Player preferences, read from JSON.
//!
//! ```json
//! {
//!   "audioEnabled": true,
//!   "turbo": 2,
//!   "autoSave": { "enabled": true, "slot": 1 },
//!   "keymap": { "KeyJ": "A" }
//! }
//! ```
//!
//! Every field is optional.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::button::GbaButton;
use crate::emulator::{SaveSlot, TurboRate};
use crate::error::ConfigError;
use crate::gamepad::GamepadMapping;
use crate::keymap::Keymap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    pub slot: SaveSlot,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slot: SaveSlot::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    pub audio_enabled: bool,
    pub turbo: TurboRate,
    pub auto_save: AutoSaveConfig,
    pub gamepad: GamepadMapping,
    /// Key code → button overrides on top of the default table.
    pub keymap: BTreeMap<String, GbaButton>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            turbo: TurboRate::X1,
            auto_save: AutoSaveConfig::default(),
            gamepad: GamepadMapping::default(),
            keymap: BTreeMap::new(),
        }
    }
}

impl PlayerConfig {
    /// # Errors
    ///
    /// [`ConfigError::Json`] for malformed JSON or out-of-range values
    /// (e.g. `"turbo": 3`).
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse, falling back to defaults (with a warning) on any error.
    #[must_use]
    pub fn from_json_or_default(text: &str) -> Self {
        Self::from_json(text).unwrap_or_else(|e| {
            warn!("{e}; using default settings");
            Self::default()
        })
    }

    /// Key table with the configured overrides applied.
    #[must_use]
    pub fn keymap(&self) -> Keymap {
        Keymap::with_overrides(&self.keymap)
    }
}
