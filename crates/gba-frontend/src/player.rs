//! Player orchestration.
//!
//! [`Player`] owns the core instance and all transient UI state: status,
//! status message, ROM identity, and preferences. Input sources and
//! lifecycle hooks reach the core only through it.
//!
//! Status transitions:
//! - idle → running: successful upload and core load
//! - running ↔ paused: [`Player::toggle_run`]
//! - any → running: [`Player::reset`] (reload and run, never back to idle)
//!
//! While idle every interactive control is a no-op. Save and load also need
//! a hashed ROM; without one they report "Load a ROM first." and leave the
//! core untouched.
//!
//! Saves and loads run in three steps so the core may answer
//! asynchronously without the player being borrowed meanwhile:
//! `begin_*` hands the request to the core, `settle` waits on the returned
//! pending value, and `finish_*` records the outcome. [`Player::save`] and
//! [`Player::load`] chain the three for callers that can hold the player
//! across the wait.

use log::{debug, error, info, warn};

use crate::button::{ButtonEvent, GbaButton};
use crate::capture::{RenderSurface, Screenshot, screenshot_file_name};
use crate::clock::Clock;
use crate::config::{AutoSaveConfig, PlayerConfig};
use crate::emulator::{CoreFuture, EmulatorStatus, GbaCore, SaveSlot, SavedState, TurboRate};
use crate::error::{CaptureError, CoreError, PlayerError};
use crate::gamepad::{ControllerStatus, GamepadMapper, GamepadState};
use crate::keymap::{KeyHint, Keymap};
use crate::rom::{RomIdentity, RomImage, check_extension, format_byte_count};
use crate::store::{SaveMeta, SaveStateStore, Storage};
use crate::touch::{PointerPhase, TouchOverlay, TouchResponse};

const MSG_START: &str = "Upload a .gba ROM to begin.";
const MSG_CORE_READY: &str = "mGBA core ready. Upload a .gba ROM.";
const MSG_WRONG_FILE: &str = "Please upload a .gba file.";
const MSG_NEED_ROM: &str = "Load a ROM first.";

/// Name and identity of the uploaded ROM.
#[derive(Debug, Clone)]
struct LoadedRom {
    name: String,
    identity: RomIdentity,
}

/// Where a save lands, fixed when it starts.
#[derive(Debug, Clone)]
struct SaveTarget {
    rom: LoadedRom,
    slot: SaveSlot,
    auto: bool,
}

/// A save handed to the core, still waiting for the state.
///
/// Owns nothing borrowed from the [`Player`]. Await [`settle`](Self::settle)
/// and pass the result to [`Player::finish_save`].
#[must_use = "a save is only recorded once settled and finished"]
pub struct PendingSave {
    target: SaveTarget,
    state: CoreFuture<SavedState>,
}

impl PendingSave {
    pub fn slot(&self) -> SaveSlot {
        self.target.slot
    }

    pub async fn settle(self) -> SettledSave {
        SettledSave {
            target: self.target,
            result: self.state.await,
        }
    }
}

/// A save whose core call has finished.
#[must_use = "pass to Player::finish_save"]
pub struct SettledSave {
    target: SaveTarget,
    result: Result<SavedState, CoreError>,
}

/// A state load handed to the core.
#[must_use = "a load is only reported once settled and finished"]
pub struct PendingLoad {
    slot: SaveSlot,
    state: CoreFuture<()>,
}

impl PendingLoad {
    pub fn slot(&self) -> SaveSlot {
        self.slot
    }

    pub async fn settle(self) -> SettledLoad {
        SettledLoad {
            slot: self.slot,
            result: self.state.await,
        }
    }
}

/// A load whose core call has finished.
#[must_use = "pass to Player::finish_load"]
pub struct SettledLoad {
    slot: SaveSlot,
    result: Result<(), CoreError>,
}

/// The front-end state machine.
pub struct Player<C: GbaCore, S: Storage, K: Clock> {
    core: Option<C>,
    store: SaveStateStore<S>,
    clock: K,
    status: EmulatorStatus,
    message: String,
    rom: Option<LoadedRom>,
    audio_enabled: bool,
    turbo: TurboRate,
    auto_save: AutoSaveConfig,
    keymap: Keymap,
    gamepad: GamepadMapper,
    controller: ControllerStatus,
    touch: TouchOverlay,
    events: Vec<ButtonEvent>,
    saving: bool,
    last_updated_at: u64,
}

impl<C: GbaCore, S: Storage, K: Clock> Player<C, S, K> {
    pub fn new(config: PlayerConfig, storage: S, clock: K) -> Self {
        Self {
            core: None,
            store: SaveStateStore::new(storage),
            clock,
            status: EmulatorStatus::Idle,
            message: MSG_START.to_string(),
            rom: None,
            audio_enabled: config.audio_enabled,
            turbo: config.turbo,
            auto_save: config.auto_save.clone(),
            keymap: config.keymap(),
            gamepad: GamepadMapper::new(config.gamepad),
            controller: ControllerStatus::Disconnected,
            touch: TouchOverlay::new(),
            events: Vec::new(),
            saving: false,
            last_updated_at: 0,
        }
    }

    // ---- Core lifecycle ----

    /// Install the core once it has been created (or report why it could
    /// not be).
    pub fn init_core(&mut self, result: Result<C, CoreError>, surface: Option<C::Surface>) {
        match result {
            Ok(mut core) => {
                if let Some(surface) = surface {
                    core.attach_surface(surface);
                }
                core.set_audio_enabled(self.audio_enabled);
                core.set_turbo(self.turbo);
                self.core = Some(core);
                info!("Core ready");
                self.message = MSG_CORE_READY.to_string();
            }
            Err(e) => {
                error!("Core init failed: {e}");
                self.message = format!("Failed to init core: {e}");
            }
        }
    }

    /// Check an upload's file name before anything reads the file.
    ///
    /// A wrong extension sets the "wrong file" message and returns false.
    pub fn accept_rom_name(&mut self, file_name: &str) -> bool {
        match check_extension(file_name) {
            Ok(()) => true,
            Err(e) => {
                warn!("Rejected upload: {e}");
                self.message = MSG_WRONG_FILE.to_string();
                false
            }
        }
    }

    /// Accept an uploaded file and start it.
    ///
    /// The ROM becomes current only once the core has loaded it (or when no
    /// core exists yet); a failed load leaves the previous ROM in place.
    pub fn upload(&mut self, file_name: &str, bytes: Vec<u8>) {
        if !self.accept_rom_name(file_name) {
            return;
        }
        let rom = match RomImage::new(file_name, bytes) {
            Ok(rom) => rom,
            Err(e) => {
                warn!("Rejected upload: {e}");
                self.message = MSG_WRONG_FILE.to_string();
                return;
            }
        };

        self.message = format!(
            "ROM loaded: {} ({} bytes)",
            rom.name(),
            format_byte_count(rom.bytes().len())
        );
        info!("ROM {} identity {}", rom.name(), rom.identity());
        let loaded = LoadedRom {
            name: rom.name().to_string(),
            identity: rom.identity().clone(),
        };

        let Some(core) = self.core.as_mut() else {
            warn!("ROM uploaded before the core was ready");
            self.rom = Some(loaded);
            return;
        };
        match core.load_rom(rom.bytes(), Some(rom.name())) {
            Ok(()) => {
                self.rom = Some(loaded);
                self.status = core.status();
                core.set_audio_enabled(self.audio_enabled);
                core.set_turbo(self.turbo);
            }
            Err(e) => {
                error!("ROM load failed: {e}");
                self.message = format!("Failed to start core: {e}");
            }
        }
    }

    /// Pause when running, resume otherwise.
    pub fn toggle_run(&mut self) {
        if !self.can_interact() {
            return;
        }
        let Some(core) = self.core.as_mut() else {
            return;
        };
        if core.status() == EmulatorStatus::Running {
            core.pause();
            self.status = EmulatorStatus::Paused;
            core.set_audio_enabled(self.audio_enabled);
            self.message = "Paused.".to_string();
        } else {
            core.start();
            self.status = EmulatorStatus::Running;
            core.set_audio_enabled(self.audio_enabled);
            self.message = "Running.".to_string();
        }
    }

    pub fn reset(&mut self) {
        if !self.can_interact() {
            return;
        }
        let Some(core) = self.core.as_mut() else {
            return;
        };
        core.reset();
        self.status = core.status();
        core.set_audio_enabled(self.audio_enabled);
        self.message = "Reset.".to_string();
    }

    // ---- Save states ----

    /// The current ROM, if save/load may proceed.
    fn save_target(&mut self) -> Option<LoadedRom> {
        let rom = self
            .rom
            .clone()
            .filter(|_| self.status != EmulatorStatus::Idle && self.core.is_some());
        if rom.is_none() {
            self.message = MSG_NEED_ROM.to_string();
        }
        rom
    }

    /// Ask the core for a snapshot of `slot`.
    ///
    /// `None` when gated (see the module docs) or while another save is in
    /// flight; a second concurrent save is dropped, not queued.
    pub fn begin_save(&mut self, slot: SaveSlot) -> Option<PendingSave> {
        let rom = self.save_target()?;
        self.start_save(rom, slot, false)
    }

    fn start_save(&mut self, rom: LoadedRom, slot: SaveSlot, auto: bool) -> Option<PendingSave> {
        if self.saving {
            debug!("Save to slot {slot} dropped: another save is in flight");
            return None;
        }
        let core = self.core.as_mut()?;
        self.saving = true;
        Some(PendingSave {
            target: SaveTarget { rom, slot, auto },
            state: core.save_state(slot),
        })
    }

    /// Store what the core handed back and report. Returns whether the save
    /// was written.
    pub fn finish_save(&mut self, settled: SettledSave) -> bool {
        self.saving = false;
        let SettledSave { target, result } = settled;
        let slot = target.slot;
        let written = result
            .map_err(PlayerError::from)
            .and_then(|state| self.persist(&target, state));

        match written {
            Ok(()) if target.auto => {
                self.message = format!("Auto-saved (slot {slot}).");
                true
            }
            Ok(()) => {
                info!("Saved state to slot {slot}");
                self.message = format!("Saved state to slot {slot}.");
                true
            }
            Err(e) if target.auto => {
                warn!("Auto-save to slot {slot} failed: {e}");
                false
            }
            Err(e) => {
                error!("Save to slot {slot} failed: {e}");
                self.message = format!("Save failed: {e}");
                false
            }
        }
    }

    fn persist(&mut self, target: &SaveTarget, state: SavedState) -> Result<(), PlayerError> {
        let identity = &target.rom.identity;
        if let SavedState::Bytes(bytes) = state {
            self.store.put_save_state(identity, target.slot, &bytes)?;
        }
        let meta = SaveMeta {
            rom_hash: identity.clone(),
            rom_name: target.rom.name.clone(),
            updated_at: self.next_timestamp(identity),
            last_slot: Some(target.slot),
        };
        self.store.put_meta(&meta)?;
        self.last_updated_at = meta.updated_at;
        Ok(())
    }

    /// Save to `slot`, waiting on the core.
    pub async fn save(&mut self, slot: SaveSlot) {
        if let Some(pending) = self.begin_save(slot) {
            let settled = pending.settle().await;
            self.finish_save(settled);
        }
    }

    /// Wall-clock millis, forced past every timestamp already recorded for
    /// this ROM.
    fn next_timestamp(&self, identity: &RomIdentity) -> u64 {
        let stored = match self.store.get_meta(identity) {
            Ok(meta) => meta.map_or(0, |m| m.updated_at),
            Err(e) => {
                warn!("Could not read save metadata: {e}");
                0
            }
        };
        self.clock
            .now_millis()
            .max(self.last_updated_at.saturating_add(1))
            .max(stored.saturating_add(1))
    }

    /// Hand `slot` back to the core.
    ///
    /// `None` when gated, or when the store has nothing for the slot (the
    /// message already says so).
    pub fn begin_load(&mut self, slot: SaveSlot) -> Option<PendingLoad> {
        let rom = self.save_target()?;
        let core = self.core.as_mut()?;
        let state = if core.supports_state_bytes() {
            match self.store.get_save_state(&rom.identity, slot) {
                Ok(Some(bytes)) => core.load_state(slot, Some(&bytes)),
                Ok(None) => {
                    self.message = format!("No save data in slot {slot}.");
                    return None;
                }
                Err(e) => {
                    error!("Load from slot {slot} failed: {e}");
                    self.message = format!("Load failed: {e}");
                    return None;
                }
            }
        } else {
            core.load_state(slot, None)
        };
        Some(PendingLoad { slot, state })
    }

    /// Report a settled load. Returns whether the state was restored.
    pub fn finish_load(&mut self, settled: SettledLoad) -> bool {
        let slot = settled.slot;
        match settled.result {
            Ok(()) => {
                info!("Loaded state from slot {slot}");
                self.message = format!("Loaded state from slot {slot}.");
                // Restoring a state can bring the core's audio back on.
                if let Some(core) = self.core.as_mut() {
                    core.set_audio_enabled(self.audio_enabled);
                }
                true
            }
            Err(CoreError::NoSaveData(_)) => {
                self.message = format!("No save data in slot {slot}.");
                false
            }
            Err(e) => {
                error!("Load from slot {slot} failed: {e}");
                self.message = format!("Load failed: {e}");
                false
            }
        }
    }

    /// Load `slot`, waiting on the core.
    pub async fn load(&mut self, slot: SaveSlot) {
        if let Some(pending) = self.begin_load(slot) {
            let settled = pending.settle().await;
            self.finish_load(settled);
        }
    }

    /// Start the best-effort checkpoint taken when the page goes away.
    ///
    /// Runs only with auto-save enabled, a ROM running or paused, and no
    /// save already in flight. Failures are logged and swallowed by
    /// [`finish_save`](Self::finish_save).
    pub fn begin_auto_save(&mut self) -> Option<PendingSave> {
        if !self.auto_save.enabled || self.status == EmulatorStatus::Idle {
            return None;
        }
        let rom = self.rom.clone()?;
        self.start_save(rom, self.auto_save.slot, true)
    }

    /// Run the close-time checkpoint to completion. Returns whether a save
    /// was written.
    pub async fn auto_save_on_close(&mut self) -> bool {
        let Some(pending) = self.begin_auto_save() else {
            return false;
        };
        let settled = pending.settle().await;
        self.finish_save(settled)
    }

    // ---- Preferences ----

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
        if let Some(core) = self.core.as_mut() {
            core.set_audio_enabled(enabled);
        }
    }

    pub fn set_turbo(&mut self, rate: TurboRate) {
        self.turbo = rate;
        if let Some(core) = self.core.as_mut() {
            core.set_turbo(rate);
        }
    }

    pub fn set_auto_save_enabled(&mut self, enabled: bool) {
        self.auto_save.enabled = enabled;
    }

    pub fn set_auto_save_slot(&mut self, slot: SaveSlot) {
        self.auto_save.slot = slot;
    }

    // ---- Input ----

    pub fn press(&mut self, button: GbaButton) {
        if let Some(core) = self.core.as_mut() {
            core.press(button);
        }
    }

    pub fn release(&mut self, button: GbaButton) {
        if let Some(core) = self.core.as_mut() {
            core.release(button);
        }
    }

    fn deliver(&mut self, event: ButtonEvent) {
        if event.pressed {
            self.press(event.button);
        } else {
            self.release(event.button);
        }
    }

    /// Handle a key-down. Returns true when the browser's default action
    /// should be suppressed.
    pub fn key_down(&mut self, code: &str) -> bool {
        if self.core.is_none() {
            return false;
        }
        let Some(action) = self.keymap.key_down(code) else {
            return false;
        };
        self.press(action.button);
        action.prevent_default
    }

    pub fn key_up(&mut self, code: &str) {
        if self.core.is_none() {
            return;
        }
        if let Some(button) = self.keymap.key_up(code) {
            self.release(button);
        }
    }

    /// Feed a pointer event from an on-screen control.
    pub fn pointer(
        &mut self,
        button: GbaButton,
        pointer_id: i32,
        phase: PointerPhase,
    ) -> Option<TouchResponse> {
        let response = self.touch.handle(button, pointer_id, phase)?;
        self.deliver(response.event);
        Some(response)
    }

    /// Release every held on-screen control (teardown).
    pub fn release_touch(&mut self) {
        let mut events = std::mem::take(&mut self.events);
        self.touch.release_all(&mut events);
        for event in events.drain(..) {
            self.deliver(event);
        }
        self.events = events;
    }

    pub fn gamepad_connected(&mut self, index: usize) {
        self.gamepad.on_connected(index);
    }

    pub fn gamepad_disconnected(&mut self) {
        self.gamepad.on_disconnected();
        self.controller = ControllerStatus::Disconnected;
    }

    /// One animation-frame gamepad poll.
    pub fn poll_gamepads(&mut self, pads: &[GamepadState]) -> &ControllerStatus {
        let mut events = std::mem::take(&mut self.events);
        self.controller = self.gamepad.poll(pads, &mut events);
        for event in events.drain(..) {
            self.deliver(event);
        }
        self.events = events;
        &self.controller
    }

    // ---- Surface ----

    /// Screenshot of `surface`, or `None` while idle.
    ///
    /// # Errors
    ///
    /// Surface encoding failure.
    pub fn screenshot(
        &self,
        surface: &impl RenderSurface,
    ) -> Result<Option<Screenshot>, CaptureError> {
        if !self.can_interact() {
            return Ok(None);
        }
        let data_url = surface.to_png_data_url()?;
        Ok(Some(Screenshot {
            file_name: screenshot_file_name(self.rom_name()),
            data_url,
        }))
    }

    pub fn fullscreen(&self, surface: &impl RenderSurface) {
        if self.can_interact() {
            surface.request_fullscreen();
        }
    }

    // ---- Accessors ----

    pub fn status(&self) -> EmulatorStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Controls other than upload are enabled.
    pub fn can_interact(&self) -> bool {
        self.status != EmulatorStatus::Idle
    }

    pub fn rom_name(&self) -> Option<&str> {
        self.rom.as_ref().map(|r| r.name.as_str())
    }

    pub fn rom_identity(&self) -> Option<&RomIdentity> {
        self.rom.as_ref().map(|r| &r.identity)
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// Rate the core reports, else the requested one.
    pub fn turbo(&self) -> TurboRate {
        self.core
            .as_ref()
            .and_then(GbaCore::turbo)
            .unwrap_or(self.turbo)
    }

    pub fn auto_save(&self) -> &AutoSaveConfig {
        &self.auto_save
    }

    pub fn controller(&self) -> &ControllerStatus {
        &self.controller
    }

    pub fn keyboard_hints(&self) -> Vec<KeyHint> {
        self.keymap.hints()
    }

    /// Stored metadata for the current ROM.
    pub fn save_meta(&self) -> Option<SaveMeta> {
        let identity = self.rom_identity()?;
        self.store.get_meta(identity).unwrap_or_else(|e| {
            warn!("Could not read save metadata: {e}");
            None
        })
    }

    /// Whether the store holds a blob for `slot` of the current ROM.
    pub fn has_save(&self, slot: SaveSlot) -> bool {
        self.rom_identity().is_some_and(|identity| {
            self.store
                .has_save_state(identity, slot)
                .unwrap_or_else(|e| {
                    warn!("Could not read save slot {slot}: {e}");
                    false
                })
        })
    }

    pub fn core(&self) -> Option<&C> {
        self.core.as_ref()
    }

    pub fn core_mut(&mut self) -> Option<&mut C> {
        self.core.as_mut()
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }
}
