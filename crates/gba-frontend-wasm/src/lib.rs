//! Browser bindings for the GBA player.
//!
//! The page creates a [`GbaPlayer`] around its canvas, resolves the mGBA
//! module factory itself and hands the module over with
//! [`GbaPlayer::attach_core`]. Keyboard, gamepad, page-lifecycle and
//! on-screen touch listeners are registered here and removed again by
//! [`GbaPlayer::dispose`].
//!
//! Uploads, saves and loads return promises. The player is never borrowed
//! across an await: the core call starts under one borrow and its result
//! is recorded under another.

mod console;
mod gamepad;
mod listeners;
mod module;
mod storage;

use std::cell::RefCell;
use std::rc::Rc;

use gba_frontend::{
    Clock, CoreError, GbaButton, LAYOUT, ModuleCore, PendingLoad, PendingSave, Player,
    PlayerConfig, PointerPhase, SaveSlot, TurboRate,
};
use js_sys::{Array, Object, Promise, Reflect, Uint8Array};
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise, spawn_local};
use web_sys::{
    Document, File, GamepadEvent, HtmlAnchorElement, HtmlCanvasElement, HtmlElement,
    KeyboardEvent, PointerEvent, VisibilityState, Window,
};

pub use console::install_console_log_sink;
use listeners::{FrameLoop, Listener};
use module::{CanvasSurface, JsModuleFactory, describe};
use storage::LocalStorage;

const POINTER_PHASES: [PointerPhase; 4] = [
    PointerPhase::Down,
    PointerPhase::Up,
    PointerPhase::Cancel,
    PointerPhase::Leave,
];

/// `Date.now()` as a save-timestamp source.
struct JsClock;

impl Clock for JsClock {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

type WebPlayer = Player<ModuleCore<JsModuleFactory>, LocalStorage, JsClock>;
type Shared = Rc<RefCell<WebPlayer>>;

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsError::new(&message.to_string()).into()
}

fn slot(n: u8) -> Result<SaveSlot, JsValue> {
    SaveSlot::try_from(n).map_err(js_error)
}

/// Run `f` against the player unless a callback already holds it.
///
/// Browser events can re-enter while another handler is running (a
/// `visibilitychange` fired during a save, for instance). Those are dropped.
fn with_player(player: &Shared, what: &str, f: impl FnOnce(&mut WebPlayer)) {
    match player.try_borrow_mut() {
        Ok(mut p) => f(&mut p),
        Err(_) => debug!("Skipped {what}: player busy"),
    }
}

/// Await a started save and record it. Resolves to whether it was written.
fn finish_save(player: &Shared, pending: Option<PendingSave>) -> Promise {
    let player = Rc::clone(player);
    future_to_promise(async move {
        let Some(pending) = pending else {
            return Ok(JsValue::FALSE);
        };
        let settled = pending.settle().await;
        let written = player.borrow_mut().finish_save(settled);
        Ok(JsValue::from_bool(written))
    })
}

/// Await a started load and report it. Resolves to whether it was restored.
fn finish_load(player: &Shared, pending: Option<PendingLoad>) -> Promise {
    let player = Rc::clone(player);
    future_to_promise(async move {
        let Some(pending) = pending else {
            return Ok(JsValue::FALSE);
        };
        let settled = pending.settle().await;
        let restored = player.borrow_mut().finish_load(settled);
        Ok(JsValue::from_bool(restored))
    })
}

/// Close-time checkpoint. Nothing waits on it; the page may already be gone
/// when the core answers.
fn auto_save(player: &Shared) {
    let mut pending = None;
    with_player(player, "auto-save", |p| pending = p.begin_auto_save());
    let Some(pending) = pending else {
        return;
    };
    let player = Rc::clone(player);
    spawn_local(async move {
        let settled = pending.settle().await;
        player.borrow_mut().finish_save(settled);
    });
}

fn layout_entry(button: &str, label: &str, group: &str) -> Result<JsValue, JsValue> {
    let entry = Object::new();
    Reflect::set(&entry, &"button".into(), &button.into())?;
    Reflect::set(&entry, &"label".into(), &label.into())?;
    Reflect::set(&entry, &"group".into(), &group.into())?;
    Ok(entry.into())
}

/// A GBA player bound to one canvas.
#[wasm_bindgen]
pub struct GbaPlayer {
    player: Shared,
    surface: CanvasSurface,
    window: Window,
    document: Document,
    listeners: Vec<Listener>,
    frame_loop: Option<FrameLoop>,
}

#[wasm_bindgen]
impl GbaPlayer {
    /// Create a player drawing to `canvas`.
    ///
    /// `config` is optional JSON preferences; malformed text falls back to
    /// defaults with a console warning.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement, config: Option<String>) -> Result<GbaPlayer, JsValue> {
        install_console_log_sink();

        let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
        let document = window.document().ok_or_else(|| js_error("no document"))?;
        let config = config
            .as_deref()
            .map(PlayerConfig::from_json_or_default)
            .unwrap_or_default();
        let storage = LocalStorage::open().map_err(js_error)?;
        let player = Rc::new(RefCell::new(Player::new(config, storage, JsClock)));

        let mut this = Self {
            player,
            surface: CanvasSurface::new(canvas),
            window,
            document,
            listeners: Vec::new(),
            frame_loop: None,
        };
        this.install_listeners()?;
        Ok(this)
    }

    /// Install the resolved emulator module.
    #[wasm_bindgen]
    pub fn attach_core(&mut self, module: JsValue) {
        let core = ModuleCore::new(JsModuleFactory::new(module));
        self.player
            .borrow_mut()
            .init_core(Ok(core), Some(self.surface.canvas().clone()));
    }

    /// Report that the module factory rejected.
    #[wasm_bindgen]
    pub fn fail_core(&mut self, message: &str) {
        self.player
            .borrow_mut()
            .init_core(Err(CoreError::Init(message.to_string())), None);
    }

    /// Load an uploaded ROM file.
    ///
    /// The name is checked before the file is read; a wrong extension
    /// resolves at once with the "wrong file" message set.
    #[wasm_bindgen]
    pub fn upload(&self, file: File) -> Promise {
        let name = file.name();
        if !self.player.borrow_mut().accept_rom_name(&name) {
            return Promise::resolve(&JsValue::UNDEFINED);
        }
        let player = Rc::clone(&self.player);
        future_to_promise(async move {
            let buffer = JsFuture::from(file.array_buffer()).await?;
            let bytes = Uint8Array::new(&buffer).to_vec();
            player.borrow_mut().upload(&name, bytes);
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Pause when running, resume when paused.
    #[wasm_bindgen]
    pub fn toggle_run(&mut self) {
        self.player.borrow_mut().toggle_run();
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.player.borrow_mut().reset();
    }

    /// Save to slot 1-3. Resolves to `true` once the state is stored.
    #[wasm_bindgen]
    pub fn save(&self, slot_number: u8) -> Result<Promise, JsValue> {
        let slot = slot(slot_number)?;
        let pending = self.player.borrow_mut().begin_save(slot);
        Ok(finish_save(&self.player, pending))
    }

    /// Load from slot 1-3. Resolves to `true` once the state is restored.
    #[wasm_bindgen]
    pub fn load(&self, slot_number: u8) -> Result<Promise, JsValue> {
        let slot = slot(slot_number)?;
        let pending = self.player.borrow_mut().begin_load(slot);
        Ok(finish_load(&self.player, pending))
    }

    #[wasm_bindgen]
    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.player.borrow_mut().set_audio_enabled(enabled);
    }

    /// Speed multiplier: 1, 2 or 4.
    #[wasm_bindgen]
    pub fn set_turbo(&mut self, rate: u8) -> Result<(), JsValue> {
        let rate = TurboRate::try_from(rate).map_err(js_error)?;
        self.player.borrow_mut().set_turbo(rate);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn set_auto_save_enabled(&mut self, enabled: bool) {
        self.player.borrow_mut().set_auto_save_enabled(enabled);
    }

    #[wasm_bindgen]
    pub fn set_auto_save_slot(&mut self, slot_number: u8) -> Result<(), JsValue> {
        let slot = slot(slot_number)?;
        self.player.borrow_mut().set_auto_save_slot(slot);
        Ok(())
    }

    /// Download the current frame as a PNG. Does nothing while idle.
    #[wasm_bindgen]
    pub fn screenshot(&self) -> Result<(), JsValue> {
        let shot = self.player.borrow().screenshot(&self.surface);
        let Some(shot) = shot.map_err(js_error)? else {
            return Ok(());
        };
        let anchor: HtmlAnchorElement = self.document.create_element("a")?.dyn_into()?;
        anchor.set_href(&shot.data_url);
        anchor.set_download(&shot.file_name);
        anchor.click();
        Ok(())
    }

    #[wasm_bindgen]
    pub fn fullscreen(&self) {
        self.player.borrow().fullscreen(&self.surface);
    }

    /// Wire an on-screen control element to `button` ("A", "Up", "Start"...).
    #[wasm_bindgen]
    pub fn bind_touch_button(&mut self, element: HtmlElement, button: &str) -> Result<(), JsValue> {
        let button: GbaButton = button.parse().map_err(js_error)?;
        for phase in POINTER_PHASES {
            let p = Rc::clone(&self.player);
            let el = element.clone();
            self.listeners.push(Listener::new(
                element.as_ref(),
                phase.event_type(),
                move |event| {
                    let Ok(pointer) = event.dyn_into::<PointerEvent>() else {
                        return;
                    };
                    pointer.prevent_default();
                    let id = pointer.pointer_id();
                    let mut response = None;
                    with_player(&p, phase.event_type(), |player| {
                        response = player.pointer(button, id, phase);
                    });
                    if response.is_some_and(|r| r.capture) {
                        if let Err(e) = el.set_pointer_capture(id) {
                            warn!("Pointer capture failed: {}", describe(&e));
                        }
                    }
                },
            )?);
        }
        Ok(())
    }

    /// Remove every listener and release held touch controls.
    #[wasm_bindgen]
    pub fn dispose(&mut self) {
        self.frame_loop = None;
        self.listeners.clear();
        self.player.borrow_mut().release_touch();
    }

    // ---- Status ----

    /// "idle", "running" or "paused".
    #[wasm_bindgen]
    pub fn status(&self) -> String {
        self.player.borrow().status().to_string()
    }

    #[wasm_bindgen]
    pub fn status_label(&self) -> String {
        self.player.borrow().status().label().to_string()
    }

    #[wasm_bindgen]
    pub fn message(&self) -> String {
        self.player.borrow().message().to_string()
    }

    #[wasm_bindgen]
    pub fn can_interact(&self) -> bool {
        self.player.borrow().can_interact()
    }

    #[wasm_bindgen]
    pub fn rom_name(&self) -> Option<String> {
        self.player.borrow().rom_name().map(str::to_string)
    }

    #[wasm_bindgen]
    pub fn audio_enabled(&self) -> bool {
        self.player.borrow().audio_enabled()
    }

    #[wasm_bindgen]
    pub fn turbo(&self) -> u8 {
        self.player.borrow().turbo().multiplier()
    }

    #[wasm_bindgen]
    pub fn auto_save_enabled(&self) -> bool {
        self.player.borrow().auto_save().enabled
    }

    #[wasm_bindgen]
    pub fn auto_save_slot(&self) -> u8 {
        self.player.borrow().auto_save().slot.get()
    }

    /// Gamepad status line.
    #[wasm_bindgen]
    pub fn controller(&self) -> String {
        self.player.borrow().controller().to_string()
    }

    /// On-screen controls in rendering order, as `{button, label, group}`.
    /// `button` is the name [`bind_touch_button`](Self::bind_touch_button)
    /// takes.
    #[wasm_bindgen]
    pub fn touch_layout() -> Result<Array, JsValue> {
        LAYOUT
            .iter()
            .map(|spec| layout_entry(spec.button.label(), spec.label, spec.group.name()))
            .collect()
    }

    /// `[key, action]` pairs for the keyboard help panel.
    #[wasm_bindgen]
    pub fn keyboard_hints(&self) -> Array {
        self.player
            .borrow()
            .keyboard_hints()
            .into_iter()
            .map(|hint| Array::of2(&JsValue::from(hint.key), &JsValue::from(hint.action)))
            .collect()
    }
}

impl GbaPlayer {
    fn install_listeners(&mut self) -> Result<(), JsValue> {
        let window: &web_sys::EventTarget = self.window.as_ref();

        let p = Rc::clone(&self.player);
        self.listeners.push(Listener::new(window, "keydown", move |event| {
            let Ok(key) = event.dyn_into::<KeyboardEvent>() else {
                return;
            };
            with_player(&p, "keydown", |player| {
                if player.key_down(&key.code()) {
                    key.prevent_default();
                }
            });
        })?);

        let p = Rc::clone(&self.player);
        self.listeners.push(Listener::new(window, "keyup", move |event| {
            let Ok(key) = event.dyn_into::<KeyboardEvent>() else {
                return;
            };
            with_player(&p, "keyup", |player| player.key_up(&key.code()));
        })?);

        for event in ["pagehide", "beforeunload"] {
            let p = Rc::clone(&self.player);
            self.listeners
                .push(Listener::new(window, event, move |_| auto_save(&p))?);
        }

        let p = Rc::clone(&self.player);
        let document = self.document.clone();
        self.listeners.push(Listener::new(
            self.document.as_ref(),
            "visibilitychange",
            move |_| {
                if document.visibility_state() == VisibilityState::Hidden {
                    auto_save(&p);
                }
            },
        )?);

        let p = Rc::clone(&self.player);
        self.listeners.push(Listener::new(window, "gamepadconnected", move |event| {
            let Some(pad) = event
                .dyn_into::<GamepadEvent>()
                .ok()
                .and_then(|e| e.gamepad())
            else {
                return;
            };
            with_player(&p, "gamepadconnected", |player| {
                player.gamepad_connected(pad.index() as usize);
            });
        })?);

        let p = Rc::clone(&self.player);
        self.listeners.push(Listener::new(window, "gamepaddisconnected", move |_| {
            with_player(&p, "gamepaddisconnected", WebPlayer::gamepad_disconnected);
        })?);

        let p = Rc::clone(&self.player);
        let navigator = self.window.navigator();
        self.frame_loop = Some(FrameLoop::start(&self.window, move || {
            let pads = gamepad::snapshot(&navigator);
            with_player(&p, "gamepad poll", |player| {
                player.poll_gamepads(&pads);
            });
        })?);

        Ok(())
    }
}

impl Drop for GbaPlayer {
    fn drop(&mut self) {
        if !self.listeners.is_empty() {
            self.dispose();
        }
    }
}
