//! Gamepad API snapshots.

use gba_frontend::GamepadState;
use wasm_bindgen::JsCast;
use web_sys::{Gamepad, GamepadButton, Navigator};

/// Read every connected pad. A browser without the Gamepad API yields an
/// empty list.
pub fn snapshot(navigator: &Navigator) -> Vec<GamepadState> {
    let Ok(pads) = navigator.get_gamepads() else {
        return Vec::new();
    };

    pads.iter()
        .filter_map(|slot| slot.dyn_into::<Gamepad>().ok())
        .filter(Gamepad::connected)
        .map(|pad| GamepadState {
            id: pad.id(),
            index: pad.index() as usize,
            connected: true,
            buttons: pad
                .buttons()
                .iter()
                .map(|b| b.dyn_into::<GamepadButton>().is_ok_and(|b| b.pressed()))
                .collect(),
            axes: pad
                .axes()
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        })
        .collect()
}
