//! Host keyboard → GBA button mapping.
//!
//! Keys are identified by their physical `KeyboardEvent.code` string, so the
//! mapping is layout-independent.
//!
//! Default mapping:
//! - Arrows → D-pad
//! - Z → A, X → B
//! - A → L, S → R
//! - Enter → Start
//! - Either Shift → Select

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::button::GbaButton;

/// Map a host key code to a GBA button using the built-in table.
///
/// Returns `None` for unmapped keys.
#[must_use]
pub fn default_button_for(code: &str) -> Option<GbaButton> {
    match code {
        "ArrowUp" => Some(GbaButton::Up),
        "ArrowDown" => Some(GbaButton::Down),
        "ArrowLeft" => Some(GbaButton::Left),
        "ArrowRight" => Some(GbaButton::Right),
        "KeyZ" => Some(GbaButton::A),
        "KeyX" => Some(GbaButton::B),
        "KeyA" => Some(GbaButton::L),
        "KeyS" => Some(GbaButton::R),
        "Enter" => Some(GbaButton::Start),
        "ShiftLeft" | "ShiftRight" => Some(GbaButton::Select),
        _ => None,
    }
}

const DEFAULT_CODES: [&str; 11] = [
    "ArrowUp",
    "ArrowDown",
    "ArrowLeft",
    "ArrowRight",
    "KeyZ",
    "KeyX",
    "KeyA",
    "KeyS",
    "Enter",
    "ShiftLeft",
    "ShiftRight",
];

/// What to do with a key-down event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAction {
    pub button: GbaButton,
    /// The browser's default action (page scroll) must be suppressed.
    pub prevent_default: bool,
}

/// One row of the "Keyboard Controls" hint grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHint {
    pub key: String,
    pub action: String,
}

/// Active key table. Stateless between calls: purely a lookup.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<String, GbaButton>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Keymap {
    #[must_use]
    pub fn defaults() -> Self {
        let bindings = DEFAULT_CODES
            .iter()
            .filter_map(|&code| default_button_for(code).map(|b| (code.to_string(), b)))
            .collect();
        Self { bindings }
    }

    /// Default table with per-key overrides applied on top.
    ///
    /// Binding a button to a new key drops the default key(s) for that
    /// button, so an override moves a button rather than duplicating it.
    #[must_use]
    pub fn with_overrides(overrides: &BTreeMap<String, GbaButton>) -> Self {
        let mut map = Self::defaults();
        let mut rebound: Vec<GbaButton> = Vec::new();
        for (code, &button) in overrides {
            if code.trim().is_empty() {
                warn!("Ignoring keymap override with empty key code for {button}");
                continue;
            }
            if !rebound.contains(&button) {
                map.bindings.retain(|_, &mut b| b != button);
                rebound.push(button);
            }
            map.bindings.insert(code.clone(), button);
        }
        map
    }

    #[must_use]
    pub fn button_for(&self, code: &str) -> Option<GbaButton> {
        self.bindings.get(code).copied()
    }

    /// Resolve a key-down. Directional buttons ask for the default browser
    /// action to be suppressed.
    #[must_use]
    pub fn key_down(&self, code: &str) -> Option<KeyAction> {
        self.button_for(code).map(|button| KeyAction {
            button,
            prevent_default: button.is_directional(),
        })
    }

    #[must_use]
    pub fn key_up(&self, code: &str) -> Option<GbaButton> {
        self.button_for(code)
    }

    /// Key codes bound to `button`, sorted for stable display.
    #[must_use]
    pub fn keys_for(&self, button: GbaButton) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .bindings
            .iter()
            .filter(|&(_, &b)| b == button)
            .map(|(k, _)| k.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Hint rows derived from the active table.
    ///
    /// The four arrow keys collapse into a single "Arrow Keys → D-Pad" row
    /// when they drive the D-pad in the usual way.
    #[must_use]
    pub fn hints(&self) -> Vec<KeyHint> {
        let mut hints = Vec::new();
        let arrows = [
            ("ArrowUp", GbaButton::Up),
            ("ArrowDown", GbaButton::Down),
            ("ArrowLeft", GbaButton::Left),
            ("ArrowRight", GbaButton::Right),
        ];
        let arrows_are_dpad = arrows
            .iter()
            .all(|&(code, button)| self.button_for(code) == Some(button));

        let shown = if arrows_are_dpad {
            hints.push(KeyHint {
                key: "Arrow Keys".to_string(),
                action: "D-Pad".to_string(),
            });
            &GbaButton::ALL[4..]
        } else {
            &GbaButton::ALL[..]
        };

        for &button in shown {
            let mut labels: Vec<String> = Vec::new();
            for code in self.keys_for(button) {
                if arrows_are_dpad && code.starts_with("Arrow") {
                    continue;
                }
                let label = key_label(code);
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
            if labels.is_empty() {
                continue;
            }
            hints.push(KeyHint {
                key: labels.join(" / "),
                action: button.label().to_string(),
            });
        }
        hints
    }
}

/// Human label for a key code: `KeyZ` → `Z`, `ShiftLeft` → `Shift`.
fn key_label(code: &str) -> String {
    if let Some(letter) = code.strip_prefix("Key") {
        return letter.to_string();
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        return digit.to_string();
    }
    if let Some(dir) = code.strip_prefix("Arrow") {
        return dir.to_string();
    }
    for modifier in ["Shift", "Control", "Alt", "Meta"] {
        if code.starts_with(modifier) {
            return modifier.to_string();
        }
    }
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_up_presses_up_and_suppresses_scroll() {
        let map = Keymap::defaults();
        assert_eq!(
            map.key_down("ArrowUp"),
            Some(KeyAction {
                button: GbaButton::Up,
                prevent_default: true,
            })
        );
        assert_eq!(map.key_up("ArrowUp"), Some(GbaButton::Up));
    }

    #[test]
    fn action_buttons_keep_default_behaviour() {
        let map = Keymap::defaults();
        let action = map.key_down("KeyZ").expect("Z is mapped");
        assert_eq!(action.button, GbaButton::A);
        assert!(!action.prevent_default);
    }

    #[test]
    fn unmapped_key_emits_nothing() {
        let map = Keymap::defaults();
        assert_eq!(map.key_down("KeyQ"), None);
        assert_eq!(map.key_up("KeyQ"), None);
    }

    #[test]
    fn both_shifts_are_select() {
        assert_eq!(default_button_for("ShiftLeft"), Some(GbaButton::Select));
        assert_eq!(default_button_for("ShiftRight"), Some(GbaButton::Select));
    }

    #[test]
    fn every_default_code_is_in_the_table() {
        let map = Keymap::defaults();
        for code in DEFAULT_CODES {
            assert_eq!(map.button_for(code), default_button_for(code));
        }
    }

    #[test]
    fn override_moves_a_button() {
        let mut overrides = BTreeMap::new();
        overrides.insert("KeyJ".to_string(), GbaButton::A);
        let map = Keymap::with_overrides(&overrides);
        assert_eq!(map.button_for("KeyJ"), Some(GbaButton::A));
        assert_eq!(map.button_for("KeyZ"), None);
        // Unrelated bindings survive.
        assert_eq!(map.button_for("KeyX"), Some(GbaButton::B));
    }

    #[test]
    fn override_can_bind_two_keys_to_one_button() {
        let mut overrides = BTreeMap::new();
        overrides.insert("KeyJ".to_string(), GbaButton::A);
        overrides.insert("KeyK".to_string(), GbaButton::A);
        let map = Keymap::with_overrides(&overrides);
        assert_eq!(map.keys_for(GbaButton::A), ["KeyJ", "KeyK"]);
    }

    #[test]
    fn default_hints_match_settings_panel() {
        let hints = Keymap::defaults().hints();
        let rows: Vec<(&str, &str)> = hints
            .iter()
            .map(|h| (h.key.as_str(), h.action.as_str()))
            .collect();
        assert_eq!(
            rows,
            [
                ("Arrow Keys", "D-Pad"),
                ("Z", "A"),
                ("X", "B"),
                ("A", "L"),
                ("S", "R"),
                ("Enter", "START"),
                ("Shift", "SELECT"),
            ]
        );
    }
}
