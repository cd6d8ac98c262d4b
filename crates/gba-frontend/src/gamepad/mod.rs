//! Gamepad → GBA button mapping with edge detection.
//!
//! Gamepads are polled once per animation frame. The mapper compares each
//! poll against the set of inputs it already reported as held, so a button
//! held across many polls produces exactly one press and one release.
//!
//! Button indices follow the W3C "standard" gamepad layout. Analog sticks map
//! onto D-pad directions once they leave the deadzone; each direction of an
//! axis is tracked on its own, so flicking the stick from left to right
//! releases LEFT before pressing RIGHT.

#[cfg(feature = "native")]
pub mod gilrs_source;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::button::{ButtonEvent, GbaButton};

/// Deadzone used by the default mapping.
pub const DEFAULT_DEADZONE: f32 = 0.35;

/// Deadzone used when a mapping configures axes but no threshold.
pub const FALLBACK_DEADZONE: f32 = 0.3;

/// One analog axis driving a pair of opposite directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMapping {
    pub index: usize,
    pub negative: GbaButton,
    pub positive: GbaButton,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxesMapping {
    #[serde(default)]
    pub x: Option<AxisMapping>,
    #[serde(default)]
    pub y: Option<AxisMapping>,
    #[serde(default)]
    pub deadzone: Option<f32>,
}

impl AxesMapping {
    #[must_use]
    pub fn deadzone(&self) -> f32 {
        self.deadzone.unwrap_or(FALLBACK_DEADZONE)
    }
}

/// Static gamepad configuration: button index → GBA button, plus optional
/// analog axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamepadMapping {
    pub buttons: BTreeMap<usize, GbaButton>,
    #[serde(default)]
    pub axes: Option<AxesMapping>,
}

impl Default for GamepadMapping {
    fn default() -> Self {
        let buttons = [
            (0, GbaButton::A),
            (1, GbaButton::B),
            (4, GbaButton::L),
            (5, GbaButton::R),
            (8, GbaButton::Select),
            (9, GbaButton::Start),
            (12, GbaButton::Up),
            (13, GbaButton::Down),
            (14, GbaButton::Left),
            (15, GbaButton::Right),
        ]
        .into_iter()
        .collect();

        Self {
            buttons,
            axes: Some(AxesMapping {
                x: Some(AxisMapping {
                    index: 0,
                    negative: GbaButton::Left,
                    positive: GbaButton::Right,
                }),
                y: Some(AxisMapping {
                    index: 1,
                    negative: GbaButton::Up,
                    positive: GbaButton::Down,
                }),
                deadzone: Some(DEFAULT_DEADZONE),
            }),
        }
    }
}

/// Snapshot of one physical pad, as read from the host API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadState {
    pub id: String,
    pub index: usize,
    pub connected: bool,
    /// `pressed` flag per standard button index.
    pub buttons: Vec<bool>,
    /// Axis values in -1.0..=1.0; positive Y points down.
    pub axes: Vec<f32>,
}

impl GamepadState {
    #[must_use]
    pub fn is_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }
}

/// Controller line shown in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerStatus {
    Connected { id: String, index: usize },
    Disconnected,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { id, index } => write!(f, "{id} (index {index})"),
            Self::Disconnected => f.write_str("No controller"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AxisName {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum HeldInput {
    Button(usize),
    AxisNegative(AxisName),
    AxisPositive(AxisName),
}

/// Edge-detecting gamepad poller.
#[derive(Debug, Clone)]
pub struct GamepadMapper {
    mapping: GamepadMapping,
    held: HashSet<HeldInput>,
    active_index: Option<usize>,
}

impl Default for GamepadMapper {
    fn default() -> Self {
        Self::new(GamepadMapping::default())
    }
}

impl GamepadMapper {
    #[must_use]
    pub fn new(mapping: GamepadMapping) -> Self {
        Self {
            mapping,
            held: HashSet::new(),
            active_index: None,
        }
    }

    #[must_use]
    pub fn mapping(&self) -> &GamepadMapping {
        &self.mapping
    }

    /// A pad was connected; it becomes the preferred pad.
    pub fn on_connected(&mut self, index: usize) {
        self.active_index = Some(index);
    }

    pub fn on_disconnected(&mut self) {
        self.active_index = None;
    }

    /// Number of inputs currently reported as held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Pick the pad to read: the most recently connected one if it is
    /// present, otherwise the first connected pad.
    fn select<'a>(&self, pads: &'a [GamepadState]) -> Option<&'a GamepadState> {
        self.active_index
            .and_then(|idx| pads.iter().find(|p| p.index == idx && p.connected))
            .or_else(|| pads.iter().find(|p| p.connected))
    }

    /// Poll once, appending press/release transitions to `events`.
    ///
    /// With no connected pad the held set is cleared without emitting
    /// releases.
    pub fn poll(
        &mut self,
        pads: &[GamepadState],
        events: &mut Vec<ButtonEvent>,
    ) -> ControllerStatus {
        let Some(pad) = self.select(pads) else {
            self.held.clear();
            return ControllerStatus::Disconnected;
        };

        for (&index, &button) in &self.mapping.buttons {
            let key = HeldInput::Button(index);
            let down = pad.is_pressed(index);
            if down && self.held.insert(key) {
                events.push(ButtonEvent::press(button));
            } else if !down && self.held.remove(&key) {
                events.push(ButtonEvent::release(button));
            }
        }

        if let Some(axes) = self.mapping.axes.clone() {
            let deadzone = axes.deadzone();
            if let Some(cfg) = &axes.x {
                self.poll_axis(AxisName::X, cfg, pad.axis(cfg.index), deadzone, events);
            }
            if let Some(cfg) = &axes.y {
                self.poll_axis(AxisName::Y, cfg, pad.axis(cfg.index), deadzone, events);
            }
        }

        ControllerStatus::Connected {
            id: pad.id.clone(),
            index: pad.index,
        }
    }

    fn poll_axis(
        &mut self,
        name: AxisName,
        cfg: &AxisMapping,
        value: f32,
        deadzone: f32,
        events: &mut Vec<ButtonEvent>,
    ) {
        let neg = HeldInput::AxisNegative(name);
        if value < -deadzone {
            if self.held.insert(neg) {
                events.push(ButtonEvent::press(cfg.negative));
            }
        } else if self.held.remove(&neg) {
            events.push(ButtonEvent::release(cfg.negative));
        }

        let pos = HeldInput::AxisPositive(name);
        if value > deadzone {
            if self.held.insert(pos) {
                events.push(ButtonEvent::press(cfg.positive));
            }
        } else if self.held.remove(&pos) {
            events.push(ButtonEvent::release(cfg.positive));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad() -> GamepadState {
        GamepadState {
            id: "Test Pad".to_string(),
            index: 0,
            connected: true,
            buttons: vec![false; 17],
            axes: vec![0.0; 4],
        }
    }

    #[test]
    fn held_button_presses_once_and_releases_once() {
        let mut mapper = GamepadMapper::default();
        let mut events = Vec::new();
        let mut state = pad();
        state.buttons[0] = true;

        for _ in 0..10 {
            mapper.poll(std::slice::from_ref(&state), &mut events);
        }
        assert_eq!(events, [ButtonEvent::press(GbaButton::A)]);

        state.buttons[0] = false;
        mapper.poll(std::slice::from_ref(&state), &mut events);
        mapper.poll(std::slice::from_ref(&state), &mut events);
        assert_eq!(
            events,
            [
                ButtonEvent::press(GbaButton::A),
                ButtonEvent::release(GbaButton::A)
            ]
        );
    }

    #[test]
    fn unmapped_indices_are_ignored() {
        let mut mapper = GamepadMapper::default();
        let mut events = Vec::new();
        let mut state = pad();
        state.buttons[2] = true; // X / Square: not mapped
        state.buttons[3] = true;
        mapper.poll(&[state], &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn axis_inside_deadzone_is_idle() {
        let mut mapper = GamepadMapper::default();
        let mut events = Vec::new();
        let mut state = pad();
        state.axes[0] = 0.35;
        state.axes[1] = -0.2;
        mapper.poll(&[state], &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn axis_reversal_releases_before_pressing() {
        let mut mapper = GamepadMapper::default();
        let mut events = Vec::new();
        let mut state = pad();

        state.axes[0] = -0.9;
        mapper.poll(std::slice::from_ref(&state), &mut events);
        assert_eq!(events, [ButtonEvent::press(GbaButton::Left)]);

        events.clear();
        state.axes[0] = 0.9;
        mapper.poll(std::slice::from_ref(&state), &mut events);
        assert_eq!(
            events,
            [
                ButtonEvent::release(GbaButton::Left),
                ButtonEvent::press(GbaButton::Right)
            ]
        );
    }

    #[test]
    fn y_axis_negative_is_up() {
        let mut mapper = GamepadMapper::default();
        let mut events = Vec::new();
        let mut state = pad();
        state.axes[1] = -1.0;
        mapper.poll(&[state], &mut events);
        assert_eq!(events, [ButtonEvent::press(GbaButton::Up)]);
    }

    #[test]
    fn disconnect_clears_held_without_releases() {
        let mut mapper = GamepadMapper::default();
        let mut events = Vec::new();
        let mut state = pad();
        state.buttons[9] = true;
        state.axes[0] = 1.0;
        mapper.poll(std::slice::from_ref(&state), &mut events);
        assert_eq!(mapper.held_count(), 2);

        events.clear();
        let status = mapper.poll(&[], &mut events);
        assert_eq!(status, ControllerStatus::Disconnected);
        assert_eq!(status.to_string(), "No controller");
        assert!(events.is_empty());
        assert_eq!(mapper.held_count(), 0);

        // Reconnecting with the button still down presses it again.
        mapper.poll(&[state], &mut events);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn prefers_most_recently_connected_pad() {
        let mut mapper = GamepadMapper::default();
        let mut events = Vec::new();
        let first = pad();
        let mut second = pad();
        second.id = "Second".to_string();
        second.index = 1;

        let status = mapper.poll(&[first.clone(), second.clone()], &mut events);
        assert_eq!(
            status,
            ControllerStatus::Connected {
                id: "Test Pad".to_string(),
                index: 0
            }
        );

        mapper.on_connected(1);
        let status = mapper.poll(&[first.clone(), second], &mut events);
        assert_eq!(status.to_string(), "Second (index 1)");

        mapper.on_disconnected();
        let status = mapper.poll(&[first], &mut events);
        assert_eq!(status.to_string(), "Test Pad (index 0)");
    }

    #[test]
    fn mapping_without_deadzone_uses_fallback() {
        let json = r#"{
            "buttons": { "0": "A" },
            "axes": { "x": { "index": 0, "negative": "LEFT", "positive": "RIGHT" } }
        }"#;
        let mapping: GamepadMapping = serde_json::from_str(json).expect("valid mapping");
        let axes = mapping.axes.as_ref().expect("axes present");
        assert!((axes.deadzone() - FALLBACK_DEADZONE).abs() < f32::EPSILON);

        let mut mapper = GamepadMapper::new(mapping);
        let mut events = Vec::new();
        let mut state = pad();
        state.axes[0] = 0.32;
        mapper.poll(&[state], &mut events);
        assert_eq!(events, [ButtonEvent::press(GbaButton::Right)]);
    }
}
