//! On-screen touch controls.
//!
//! Each control is a small state machine keyed by pointer id. A press starts
//! on pointer-down and asks the host to capture the pointer, so the release
//! still arrives if the finger slides off the element. Whichever of
//! pointer-up, pointer-cancel or pointer-leave comes first releases; the rest
//! are ignored. Every press therefore pairs with exactly one release.

use crate::button::{ButtonEvent, GbaButton};

/// Visual cluster a control belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchGroup {
    DPad,
    Actions,
    StartSelect,
}

impl TouchGroup {
    /// Stable name for styling hooks.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DPad => "dpad",
            Self::Actions => "actions",
            Self::StartSelect => "start-select",
        }
    }
}

/// One control in the overlay layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchButtonSpec {
    pub button: GbaButton,
    pub label: &'static str,
    pub group: TouchGroup,
}

const fn spec(button: GbaButton, label: &'static str, group: TouchGroup) -> TouchButtonSpec {
    TouchButtonSpec {
        button,
        label,
        group,
    }
}

/// Overlay layout, grouped and in rendering order.
pub const LAYOUT: [TouchButtonSpec; 10] = [
    spec(GbaButton::Up, "↑", TouchGroup::DPad),
    spec(GbaButton::Left, "←", TouchGroup::DPad),
    spec(GbaButton::Down, "↓", TouchGroup::DPad),
    spec(GbaButton::Right, "→", TouchGroup::DPad),
    spec(GbaButton::A, "A", TouchGroup::Actions),
    spec(GbaButton::B, "B", TouchGroup::Actions),
    spec(GbaButton::L, "L", TouchGroup::Actions),
    spec(GbaButton::R, "R", TouchGroup::Actions),
    spec(GbaButton::Select, "SELECT", TouchGroup::StartSelect),
    spec(GbaButton::Start, "START", TouchGroup::StartSelect),
];

/// Pointer event kinds the overlay reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Up,
    Cancel,
    Leave,
}

impl PointerPhase {
    /// DOM event type for this phase.
    #[must_use]
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::Down => "pointerdown",
            Self::Up => "pointerup",
            Self::Cancel => "pointercancel",
            Self::Leave => "pointerleave",
        }
    }

    #[must_use]
    pub const fn is_end(self) -> bool {
        !matches!(self, Self::Down)
    }
}

/// What the host should do in response to a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchResponse {
    pub event: ButtonEvent,
    /// Capture the pointer on the control's element.
    pub capture: bool,
}

/// Press/release tracker for one on-screen control.
#[derive(Debug, Clone)]
pub struct TouchButton {
    button: GbaButton,
    pointer: Option<i32>,
}

impl TouchButton {
    #[must_use]
    pub const fn new(button: GbaButton) -> Self {
        Self {
            button,
            pointer: None,
        }
    }

    #[must_use]
    pub const fn button(&self) -> GbaButton {
        self.button
    }

    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.pointer.is_some()
    }

    pub fn handle(&mut self, pointer_id: i32, phase: PointerPhase) -> Option<TouchResponse> {
        match (phase, self.pointer) {
            (PointerPhase::Down, None) => {
                self.pointer = Some(pointer_id);
                Some(TouchResponse {
                    event: ButtonEvent::press(self.button),
                    capture: true,
                })
            }
            (PointerPhase::Down, Some(_)) => None,
            (_, Some(owner)) if owner == pointer_id => {
                self.pointer = None;
                Some(TouchResponse {
                    event: ButtonEvent::release(self.button),
                    capture: false,
                })
            }
            _ => None,
        }
    }

    /// Force a release if held (teardown).
    pub fn release(&mut self) -> Option<ButtonEvent> {
        self.pointer
            .take()
            .map(|_| ButtonEvent::release(self.button))
    }
}

/// All ten controls.
#[derive(Debug, Clone)]
pub struct TouchOverlay {
    buttons: Vec<TouchButton>,
}

impl Default for TouchOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buttons: LAYOUT.iter().map(|s| TouchButton::new(s.button)).collect(),
        }
    }

    pub fn handle(
        &mut self,
        button: GbaButton,
        pointer_id: i32,
        phase: PointerPhase,
    ) -> Option<TouchResponse> {
        self.buttons
            .iter_mut()
            .find(|b| b.button() == button)
            .and_then(|b| b.handle(pointer_id, phase))
    }

    #[must_use]
    pub fn is_pressed(&self, button: GbaButton) -> bool {
        self.buttons
            .iter()
            .any(|b| b.button() == button && b.is_pressed())
    }

    /// Release every held control, appending the releases to `events`.
    pub fn release_all(&mut self, events: &mut Vec<ButtonEvent>) {
        events.extend(self.buttons.iter_mut().filter_map(TouchButton::release));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_captures_and_first_end_releases() {
        let mut b = TouchButton::new(GbaButton::A);
        let down = b.handle(7, PointerPhase::Down).expect("press");
        assert_eq!(down.event, ButtonEvent::press(GbaButton::A));
        assert!(down.capture);

        let leave = b.handle(7, PointerPhase::Leave).expect("release");
        assert_eq!(leave.event, ButtonEvent::release(GbaButton::A));
        assert!(!leave.capture);

        // The trailing pointerup after a leave is ignored.
        assert_eq!(b.handle(7, PointerPhase::Up), None);
        assert_eq!(b.handle(7, PointerPhase::Cancel), None);
    }

    #[test]
    fn other_pointers_cannot_release() {
        let mut b = TouchButton::new(GbaButton::Start);
        b.handle(1, PointerPhase::Down);
        assert_eq!(b.handle(2, PointerPhase::Down), None);
        assert_eq!(b.handle(2, PointerPhase::Up), None);
        assert!(b.is_pressed());
        assert!(b.handle(1, PointerPhase::Cancel).is_some());
        assert!(!b.is_pressed());
    }

    #[test]
    fn end_without_press_is_ignored() {
        let mut b = TouchButton::new(GbaButton::B);
        assert_eq!(b.handle(3, PointerPhase::Up), None);
    }

    #[test]
    fn layout_covers_every_button_once() {
        for button in GbaButton::ALL {
            assert_eq!(LAYOUT.iter().filter(|s| s.button == button).count(), 1);
        }
        assert_eq!(LAYOUT[0].label, "↑");
        let select = LAYOUT.iter().find(|s| s.button == GbaButton::Select);
        assert_eq!(select.map(|s| s.group.name()), Some("start-select"));
        // Names round-trip through the button parser used for binding.
        for spec in LAYOUT {
            assert_eq!(spec.button.label().parse::<GbaButton>(), Ok(spec.button));
        }
    }

    #[test]
    fn release_all_pairs_outstanding_presses() {
        let mut overlay = TouchOverlay::new();
        overlay.handle(GbaButton::Left, 1, PointerPhase::Down);
        overlay.handle(GbaButton::A, 2, PointerPhase::Down);
        assert!(overlay.is_pressed(GbaButton::Left));

        let mut events = Vec::new();
        overlay.release_all(&mut events);
        assert_eq!(
            events,
            [
                ButtonEvent::release(GbaButton::Left),
                ButtonEvent::release(GbaButton::A)
            ]
        );
        overlay.release_all(&mut events);
        assert_eq!(events.len(), 2);
    }
}
