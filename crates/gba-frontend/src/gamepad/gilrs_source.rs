//! Native gamepad source backed by `gilrs`.
//!
//! Reads every connected pad into the same [`GamepadState`] shape the
//! browser's Gamepad API produces, so the mapper and its default table work
//! unchanged on desktop.

use gilrs::{Axis, Button, EventType, Gamepad, Gilrs};
use log::{info, warn};

use super::{ControllerStatus, GamepadState};
use crate::clock::Clock;
use crate::emulator::GbaCore;
use crate::player::Player;
use crate::store::Storage;

/// `gilrs` buttons in W3C standard-gamepad index order.
const STANDARD_BUTTONS: [Button; 17] = [
    Button::South,         // 0: A / Cross
    Button::East,          // 1: B / Circle
    Button::West,          // 2: X / Square
    Button::North,         // 3: Y / Triangle
    Button::LeftTrigger,   // 4: L1
    Button::RightTrigger,  // 5: R1
    Button::LeftTrigger2,  // 6: L2
    Button::RightTrigger2, // 7: R2
    Button::Select,        // 8
    Button::Start,         // 9
    Button::LeftThumb,     // 10
    Button::RightThumb,    // 11
    Button::DPadUp,        // 12
    Button::DPadDown,      // 13
    Button::DPadLeft,      // 14
    Button::DPadRight,     // 15
    Button::Mode,          // 16
];

/// Polls `gilrs` on behalf of a [`Player`].
pub struct GilrsSource {
    gilrs: Gilrs,
}

impl GilrsSource {
    /// Initialise gamepad support. Returns `None` (after logging) when the
    /// platform has no gamepad backend; that is not an error for the player.
    #[must_use]
    pub fn new() -> Option<Self> {
        match Gilrs::new() {
            Ok(gilrs) => Some(Self { gilrs }),
            Err(e) => {
                warn!("Gamepad support unavailable: {e}");
                None
            }
        }
    }

    /// Drain pending connect/disconnect events into `player`, then run one
    /// gamepad poll over every connected pad.
    pub fn poll<C: GbaCore, S: Storage, K: Clock>(
        &mut self,
        player: &mut Player<C, S, K>,
    ) -> ControllerStatus {
        while let Some(event) = self.gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    let index = usize::from(event.id);
                    info!("Gamepad {index} connected");
                    player.gamepad_connected(index);
                }
                EventType::Disconnected => {
                    info!("Gamepad {} disconnected", usize::from(event.id));
                    player.gamepad_disconnected();
                }
                _ => {}
            }
        }

        let pads = self.snapshot();
        player.poll_gamepads(&pads).clone()
    }

    /// Every connected pad, in the browser snapshot shape.
    #[must_use]
    pub fn snapshot(&self) -> Vec<GamepadState> {
        self.gilrs
            .gamepads()
            .filter(|(_, pad)| pad.is_connected())
            .map(|(id, pad)| pad_state(usize::from(id), &pad))
            .collect()
    }
}

fn pad_state(index: usize, pad: &Gamepad<'_>) -> GamepadState {
    let buttons = STANDARD_BUTTONS
        .iter()
        .map(|&b| pad.is_pressed(b))
        .collect();

    // gilrs reports stick Y with up positive; the browser convention the
    // mapping uses is down positive.
    let axes = vec![
        pad.value(Axis::LeftStickX),
        -pad.value(Axis::LeftStickY),
        pad.value(Axis::RightStickX),
        -pad.value(Axis::RightStickY),
    ];

    GamepadState {
        id: pad.name().to_string(),
        index,
        connected: true,
        buttons,
        axes,
    }
}
