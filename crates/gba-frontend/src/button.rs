//! Logical GBA controller buttons.
//!
//! Every input source (keyboard, gamepad, touch overlay) resolves to one of
//! these ten values before anything reaches the core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseButtonError;

/// Logical button on the GBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GbaButton {
    A,
    B,
    L,
    R,
    Start,
    Select,
    Up,
    Down,
    Left,
    Right,
}

impl GbaButton {
    /// The whole vocabulary, in display order.
    pub const ALL: [Self; 10] = [
        Self::Up,
        Self::Down,
        Self::Left,
        Self::Right,
        Self::A,
        Self::B,
        Self::L,
        Self::R,
        Self::Start,
        Self::Select,
    ];

    /// D-pad directions. Keyboard presses of these suppress page scroll.
    #[must_use]
    pub const fn is_directional(self) -> bool {
        matches!(self, Self::Up | Self::Down | Self::Left | Self::Right)
    }

    /// Name the external core expects in `buttonPress`/`buttonUnpress`.
    #[must_use]
    pub const fn core_name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::L => "l",
            Self::R => "r",
            Self::Start => "start",
            Self::Select => "select",
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Upper-case label, as used in config files and the UI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::L => "L",
            Self::R => "R",
            Self::Start => "START",
            Self::Select => "SELECT",
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

impl fmt::Display for GbaButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GbaButton {
    type Err = ParseButtonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseButtonError(s.to_string()))
    }
}

/// A press or release of one logical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: GbaButton,
    /// True = press, false = release.
    pub pressed: bool,
}

impl ButtonEvent {
    #[must_use]
    pub const fn press(button: GbaButton) -> Self {
        Self {
            button,
            pressed: true,
        }
    }

    #[must_use]
    pub const fn release(button: GbaButton) -> Self {
        Self {
            button,
            pressed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_are_directional() {
        let dirs: Vec<_> = GbaButton::ALL
            .into_iter()
            .filter(|b| b.is_directional())
            .collect();
        assert_eq!(
            dirs,
            [GbaButton::Up, GbaButton::Down, GbaButton::Left, GbaButton::Right]
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("start".parse(), Ok(GbaButton::Start));
        assert_eq!(" SELECT ".parse(), Ok(GbaButton::Select));
        assert_eq!(
            "turbo".parse::<GbaButton>(),
            Err(ParseButtonError("turbo".to_string()))
        );
    }

    #[test]
    fn serde_uses_upper_case_labels() {
        let json = serde_json::to_string(&GbaButton::Start).unwrap();
        assert_eq!(json, "\"START\"");
        let back: GbaButton = serde_json::from_str("\"LEFT\"").unwrap();
        assert_eq!(back, GbaButton::Left);
    }

    #[test]
    fn core_names_are_lower_case() {
        for b in GbaButton::ALL {
            assert_eq!(b.core_name(), b.label().to_ascii_lowercase());
        }
    }
}
