// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Controller input sampling.
//!
//! Input sources are polled once per tick and produce an immutable
//! [`InputSnapshot`]. A source returns `None` when no controller is connected.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config;

pub mod edge;
#[cfg(feature = "gamepad")]
pub mod gamepad;
pub mod mock;

/// A discrete controller button.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ButtonId {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    LeftTrigger,
    RightTrigger,
    LeftStick,
    RightStick,
    Select,
    Start,
    #[serde(rename = "dpad_up")]
    DPadUp,
    #[serde(rename = "dpad_down")]
    DPadDown,
    #[serde(rename = "dpad_left")]
    DPadLeft,
    #[serde(rename = "dpad_right")]
    DPadRight,
}

impl ButtonId {
    pub const COUNT: usize = 16;

    /// Every button, in snapshot order.
    pub const ALL: [ButtonId; ButtonId::COUNT] = [
        ButtonId::A,
        ButtonId::B,
        ButtonId::X,
        ButtonId::Y,
        ButtonId::LeftBumper,
        ButtonId::RightBumper,
        ButtonId::LeftTrigger,
        ButtonId::RightTrigger,
        ButtonId::LeftStick,
        ButtonId::RightStick,
        ButtonId::Select,
        ButtonId::Start,
        ButtonId::DPadUp,
        ButtonId::DPadDown,
        ButtonId::DPadLeft,
        ButtonId::DPadRight,
    ];

    /// The position of this button in a snapshot.
    pub fn index(self) -> usize {
        self as usize
    }

    /// A short label, as printed on most controllers.
    pub fn label(self) -> &'static str {
        match self {
            ButtonId::A => "A",
            ButtonId::B => "B",
            ButtonId::X => "X",
            ButtonId::Y => "Y",
            ButtonId::LeftBumper => "LB",
            ButtonId::RightBumper => "RB",
            ButtonId::LeftTrigger => "LT",
            ButtonId::RightTrigger => "RT",
            ButtonId::LeftStick => "L3",
            ButtonId::RightStick => "R3",
            ButtonId::Select => "Select",
            ButtonId::Start => "Start",
            ButtonId::DPadUp => "Up",
            ButtonId::DPadDown => "Down",
            ButtonId::DPadLeft => "Left",
            ButtonId::DPadRight => "Right",
        }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An analog stick axis.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
}

impl Axis {
    pub const COUNT: usize = 4;

    pub const ALL: [Axis; Axis::COUNT] = [
        Axis::LeftStickX,
        Axis::LeftStickY,
        Axis::RightStickX,
        Axis::RightStickY,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// The state of a controller at one tick. Button activations are in [0, 1],
/// axis values in [-1, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputSnapshot {
    buttons: [f32; ButtonId::COUNT],
    axes: [f32; Axis::COUNT],
}

impl Default for InputSnapshot {
    fn default() -> Self {
        InputSnapshot {
            buttons: [0.0; ButtonId::COUNT],
            axes: [0.0; Axis::COUNT],
        }
    }
}

impl InputSnapshot {
    /// Creates a snapshot with everything at rest.
    pub fn new() -> InputSnapshot {
        InputSnapshot::default()
    }

    /// Returns a copy of this snapshot with the given button activation.
    pub fn with_button(mut self, button: ButtonId, activation: f32) -> InputSnapshot {
        self.buttons[button.index()] = normalize(activation, 0.0, 1.0);
        self
    }

    /// Returns a copy of this snapshot with the given axis value.
    pub fn with_axis(mut self, axis: Axis, value: f32) -> InputSnapshot {
        self.axes[axis.index()] = normalize(value, -1.0, 1.0);
        self
    }

    /// The activation of the given button.
    pub fn activation(&self, button: ButtonId) -> f32 {
        self.buttons[button.index()]
    }

    /// The value of the given axis.
    pub fn axis(&self, axis: Axis) -> f32 {
        self.axes[axis.index()]
    }

    /// Iterates over every button and its activation.
    pub fn buttons(&self) -> impl Iterator<Item = (ButtonId, f32)> + '_ {
        ButtonId::ALL
            .iter()
            .map(move |button| (*button, self.activation(*button)))
    }
}

/// Clamps into range. Non-finite values read as at rest.
fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("unable to initialise controller input: {0}")]
    Platform(String),

    #[error("input device {0} requires padgenie to be built with the gamepad feature")]
    Unsupported(String),

    #[error("unknown input device {0}")]
    Unknown(String),
}

/// A polled source of controller state.
pub trait InputSource: fmt::Display {
    /// Samples the current controller state. Returns `None` when no controller
    /// is connected.
    fn sample(&mut self) -> Option<InputSnapshot>;
}

/// Lists the names of the controllers currently connected.
pub fn list_gamepads() -> Result<Vec<String>, InputError> {
    #[cfg(feature = "gamepad")]
    {
        gamepad::Source::list()
    }
    #[cfg(not(feature = "gamepad"))]
    {
        Err(InputError::Unsupported("gamepad".to_string()))
    }
}

/// Gets the input source named by the config.
pub fn get_source(config: &config::Input) -> Result<Box<dyn InputSource>, InputError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Box::new(mock::Source::get(device)));
    }

    match device {
        #[cfg(feature = "gamepad")]
        "gamepad" => Ok(Box::new(gamepad::Source::new()?)),
        #[cfg(not(feature = "gamepad"))]
        "gamepad" => Err(InputError::Unsupported(device.to_string())),
        _ => Err(InputError::Unknown(device.to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_button_order_matches_index() {
        for (i, button) in ButtonId::ALL.iter().enumerate() {
            assert_eq!(i, button.index());
        }
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(i, axis.index());
        }
    }

    #[test]
    fn test_snapshot_values_are_normalized() {
        let snapshot = InputSnapshot::new()
            .with_button(ButtonId::A, 1.5)
            .with_button(ButtonId::RightTrigger, 0.25)
            .with_axis(Axis::LeftStickY, -3.0);

        assert_eq!(1.0, snapshot.activation(ButtonId::A));
        assert_eq!(0.25, snapshot.activation(ButtonId::RightTrigger));
        assert_eq!(0.0, snapshot.activation(ButtonId::B));
        assert_eq!(-1.0, snapshot.axis(Axis::LeftStickY));
        assert_eq!(ButtonId::COUNT, snapshot.buttons().count());
    }

    #[test]
    fn test_non_finite_values_read_as_rest() {
        let snapshot = InputSnapshot::new()
            .with_button(ButtonId::A, f32::NAN)
            .with_button(ButtonId::RightTrigger, f32::INFINITY)
            .with_axis(Axis::LeftStickX, f32::NAN)
            .with_axis(Axis::LeftStickY, f32::NEG_INFINITY);

        assert_eq!(0.0, snapshot.activation(ButtonId::A));
        assert_eq!(0.0, snapshot.activation(ButtonId::RightTrigger));
        assert_eq!(0.0, snapshot.axis(Axis::LeftStickX));
        assert_eq!(0.0, snapshot.axis(Axis::LeftStickY));
    }

    #[test]
    fn test_get_mock_source() {
        let config = config::Input::new("mock-pad");
        let mut source = get_source(&config).expect("mock source");
        assert_eq!("mock-pad (Mock)", source.to_string());
        assert!(source.sample().is_none());
    }

    #[test]
    fn test_unknown_source() {
        let config = config::Input::new("joystick-9000");
        assert!(matches!(get_source(&config), Err(InputError::Unknown(_))));
    }
}
