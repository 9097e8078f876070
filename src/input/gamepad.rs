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
use std::fmt;

use gilrs::{Gamepad, Gilrs};
use tracing::{info, warn};

use super::{Axis, ButtonId, InputError, InputSnapshot};

/// Reads the first connected gamepad through gilrs.
pub struct Source {
    gilrs: Gilrs,
    /// Name of the gamepad used by the last sample, if any.
    connected: Option<String>,
}

impl Source {
    pub fn new() -> Result<Source, InputError> {
        let gilrs = Gilrs::new().map_err(|e| InputError::Platform(e.to_string()))?;
        Ok(Source {
            gilrs,
            connected: None,
        })
    }

    /// Lists the names of connected gamepads.
    pub fn list() -> Result<Vec<String>, InputError> {
        let source = Source::new()?;
        Ok(source
            .gilrs
            .gamepads()
            .filter(|(_, gamepad)| gamepad.is_connected())
            .map(|(_, gamepad)| gamepad.name().to_string())
            .collect())
    }

    fn button(button: ButtonId) -> gilrs::Button {
        match button {
            ButtonId::A => gilrs::Button::South,
            ButtonId::B => gilrs::Button::East,
            ButtonId::X => gilrs::Button::West,
            ButtonId::Y => gilrs::Button::North,
            ButtonId::LeftBumper => gilrs::Button::LeftTrigger,
            ButtonId::RightBumper => gilrs::Button::RightTrigger,
            ButtonId::LeftTrigger => gilrs::Button::LeftTrigger2,
            ButtonId::RightTrigger => gilrs::Button::RightTrigger2,
            ButtonId::LeftStick => gilrs::Button::LeftThumb,
            ButtonId::RightStick => gilrs::Button::RightThumb,
            ButtonId::Select => gilrs::Button::Select,
            ButtonId::Start => gilrs::Button::Start,
            ButtonId::DPadUp => gilrs::Button::DPadUp,
            ButtonId::DPadDown => gilrs::Button::DPadDown,
            ButtonId::DPadLeft => gilrs::Button::DPadLeft,
            ButtonId::DPadRight => gilrs::Button::DPadRight,
        }
    }

    fn axis(axis: Axis) -> gilrs::Axis {
        match axis {
            Axis::LeftStickX => gilrs::Axis::LeftStickX,
            Axis::LeftStickY => gilrs::Axis::LeftStickY,
            Axis::RightStickX => gilrs::Axis::RightStickX,
            Axis::RightStickY => gilrs::Axis::RightStickY,
        }
    }

    /// Pressed buttons report 1.0, otherwise the raw pressure value so that
    /// analog triggers still read as partially held.
    fn snapshot(gamepad: &Gamepad<'_>) -> InputSnapshot {
        let buttons = ButtonId::ALL.iter().fold(InputSnapshot::new(), |snapshot, button| {
            let activation = match gamepad.button_data(Self::button(*button)) {
                Some(data) if data.is_pressed() => 1.0,
                Some(data) => data.value(),
                None => 0.0,
            };
            snapshot.with_button(*button, activation)
        });
        Axis::ALL.iter().fold(buttons, |snapshot, axis| {
            snapshot.with_axis(*axis, gamepad.value(Self::axis(*axis)))
        })
    }
}

impl super::InputSource for Source {
    fn sample(&mut self) -> Option<InputSnapshot> {
        // Drain pending events so the cached gamepad state is current.
        while self.gilrs.next_event().is_some() {}

        let current = self
            .gilrs
            .gamepads()
            .find(|(_, gamepad)| gamepad.is_connected())
            .map(|(_, gamepad)| (gamepad.name().to_string(), Self::snapshot(&gamepad)));

        match (&self.connected, &current) {
            (None, Some((name, _))) => info!(gamepad = name, "Gamepad connected."),
            (Some(name), None) => warn!(gamepad = name, "Gamepad disconnected."),
            _ => {}
        }
        self.connected = current.as_ref().map(|(name, _)| name.clone());
        current.map(|(_, snapshot)| snapshot)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.connected {
            Some(name) => write!(f, "{} (Gamepad)", name),
            None => write!(f, "no gamepad connected"),
        }
    }
}
