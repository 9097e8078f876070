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
use std::time::Duration;

use serde::Deserialize;

use crate::input::edge::Thresholds;
use crate::input::{Axis, ButtonId};

const DEFAULT_DEVICE: &str = "gamepad";
const DEFAULT_TICK_RATE_HZ: u32 = 60;
const DEFAULT_SUSTAIN: ButtonId = ButtonId::RightTrigger;
const DEFAULT_DIRECTION_AXIS: Axis = Axis::LeftStickY;
const DEFAULT_DIRECTION_STEPS: u8 = 4;

/// The buttons that select buckets, in bucket order.
const DEFAULT_BUTTONS: [ButtonId; 8] = [
    ButtonId::A,
    ButtonId::B,
    ButtonId::X,
    ButtonId::Y,
    ButtonId::LeftBumper,
    ButtonId::RightBumper,
    ButtonId::LeftStick,
    ButtonId::RightStick,
];

/// A tracked button and the bucket it selects.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonBinding {
    /// The button to track.
    pub button: ButtonId,
    /// The bucket fed to the note generator when this button is pressed.
    pub bucket: u8,
}

/// A YAML representation of the controller input configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Input {
    /// The input device: "gamepad" or a name starting with "mock".
    device: Option<String>,

    /// How many times per second the controller is polled (default: 60).
    tick_rate_hz: Option<u32>,

    /// Activation a released button must exceed to count as pressed (default: 0).
    press_threshold: Option<f32>,

    /// Activation at or below which a pressed button is released (default: 0).
    release_threshold: Option<f32>,

    /// The buttons that participate in press/release tracking.
    buttons: Option<Vec<ButtonBinding>>,

    /// The continuous channel read as the sustain strength (default: right_trigger).
    sustain: Option<ButtonId>,

    /// The stick axis read on every press to derive a direction (default: left_stick_y).
    direction_axis: Option<Axis>,

    /// The number of direction steps; directions range over 0..=steps (default: 4).
    direction_steps: Option<u8>,

    /// When set, buckets are read from this axis instead of the button binding.
    bucket_axis: Option<Axis>,
}

impl Input {
    /// New will create a new input configuration for the given device.
    pub fn new(device: &str) -> Input {
        Input {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz.unwrap_or(DEFAULT_TICK_RATE_HZ)
    }

    /// The period between ticks.
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz().max(1)))
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            press: self.press_threshold.unwrap_or(0.0),
            release: self.release_threshold.unwrap_or(0.0),
        }
    }

    pub fn buttons(&self) -> Vec<ButtonBinding> {
        match &self.buttons {
            Some(buttons) => buttons.clone(),
            None => DEFAULT_BUTTONS
                .iter()
                .enumerate()
                .map(|(bucket, button)| ButtonBinding {
                    button: *button,
                    bucket: bucket as u8,
                })
                .collect(),
        }
    }

    pub fn sustain(&self) -> ButtonId {
        self.sustain.unwrap_or(DEFAULT_SUSTAIN)
    }

    pub fn direction_axis(&self) -> Axis {
        self.direction_axis.unwrap_or(DEFAULT_DIRECTION_AXIS)
    }

    pub fn direction_steps(&self) -> u8 {
        self.direction_steps.unwrap_or(DEFAULT_DIRECTION_STEPS)
    }

    pub fn bucket_axis(&self) -> Option<Axis> {
        self.bucket_axis
    }

    #[cfg(test)]
    pub fn with_buttons(mut self, buttons: Vec<ButtonBinding>) -> Input {
        self.buttons = Some(buttons);
        self
    }

    #[cfg(test)]
    pub fn with_thresholds(mut self, press: f32, release: f32) -> Input {
        self.press_threshold = Some(press);
        self.release_threshold = Some(release);
        self
    }

    #[cfg(test)]
    pub fn with_bucket_axis(mut self, axis: Axis) -> Input {
        self.bucket_axis = Some(axis);
        self
    }
}
