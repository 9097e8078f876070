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

//! Continuous controls. Sustain strength follows one analog channel every
//! tick; direction and bucket are read from stick axes at press time only.

use crate::config;
use crate::input::{Axis, ButtonId, InputSnapshot};

/// Maps analog controller state onto synthesis and scene parameters.
pub struct ControllerMapper {
    sustain_channel: ButtonId,
    sustain: f32,
    direction_axis: Axis,
    direction_steps: u8,
    bucket_axis: Option<Axis>,
    bucket_count: u8,
}

impl ControllerMapper {
    pub fn new(input: &config::Input, generator: &config::Generator) -> ControllerMapper {
        ControllerMapper {
            sustain_channel: input.sustain(),
            sustain: 0.0,
            direction_axis: input.direction_axis(),
            direction_steps: input.direction_steps(),
            bucket_axis: input.bucket_axis(),
            bucket_count: generator.bucket_count(),
        }
    }

    /// Reads the sustain channel from the snapshot and stores it as the current
    /// sustain strength. Returns the new value.
    pub fn update(&mut self, snapshot: &InputSnapshot) -> f32 {
        self.sustain = snapshot.activation(self.sustain_channel);
        self.sustain
    }

    /// The sustain strength from the most recent tick.
    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// The direction in `0..=direction_steps` for a press.
    pub fn direction(&self, snapshot: &InputSnapshot) -> u8 {
        quantize(snapshot.axis(self.direction_axis), self.direction_steps)
    }

    /// The bucket for a press. Uses the binding's bucket unless a bucket axis
    /// is configured.
    pub fn bucket(&self, bound: u8, snapshot: &InputSnapshot) -> u8 {
        match self.bucket_axis {
            Some(axis) => quantize(snapshot.axis(axis), self.bucket_count.saturating_sub(1)),
            None => bound,
        }
    }
}

/// Maps an axis value in [-1, 1] onto `0..=steps`.
fn quantize(axis: f32, steps: u8) -> u8 {
    let normalized = (axis.clamp(-1.0, 1.0) + 1.0) / 2.0;
    (normalized * steps as f32).round() as u8
}
