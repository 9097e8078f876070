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
use serde::Deserialize;

use crate::input::ButtonId;

const DEFAULT_SCALE: [u8; 6] = [0, 2, 3, 4, 7, 9];

/// Contrasting moods for the face buttons.
fn default_button_scales() -> Vec<(ButtonId, Vec<u8>)> {
    vec![
        (ButtonId::A, vec![0, 3, 5, 6, 7, 10]),
        (ButtonId::B, vec![0, 2, 4, 7, 9]),
        (ButtonId::X, vec![0, 2, 3, 5, 7, 8, 10]),
        (ButtonId::Y, vec![0, 2, 4, 5, 7, 9, 11]),
    ]
}

/// The pitch classes allowed while a button is pressed.
#[derive(Deserialize, Clone, Debug)]
pub struct ButtonScale {
    button: ButtonId,
    pitch_classes: Vec<u8>,
}

/// A YAML representation of the scale table.
#[derive(Deserialize, Clone, Default)]
pub struct Scales {
    /// The scale used by buttons without an entry of their own.
    default: Option<Vec<u8>>,

    /// Per-button scales. Replaces the built-in table when present.
    buttons: Option<Vec<ButtonScale>>,
}

impl Scales {
    pub fn default_scale(&self) -> Vec<u8> {
        self.default.clone().unwrap_or_else(|| DEFAULT_SCALE.to_vec())
    }

    pub fn buttons(&self) -> Vec<(ButtonId, Vec<u8>)> {
        match &self.buttons {
            Some(buttons) => buttons
                .iter()
                .map(|entry| (entry.button, entry.pitch_classes.clone()))
                .collect(),
            None => default_button_scales(),
        }
    }

    #[cfg(test)]
    pub fn with_default(mut self, values: Vec<u8>) -> Scales {
        self.default = Some(values);
        self
    }
}
