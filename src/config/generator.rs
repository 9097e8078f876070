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

/// 88 piano keys, starting at A0.
const DEFAULT_KEY_COUNT: u8 = 88;
const DEFAULT_LOWEST_MIDI_NOTE: u8 = 21;
/// Aligns key index 0 (A0) with pitch class 9.
const DEFAULT_SCALE_OFFSET: u8 = 9;
const DEFAULT_TEMPERATURE: f32 = 0.25;
const DEFAULT_BUCKET_COUNT: u8 = 8;
const DEFAULT_STEP_SEMITONES: u8 = 2;

/// A YAML representation of the note generator configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Generator {
    /// The number of keys the generator chooses from (default: 88).
    key_count: Option<u8>,

    /// The MIDI note of key index 0 (default: 21).
    lowest_midi_note: Option<u8>,

    /// Added to a key index before taking it mod 12 for scale membership (default: 9).
    scale_offset: Option<u8>,

    /// Sampling sharpness passed to the oracle (default: 0.25).
    temperature: Option<f32>,

    /// The number of buckets the oracle distinguishes (default: 8).
    bucket_count: Option<u8>,

    /// Semitones the melody moves per bucket of difference (default: 2).
    step_semitones: Option<u8>,

    /// Seed for the oracle's sampler. Random when unset.
    seed: Option<u64>,
}

impl Generator {
    pub fn key_count(&self) -> u8 {
        self.key_count.unwrap_or(DEFAULT_KEY_COUNT)
    }

    pub fn lowest_midi_note(&self) -> u8 {
        self.lowest_midi_note.unwrap_or(DEFAULT_LOWEST_MIDI_NOTE)
    }

    pub fn scale_offset(&self) -> u8 {
        self.scale_offset.unwrap_or(DEFAULT_SCALE_OFFSET)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn bucket_count(&self) -> u8 {
        self.bucket_count.unwrap_or(DEFAULT_BUCKET_COUNT)
    }

    pub fn step_semitones(&self) -> u8 {
        self.step_semitones.unwrap_or(DEFAULT_STEP_SEMITONES)
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Generator {
        self.seed = Some(seed);
        self
    }
}
