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

//! Pitch classes and the per-button scale lookup.

use std::{collections::HashMap, fmt};

use crate::config;
use crate::config::error::ConfigError;
use crate::input::ButtonId;

pub const NOTES_PER_OCTAVE: u8 = 12;

/// One semitone of the chromatic octave, in [0, 11].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn new(value: u8) -> Option<PitchClass> {
        (value < NOTES_PER_OCTAVE).then_some(PitchClass(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// A set of allowed pitch classes, stored as a 12-bit mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScaleSet(u16);

impl ScaleSet {
    pub fn new(pitch_classes: impl IntoIterator<Item = PitchClass>) -> ScaleSet {
        ScaleSet(
            pitch_classes
                .into_iter()
                .fold(0, |mask, pc| mask | (1 << pc.value())),
        )
    }

    /// Builds a scale from raw values, rejecting anything outside 0..=11.
    pub fn from_values(values: &[u8]) -> Result<ScaleSet, ConfigError> {
        let pitch_classes = values
            .iter()
            .map(|value| {
                PitchClass::new(*value).ok_or_else(|| {
                    ConfigError::Invalid(format!("pitch class {} is not in 0..=11", value))
                })
            })
            .collect::<Result<Vec<PitchClass>, ConfigError>>()?;
        Ok(ScaleSet::new(pitch_classes))
    }

    pub fn contains(&self, pitch_class: PitchClass) -> bool {
        self.0 & (1 << pitch_class.value()) != 0
    }

    /// Returns true if the note index, shifted by `offset`, lands in the scale.
    pub fn admits(&self, index: u8, offset: u8) -> bool {
        let pc = ((index as u16 + offset as u16) % NOTES_PER_OCTAVE as u16) as u8;
        self.contains(PitchClass(pc))
    }

    /// Returns true if any of the first `key_count` note indices lands in the
    /// scale.
    pub fn admits_any(&self, key_count: u8, offset: u8) -> bool {
        (0..key_count).any(|index| self.admits(index, offset))
    }

    pub fn pitch_classes(&self) -> Vec<PitchClass> {
        (0..NOTES_PER_OCTAVE)
            .map(PitchClass)
            .filter(|pc| self.contains(*pc))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ScaleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self
            .pitch_classes()
            .iter()
            .map(|pc| pc.value().to_string())
            .collect();
        write!(f, "{{{}}}", values.join(","))
    }
}

/// Maps buttons to scales, falling back to a default scale.
#[derive(Clone, Debug)]
pub struct ScaleResolver {
    default: ScaleSet,
    by_button: HashMap<ButtonId, ScaleSet>,
}

impl ScaleResolver {
    pub fn new(default: ScaleSet, by_button: HashMap<ButtonId, ScaleSet>) -> ScaleResolver {
        ScaleResolver { default, by_button }
    }

    pub fn from_config(config: &config::Scales) -> Result<ScaleResolver, ConfigError> {
        let default = ScaleSet::from_values(&config.default_scale())?;
        let mut by_button = HashMap::new();
        for (button, values) in config.buttons() {
            by_button.insert(button, ScaleSet::from_values(&values)?);
        }
        Ok(ScaleResolver::new(default, by_button))
    }

    pub fn resolve(&self, button: ButtonId) -> ScaleSet {
        self.by_button.get(&button).copied().unwrap_or(self.default)
    }

    /// Every configured scale. The default scale has no button.
    pub fn scales(&self) -> impl Iterator<Item = (Option<ButtonId>, ScaleSet)> + '_ {
        std::iter::once((None, self.default)).chain(
            self.by_button
                .iter()
                .map(|(button, scale)| (Some(*button), *scale)),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scale(values: &[u8]) -> ScaleSet {
        ScaleSet::from_values(values).expect("valid scale")
    }

    #[test]
    fn test_pitch_class_bounds() {
        assert_eq!(Some(11), PitchClass::new(11).map(PitchClass::value));
        assert_eq!(None, PitchClass::new(12));
        assert!(ScaleSet::from_values(&[0, 12]).is_err());
    }

    #[test]
    fn test_scale_membership() {
        let blues = scale(&[0, 3, 5, 6, 7, 10]);
        assert!(blues.contains(PitchClass(6)));
        assert!(!blues.contains(PitchClass(1)));
        assert_eq!("{0,3,5,6,7,10}", blues.to_string());

        // Index 0 with offset 9 is pitch class 9, which the scale excludes.
        assert!(!blues.admits(0, 9));
        // Index 3 with offset 9 wraps to pitch class 0.
        assert!(blues.admits(3, 9));

        assert!(blues.admits_any(2, 9));
        assert!(!blues.admits_any(1, 9));
        assert!(!scale(&[]).admits_any(88, 9));
        assert!(scale(&[]).is_empty());
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let default = scale(&[0, 2, 3, 4, 7, 9]);
        let a = scale(&[0, 3, 5, 6, 7, 10]);
        let resolver = ScaleResolver::new(default, HashMap::from([(ButtonId::A, a)]));

        assert_eq!(a, resolver.resolve(ButtonId::A));
        assert_eq!(default, resolver.resolve(ButtonId::Y));
    }

    #[test]
    fn test_default_config_table() {
        let resolver = ScaleResolver::from_config(&config::Scales::default()).expect("defaults");
        assert_eq!(scale(&[0, 3, 5, 6, 7, 10]), resolver.resolve(ButtonId::A));
        assert_eq!(scale(&[0, 2, 3, 4, 7, 9]), resolver.resolve(ButtonId::LeftStick));

        let mut buttons: Vec<Option<ButtonId>> =
            resolver.scales().map(|(button, _)| button).collect();
        buttons.sort();
        assert_eq!(
            vec![
                None,
                Some(ButtonId::A),
                Some(ButtonId::B),
                Some(ButtonId::X),
                Some(ButtonId::Y)
            ],
            buttons
        );
    }
}
