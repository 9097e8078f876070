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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use self::error::ConfigError;
use crate::scale::ScaleResolver;

mod audio;
pub mod error;
mod generator;
mod input;
mod scales;

pub use self::audio::Audio;
pub use self::generator::Generator;
pub use self::input::{ButtonBinding, Input};
pub use self::scales::Scales;

/// The configuration for a playing session.
#[derive(Deserialize, Clone, Default)]
pub struct Session {
    #[serde(default)]
    input: Input,

    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    generator: Generator,

    #[serde(default)]
    scales: Scales,
}

impl Session {
    /// Creates a session configuration from its parts.
    pub fn new(input: Input, audio: Audio, generator: Generator, scales: Scales) -> Session {
        Session {
            input,
            audio,
            generator,
            scales,
        }
    }

    /// Parse and validate a session configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Session, ConfigError> {
        let session = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Session>()?;
        session.validate()?;
        Ok(session)
    }

    /// Parse and validate a session configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Session, ConfigError> {
        let session = Config::builder()
            .add_source(File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize::<Session>()?;
        session.validate()?;
        Ok(session)
    }

    /// Checks the values that deserialization alone can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let resolver = ScaleResolver::from_config(&self.scales)?;

        let thresholds = self.input.thresholds();
        if thresholds.release > thresholds.press {
            return Err(ConfigError::Invalid(format!(
                "release threshold {} is above press threshold {}",
                thresholds.release, thresholds.press
            )));
        }
        if self.input.tick_rate_hz() == 0 {
            return Err(ConfigError::Invalid("tick rate must be positive".into()));
        }

        let key_count = self.generator.key_count();
        if key_count == 0 {
            return Err(ConfigError::Invalid("key count must be positive".into()));
        }
        if u16::from(self.generator.lowest_midi_note()) + u16::from(key_count) > 128 {
            return Err(ConfigError::Invalid(format!(
                "{} keys starting at MIDI note {} run past note 127",
                key_count,
                self.generator.lowest_midi_note()
            )));
        }
        let offset = self.generator.scale_offset();
        if let Some((button, scale)) = resolver
            .scales()
            .find(|(_, scale)| !scale.admits_any(key_count, offset))
        {
            let owner = button.map_or_else(|| "default".to_string(), |button| button.to_string());
            return Err(ConfigError::Invalid(format!(
                "{} scale {} has no notes among {} keys at offset {}",
                owner, scale, key_count, offset
            )));
        }
        let temperature = self.generator.temperature();
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be positive, got {}",
                temperature
            )));
        }
        let bucket_count = self.generator.bucket_count();
        if bucket_count == 0 {
            return Err(ConfigError::Invalid("bucket count must be positive".into()));
        }
        if let Some(binding) = self
            .input
            .buttons()
            .into_iter()
            .find(|binding| binding.bucket >= bucket_count)
        {
            return Err(ConfigError::Invalid(format!(
                "button {} selects bucket {} but there are only {} buckets",
                binding.button, binding.bucket, bucket_count
            )));
        }

        self.audio.fade_time_unit()?;
        self.audio.safety_margin()?;
        Ok(())
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn scales(&self) -> &Scales {
        &self.scales
    }
}
