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

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_INSTRUMENT: &str = "ocarina";
const DEFAULT_FADE_TIME_UNIT: Duration = Duration::from_secs(1);
const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_millis(100);

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Audio {
    /// The audio device. "default" picks the host's default output.
    device: Option<String>,

    /// The instrument voices are played with (default: ocarina).
    instrument: Option<String>,

    /// The release fade at full sustain strength (default: 1s).
    fade_time_unit: Option<String>,

    /// Extra time after a fade before the voice is torn down (default: 100ms).
    safety_margin: Option<String>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    pub fn instrument(&self) -> &str {
        self.instrument.as_deref().unwrap_or(DEFAULT_INSTRUMENT)
    }

    /// Returns the fade duration used when sustain strength is 1.
    pub fn fade_time_unit(&self) -> Result<Duration, ConfigError> {
        parse_duration(self.fade_time_unit.as_deref(), DEFAULT_FADE_TIME_UNIT)
    }

    /// Returns the margin between the end of a fade and voice teardown.
    pub fn safety_margin(&self) -> Result<Duration, ConfigError> {
        parse_duration(self.safety_margin.as_deref(), DEFAULT_SAFETY_MARGIN)
    }

    #[cfg(test)]
    pub fn with_timing(mut self, fade_time_unit: &str, safety_margin: &str) -> Audio {
        self.fade_time_unit = Some(fade_time_unit.to_string());
        self.safety_margin = Some(safety_margin.to_string());
        self
    }
}

fn parse_duration(value: Option<&str>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.to_string())
            .map_err(|reason| ConfigError::Duration {
                value: value.to_string(),
                reason: reason.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let audio = Audio::default();
        assert_eq!("default", audio.device());
        assert_eq!("ocarina", audio.instrument());
        assert_eq!(Duration::from_secs(1), audio.fade_time_unit().unwrap());
        assert_eq!(Duration::from_millis(100), audio.safety_margin().unwrap());
    }

    #[test]
    fn test_durations() {
        let audio = Audio::new("mock").with_timing("750ms", "20ms");
        assert_eq!(Duration::from_millis(750), audio.fade_time_unit().unwrap());
        assert_eq!(Duration::from_millis(20), audio.safety_margin().unwrap());

        let bad = Audio::new("mock").with_timing("soon", "20ms");
        assert!(matches!(
            bad.fade_time_unit(),
            Err(ConfigError::Duration { .. })
        ));
    }
}
