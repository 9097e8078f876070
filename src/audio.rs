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
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::config;

pub mod cpal;
pub mod mock;
pub mod synth;

/// Handles are unique for the life of the process.
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one playing sound on a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceHandle(u64);

impl VoiceHandle {
    pub fn next() -> VoiceHandle {
        VoiceHandle(HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Options for starting a sound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayOptions {
    /// Initial gain, 0 to 1.
    pub gain: f32,
}

impl Default for PlayOptions {
    fn default() -> Self {
        PlayOptions { gain: 1.0 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("unknown instrument {0}")]
    UnknownInstrument(String),

    #[error("no audio device found with name {0}")]
    NoDevice(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("audio device has shut down")]
    Closed,

    #[error("mock device: {0}")]
    Mock(String),
}

pub trait Device: fmt::Display + Send + Sync {
    /// Switches the instrument used by sounds started after this call.
    fn load_instrument(&self, name: &str) -> Result<(), AudioError>;

    /// The name of the current instrument.
    fn instrument(&self) -> String;

    /// Starts a sound at the given MIDI pitch.
    fn play(&self, pitch: u8, options: PlayOptions) -> Result<VoiceHandle, AudioError>;

    /// Ramps a sound's gain linearly to `target` over `duration`. A zero
    /// duration jumps straight there.
    fn ramp_gain(&self, handle: VoiceHandle, target: f32, duration: Duration)
        -> Result<(), AudioError>;

    /// Stops a sound and releases its resources.
    fn stop(&self, handle: VoiceHandle) -> Result<(), AudioError>;

    /// The number of sounds the device is currently rendering.
    fn active_voices(&self) -> usize;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, AudioError> {
    cpal::Device::list()
}

/// Gets the device named by the config.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        let mock = mock::Device::get(device);
        mock.load_instrument(config.instrument())?;
        return Ok(Arc::new(mock));
    }

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let first = VoiceHandle::next();
        let second = VoiceHandle::next();
        assert_ne!(first, second);
    }

    #[test]
    fn test_get_mock_device() {
        let device = get_device(&config::Audio::new("mock-out")).expect("mock device");
        assert_eq!("mock-out (Mock)", device.to_string());
        assert_eq!("ocarina", device.instrument());
        assert_eq!(0, device.active_voices());
    }
}
