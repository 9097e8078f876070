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
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, span, Level};

use super::{synth::Instrument, AudioError, PlayOptions, VoiceHandle};

/// A call made against the mock device.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    LoadInstrument(String),
    Play {
        pitch: u8,
        gain: f32,
        handle: VoiceHandle,
    },
    Ramp {
        handle: VoiceHandle,
        target: f32,
        duration: Duration,
    },
    Stop(VoiceHandle),
}

#[derive(Default)]
struct State {
    instrument: Option<Instrument>,
    calls: Vec<Call>,
    live: HashMap<VoiceHandle, u8>,
}

/// A mock device. Doesn't actually play anything, but keeps track of what it
/// was asked to do. Clones share state.
#[derive(Clone)]
pub struct Device {
    name: String,
    state: Arc<Mutex<State>>,
    fail_play: Arc<AtomicBool>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State::default())),
            fail_play: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes subsequent calls to `play` fail.
    pub fn set_fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::Relaxed);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// The pitches of every sound that has been played and not stopped.
    pub fn live_pitches(&self) -> Vec<u8> {
        let mut pitches: Vec<u8> = self.state.lock().live.values().copied().collect();
        pitches.sort();
        pitches
    }

    pub fn is_live(&self, handle: VoiceHandle) -> bool {
        self.state.lock().live.contains_key(&handle)
    }
}

impl super::Device for Device {
    fn load_instrument(&self, name: &str) -> Result<(), AudioError> {
        let instrument = Instrument::from_name(name)?;
        let mut state = self.state.lock();
        state.instrument = Some(instrument);
        state.calls.push(Call::LoadInstrument(instrument.name().to_string()));
        Ok(())
    }

    fn instrument(&self) -> String {
        self.state
            .lock()
            .instrument
            .map(|instrument| instrument.name().to_string())
            .unwrap_or_default()
    }

    fn play(&self, pitch: u8, options: PlayOptions) -> Result<VoiceHandle, AudioError> {
        let span = span!(Level::DEBUG, "play (mock)");
        let _enter = span.enter();

        if self.fail_play.load(Ordering::Relaxed) {
            return Err(AudioError::Mock("play failure requested".to_string()));
        }
        let mut state = self.state.lock();
        if state.instrument.is_none() {
            return Err(AudioError::Mock("no instrument loaded".to_string()));
        }

        let handle = VoiceHandle::next();
        debug!(device = self.name, pitch, %handle, "Playing note.");
        state.live.insert(handle, pitch);
        state.calls.push(Call::Play {
            pitch,
            gain: options.gain,
            handle,
        });
        Ok(handle)
    }

    fn ramp_gain(
        &self,
        handle: VoiceHandle,
        target: f32,
        duration: Duration,
    ) -> Result<(), AudioError> {
        self.state.lock().calls.push(Call::Ramp {
            handle,
            target,
            duration,
        });
        Ok(())
    }

    fn stop(&self, handle: VoiceHandle) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.live.remove(&handle);
        state.calls.push(Call::Stop(handle));
        Ok(())
    }

    fn active_voices(&self) -> usize {
        self.state.lock().live.len()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::Device as _;

    #[test]
    fn test_records_calls() {
        let device = Device::get("mock");
        assert!(device.play(60, PlayOptions::default()).is_err());

        device.load_instrument("sine").unwrap();
        let handle = device.play(60, PlayOptions::default()).unwrap();
        assert_eq!(vec![60], device.live_pitches());
        assert_eq!(1, device.active_voices());

        device
            .ramp_gain(handle, 0.0, Duration::from_millis(5))
            .unwrap();
        device.stop(handle).unwrap();
        assert_eq!(0, device.active_voices());
        assert_eq!(
            vec![
                Call::LoadInstrument("sine".to_string()),
                Call::Play {
                    pitch: 60,
                    gain: 1.0,
                    handle
                },
                Call::Ramp {
                    handle,
                    target: 0.0,
                    duration: Duration::from_millis(5)
                },
                Call::Stop(handle),
            ],
            device.calls()
        );
    }

    #[test]
    fn test_unknown_instrument_keeps_current() {
        let device = Device::get("mock");
        device.load_instrument("organ").unwrap();
        assert!(matches!(
            device.load_instrument("theremin"),
            Err(AudioError::UnknownInstrument(_))
        ));
        assert_eq!("organ", device.instrument());
    }

    #[test]
    fn test_fail_play() {
        let device = Device::get("mock");
        device.load_instrument("ocarina").unwrap();
        device.set_fail_play(true);
        assert!(device.play(60, PlayOptions::default()).is_err());
        device.set_fail_play(false);
        assert!(device.play(60, PlayOptions::default()).is_ok());
    }
}
