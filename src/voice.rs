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

//! Voice lifecycle. A pitch is Idle (no entry), Sounding, or Releasing. A
//! release ramps the gain to zero and schedules a teardown timer; the timer
//! only reports back, and the owner of the manager applies the teardown.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, error, info};

use crate::audio::{AudioError, Device, PlayOptions, VoiceHandle};
use crate::config;
use crate::config::error::ConfigError;

static VOICE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Sent by a release timer once a voice's fade and safety margin have passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseElapsed {
    pub pitch: u8,
    pub voice_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceStatus {
    Idle,
    Sounding,
    Releasing,
}

/// The result of a note-down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteDown {
    Started,
    /// The pitch was already sounding. Nothing changed.
    AlreadySounding,
    /// The pitch was releasing. The old voice was stopped and a new one started.
    Superseded,
}

/// The schedule of a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Release {
    pub fade: Duration,
    pub teardown_after: Duration,
}

enum VoiceState {
    Sounding,
    Releasing { teardown: JoinHandle<()> },
}

struct Voice {
    id: u64,
    handle: VoiceHandle,
    started: Instant,
    state: VoiceState,
}

/// Owns the sounding voices, at most one per pitch.
pub struct VoiceManager {
    device: Arc<dyn Device>,
    fade_time_unit: Duration,
    safety_margin: Duration,
    voices: HashMap<u8, Voice>,
    released_tx: mpsc::UnboundedSender<ReleaseElapsed>,
}

impl VoiceManager {
    /// Creates a voice manager. Release timers report on the returned
    /// receiver; pass what arrives there to `complete_release`.
    pub fn new(
        device: Arc<dyn Device>,
        config: &config::Audio,
    ) -> Result<(VoiceManager, mpsc::UnboundedReceiver<ReleaseElapsed>), ConfigError> {
        let (released_tx, released_rx) = mpsc::unbounded_channel();
        Ok((
            VoiceManager {
                device,
                fade_time_unit: config.fade_time_unit()?,
                safety_margin: config.safety_margin()?,
                voices: HashMap::new(),
                released_tx,
            },
            released_rx,
        ))
    }

    /// Starts a voice for `pitch` at full gain.
    pub fn note_down(&mut self, pitch: u8) -> Result<NoteDown, AudioError> {
        let superseded = match self.status(pitch) {
            VoiceStatus::Sounding => return Ok(NoteDown::AlreadySounding),
            VoiceStatus::Releasing => {
                if let Some(old) = self.voices.remove(&pitch) {
                    self.discard(pitch, old);
                }
                true
            }
            VoiceStatus::Idle => false,
        };

        let handle = self.device.play(pitch, PlayOptions::default())?;
        let id = VOICE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        debug!(pitch, voice_id = id, %handle, "Voice sounding.");
        self.voices.insert(
            pitch,
            Voice {
                id,
                handle,
                started: Instant::now(),
                state: VoiceState::Sounding,
            },
        );

        Ok(if superseded {
            NoteDown::Superseded
        } else {
            NoteDown::Started
        })
    }

    /// Releases a sounding voice: ramps it to silence over
    /// `fade_time_unit * sustain` and schedules its teardown after the fade
    /// plus the safety margin. Does nothing unless the pitch is Sounding.
    pub fn note_up(&mut self, pitch: u8, sustain: f32) -> Option<Release> {
        let voice = self.voices.get_mut(&pitch)?;
        if !matches!(voice.state, VoiceState::Sounding) {
            return None;
        }

        let sustain = if sustain.is_finite() {
            sustain.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let fade = self.fade_time_unit.mul_f64(f64::from(sustain));
        let teardown_after = fade + self.safety_margin;
        if let Err(e) = self.device.ramp_gain(voice.handle, 0.0, fade) {
            error!(pitch, err = %e, "Unable to start release fade.");
        }

        let deadline = Instant::now() + teardown_after;
        let released_tx = self.released_tx.clone();
        let elapsed = ReleaseElapsed {
            pitch,
            voice_id: voice.id,
        };
        let teardown = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            let _ = released_tx.send(elapsed);
        });

        debug!(
            pitch,
            voice_id = voice.id,
            held_ms = voice.started.elapsed().as_millis() as u64,
            fade_ms = fade.as_millis() as u64,
            "Voice releasing."
        );
        voice.state = VoiceState::Releasing { teardown };
        Some(Release {
            fade,
            teardown_after,
        })
    }

    /// Tears down the voice a release timer was scheduled for. Returns false
    /// if that voice is already gone or was superseded.
    pub fn complete_release(&mut self, elapsed: ReleaseElapsed) -> bool {
        let current = self.voices.get(&elapsed.pitch).is_some_and(|voice| {
            voice.id == elapsed.voice_id && matches!(voice.state, VoiceState::Releasing { .. })
        });
        if !current {
            debug!(
                pitch = elapsed.pitch,
                voice_id = elapsed.voice_id,
                "Ignoring stale release."
            );
            return false;
        }

        if let Some(voice) = self.voices.remove(&elapsed.pitch) {
            if let Err(e) = self.device.stop(voice.handle) {
                error!(pitch = elapsed.pitch, err = %e, "Unable to stop voice.");
            }
            debug!(pitch = elapsed.pitch, voice_id = voice.id, "Voice torn down.");
        }
        true
    }

    /// Stops every voice and cancels every pending teardown.
    pub fn clear(&mut self) {
        let voices: Vec<(u8, Voice)> = self.voices.drain().collect();
        if !voices.is_empty() {
            info!(voices = voices.len(), "Stopping all voices.");
        }
        for (pitch, voice) in voices {
            self.discard(pitch, voice);
        }
    }

    pub fn status(&self, pitch: u8) -> VoiceStatus {
        match self.voices.get(&pitch).map(|voice| &voice.state) {
            None => VoiceStatus::Idle,
            Some(VoiceState::Sounding) => VoiceStatus::Sounding,
            Some(VoiceState::Releasing { .. }) => VoiceStatus::Releasing,
        }
    }

    /// The id of the voice currently held for `pitch`.
    pub fn voice_id(&self, pitch: u8) -> Option<u64> {
        self.voices.get(&pitch).map(|voice| voice.id)
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    fn discard(&self, pitch: u8, voice: Voice) {
        if let VoiceState::Releasing { teardown } = voice.state {
            teardown.abort();
        }
        if let Err(e) = self.device.stop(voice.handle) {
            error!(pitch, err = %e, "Unable to stop voice.");
        }
    }
}
