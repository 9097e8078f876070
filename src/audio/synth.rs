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

//! Oscillator voices and the mixer that renders them on the audio thread.

use std::{f32::consts::TAU, time::Duration};

use super::{AudioError, VoiceHandle};

/// Headroom so that a handful of full-gain voices don't clip.
const MASTER_GAIN: f32 = 0.25;
const CLIP: f32 = 0.98;

/// The timbre of a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instrument {
    Ocarina,
    Sine,
    Triangle,
    Saw,
    Square,
    Organ,
}

impl Instrument {
    pub const ALL: [Instrument; 6] = [
        Instrument::Ocarina,
        Instrument::Sine,
        Instrument::Triangle,
        Instrument::Saw,
        Instrument::Square,
        Instrument::Organ,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Ocarina => "ocarina",
            Instrument::Sine => "sine",
            Instrument::Triangle => "triangle",
            Instrument::Saw => "saw",
            Instrument::Square => "square",
            Instrument::Organ => "organ",
        }
    }

    pub fn from_name(name: &str) -> Result<Instrument, AudioError> {
        let wanted = name.trim().to_lowercase();
        Instrument::ALL
            .iter()
            .copied()
            .find(|instrument| instrument.name() == wanted)
            .ok_or_else(|| AudioError::UnknownInstrument(name.to_string()))
    }

    /// The waveform at `phase`, in cycles [0, 1).
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            // Mostly fundamental with a soft second harmonic.
            Instrument::Ocarina => {
                0.85 * (TAU * phase).sin() + 0.15 * (2.0 * TAU * phase).sin()
            }
            Instrument::Sine => (TAU * phase).sin(),
            Instrument::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Instrument::Saw => 2.0 * phase - 1.0,
            Instrument::Square => {
                if phase < 0.5 {
                    0.6
                } else {
                    -0.6
                }
            }
            // Drawbar-ish: fundamental, octave, twelfth.
            Instrument::Organ => {
                0.5 * (TAU * phase).sin()
                    + 0.3 * (2.0 * TAU * phase).sin()
                    + 0.2 * (3.0 * TAU * phase).sin()
            }
        }
    }
}

/// Equal-tempered frequency of a MIDI note, A4 = 440Hz.
pub fn midi_to_frequency(pitch: u8) -> f32 {
    440.0 * 2f32.powf((pitch as f32 - 69.0) / 12.0)
}

/// The number of frames `duration` lasts at `sample_rate`.
pub fn frames(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64).round() as u64
}

/// Instructions sent to the mixer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Start {
        handle: VoiceHandle,
        pitch: u8,
        gain: f32,
        instrument: Instrument,
    },
    /// Ramp linearly to `target` over `frames` frames.
    Ramp {
        handle: VoiceHandle,
        target: f32,
        frames: u64,
    },
    Stop {
        handle: VoiceHandle,
    },
}

struct Voice {
    handle: VoiceHandle,
    instrument: Instrument,
    phase: f32,
    increment: f32,
    gain: f32,
    target: f32,
    step: f32,
    remaining: u64,
}

impl Voice {
    fn next_sample(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.gain = if self.remaining == 0 {
                self.target
            } else {
                self.gain + self.step
            };
        }
        let sample = self.instrument.sample(self.phase) * self.gain;
        self.phase = (self.phase + self.increment).fract();
        sample
    }
}

/// Renders the active voices into interleaved output buffers.
pub struct Mixer {
    sample_rate: f32,
    channels: usize,
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn new(sample_rate: u32, channels: u16) -> Mixer {
        Mixer {
            sample_rate: sample_rate.max(1) as f32,
            channels: channels.max(1) as usize,
            voices: Vec::new(),
        }
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Start {
                handle,
                pitch,
                gain,
                instrument,
            } => self.voices.push(Voice {
                handle,
                instrument,
                phase: 0.0,
                increment: midi_to_frequency(pitch) / self.sample_rate,
                gain,
                target: gain,
                step: 0.0,
                remaining: 0,
            }),
            Command::Ramp {
                handle,
                target,
                frames,
            } => {
                if let Some(voice) = self.voices.iter_mut().find(|voice| voice.handle == handle) {
                    voice.target = target;
                    voice.remaining = frames;
                    if frames == 0 {
                        voice.gain = target;
                        voice.step = 0.0;
                    } else {
                        voice.step = (target - voice.gain) / frames as f32;
                    }
                }
            }
            Command::Stop { handle } => self.voices.retain(|voice| voice.handle != handle),
        }
    }

    /// Fills `output` with interleaved frames. Every channel gets the same
    /// mono signal.
    pub fn render(&mut self, output: &mut [f32]) {
        for frame in output.chunks_mut(self.channels) {
            let mixed: f32 = self.voices.iter_mut().map(Voice::next_sample).sum();
            let sample = (mixed * MASTER_GAIN).clamp(-CLIP, CLIP);
            frame.fill(sample);
        }
    }

    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// The current gain of a voice, if it is playing.
    pub fn gain(&self, handle: VoiceHandle) -> Option<f32> {
        self.voices
            .iter()
            .find(|voice| voice.handle == handle)
            .map(|voice| voice.gain)
    }
}
