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
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use super::synth::{self, Command, Instrument, Mixer};
use super::{AudioError, PlayOptions, VoiceHandle};
use crate::config;

const DEFAULT_DEVICE: &str = "default";

/// A cpal output device with a synth mixer running on its stream.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host the device belongs to.
    host_id: cpal::HostId,
    /// The stream's sample rate, used to convert ramp durations into frames.
    sample_rate: u32,
    /// Commands for the mixer, drained by the stream callback.
    commands: crossbeam_channel::Sender<Command>,
    instrument: Mutex<Instrument>,
    /// The number of voices the mixer rendered in its last callback.
    active: Arc<AtomicUsize>,
    /// Dropping this lets the output thread close the stream.
    shutdown: Option<crossbeam_channel::Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}Hz) ({})",
            self.name,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Device {
    /// Lists the output devices of every available host.
    pub fn list() -> Result<Vec<String>, AudioError> {
        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(|e| AudioError::Stream(e.to_string()))?;
            let outputs = match host.output_devices() {
                Ok(outputs) => outputs,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };
            for device in outputs {
                if let Ok(name) = device.name() {
                    devices.push(format!("{} ({})", name, host_id.name()));
                }
            }
        }
        devices.sort();
        Ok(devices)
    }

    /// Opens the named output device and starts its stream. "default" picks
    /// the default host's default output.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let span = span!(Level::INFO, "audio device (cpal)");
        let _enter = span.enter();

        let name = config.device();
        let (host_id, device) = Device::find(name)?;
        let device_name = device.name().unwrap_or_else(|_| name.to_string());
        let instrument = Instrument::from_name(config.instrument())?;

        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let active = Arc::new(AtomicUsize::new(0));

        // cpal streams can't leave the thread they were built on, so the
        // thread owns the stream until shutdown.
        let output_thread = {
            let active = active.clone();
            thread::spawn(move || {
                let stream = match build_stream(&device, commands_rx, active) {
                    Ok((stream, sample_rate)) => {
                        let _ = started_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                        return;
                    }
                };
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Output stream closed.");
            })
        };

        let sample_rate = match started_rx.recv() {
            Ok(Ok(sample_rate)) => sample_rate,
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(_) => return Err(AudioError::Closed),
        };

        info!(
            device = device_name,
            host = host_id.name(),
            sample_rate,
            instrument = instrument.name(),
            "Audio output started."
        );
        Ok(Device {
            name: device_name,
            host_id,
            sample_rate,
            commands: commands_tx,
            instrument: Mutex::new(instrument),
            active,
            shutdown: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }

    fn find(name: &str) -> Result<(cpal::HostId, cpal::Device), AudioError> {
        if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            return host
                .default_output_device()
                .map(|device| (host.id(), device))
                .ok_or_else(|| AudioError::NoDevice(name.to_string()));
        }

        for host_id in cpal::available_hosts() {
            let Ok(host) = cpal::host_from_id(host_id) else {
                continue;
            };
            let Ok(outputs) = host.output_devices() else {
                continue;
            };
            for device in outputs {
                if device.name().is_ok_and(|device_name| device_name.trim() == name) {
                    return Ok((host_id, device));
                }
            }
        }
        Err(AudioError::NoDevice(name.to_string()))
    }

    fn send(&self, command: Command) -> Result<(), AudioError> {
        self.commands.send(command).map_err(|_| AudioError::Closed)
    }
}

/// Builds and starts a stream in the device's preferred format. Returns the
/// stream and its sample rate.
fn build_stream(
    device: &cpal::Device,
    commands: crossbeam_channel::Receiver<Command>,
    active: Arc<AtomicUsize>,
) -> Result<(cpal::Stream, u32), AudioError> {
    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Stream(e.to_string()))?;
    let config = supported.config();
    let sample_rate = config.sample_rate.0;
    let mixer = Mixer::new(sample_rate, config.channels);

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => {
            build_typed_stream::<i16>(device, &config, mixer, commands, active)?
        }
        cpal::SampleFormat::U16 => {
            build_typed_stream::<u16>(device, &config, mixer, commands, active)?
        }
        _ => build_typed_stream::<f32>(device, &config, mixer, commands, active)?,
    };
    stream
        .play()
        .map_err(|e| AudioError::Stream(e.to_string()))?;
    Ok((stream, sample_rate))
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
    commands: crossbeam_channel::Receiver<Command>,
    active: Arc<AtomicUsize>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                while let Ok(command) = commands.try_recv() {
                    mixer.apply(command);
                }
                scratch.resize(data.len(), 0.0);
                mixer.render(&mut scratch);
                for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(*src);
                }
                active.store(mixer.active(), Ordering::Relaxed);
            },
            |err| error!(err = err.to_string(), "Audio output stream error."),
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))
}

impl super::Device for Device {
    fn load_instrument(&self, name: &str) -> Result<(), AudioError> {
        let instrument = Instrument::from_name(name)?;
        *self.instrument.lock() = instrument;
        info!(instrument = instrument.name(), "Loaded instrument.");
        Ok(())
    }

    fn instrument(&self) -> String {
        self.instrument.lock().name().to_string()
    }

    fn play(&self, pitch: u8, options: PlayOptions) -> Result<VoiceHandle, AudioError> {
        let handle = VoiceHandle::next();
        self.send(Command::Start {
            handle,
            pitch,
            gain: options.gain,
            instrument: *self.instrument.lock(),
        })?;
        Ok(handle)
    }

    fn ramp_gain(
        &self,
        handle: VoiceHandle,
        target: f32,
        duration: Duration,
    ) -> Result<(), AudioError> {
        self.send(Command::Ramp {
            handle,
            target,
            frames: synth::frames(duration, self.sample_rate),
        })
    }

    fn stop(&self, handle: VoiceHandle) -> Result<(), AudioError> {
        self.send(Command::Stop { handle })
    }

    fn active_voices(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}
