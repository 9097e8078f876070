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

//! The playing session. Owns every component and is the only writer of
//! session state: ticks, generator results, release timers and commands are
//! all applied from one loop.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, mpsc, watch},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, span, warn, Level};

use crate::audio::{AudioError, Device};
use crate::config;
use crate::config::error::ConfigError;
use crate::controller::ControllerMapper;
use crate::generator::{GenerateError, GeneratorEvent, NoteGenerator, Oracle};
use crate::input::edge::{EdgeDetector, Transition};
use crate::input::{ButtonId, InputSnapshot, InputSource};
use crate::scale::ScaleResolver;
use crate::voice::{NoteDown, ReleaseElapsed, VoiceManager};

const PRESS_NOTICE_CAPACITY: usize = 64;

/// What the UI needs to draw one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UiFrame {
    pub snapshot: InputSnapshot,
    pub sustain: f32,
}

/// Sent to the scene layer on every press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PressNotice {
    pub button: ButtonId,
    pub bucket: u8,
    pub direction: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    SelectInstrument(String),
    Shutdown,
}

/// Work arriving from outside the tick.
#[derive(Debug)]
pub enum SessionEvent {
    Generator(GeneratorEvent),
    Release(ReleaseElapsed),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// What a held button is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeldNote {
    /// Waiting on the oracle.
    Pending,
    Sounding(u8),
}

pub struct Session {
    input: Box<dyn InputSource>,
    edges: EdgeDetector,
    buckets: HashMap<ButtonId, u8>,
    mapper: ControllerMapper,
    generator: NoteGenerator,
    generator_rx: mpsc::UnboundedReceiver<GeneratorEvent>,
    voices: VoiceManager,
    release_rx: mpsc::UnboundedReceiver<ReleaseElapsed>,
    device: Arc<dyn Device>,
    held: HashMap<ButtonId, HeldNote>,
    /// A button released while its note was still being generated.
    orphaned: Option<ButtonId>,
    tick_period: Duration,
    ui_tx: watch::Sender<UiFrame>,
    presses_tx: broadcast::Sender<PressNotice>,
}

impl Session {
    /// Builds a session and starts its oracle worker. Must be called from
    /// within a tokio runtime.
    pub fn new(
        config: &config::Session,
        input: Box<dyn InputSource>,
        device: Arc<dyn Device>,
        oracle: Box<dyn Oracle>,
    ) -> Result<Session, SessionError> {
        let resolver = ScaleResolver::from_config(config.scales())?;
        let bindings = config.input().buttons();
        let edges = EdgeDetector::new(
            bindings.iter().map(|binding| binding.button),
            config.input().thresholds(),
        );
        let buckets = bindings
            .iter()
            .map(|binding| (binding.button, binding.bucket))
            .collect();

        device.load_instrument(config.audio().instrument())?;
        let (voices, release_rx) = VoiceManager::new(device.clone(), config.audio())?;
        let (generator, generator_rx) =
            NoteGenerator::spawn(resolver, config.generator(), oracle);
        let (ui_tx, _) = watch::channel(UiFrame::default());
        let (presses_tx, _) = broadcast::channel(PRESS_NOTICE_CAPACITY);

        info!(
            input = input.to_string(),
            device = device.to_string(),
            buttons = bindings.len(),
            "Session created."
        );
        Ok(Session {
            input,
            edges,
            buckets,
            mapper: ControllerMapper::new(config.input(), config.generator()),
            generator,
            generator_rx,
            voices,
            release_rx,
            device,
            held: HashMap::new(),
            orphaned: None,
            tick_period: config.input().tick_period(),
            ui_tx,
            presses_tx,
        })
    }

    /// Runs one frame: samples the controller, updates sustain, publishes the
    /// UI frame and acts on any press or release. Does nothing when no
    /// controller is connected. Returns the transitions it acted on.
    pub fn tick(&mut self) -> Vec<Transition> {
        let Some(snapshot) = self.input.sample() else {
            return Vec::new();
        };

        let sustain = self.mapper.update(&snapshot);
        self.ui_tx.send_replace(UiFrame { snapshot, sustain });

        let transitions = self.edges.detect(&snapshot);
        for transition in &transitions {
            match *transition {
                Transition::Press(button) => self.press(button, &snapshot),
                Transition::Release(button) => self.release(button),
            }
        }
        transitions
    }

    fn press(&mut self, button: ButtonId, snapshot: &InputSnapshot) {
        let bound = self.buckets.get(&button).copied().unwrap_or_default();
        let notice = PressNotice {
            button,
            bucket: self.mapper.bucket(bound, snapshot),
            direction: self.mapper.direction(snapshot),
        };
        // Nobody listening is fine.
        let _ = self.presses_tx.send(notice);

        match self.generator.request(button, notice.bucket) {
            Ok(()) => {
                self.held.insert(button, HeldNote::Pending);
            }
            Err(e @ (GenerateError::NotReady | GenerateError::Busy)) => {
                debug!(button = button.label(), err = %e, "Dropping press.");
            }
            Err(e) => {
                warn!(button = button.label(), err = %e, "Dropping press.");
            }
        }
    }

    fn release(&mut self, button: ButtonId) {
        match self.held.remove(&button) {
            Some(HeldNote::Sounding(pitch)) => {
                self.voices.note_up(pitch, self.mapper.sustain());
            }
            Some(HeldNote::Pending) => self.orphaned = Some(button),
            None => {}
        }
    }

    /// Waits for the next generator result or release timer.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            Some(event) = self.generator_rx.recv() => Some(SessionEvent::Generator(event)),
            Some(elapsed) = self.release_rx.recv() => Some(SessionEvent::Release(elapsed)),
            else => None,
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Generator(event) => {
                if let Some((button, result)) = self.generator.handle_event(event) {
                    self.generated(button, result);
                }
            }
            SessionEvent::Release(elapsed) => {
                self.voices.complete_release(elapsed);
            }
        }
    }

    fn generated(&mut self, button: ButtonId, result: Result<u8, GenerateError>) {
        let held = self.held.get(&button) == Some(&HeldNote::Pending);
        let orphaned = self.orphaned == Some(button);
        if orphaned {
            self.orphaned = None;
        }

        let index = match result {
            Ok(index) => index,
            Err(_) => {
                if held {
                    self.held.remove(&button);
                }
                return;
            }
        };
        let pitch = self.generator.pitch(index);

        if held {
            match self.voices.note_down(pitch) {
                Ok(NoteDown::Started | NoteDown::Superseded) => {
                    self.held.insert(button, HeldNote::Sounding(pitch));
                }
                Ok(NoteDown::AlreadySounding) => {
                    debug!(button = button.label(), pitch, "Pitch already sounding.");
                    self.held.remove(&button);
                }
                Err(e) => {
                    error!(button = button.label(), pitch, err = %e, "Unable to start voice.");
                    self.held.remove(&button);
                }
            }
        } else if orphaned {
            // Released before the oracle answered: still sound it, then let go.
            match self.voices.note_down(pitch) {
                Ok(NoteDown::Started | NoteDown::Superseded) => {
                    self.voices.note_up(pitch, self.mapper.sustain());
                }
                Ok(NoteDown::AlreadySounding) => {}
                Err(e) => {
                    error!(button = button.label(), pitch, err = %e, "Unable to start voice.");
                }
            }
        }
    }

    /// Switches the instrument. Unknown names keep the current one.
    pub fn select_instrument(&self, name: &str) -> Result<(), AudioError> {
        match self.device.load_instrument(name) {
            Ok(()) => {
                info!(instrument = name, "Selected instrument.");
                Ok(())
            }
            Err(e) => {
                warn!(instrument = name, err = %e, "Unable to select instrument.");
                Err(e)
            }
        }
    }

    /// Runs the session until a shutdown command arrives or the command
    /// channel closes. Every voice is stopped on the way out.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let span = span!(Level::INFO, "session");
        let _enter = span.enter();

        info!(tick_ms = self.tick_period.as_millis() as u64, "Session started.");
        let mut interval = time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                Some(event) = self.generator_rx.recv() => {
                    self.handle_event(SessionEvent::Generator(event));
                }
                Some(elapsed) = self.release_rx.recv() => {
                    self.handle_event(SessionEvent::Release(elapsed));
                }
                command = commands.recv() => match command {
                    Some(SessionCommand::SelectInstrument(name)) => {
                        let _ = self.select_instrument(&name);
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
            }
        }

        self.voices.clear();
        info!("Session stopped.");
    }

    /// Receives the latest snapshot and sustain strength every tick.
    pub fn subscribe_ui(&self) -> watch::Receiver<UiFrame> {
        self.ui_tx.subscribe()
    }

    /// Receives a notice for every press.
    pub fn subscribe_presses(&self) -> broadcast::Receiver<PressNotice> {
        self.presses_tx.subscribe()
    }

    pub fn sustain(&self) -> f32 {
        self.mapper.sustain()
    }

    pub fn generator(&self) -> &NoteGenerator {
        &self.generator
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::audio::mock::{self as mock_audio, Call};
    use crate::config::ButtonBinding;
    use crate::generator::oracle::scripted::{Response, ScriptedOracle};
    use crate::input::{mock as mock_input, Axis};
    use crate::voice::VoiceStatus;

    struct Rig {
        session: Session,
        pad: mock_input::Source,
        device: mock_audio::Device,
        oracle: ScriptedOracle,
    }

    impl Rig {
        fn frame(&mut self, snapshot: Option<InputSnapshot>) -> Vec<Transition> {
            self.pad.push(snapshot);
            self.session.tick()
        }

        async fn settle(&mut self) {
            let event = tokio::time::timeout(Duration::from_secs(5), self.session.next_event())
                .await
                .expect("event in time")
                .expect("event");
            self.session.handle_event(event);
        }

        /// Handles events until the outstanding generation request completes.
        async fn generate(&mut self) {
            self.settle().await;
            while self.session.generator().is_pending() {
                self.settle().await;
            }
        }

        fn plays(&self) -> Vec<u8> {
            self.device
                .calls()
                .iter()
                .filter_map(|call| match call {
                    Call::Play { pitch, .. } => Some(*pitch),
                    _ => None,
                })
                .collect()
        }
    }

    fn bindings() -> Vec<ButtonBinding> {
        vec![
            ButtonBinding {
                button: ButtonId::A,
                bucket: 4,
            },
            ButtonBinding {
                button: ButtonId::B,
                bucket: 1,
            },
        ]
    }

    async fn rig() -> Rig {
        rig_with(config::Input::new("mock-pad").with_buttons(bindings())).await
    }

    async fn rig_with(input: config::Input) -> Rig {
        let config = config::Session::new(
            input,
            config::Audio::new("mock-out").with_timing("200ms", "10ms"),
            config::Generator::default(),
            config::Scales::default(),
        );
        let pad = mock_input::Source::get("mock-pad");
        let device = mock_audio::Device::get("mock-out");
        let oracle = ScriptedOracle::new();
        let session = Session::new(
            &config,
            Box::new(pad.clone()),
            Arc::new(device.clone()),
            Box::new(oracle.clone()),
        )
        .expect("session");

        let mut rig = Rig {
            session,
            pad,
            device,
            oracle,
        };
        rig.settle().await;
        assert!(rig.session.generator().is_ready());
        rig
    }

    fn pressed(button: ButtonId) -> InputSnapshot {
        InputSnapshot::new().with_button(button, 1.0)
    }

    fn scale_a_candidates() -> Vec<u8> {
        (0..88u8)
            .filter(|index| [0, 3, 5, 6, 7, 10].contains(&((index + 9) % 12)))
            .collect()
    }

    #[tokio::test]
    async fn test_absent_controller() {
        let mut rig = rig().await;
        let mut ui = rig.session.subscribe_ui();
        let mut presses = rig.session.subscribe_presses();

        assert!(rig.frame(None).is_empty());
        assert!(rig.frame(None).is_empty());
        assert!(!ui.has_changed().unwrap());
        assert!(presses.try_recv().is_err());
        assert!(!rig.session.generator().is_pending());
        assert_eq!(0, rig.session.voices().active_count());
        assert!(rig.oracle.calls().is_empty());
        assert_eq!(vec![Call::LoadInstrument("ocarina".to_string())], rig.device.calls());
    }

    #[tokio::test]
    async fn test_press_sounds_and_release_tears_down() {
        let mut rig = rig().await;
        let mut presses = rig.session.subscribe_presses();
        let ui = rig.session.subscribe_ui();

        let snapshot = pressed(ButtonId::A)
            .with_button(ButtonId::RightTrigger, 0.0)
            .with_axis(Axis::LeftStickY, 1.0);
        assert_eq!(vec![Transition::Press(ButtonId::A)], rig.frame(Some(snapshot)));
        assert_eq!(
            PressNotice {
                button: ButtonId::A,
                bucket: 4,
                direction: 4,
            },
            presses.try_recv().unwrap()
        );
        assert_eq!(snapshot, ui.borrow().snapshot);

        rig.generate().await;
        let candidates = scale_a_candidates();
        let calls = rig.oracle.calls();
        assert_eq!(1, calls.len());
        assert_eq!(4, calls[0].bucket);
        assert_eq!(candidates, calls[0].candidates);

        let pitch = 21 + candidates[0];
        assert_eq!(vec![pitch], rig.plays());
        assert_eq!(Some(candidates[0]), rig.session.generator().history());
        assert_eq!(VoiceStatus::Sounding, rig.session.voices().status(pitch));

        // Holding produces no further events.
        assert!(rig.frame(Some(snapshot)).is_empty());

        assert_eq!(
            vec![Transition::Release(ButtonId::A)],
            rig.frame(Some(InputSnapshot::new()))
        );
        assert_eq!(VoiceStatus::Releasing, rig.session.voices().status(pitch));

        rig.settle().await;
        assert_eq!(VoiceStatus::Idle, rig.session.voices().status(pitch));
        assert_eq!(0, rig.device.active_voices());
    }

    #[tokio::test]
    async fn test_disconnect_lets_release_finish() {
        let mut rig = rig().await;
        let mut presses = rig.session.subscribe_presses();

        rig.frame(Some(pressed(ButtonId::A)));
        rig.generate().await;
        let pitch = 21 + scale_a_candidates()[0];
        assert_eq!(ButtonId::A, presses.try_recv().unwrap().button);

        rig.frame(Some(InputSnapshot::new().with_button(ButtonId::RightTrigger, 0.5)));
        assert_eq!(VoiceStatus::Releasing, rig.session.voices().status(pitch));

        // The controller goes away mid-release.
        assert!(rig.frame(None).is_empty());
        assert!(rig.frame(None).is_empty());
        assert_eq!(0.5, rig.session.sustain());
        assert_eq!(VoiceStatus::Releasing, rig.session.voices().status(pitch));

        rig.settle().await;
        assert_eq!(VoiceStatus::Idle, rig.session.voices().status(pitch));
        assert_eq!(0, rig.device.active_voices());
        assert!(presses.try_recv().is_err());
        assert_eq!(1, rig.oracle.calls().len());
    }

    #[tokio::test]
    async fn test_hysteresis_holds_note() {
        let input = config::Input::new("mock-pad")
            .with_buttons(bindings())
            .with_thresholds(0.5, 0.2);
        let mut rig = rig_with(input).await;
        let a = |activation| Some(InputSnapshot::new().with_button(ButtonId::A, activation));

        assert!(rig.frame(a(0.3)).is_empty());
        assert_eq!(vec![Transition::Press(ButtonId::A)], rig.frame(a(0.6)));
        rig.generate().await;
        let pitch = 21 + scale_a_candidates()[0];

        assert!(rig.frame(a(0.3)).is_empty());
        assert_eq!(VoiceStatus::Sounding, rig.session.voices().status(pitch));
        assert_eq!(vec![Transition::Release(ButtonId::A)], rig.frame(a(0.1)));
        assert_eq!(VoiceStatus::Releasing, rig.session.voices().status(pitch));
    }

    #[tokio::test]
    async fn test_history_excluded_on_next_press() {
        let mut rig = rig().await;
        let candidates = scale_a_candidates();

        rig.frame(Some(pressed(ButtonId::A)));
        rig.generate().await;
        rig.frame(Some(InputSnapshot::new()));
        rig.frame(Some(pressed(ButtonId::A)));
        rig.generate().await;

        let calls = rig.oracle.calls();
        assert_eq!(2, calls.len());
        assert!(!calls[1].candidates.contains(&candidates[0]));
        assert_eq!(candidates[1], calls[1].candidates[0]);
        assert_eq!(vec![21 + candidates[0], 21 + candidates[1]], rig.plays());
    }

    #[tokio::test]
    async fn test_press_while_pending_is_dropped() {
        let mut rig = rig().await;
        let mut presses = rig.session.subscribe_presses();

        rig.frame(Some(pressed(ButtonId::A)));
        rig.frame(Some(pressed(ButtonId::A).with_button(ButtonId::B, 1.0)));
        assert!(rig.session.generator().is_pending());

        // Both presses reach the scene layer; only one reaches the oracle.
        assert_eq!(ButtonId::A, presses.try_recv().unwrap().button);
        assert_eq!(ButtonId::B, presses.try_recv().unwrap().button);
        rig.generate().await;
        assert_eq!(1, rig.oracle.calls().len());
        assert_eq!(1, rig.plays().len());

        // B's release has nothing to let go of.
        rig.frame(Some(pressed(ButtonId::A)));
        assert_eq!(1, rig.session.voices().active_count());
    }

    #[tokio::test]
    async fn test_release_while_pending_still_sounds() {
        let mut rig = rig().await;

        rig.frame(Some(pressed(ButtonId::A)));
        rig.frame(Some(InputSnapshot::new().with_button(ButtonId::RightTrigger, 0.5)));
        rig.generate().await;

        let pitch = 21 + scale_a_candidates()[0];
        assert_eq!(vec![pitch], rig.plays());
        assert_eq!(VoiceStatus::Releasing, rig.session.voices().status(pitch));
        assert!(rig.device.calls().iter().any(|call| matches!(
            call,
            Call::Ramp { duration, .. } if *duration == Duration::from_millis(100)
        )));

        rig.settle().await;
        assert_eq!(VoiceStatus::Idle, rig.session.voices().status(pitch));
    }

    #[tokio::test]
    async fn test_oracle_panic_is_absorbed() {
        let mut rig = rig().await;
        rig.oracle.respond(Response::Panic);

        rig.frame(Some(pressed(ButtonId::A)));
        rig.generate().await;
        assert!(rig.plays().is_empty());
        assert!(!rig.session.generator().is_pending());

        rig.frame(Some(InputSnapshot::new()));
        rig.frame(Some(pressed(ButtonId::A)));
        rig.generate().await;
        assert_eq!(1, rig.plays().len());
    }

    #[tokio::test]
    async fn test_audio_failure_drops_note() {
        let mut rig = rig().await;
        rig.device.set_fail_play(true);

        rig.frame(Some(pressed(ButtonId::A)));
        rig.generate().await;
        assert_eq!(0, rig.session.voices().active_count());

        // Releasing afterwards is a no-op.
        rig.frame(Some(InputSnapshot::new()));
        assert_eq!(0, rig.session.voices().active_count());
    }

    #[tokio::test]
    async fn test_sustain_tracks_trigger() {
        let mut rig = rig().await;
        let ui = rig.session.subscribe_ui();

        rig.frame(Some(InputSnapshot::new().with_button(ButtonId::RightTrigger, 0.75)));
        assert_eq!(0.75, rig.session.sustain());
        assert_eq!(0.75, ui.borrow().sustain);
    }

    #[tokio::test]
    async fn test_run_handles_commands() {
        let mut rig = rig().await;
        rig.frame(Some(pressed(ButtonId::A)));
        rig.generate().await;
        assert_eq!(1, rig.device.active_voices());

        let (commands_tx, commands_rx) = mpsc::channel(4);
        commands_tx
            .send(SessionCommand::SelectInstrument("organ".to_string()))
            .await
            .unwrap();
        commands_tx
            .send(SessionCommand::SelectInstrument("kazoo".to_string()))
            .await
            .unwrap();
        commands_tx.send(SessionCommand::Shutdown).await.unwrap();

        let device = rig.device.clone();
        tokio::time::timeout(Duration::from_secs(5), rig.session.run(commands_rx))
            .await
            .expect("session stops");

        assert_eq!("organ", device.instrument());
        assert_eq!(0, device.active_voices());
    }
}
