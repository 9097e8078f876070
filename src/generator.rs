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

//! Note generation. Builds a scale-filtered candidate list for each press and
//! hands it to the oracle, which runs on its own blocking worker so a slow
//! model never stalls the tick loop.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::mpsc as std_mpsc,
};

use tokio::sync::mpsc;
use tracing::{debug, error, info, span, warn, Level};

use crate::config;
use crate::input::ButtonId;
use crate::scale::ScaleResolver;

pub mod oracle;

pub use self::oracle::{ContourOracle, Oracle, OracleError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("note generator is not ready")]
    NotReady,

    #[error("a generation request is already in flight")]
    Busy,

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("oracle returned {0}, which is not a candidate")]
    NotInCandidates(u8),
}

/// Messages from the oracle worker.
#[derive(Debug)]
pub enum GeneratorEvent {
    /// The oracle finished initializing.
    Ready,
    /// The oracle could not be initialized. No notes will be generated.
    InitFailed(OracleError),
    /// The result of one request.
    Generated {
        button: ButtonId,
        result: Result<u8, OracleError>,
    },
}

struct Request {
    button: ButtonId,
    bucket: u8,
    candidates: Vec<u8>,
    temperature: f32,
}

struct Pending {
    button: ButtonId,
    candidates: Vec<u8>,
}

/// Produces note indices for presses. Holds the generation history.
pub struct NoteGenerator {
    resolver: ScaleResolver,
    key_count: u8,
    lowest_midi_note: u8,
    scale_offset: u8,
    temperature: f32,
    requests: std_mpsc::Sender<Request>,
    ready: bool,
    pending: Option<Pending>,
    history: Option<u8>,
}

impl NoteGenerator {
    /// Starts the oracle worker. The worker initializes the oracle and then
    /// serves requests until the generator is dropped. Its results arrive on
    /// the returned receiver and must be fed back through `handle_event`.
    pub fn spawn(
        resolver: ScaleResolver,
        config: &config::Generator,
        mut oracle: Box<dyn Oracle>,
    ) -> (NoteGenerator, mpsc::UnboundedReceiver<GeneratorEvent>) {
        let (requests_tx, requests_rx) = std_mpsc::channel::<Request>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "oracle");
            let _enter = span.enter();

            let initialized = match catch_unwind(AssertUnwindSafe(|| oracle.initialize())) {
                Ok(result) => result,
                Err(_) => Err(OracleError::Panicked),
            };
            if let Err(e) = initialized {
                let _ = events_tx.send(GeneratorEvent::InitFailed(e));
                return;
            }
            if events_tx.send(GeneratorEvent::Ready).is_err() {
                return;
            }
            info!("Oracle ready.");

            while let Ok(request) = requests_rx.recv() {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    oracle.next_from_whitelist(
                        request.bucket,
                        &request.candidates,
                        request.temperature,
                    )
                }))
                .unwrap_or(Err(OracleError::Panicked));

                if events_tx
                    .send(GeneratorEvent::Generated {
                        button: request.button,
                        result,
                    })
                    .is_err()
                {
                    break;
                }
            }
            debug!("Oracle worker stopped.");
        });

        (
            NoteGenerator {
                resolver,
                key_count: config.key_count(),
                lowest_midi_note: config.lowest_midi_note(),
                scale_offset: config.scale_offset(),
                temperature: config.temperature(),
                requests: requests_tx,
                ready: false,
                pending: None,
                history: None,
            },
            events_rx,
        )
    }

    /// The candidate list for a press of `button`: every key in range whose
    /// pitch class is in the button's scale, minus the previous note unless
    /// that would leave nothing.
    pub fn candidates(&self, button: ButtonId) -> Vec<u8> {
        let scale = self.resolver.resolve(button);
        let in_scale: Vec<u8> = (0..self.key_count)
            .filter(|index| scale.admits(*index, self.scale_offset))
            .collect();

        match self.history {
            Some(previous) => {
                let filtered: Vec<u8> = in_scale
                    .iter()
                    .copied()
                    .filter(|index| *index != previous)
                    .collect();
                if filtered.is_empty() {
                    in_scale
                } else {
                    filtered
                }
            }
            None => in_scale,
        }
    }

    /// Submits a generation request for a press. Fails without side effects
    /// when the oracle isn't ready or another request is in flight.
    pub fn request(&mut self, button: ButtonId, bucket: u8) -> Result<(), GenerateError> {
        if !self.ready {
            return Err(GenerateError::NotReady);
        }
        if self.pending.is_some() {
            return Err(GenerateError::Busy);
        }

        let candidates = self.candidates(button);
        self.requests
            .send(Request {
                button,
                bucket,
                candidates: candidates.clone(),
                temperature: self.temperature,
            })
            .map_err(|_| OracleError::Failed("oracle worker has stopped".to_string()))?;

        debug!(
            button = button.label(),
            bucket,
            candidates = candidates.len(),
            "Requested note."
        );
        self.pending = Some(Pending { button, candidates });
        Ok(())
    }

    /// Applies a worker message. Returns the button and the outcome when the
    /// message completes a request.
    pub fn handle_event(
        &mut self,
        event: GeneratorEvent,
    ) -> Option<(ButtonId, Result<u8, GenerateError>)> {
        match event {
            GeneratorEvent::Ready => {
                self.ready = true;
                None
            }
            GeneratorEvent::InitFailed(e) => {
                error!(err = %e, "Oracle failed to initialize, no notes will be generated.");
                None
            }
            GeneratorEvent::Generated { button, result } => {
                let Some(pending) = self.pending.take() else {
                    warn!(button = button.label(), "Dropping unexpected oracle result.");
                    return None;
                };

                let outcome = match result {
                    Ok(index) if pending.candidates.contains(&index) => {
                        self.history = Some(index);
                        Ok(index)
                    }
                    Ok(index) => Err(GenerateError::NotInCandidates(index)),
                    Err(e) => Err(GenerateError::Oracle(e)),
                };
                if let Err(e) = &outcome {
                    warn!(button = button.label(), err = %e, "Note generation failed.");
                }
                Some((pending.button, outcome))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The most recently generated note index.
    pub fn history(&self) -> Option<u8> {
        self.history
    }

    /// The MIDI pitch of a note index.
    pub fn pitch(&self, index: u8) -> u8 {
        self.lowest_midi_note.saturating_add(index)
    }
}

#[cfg(test)]
mod test {
    use super::oracle::scripted::{Response, ScriptedOracle};
    use super::*;

    fn spawn(oracle: ScriptedOracle) -> (NoteGenerator, mpsc::UnboundedReceiver<GeneratorEvent>) {
        let config = config::Generator::default();
        let resolver =
            ScaleResolver::from_config(&config::Scales::default()).expect("default scales");
        NoteGenerator::spawn(resolver, &config, Box::new(oracle))
    }

    async fn ready(
        generator: &mut NoteGenerator,
        events: &mut mpsc::UnboundedReceiver<GeneratorEvent>,
    ) {
        let event = events.recv().await.expect("worker event");
        assert!(matches!(event, GeneratorEvent::Ready));
        assert!(generator.handle_event(event).is_none());
        assert!(generator.is_ready());
    }

    async fn next(
        generator: &mut NoteGenerator,
        events: &mut mpsc::UnboundedReceiver<GeneratorEvent>,
    ) -> (ButtonId, Result<u8, GenerateError>) {
        let event = events.recv().await.expect("worker event");
        generator.handle_event(event).expect("request outcome")
    }

    fn expected_for_a() -> Vec<u8> {
        (0..88u8)
            .filter(|index| [0, 3, 5, 6, 7, 10].contains(&((index + 9) % 12)))
            .collect()
    }

    #[tokio::test]
    async fn test_not_ready_before_initialize() {
        let (mut generator, _events) = spawn(ScriptedOracle::new());
        assert_eq!(Err(GenerateError::NotReady), generator.request(ButtonId::A, 0));
        assert!(!generator.is_pending());
    }

    #[tokio::test]
    async fn test_init_failure_keeps_generator_unready() {
        let (mut generator, mut events) = spawn(ScriptedOracle::failing_initialize());
        let event = events.recv().await.expect("worker event");
        assert!(matches!(event, GeneratorEvent::InitFailed(_)));
        assert!(generator.handle_event(event).is_none());
        assert_eq!(Err(GenerateError::NotReady), generator.request(ButtonId::A, 0));
    }

    #[tokio::test]
    async fn test_candidates_for_a_without_history() {
        let oracle = ScriptedOracle::new();
        let (mut generator, mut events) = spawn(oracle.clone());
        ready(&mut generator, &mut events).await;

        let expected = expected_for_a();
        assert_eq!(expected, generator.candidates(ButtonId::A));

        generator.request(ButtonId::A, 4).unwrap();
        let (button, result) = next(&mut generator, &mut events).await;
        assert_eq!(ButtonId::A, button);
        assert_eq!(Ok(expected[0]), result);
        assert_eq!(Some(expected[0]), generator.history());

        let calls = oracle.calls();
        assert_eq!(1, calls.len());
        assert_eq!(4, calls[0].bucket);
        assert_eq!(expected, calls[0].candidates);
        assert_eq!(0.25, calls[0].temperature);
    }

    #[tokio::test]
    async fn test_history_is_excluded() {
        let oracle = ScriptedOracle::new();
        let (mut generator, mut events) = spawn(oracle.clone());
        ready(&mut generator, &mut events).await;

        let expected = expected_for_a();
        oracle.respond(Response::Index(expected[3]));
        generator.request(ButtonId::A, 4).unwrap();
        assert_eq!(Ok(expected[3]), next(&mut generator, &mut events).await.1);

        generator.request(ButtonId::A, 4).unwrap();
        next(&mut generator, &mut events).await.1.unwrap();

        let second = &oracle.calls()[1].candidates;
        assert!(!second.contains(&expected[3]));
        assert_eq!(expected.len() - 1, second.len());
    }

    #[tokio::test]
    async fn test_repetition_allowed_when_nothing_else_fits() {
        // One octave of keys, so pitch class 9 has exactly one index.
        let session = config::Session::from_yaml("generator:\n  key_count: 12\n").unwrap();
        let resolver = ScaleResolver::new(
            crate::scale::ScaleSet::from_values(&[9]).unwrap(),
            Default::default(),
        );
        let (mut generator, mut events) = NoteGenerator::spawn(
            resolver,
            session.generator(),
            Box::new(ScriptedOracle::new()),
        );
        ready(&mut generator, &mut events).await;

        assert_eq!(vec![0], generator.candidates(ButtonId::B));
        generator.request(ButtonId::B, 0).unwrap();
        assert_eq!(Ok(0), next(&mut generator, &mut events).await.1);
        assert_eq!(vec![0], generator.candidates(ButtonId::B));
    }

    #[tokio::test]
    async fn test_busy_drops_second_request() {
        let oracle = ScriptedOracle::new();
        let (mut generator, mut events) = spawn(oracle.clone());
        ready(&mut generator, &mut events).await;

        generator.request(ButtonId::A, 1).unwrap();
        assert_eq!(Err(GenerateError::Busy), generator.request(ButtonId::B, 2));
        assert!(generator.is_pending());

        assert_eq!(ButtonId::A, next(&mut generator, &mut events).await.0);
        assert!(!generator.is_pending());
        assert_eq!(1, oracle.calls().len());
    }

    #[tokio::test]
    async fn test_oracle_failures_are_reported() {
        let oracle = ScriptedOracle::new();
        let (mut generator, mut events) = spawn(oracle.clone());
        ready(&mut generator, &mut events).await;

        oracle.respond(Response::Panic);
        generator.request(ButtonId::A, 0).unwrap();
        assert_eq!(
            Err(GenerateError::Oracle(OracleError::Panicked)),
            next(&mut generator, &mut events).await.1
        );
        assert_eq!(None, generator.history());

        // Index 0 is pitch class 9, outside A's scale.
        oracle.respond(Response::Index(0));
        generator.request(ButtonId::A, 0).unwrap();
        assert_eq!(
            Err(GenerateError::NotInCandidates(0)),
            next(&mut generator, &mut events).await.1
        );
        assert_eq!(None, generator.history());

        oracle.respond(Response::Fail);
        generator.request(ButtonId::A, 0).unwrap();
        assert!(matches!(
            next(&mut generator, &mut events).await.1,
            Err(GenerateError::Oracle(OracleError::Failed(_)))
        ));

        // The worker survives all of the above.
        generator.request(ButtonId::A, 0).unwrap();
        assert!(next(&mut generator, &mut events).await.1.is_ok());
        assert_eq!(4, oracle.calls().len());
    }

    #[tokio::test]
    async fn test_pitch() {
        let (generator, _events) = spawn(ScriptedOracle::new());
        assert_eq!(21, generator.pitch(0));
        assert_eq!(108, generator.pitch(87));
    }
}
