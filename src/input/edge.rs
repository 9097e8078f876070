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

//! Press/release edge detection for tracked buttons.

use tracing::debug;

use super::{ButtonId, InputSnapshot};

/// The lock state of a tracked button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockState {
    #[default]
    Released,
    Pressed,
}

/// A discrete transition of a tracked button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Press(ButtonId),
    Release(ButtonId),
}

/// Activation thresholds. A released button is pressed once its activation
/// exceeds `press`; a pressed button is released once its activation drops to
/// `release` or below. Both default to zero, so any nonzero activation holds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Thresholds {
    pub press: f32,
    pub release: f32,
}

/// Tracks the lock state of a subset of buttons across ticks.
#[derive(Debug)]
pub struct EdgeDetector {
    locks: Vec<(ButtonId, LockState)>,
    thresholds: Thresholds,
}

impl EdgeDetector {
    /// Creates a detector for the given buttons. Duplicates are tracked once.
    pub fn new(tracked: impl IntoIterator<Item = ButtonId>, thresholds: Thresholds) -> Self {
        let mut locks: Vec<(ButtonId, LockState)> = Vec::new();
        for button in tracked {
            if !locks.iter().any(|(b, _)| *b == button) {
                locks.push((button, LockState::Released));
            }
        }
        EdgeDetector { locks, thresholds }
    }

    /// Compares the snapshot against the current lock states and returns the
    /// transitions, in tracked order.
    pub fn detect(&mut self, snapshot: &InputSnapshot) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for (button, state) in self.locks.iter_mut() {
            let activation = snapshot.activation(*button);
            match *state {
                LockState::Released if activation > self.thresholds.press => {
                    *state = LockState::Pressed;
                    transitions.push(Transition::Press(*button));
                }
                LockState::Pressed if activation <= self.thresholds.release => {
                    *state = LockState::Released;
                    transitions.push(Transition::Release(*button));
                }
                _ => {}
            }
        }
        if !transitions.is_empty() {
            debug!(transitions = ?transitions, "Edges detected");
        }
        transitions
    }

    /// Returns the lock state of the button, or `None` if it isn't tracked.
    pub fn state(&self, button: ButtonId) -> Option<LockState> {
        self.locks
            .iter()
            .find(|(b, _)| *b == button)
            .map(|(_, state)| *state)
    }

    /// Returns true if the button participates in edge detection.
    pub fn is_tracked(&self, button: ButtonId) -> bool {
        self.state(button).is_some()
    }
}
