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
use std::{collections::VecDeque, fmt, sync::Arc};

use parking_lot::Mutex;

use super::InputSnapshot;

/// A mock input source. Replays scripted snapshots, one per sample. A `None`
/// entry behaves like a disconnected controller. Once the script runs out the
/// last entry is repeated.
#[derive(Clone)]
pub struct Source {
    name: String,
    script: Arc<Mutex<VecDeque<Option<InputSnapshot>>>>,
    last: Option<InputSnapshot>,
}

impl Source {
    /// Gets the given mock source with an empty script.
    pub fn get(name: &str) -> Source {
        Source {
            name: name.to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            last: None,
        }
    }

    /// Queues a snapshot to be returned by a future sample.
    pub fn push(&self, snapshot: Option<InputSnapshot>) {
        self.script.lock().push_back(snapshot);
    }

    /// Returns the number of queued snapshots that have not been sampled yet.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl super::InputSource for Source {
    fn sample(&mut self) -> Option<InputSnapshot> {
        if let Some(next) = self.script.lock().pop_front() {
            self.last = next;
        }
        self.last
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod test {
    use crate::input::{ButtonId, InputSource};

    use super::*;

    #[test]
    fn test_replays_script_then_holds_last() {
        let source = Source::get("mock");
        let pressed = InputSnapshot::new().with_button(ButtonId::A, 1.0);
        source.push(None);
        source.push(Some(pressed));

        // Clones share the script so tests can keep feeding a boxed source.
        let mut sampler = source.clone();
        assert_eq!(None, sampler.sample());
        assert_eq!(Some(pressed), sampler.sample());
        assert_eq!(0, source.remaining());
        assert_eq!(Some(pressed), sampler.sample());

        source.push(None);
        assert_eq!(None, sampler.sample());
        assert_eq!(None, sampler.sample());
    }
}
