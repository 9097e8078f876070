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
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::config;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle has not been initialized")]
    NotInitialized,

    #[error("oracle failed: {0}")]
    Failed(String),

    #[error("oracle panicked")]
    Panicked,
}

/// A stateful sequence model that picks the next note from a whitelist.
/// Implementations are driven from a single worker thread and are never
/// called concurrently.
pub trait Oracle: Send + 'static {
    /// One-time setup. Called on the worker before any request.
    fn initialize(&mut self) -> Result<(), OracleError>;

    /// Returns one of `candidates`, conditioned on `bucket` and the oracle's
    /// own history.
    fn next_from_whitelist(
        &mut self,
        bucket: u8,
        candidates: &[u8],
        temperature: f32,
    ) -> Result<u8, OracleError>;
}

/// Follows the buttons up and down: higher buckets pull the melody up,
/// lower buckets pull it down.
pub struct ContourOracle {
    rng: StdRng,
    bucket_count: u8,
    step_semitones: u8,
    initialized: bool,
    previous: Option<(u8, u8)>,
}

impl ContourOracle {
    pub fn new(config: &config::Generator) -> ContourOracle {
        let rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ContourOracle {
            rng,
            bucket_count: config.bucket_count(),
            step_semitones: config.step_semitones(),
            initialized: false,
            previous: None,
        }
    }

    fn target(&self, bucket: u8, low: u8, high: u8) -> f32 {
        let step = self.step_semitones as f32;
        let target = match self.previous {
            Some((previous_bucket, previous_note)) => {
                previous_note as f32 + (bucket as f32 - previous_bucket as f32) * step
            }
            None => {
                let centre = (low as f32 + high as f32) / 2.0;
                let middle_bucket = self.bucket_count.saturating_sub(1) as f32 / 2.0;
                centre + (bucket as f32 - middle_bucket) * step
            }
        };
        target.clamp(low as f32, high as f32)
    }
}

impl Oracle for ContourOracle {
    fn initialize(&mut self) -> Result<(), OracleError> {
        self.initialized = true;
        Ok(())
    }

    fn next_from_whitelist(
        &mut self,
        bucket: u8,
        candidates: &[u8],
        temperature: f32,
    ) -> Result<u8, OracleError> {
        if !self.initialized {
            return Err(OracleError::NotInitialized);
        }
        let (Some(low), Some(high)) = (candidates.iter().min(), candidates.iter().max()) else {
            return Err(OracleError::Failed("no candidates".to_string()));
        };
        if temperature <= 0.0 {
            return Err(OracleError::Failed(format!(
                "temperature must be positive, got {}",
                temperature
            )));
        }

        let target = self.target(bucket, *low, *high);
        let scores: Vec<f32> = candidates
            .iter()
            .map(|candidate| -(*candidate as f32 - target).abs() / temperature)
            .collect();
        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let weights: Vec<f32> = scores.iter().map(|score| (score - max).exp()).collect();
        let total: f32 = weights.iter().sum();

        let mut remaining = self.rng.gen::<f32>() * total;
        let mut chosen = None;
        for (candidate, weight) in candidates.iter().zip(weights.iter()) {
            if remaining < *weight {
                chosen = Some(*candidate);
                break;
            }
            remaining -= weight;
        }
        // Rounding can leave a sliver past the last weight.
        let chosen = match chosen {
            Some(chosen) => chosen,
            None => candidates
                .iter()
                .zip(weights.iter())
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(candidate, _)| *candidate)
                .unwrap_or(*low),
        };

        debug!(bucket, target, note = chosen, "Contour oracle picked a note.");
        self.previous = Some((bucket, chosen));
        Ok(chosen)
    }
}
