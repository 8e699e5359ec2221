//! Oscillation observation.
//!
//! Ring buffers of recent call signatures and output fingerprints feed three
//! per-step ratios. Observation only — the engine publishes the metrics and
//! moves on.

use std::collections::{HashSet, VecDeque};

use myclaw_core::events::OscillationMetrics;
use myclaw_core::text::fingerprint;

/// Ring-buffer capacity for calls and outputs.
pub const RING_CAPACITY: usize = 6;
/// Fingerprint bound in characters.
pub const FINGERPRINT_MAX_CHARS: usize = 220;

const REPEAT_THRESHOLD: f64 = 0.5;
const NOVELTY_THRESHOLD: f64 = 0.5;
const NO_MUTATION_THRESHOLD: u32 = 2;

/// Tracks recent tool activity for one session.
#[derive(Debug, Default)]
pub struct OscillationTracker {
    recent_calls: VecDeque<String>,
    recent_outputs: VecDeque<String>,
    no_mutation_steps: u32,
}

impl OscillationTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an executed call signature.
    pub fn record_call(&mut self, signature: String) {
        push_bounded(&mut self.recent_calls, signature);
    }

    /// Record a tool output (normalized into a fingerprint).
    pub fn record_output(&mut self, output: &str) {
        push_bounded(
            &mut self.recent_outputs,
            fingerprint(output, FINGERPRINT_MAX_CHARS),
        );
    }

    /// Close a step and compute its metrics.
    ///
    /// `mutated` is whether the step performed a successful mutation; it
    /// resets the no-mutation counter.
    pub fn finish_step(&mut self, mutated: bool) -> OscillationMetrics {
        if mutated {
            self.no_mutation_steps = 0;
        } else {
            self.no_mutation_steps += 1;
        }

        let repeat_ratio = if self.recent_calls.is_empty() {
            0.0
        } else {
            let distinct: HashSet<&String> = self.recent_calls.iter().collect();
            #[allow(clippy::cast_precision_loss)]
            {
                (self.recent_calls.len() - distinct.len()) as f64 / self.recent_calls.len() as f64
            }
        };

        let novelty_ratio = if self.recent_outputs.is_empty() {
            1.0
        } else {
            let distinct_nonempty: HashSet<&String> = self
                .recent_outputs
                .iter()
                .filter(|f| !f.is_empty())
                .collect();
            #[allow(clippy::cast_precision_loss)]
            {
                distinct_nonempty.len() as f64 / self.recent_outputs.len() as f64
            }
        };

        OscillationMetrics {
            repeat_ratio,
            novelty_ratio,
            no_mutation_steps: self.no_mutation_steps,
            possible_oscillation: repeat_ratio >= REPEAT_THRESHOLD
                && novelty_ratio <= NOVELTY_THRESHOLD
                && self.no_mutation_steps >= NO_MUTATION_THRESHOLD,
        }
    }
}

fn push_bounded(ring: &mut VecDeque<String>, value: String) {
    if ring.len() == RING_CAPACITY {
        let _ = ring.pop_front();
    }
    ring.push_back(value);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
