//! Temperature-scaled softmax and weighted sampling.
//!
//! Randomness comes from a `RandomSource` so callers can swap in a seeded
//! generator, a fixed draw or plain argmax.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lowest temperature the sampler will divide by
pub const MIN_SELECTION_TEMPERATURE: f64 = 0.05;

/// Clamp a configured temperature to the sampler floor (NaN maps to the floor)
pub fn safe_temperature(temperature: f64) -> f64 {
    if temperature.is_nan() {
        MIN_SELECTION_TEMPERATURE
    } else {
        temperature.max(MIN_SELECTION_TEMPERATURE)
    }
}

/// Softmax of `logits / temperature` with max-subtraction.
///
/// - NaN logits are treated as negative infinity.
/// - If no logit can carry mass (empty or all negative infinity) every probability is 0.
/// - If the weights collapse (sum non-finite or not positive, or a +inf logit)
///   the mass is split evenly among the indices holding the maximum logit.
pub fn probabilities(logits: &[f64], temperature: f64) -> Vec<f64> {
    let logits: Vec<f64> = logits
        .iter()
        .map(|l| if l.is_nan() { f64::NEG_INFINITY } else { *l })
        .collect();

    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return vec![0.0; logits.len()];
    }

    let temp = safe_temperature(temperature);
    let weights: Vec<f64> = logits.iter().map(|l| ((l - max) / temp).exp()).collect();
    let total: f64 = weights.iter().sum();

    if !total.is_finite() || total <= 0.0 || max.is_infinite() {
        let winners = logits.iter().filter(|l| **l == max).count() as f64;
        return logits
            .iter()
            .map(|l| if *l == max { 1.0 / winners } else { 0.0 })
            .collect();
    }

    weights.iter().map(|w| w / total).collect()
}

/// Inverse-CDF walk: `unit` in [0, 1) is scaled to [0, sum) and the first
/// index whose cumulative mass reaches it wins. Zero-mass indices are skipped.
pub fn inverse_cdf(probabilities: &[f64], unit: f64) -> Option<usize> {
    let total: f64 = probabilities.iter().filter(|p| **p > 0.0).sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let target = unit.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    let mut last = None;

    for (i, p) in probabilities.iter().enumerate() {
        if p.is_nan() || *p <= 0.0 {
            continue;
        }
        cumulative += p;
        last = Some(i);
        if cumulative >= target {
            return Some(i);
        }
    }

    // floating-point shortfall at the top of the range
    last
}

/// Injectable source of uniform draws
pub trait RandomSource: Send {
    /// Uniform value in [0, 1)
    fn next_unit(&mut self) -> f64;

    /// Pick an index from a probability vector
    fn choose(&mut self, probabilities: &[f64]) -> Option<usize> {
        let unit = self.next_unit();
        inverse_cdf(probabilities, unit)
    }
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

/// Seeded generator for reproducible runs
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generator seeded from the operating system
pub fn entropy() -> StdRng {
    StdRng::from_os_rng()
}

/// Always returns the same draw
#[derive(Debug, Clone, Copy)]
pub struct FixedDraw(pub f64);

impl RandomSource for FixedDraw {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Always picks the most probable index (first on ties)
#[derive(Debug, Clone, Copy, Default)]
pub struct Argmax;

impl RandomSource for Argmax {
    fn next_unit(&mut self) -> f64 {
        0.0
    }

    fn choose(&mut self, probabilities: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > 0.0 && best.is_none_or(|(_, b)| *p > b) {
                best = Some((i, *p));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Sample an index from logits; None means "no selection"
pub fn sample_index(logits: &[f64], temperature: f64, rng: &mut dyn RandomSource) -> Option<usize> {
    if logits.is_empty() {
        return None;
    }
    let probs = probabilities(logits, temperature);
    rng.choose(&probs)
}
