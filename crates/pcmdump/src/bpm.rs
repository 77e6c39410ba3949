//! Tempo estimation over the decoded stream.
//!
//! The mono samples are reduced to an energy envelope (fast attack, slow
//! release), decimated by `interval`. Each candidate beat period is then scored
//! at random points of the envelope: energy should repeat at whole multiples of
//! the period and differ at fractions of it. The lowest score wins.

use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;

use crate::config::BpmPrecision;

/// Offsets, in periods, where energy should match the reference point.
const BEATS: [f32; 12] = [
    -32.0, -16.0, -8.0, -4.0, -2.0, -1.0, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0,
];
/// Offsets, in periods, where energy should differ from the reference point.
const OFF_BEATS: [f32; 4] = [-0.5, -0.25, 0.25, 0.5];

/// Fixed so the same input always gives the same estimate.
const SEED: u64 = 0x6270_6d21;

#[derive(Clone, Debug, PartialEq)]
pub struct BpmEstimator {
    /// Slowest tempo considered.
    pub lower: f32,
    /// Fastest tempo considered.
    pub upper: f32,
    /// Input samples per envelope point.
    pub interval: usize,
    pub rate: u32,
    /// Candidate periods tried between `lower` and `upper`.
    pub steps: usize,
    /// Random reference points scored per candidate.
    pub samples: usize,
}

impl BpmEstimator {
    pub fn new(precision: BpmPrecision, rate: u32) -> Self {
        let (interval, steps, samples) = match precision {
            BpmPrecision::Rough => (128, 400, 512),
            BpmPrecision::Normal => (64, 800, 1024),
            BpmPrecision::Fine => (8, 1600, 4096),
        };
        Self {
            lower: 50.0,
            upper: 450.0,
            interval,
            rate,
            steps,
            samples,
        }
    }

    /// Estimated tempo in beats per minute, `None` for an empty stream.
    pub fn estimate(&self, samples: impl IntoIterator<Item = f32>) -> Option<f32> {
        let envelope = self.envelope(samples);
        if envelope.is_empty() {
            return None;
        }
        Some(self.scan(&envelope))
    }

    fn envelope(&self, samples: impl IntoIterator<Item = f32>) -> Vec<f32> {
        samples
            .into_iter()
            .scan(0.0f32, |level, s| {
                let z = s.abs();
                if z > *level {
                    *level += (z - *level) / 8.0;
                } else {
                    *level -= (*level - z) / 512.0;
                }
                Some(*level)
            })
            .step_by(self.interval.max(1))
            .collect()
    }

    fn scan(&self, envelope: &[f32]) -> f32 {
        let slowest = self.bpm_to_period(self.lower);
        let fastest = self.bpm_to_period(self.upper);
        let stride = (fastest - slowest) / (self.steps.max(2) - 1) as f32;

        let mut rng = StdRng::seed_from_u64(SEED);
        let points = Uniform::new(0.0f32, envelope.len() as f32);

        let mut best = (f32::INFINITY, slowest);
        for step in 0..self.steps.max(2) {
            let period = slowest + stride * step as f32;
            let score: f32 = (0..self.samples)
                .map(|_| autodifference(envelope, period, points.sample(&mut rng)))
                .sum();
            if score < best.0 {
                best = (score, period);
            }
        }

        tracing::debug!(period = best.1, score = best.0, "tempo scan done");
        self.period_to_bpm(best.1)
    }

    /// Beat period in envelope points.
    fn bpm_to_period(&self, bpm: f32) -> f32 {
        self.rate as f32 / (bpm / 60.0) / self.interval.max(1) as f32
    }

    fn period_to_bpm(&self, period: f32) -> f32 {
        self.rate as f32 / (period * self.interval.max(1) as f32) * 60.0
    }
}

/// Weighted mismatch of the envelope around `mid` for one candidate period.
fn autodifference(envelope: &[f32], period: f32, mid: f32) -> f32 {
    let reference = envelope_at(envelope, mid);

    let mut diff = 0.0;
    let mut total = 0.0;
    for beat in BEATS {
        let weight = 1.0 / beat.abs();
        diff += weight * (envelope_at(envelope, mid + beat * period) - reference).abs();
        total += weight;
    }
    for beat in OFF_BEATS {
        let weight = beat.abs();
        diff -= weight * (envelope_at(envelope, mid + beat * period) - reference).abs();
        total += weight;
    }
    diff / total
}

/// Envelope value at a fractional position; zero outside the stream.
fn envelope_at(envelope: &[f32], position: f32) -> f32 {
    if position < 0.0 {
        return 0.0;
    }
    envelope.get(position as usize).copied().unwrap_or(0.0)
}
