//! Synthetic waveform generation
//!
//! Each band is a slow sinusoid of the sample time plus uniform additive noise:
//!
//! | band  | rate (rad/ms) | scale | noise   |
//! |-------|---------------|-------|---------|
//! | delta | 0.001         | 10    | [0, 5)  |
//! | theta | 0.002         | 8     | [0, 4)  |
//! | alpha | 0.01          | 15    | [0, 3)  |
//! | beta  | 0.02          | 7     | [0, 6)  |
//! | gamma | 0.03          | 4     | [0, 2)  |

use crate::config::{PipelineConfig, DEFAULT_SAMPLE_SPACING_MS, DEFAULT_WINDOW_SIZE};
use crate::error::PipelineError;
use crate::types::{Band, Sample, SampleWindow};
use rand::Rng;

/// Generation constants for one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSpec {
    pub band: Band,
    /// Angular rate applied to the millisecond timestamp
    pub rate: f64,
    /// Sinusoid amplitude
    pub sin_scale: f64,
    /// Upper (exclusive) bound of the additive noise
    pub noise_max: f64,
}

impl BandSpec {
    /// Largest magnitude this band can produce
    pub fn amplitude_bound(&self) -> f64 {
        self.sin_scale + self.noise_max
    }

    fn value<R: Rng + ?Sized>(&self, t: f64, rng: &mut R) -> f64 {
        (t * self.rate).sin() * self.sin_scale + rng.gen::<f64>() * self.noise_max
    }
}

/// Band table in generation order
pub const BAND_SPECS: [BandSpec; 5] = [
    BandSpec {
        band: Band::Delta,
        rate: 0.001,
        sin_scale: 10.0,
        noise_max: 5.0,
    },
    BandSpec {
        band: Band::Theta,
        rate: 0.002,
        sin_scale: 8.0,
        noise_max: 4.0,
    },
    BandSpec {
        band: Band::Alpha,
        rate: 0.01,
        sin_scale: 15.0,
        noise_max: 3.0,
    },
    BandSpec {
        band: Band::Beta,
        rate: 0.02,
        sin_scale: 7.0,
        noise_max: 6.0,
    },
    BandSpec {
        band: Band::Gamma,
        rate: 0.03,
        sin_scale: 4.0,
        noise_max: 2.0,
    },
];

/// Look up the generation constants for a band
pub fn band_spec(band: Band) -> &'static BandSpec {
    match band {
        Band::Delta => &BAND_SPECS[0],
        Band::Theta => &BAND_SPECS[1],
        Band::Alpha => &BAND_SPECS[2],
        Band::Beta => &BAND_SPECS[3],
        Band::Gamma => &BAND_SPECS[4],
    }
}

/// Generator for fixed-size sample windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformGenerator {
    window_size: usize,
    spacing_ms: u64,
}

impl Default for WaveformGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_SAMPLE_SPACING_MS)
    }
}

impl WaveformGenerator {
    /// Create a generator. Callers validate sizes through [`PipelineConfig`].
    pub fn new(window_size: usize, spacing_ms: u64) -> Self {
        Self {
            window_size,
            spacing_ms,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.window_size, config.sample_spacing_ms)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn spacing_ms(&self) -> u64 {
        self.spacing_ms
    }

    /// Timestamp of the oldest sample in the window ending at `now_ms`, or
    /// `None` if it falls outside the `i64` millisecond range.
    pub fn window_start(&self, now_ms: i64) -> Option<i64> {
        let steps = i64::try_from(self.window_size.saturating_sub(1)).ok()?;
        let spacing = i64::try_from(self.spacing_ms).ok()?;
        now_ms.checked_sub(steps.checked_mul(spacing)?)
    }

    /// Generate the window ending at `now_ms`.
    ///
    /// Samples are produced oldest first; within a sample, noise is drawn in band
    /// order (delta, theta, alpha, beta, gamma). Fails without drawing anything
    /// when the window would reach before `i64::MIN`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        now_ms: i64,
        rng: &mut R,
    ) -> Result<SampleWindow, PipelineError> {
        let start = self
            .window_start(now_ms)
            .ok_or(PipelineError::ReferenceTimeOutOfRange(now_ms))?;
        // window_start proved (window_size - 1) * spacing fits in i64
        let spacing = self.spacing_ms as i64;
        let mut samples = Vec::with_capacity(self.window_size);

        for i in 0..self.window_size as i64 {
            let timestamp_ms = start + i * spacing;
            let t = timestamp_ms as f64;

            samples.push(Sample {
                timestamp_ms,
                delta: BAND_SPECS[0].value(t, rng),
                theta: BAND_SPECS[1].value(t, rng),
                alpha: BAND_SPECS[2].value(t, rng),
                beta: BAND_SPECS[3].value(t, rng),
                gamma: BAND_SPECS[4].value(t, rng),
            });
        }

        Ok(SampleWindow::new(self.spacing_ms, samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    const T: i64 = 1_700_000_000_000;

    #[test]
    fn test_window_timestamps_end_at_now() {
        let generator = WaveformGenerator::default();
        let mut rng = StdRng::seed_from_u64(1);
        let window = generator.generate(T, &mut rng).unwrap();

        assert_eq!(window.len(), 50);
        let timestamps: Vec<i64> = window.iter().map(|s| s.timestamp_ms).collect();
        let expected: Vec<i64> = (0..50).rev().map(|i| T - i * 200).collect();
        assert_eq!(timestamps, expected);
        assert_eq!(timestamps[0], T - 9800);
        assert_eq!(window.end_ms(), Some(T));
    }

    #[test]
    fn test_spacing_and_length_hold_for_any_now() {
        let mut rng = StdRng::seed_from_u64(99);
        for (size, spacing) in [(1usize, 1u64), (7, 33), (50, 200), (128, 4)] {
            let generator = WaveformGenerator::new(size, spacing);
            for now in [0i64, -5_000, 123_456_789, T] {
                let window = generator.generate(now, &mut rng).unwrap();
                assert_eq!(window.len(), size);
                assert!(window
                    .samples()
                    .windows(2)
                    .all(|w| w[1].timestamp_ms - w[0].timestamp_ms == spacing as i64));
            }
        }
    }

    #[test]
    fn test_amplitudes_within_band_bounds() {
        let generator = WaveformGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        for step in 0..200 {
            let window = generator.generate(T + step * 997, &mut rng).unwrap();
            for sample in &window {
                for spec in &BAND_SPECS {
                    let v = sample.amplitude(spec.band);
                    assert!(
                        v.abs() <= spec.amplitude_bound(),
                        "{} out of range: {v}",
                        spec.band.as_str()
                    );
                }
            }
        }
    }

    #[test]
    fn test_zero_noise_is_pure_sinusoid() {
        let generator = WaveformGenerator::new(3, 200);
        let mut rng = StepRng::new(0, 0);
        let window = generator.generate(1000, &mut rng).unwrap();

        let first = window.samples()[0];
        assert_eq!(first.timestamp_ms, 600);
        assert_eq!(first.delta, (600.0f64 * 0.001).sin() * 10.0);
        assert_eq!(first.gamma, (600.0f64 * 0.03).sin() * 4.0);
    }

    #[test]
    fn test_same_seed_same_window() {
        let generator = WaveformGenerator::default();
        let a = generator.generate(T, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = generator.generate(T, &mut StdRng::seed_from_u64(5)).unwrap();
        let c = generator.generate(T, &mut StdRng::seed_from_u64(6)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_window_reaching_before_i64_min_rejected() {
        let generator = WaveformGenerator::default();
        let mut rng = StepRng::new(0, 1);

        let result = generator.generate(i64::MIN + 1000, &mut rng);
        assert!(matches!(
            result,
            Err(PipelineError::ReferenceTimeOutOfRange(t)) if t == i64::MIN + 1000
        ));
        // Nothing was drawn for the rejected window
        assert_eq!(rng.next_u64(), 0);

        let huge = WaveformGenerator::new(3, u64::MAX);
        assert!(huge.generate(0, &mut rng).is_err());
        assert_eq!(huge.window_start(0), None);
    }

    #[test]
    fn test_window_may_start_exactly_at_i64_min() {
        let generator = WaveformGenerator::default();
        let mut rng = StdRng::seed_from_u64(2);
        let window = generator.generate(i64::MIN + 9800, &mut rng).unwrap();

        assert_eq!(window.samples()[0].timestamp_ms, i64::MIN);
        assert!(window
            .samples()
            .windows(2)
            .all(|w| w[1].timestamp_ms - w[0].timestamp_ms == 200));
    }

    #[test]
    fn test_band_spec_lookup_matches_table() {
        for band in Band::ALL {
            assert_eq!(band_spec(band).band, band);
        }
    }
}
