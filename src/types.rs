//! Core types for the Synheart Drive pipeline
//!
//! This module defines the values that flow through each cycle of the pipeline:
//! synthetic samples and their window, the classified mental state, the derived
//! control vector, and the snapshot envelope handed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EEG frequency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    /// All bands, in generation order
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    /// Human-readable label with the nominal frequency range
    pub fn label(&self) -> &'static str {
        match self {
            Band::Delta => "Delta (0.5-4Hz)",
            Band::Theta => "Theta (4-8Hz)",
            Band::Alpha => "Alpha (8-13Hz)",
            Band::Beta => "Beta (13-30Hz)",
            Band::Gamma => "Gamma (30-100Hz)",
        }
    }
}

/// One instant of synthetic signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample time (milliseconds)
    pub timestamp_ms: i64,
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Sample {
    /// Amplitude of a single band
    pub fn amplitude(&self, band: Band) -> f64 {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }
}

/// Ordered, evenly spaced run of samples ending at a reference time.
///
/// Only the waveform generator builds these directly; deserialization re-checks
/// the spacing invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SampleWindowRepr")]
pub struct SampleWindow {
    spacing_ms: u64,
    samples: Vec<Sample>,
}

#[derive(Deserialize)]
struct SampleWindowRepr {
    spacing_ms: u64,
    samples: Vec<Sample>,
}

impl TryFrom<SampleWindowRepr> for SampleWindow {
    type Error = String;

    fn try_from(repr: SampleWindowRepr) -> Result<Self, Self::Error> {
        if repr.samples.is_empty() {
            return Err("sample window is empty".to_string());
        }
        if repr.spacing_ms == 0 {
            return Err("spacing_ms must be positive".to_string());
        }
        let spacing = i64::try_from(repr.spacing_ms)
            .map_err(|_| format!("spacing_ms {} out of range", repr.spacing_ms))?;
        for pair in repr.samples.windows(2) {
            if pair[1].timestamp_ms.checked_sub(pair[0].timestamp_ms) != Some(spacing) {
                return Err(format!(
                    "samples at {} and {} are not {} ms apart",
                    pair[0].timestamp_ms, pair[1].timestamp_ms, spacing
                ));
            }
        }
        Ok(Self {
            spacing_ms: repr.spacing_ms,
            samples: repr.samples,
        })
    }
}

impl SampleWindow {
    pub(crate) fn new(spacing_ms: u64, samples: Vec<Sample>) -> Self {
        Self {
            spacing_ms,
            samples,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn spacing_ms(&self) -> u64 {
        self.spacing_ms
    }

    /// Timestamp of the newest sample (the generation reference time)
    pub fn end_ms(&self) -> Option<i64> {
        self.samples.last().map(|s| s.timestamp_ms)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Time series for one band, oldest first
    pub fn band_series(&self, band: Band) -> Vec<f64> {
        self.samples.iter().map(|s| s.amplitude(band)).collect()
    }
}

impl<'a> IntoIterator for &'a SampleWindow {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Simulated control intent chosen each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentalState {
    Forward,
    Reverse,
    Left,
    Right,
    Up,
    #[serde(alias = "none")]
    Neutral,
}

impl MentalState {
    /// Every classifiable state; matches the command table one to one
    pub const ALL: [MentalState; 6] = [
        MentalState::Forward,
        MentalState::Reverse,
        MentalState::Left,
        MentalState::Right,
        MentalState::Up,
        MentalState::Neutral,
    ];

    /// Position within [`MentalState::ALL`]
    pub fn index(&self) -> usize {
        match self {
            MentalState::Forward => 0,
            MentalState::Reverse => 1,
            MentalState::Left => 2,
            MentalState::Right => 3,
            MentalState::Up => 4,
            MentalState::Neutral => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MentalState::Forward => "forward",
            MentalState::Reverse => "reverse",
            MentalState::Left => "left",
            MentalState::Right => "right",
            MentalState::Up => "up",
            MentalState::Neutral => "neutral",
        }
    }
}

impl fmt::Display for MentalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MentalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" => Ok(MentalState::Forward),
            "reverse" => Ok(MentalState::Reverse),
            "left" => Ok(MentalState::Left),
            "right" => Ok(MentalState::Right),
            "up" => Ok(MentalState::Up),
            // Older producers emit "none" for the idle state
            "neutral" | "none" => Ok(MentalState::Neutral),
            other => Err(format!("unknown mental state: {other}")),
        }
    }
}

/// Axis of the control vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Forward,
    Lateral,
    Vertical,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Forward, Axis::Lateral, Axis::Vertical];

    /// Inclusive bounds every value on this axis must respect
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Axis::Forward | Axis::Lateral => (-1.0, 1.0),
            Axis::Vertical => (0.0, 1.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Forward => "forward",
            Axis::Lateral => "lateral",
            Axis::Vertical => "vertical",
        }
    }
}

/// Three-axis vehicle command.
///
/// Values are clamped into their axis bounds on construction, so a
/// `ControlVector` is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ControlVectorRepr")]
pub struct ControlVector {
    forward: f64,
    lateral: f64,
    vertical: f64,
}

#[derive(Deserialize)]
struct ControlVectorRepr {
    forward: f64,
    lateral: f64,
    vertical: f64,
}

impl From<ControlVectorRepr> for ControlVector {
    fn from(repr: ControlVectorRepr) -> Self {
        ControlVector::new(repr.forward, repr.lateral, repr.vertical)
    }
}

impl Default for ControlVector {
    fn default() -> Self {
        Self::zero()
    }
}

impl ControlVector {
    pub fn new(forward: f64, lateral: f64, vertical: f64) -> Self {
        Self {
            forward: clamp_axis(Axis::Forward, forward),
            lateral: clamp_axis(Axis::Lateral, lateral),
            vertical: clamp_axis(Axis::Vertical, vertical),
        }
    }

    pub fn zero() -> Self {
        Self {
            forward: 0.0,
            lateral: 0.0,
            vertical: 0.0,
        }
    }

    /// Forward (+) / reverse (-) throttle, in [-1, 1]
    pub fn forward(&self) -> f64 {
        self.forward
    }

    /// Right (+) / left (-) steering, in [-1, 1]
    pub fn lateral(&self) -> f64 {
        self.lateral
    }

    /// Height, in [0, 1]
    pub fn vertical(&self) -> f64 {
        self.vertical
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Forward => self.forward,
            Axis::Lateral => self.lateral,
            Axis::Vertical => self.vertical,
        }
    }
}

fn clamp_axis(axis: Axis, value: f64) -> f64 {
    let (lo, hi) = axis.bounds();
    if value.is_nan() {
        return lo.max(0.0);
    }
    value.clamp(lo, hi)
}

/// Producer metadata attached to every snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Immutable result of one pipeline cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub producer: Producer,
    /// 1-based cycle number within the producing run
    pub cycle: u64,
    /// Reference time the window was generated for
    pub observed_at: DateTime<Utc>,
    pub window: SampleWindow,
    pub state: MentalState,
    pub vector: ControlVector,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
