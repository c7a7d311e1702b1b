//! Synheart Drive - Simulated brain-computer-interface telemetry pipeline
//!
//! Drive synthesizes multi-band EEG-like samples, derives a mental state each
//! cycle, and maps it to a bounded three-axis vehicle command through a
//! deterministic pipeline: waveform generation → classification → command
//! mapping → snapshot publish.
//!
//! ## Modules
//!
//! - **Pipeline**: One-shot (`simulate_cycle`) and stateful (`Pipeline`) cycle execution
//! - **Engine**: Periodic scheduling with start/stop and subscriber fan-out
//! - **RC link**: Encoding control vectors for the vehicle's serial command format

pub mod classifier;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod rc;
pub mod scheduler;
pub mod subscriber;
pub mod types;
pub mod waveform;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::PipelineConfig;
pub use engine::TelemetryEngine;
pub use error::{PipelineError, SubscriberError};
pub use pipeline::{simulate_cycle, Pipeline};
pub use scheduler::StopHandle;
pub use subscriber::{Subscriber, SubscriptionId};
pub use types::{Band, ControlVector, MentalState, Sample, SampleWindow, Snapshot};

/// Drive version embedded in every snapshot
pub const DRIVE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshots
pub const PRODUCER_NAME: &str = "synheart-drive";
