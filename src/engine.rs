//! Telemetry engine
//!
//! The engine is the public lifecycle surface: it owns the subscriber registry
//! and the latest snapshot across runs, and wires a fresh [`Pipeline`] into the
//! [`Scheduler`] on every `start`.

use crate::classifier::StateClassifier;
use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::mapper::CommandMapper;
use crate::pipeline::{LatestSnapshot, Pipeline, SharedRegistry};
use crate::scheduler::{Scheduler, StopHandle};
use crate::subscriber::{Subscriber, SubscriptionId};
use crate::types::Snapshot;
use std::sync::{Arc, PoisonError};
use tracing::{info, warn};

type ClockFactory = Box<dyn Fn() -> Box<dyn Clock> + Send>;
type ClassifierFactory = Box<dyn Fn() -> Box<dyn StateClassifier> + Send>;

/// Periodic BCI telemetry engine.
///
/// Subscribers and the latest snapshot survive `stop`/`start`; the cadence,
/// random source and cycle numbering start fresh on every `start`.
#[derive(Default)]
pub struct TelemetryEngine {
    scheduler: Scheduler,
    subscribers: SharedRegistry,
    latest: LatestSnapshot,
    mapper: CommandMapper,
    clock: Option<ClockFactory>,
    classifier: Option<ClassifierFactory>,
    config: Option<PipelineConfig>,
}

impl TelemetryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom command mapper for subsequent runs
    pub fn with_mapper(mut self, mapper: CommandMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Build each run's clock from `factory` instead of the wall clock
    pub fn with_clock<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Clock> + Send + 'static,
    {
        self.clock = Some(Box::new(factory));
        self
    }

    /// Build each run's classifier from `factory` instead of the random placeholder
    pub fn with_classifier<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn StateClassifier> + Send + 'static,
    {
        self.classifier = Some(Box::new(factory));
        self
    }

    /// Start the periodic pipeline.
    ///
    /// Fails fast, before any cycle runs, on an invalid configuration or if a
    /// run is already active.
    pub fn start(&mut self, config: PipelineConfig) -> Result<(), PipelineError> {
        config.validate()?;
        if self.scheduler.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }

        let mut pipeline = Pipeline::new(&config)?
            .with_mapper(self.mapper.clone())
            .with_subscribers(Arc::clone(&self.subscribers))
            .with_latest(Arc::clone(&self.latest));
        if let Some(factory) = &self.clock {
            pipeline = pipeline.with_clock(factory());
        }
        if let Some(factory) = &self.classifier {
            pipeline = pipeline.with_classifier(factory());
        }

        let instance_id = pipeline.producer().instance_id.clone();
        self.scheduler.start(config.tick_interval(), move |tick| {
            if let Err(e) = pipeline.run_cycle() {
                warn!(tick, error = %e, "cycle skipped");
            }
        })?;

        info!(
            instance_id = %instance_id,
            tick_interval_ms = config.tick_interval_ms,
            window_size = config.window_size,
            sample_spacing_ms = config.sample_spacing_ms,
            "telemetry engine started"
        );
        self.config = Some(config);
        Ok(())
    }

    /// Halt future cycles, waiting for one in flight. Idempotent.
    pub fn stop(&mut self) {
        let was_active = self.scheduler.stop_handle().is_some();
        self.scheduler.stop();
        if was_active {
            info!("telemetry engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Handle for stopping the current run from another thread or a subscriber
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.scheduler.stop_handle()
    }

    /// Register a subscriber.
    ///
    /// Subscribers run on the scheduler thread and must not call back into
    /// `subscribe`/`unsubscribe`; use a [`StopHandle`] to stop from a callback.
    pub fn subscribe<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: Subscriber + 'static,
    {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(Box::new(subscriber))
    }

    /// Remove a subscriber; returns false if the id was unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Most recently published snapshot, from this or an earlier run
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Configuration of the current or most recent run
    pub fn config(&self) -> Option<&PipelineConfig> {
        self.config.as_ref()
    }
}

impl std::fmt::Debug for TelemetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryEngine")
            .field("running", &self.is_running())
            .field("config", &self.config)
            .finish()
    }
}
