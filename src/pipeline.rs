//! Pipeline orchestration
//!
//! One cycle runs four stages and hands the result to subscribers:
//! 1. WaveformGenerator - Build the sample window ending at the clock's "now"
//! 2. StateClassifier - Choose the active mental state
//! 3. CommandMapper - Draw the control vector for that state
//! 4. SubscriberRegistry - Publish the immutable snapshot

use crate::classifier::{RandomClassifier, StateClassifier};
use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::mapper::CommandMapper;
use crate::subscriber::{PublishReport, SubscriberRegistry};
use crate::types::{Producer, Snapshot};
use crate::waveform::WaveformGenerator;
use crate::{DRIVE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Subscriber registry shared between an engine and its running pipeline
pub type SharedRegistry = Arc<Mutex<SubscriberRegistry>>;

/// Slot holding the most recently published snapshot
pub type LatestSnapshot = Arc<Mutex<Option<Arc<Snapshot>>>>;

/// Compute a single snapshot without a scheduler or subscribers (stateless, one-shot).
///
/// # Arguments
/// * `config` - Window size and spacing to generate with (validated)
/// * `now_ms` - Reference time for the newest sample
/// * `rng` - Random source for noise, state and command draws
///
/// # Example
/// ```ignore
/// let mut rng = StdRng::seed_from_u64(7);
/// let snapshot = simulate_cycle(&PipelineConfig::default(), now_ms, &mut rng)?;
/// ```
pub fn simulate_cycle<R: RngCore>(
    config: &PipelineConfig,
    now_ms: i64,
    rng: &mut R,
) -> Result<Snapshot, PipelineError> {
    config.validate()?;

    let mut stages = Stages {
        generator: WaveformGenerator::from_config(config),
        classifier: Box::new(RandomClassifier),
        mapper: CommandMapper::new(),
    };

    stages.run(now_ms, rng, new_producer(), 1)
}

/// The three computing stages of a cycle
struct Stages {
    generator: WaveformGenerator,
    classifier: Box<dyn StateClassifier>,
    mapper: CommandMapper,
}

impl Stages {
    fn run<R: RngCore>(
        &mut self,
        now_ms: i64,
        rng: &mut R,
        producer: Producer,
        cycle: u64,
    ) -> Result<Snapshot, PipelineError> {
        // Both range checks happen before anything is drawn
        let observed_at = observed_at(now_ms)?;

        // Draw order is fixed: window noise, then state, then command
        let window = self.generator.generate(now_ms, rng)?;
        let state = self.classifier.classify(rng);
        let vector = self.mapper.map(state, rng);

        Ok(Snapshot {
            producer,
            cycle,
            observed_at,
            window,
            state,
            vector,
        })
    }
}

fn new_producer() -> Producer {
    Producer {
        name: PRODUCER_NAME.to_string(),
        version: DRIVE_VERSION.to_string(),
        instance_id: Uuid::new_v4().to_string(),
    }
}

/// Reference time as a UTC timestamp; chrono covers roughly +/-262,000 years
fn observed_at(now_ms: i64) -> Result<DateTime<Utc>, PipelineError> {
    DateTime::from_timestamp_millis(now_ms)
        .ok_or(PipelineError::ReferenceTimeOutOfRange(now_ms))
}

/// Stateful pipeline driven once per scheduler tick.
///
/// Owns its random source and clock; shares the subscriber registry and the
/// latest-snapshot slot with whoever created it.
pub struct Pipeline {
    stages: Stages,
    rng: StdRng,
    clock: Box<dyn Clock>,
    subscribers: SharedRegistry,
    latest: LatestSnapshot,
    producer: Producer,
    cycle: u64,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            stages: Stages {
                generator: WaveformGenerator::from_config(config),
                classifier: Box::new(RandomClassifier),
                mapper: CommandMapper::new(),
            },
            rng,
            clock: Box::new(SystemClock),
            subscribers: SharedRegistry::default(),
            latest: LatestSnapshot::default(),
            producer: new_producer(),
            cycle: 0,
        })
    }

    pub fn with_classifier(mut self, classifier: Box<dyn StateClassifier>) -> Self {
        self.stages.classifier = classifier;
        self
    }

    pub fn with_mapper(mut self, mapper: CommandMapper) -> Self {
        self.stages.mapper = mapper;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish into an existing registry instead of a private one
    pub fn with_subscribers(mut self, subscribers: SharedRegistry) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Store snapshots into an existing slot instead of a private one
    pub fn with_latest(mut self, latest: LatestSnapshot) -> Self {
        self.latest = latest;
        self
    }

    pub fn subscribers(&self) -> &SharedRegistry {
        &self.subscribers
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// Number of cycles run so far
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one full cycle: generate, classify, map, publish.
    ///
    /// A clock reading outside the representable range fails the cycle before
    /// any randomness is consumed; nothing is published and the cycle number is
    /// not advanced.
    pub fn run_cycle(&mut self) -> Result<Arc<Snapshot>, PipelineError> {
        let now_ms = self.clock.now_ms();

        let snapshot = Arc::new(self.stages.run(
            now_ms,
            &mut self.rng,
            self.producer.clone(),
            self.cycle + 1,
        )?);
        self.cycle = snapshot.cycle;

        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        let report = self.publish(&snapshot);
        debug!(
            cycle = snapshot.cycle,
            state = %snapshot.state,
            forward = snapshot.vector.forward(),
            lateral = snapshot.vector.lateral(),
            vertical = snapshot.vector.vertical(),
            delivered = report.delivered,
            failed = report.failed,
            "cycle complete"
        );

        Ok(snapshot)
    }

    fn publish(&self, snapshot: &Snapshot) -> PublishReport {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .publish(snapshot)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("instance_id", &self.producer.instance_id)
            .field("cycle", &self.cycle)
            .finish()
    }
}
