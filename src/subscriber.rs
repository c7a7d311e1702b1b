//! Snapshot subscribers
//!
//! Subscribers receive every published snapshot, in registration order. A
//! subscriber that returns an error or panics is logged and skipped for that
//! cycle; it stays registered and the remaining subscribers still run.

use crate::error::SubscriberError;
use crate::types::Snapshot;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// Receiver of published snapshots
pub trait Subscriber: Send {
    fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SubscriberError>;
}

impl<F> Subscriber for F
where
    F: FnMut(&Snapshot) -> Result<(), SubscriberError> + Send,
{
    fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SubscriberError> {
        self(snapshot)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered set of subscribers
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: u64,
    entries: Vec<(SubscriptionId, Box<dyn Subscriber>)>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, subscriber));
        id
    }

    /// Remove a subscriber; returns false if the id was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver a snapshot to every subscriber, isolating failures
    pub fn publish(&mut self, snapshot: &Snapshot) -> PublishReport {
        let mut report = PublishReport::default();

        for (id, subscriber) in self.entries.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_snapshot(snapshot)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(subscription = ?id, cycle = snapshot.cycle, error = %e, "subscriber failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(subscription = ?id, cycle = snapshot.cycle, "subscriber panicked");
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::simulate_cycle;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};

    fn snapshot() -> Snapshot {
        let mut rng = StdRng::seed_from_u64(1);
        simulate_cycle(&PipelineConfig::default(), 1_000_000, &mut rng).unwrap()
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Box<dyn Subscriber> {
        let log = Arc::clone(log);
        Box::new(move |_: &Snapshot| -> Result<(), SubscriberError> {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        registry.subscribe(recorder(&log, "a"));
        registry.subscribe(recorder(&log, "b"));
        registry.subscribe(recorder(&log, "c"));

        let report = registry.publish(&snapshot());
        assert_eq!(report, PublishReport { delivered: 3, failed: 0 });
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        registry.subscribe(Box::new(|_: &Snapshot| -> Result<(), SubscriberError> {
            Err(SubscriberError::new("display offline"))
        }));
        registry.subscribe(Box::new(|_: &Snapshot| -> Result<(), SubscriberError> {
            panic!("renderer crashed")
        }));
        registry.subscribe(recorder(&log, "last"));

        let snap = snapshot();
        let report = registry.publish(&snap);
        assert_eq!(report, PublishReport { delivered: 1, failed: 2 });

        // Failing subscribers stay registered
        let report = registry.publish(&snap);
        assert_eq!(report.failed, 2);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        let a = registry.subscribe(recorder(&log, "a"));
        registry.subscribe(recorder(&log, "b"));

        assert!(registry.unsubscribe(a));
        assert!(!registry.unsubscribe(a));
        assert_eq!(registry.len(), 1);

        registry.publish(&snapshot());
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }
}
