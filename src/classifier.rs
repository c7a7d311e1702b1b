//! Mental state classification
//!
//! The classifier is the seam where a real decoder would read the sample window.
//! The shipped implementation is a placeholder that draws a state uniformly.

use crate::types::MentalState;
use rand::{Rng, RngCore};

/// Trait for mental state classifiers
pub trait StateClassifier: Send {
    /// Choose the active state for this cycle
    fn classify(&mut self, rng: &mut dyn RngCore) -> MentalState;
}

/// Uniform random draw over all six states, with no memory between calls
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomClassifier;

impl StateClassifier for RandomClassifier {
    fn classify(&mut self, rng: &mut dyn RngCore) -> MentalState {
        MentalState::ALL[rng.gen_range(0..MentalState::ALL.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_every_state_is_reachable() {
        let mut classifier = RandomClassifier;
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts: HashMap<MentalState, usize> = HashMap::new();

        for _ in 0..6000 {
            *counts.entry(classifier.classify(&mut rng)).or_default() += 1;
        }

        assert_eq!(counts.len(), 6);
        // Roughly uniform: each state within a loose band around 1000
        for (state, count) in counts {
            assert!((700..1300).contains(&count), "{state}: {count}");
        }
    }

    #[test]
    fn test_zero_draw_picks_first_state() {
        let mut classifier = RandomClassifier;
        let mut rng = StepRng::new(0, 0);
        assert_eq!(classifier.classify(&mut rng), MentalState::Forward);
    }

    #[test]
    fn test_seeded_sequence_is_reproducible() {
        let mut classifier = RandomClassifier;
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        let seq_a: Vec<_> = (0..20).map(|_| classifier.classify(&mut a)).collect();
        let seq_b: Vec<_> = (0..20).map(|_| classifier.classify(&mut b)).collect();
        assert_eq!(seq_a, seq_b);
    }
}
