//! Common capability of the two scoring backends

use crate::heuristic::HeuristicPredictor;
use crate::network::NeuralPredictor;
use fraud_core::{Backend, FeatureVector};

/// A backend that turns a normalised vector into a fraud probability.
///
/// The engine holds exactly one of these, chosen at initialisation.
pub trait Predictor: Send + Sync {
    fn score(&self, vector: &FeatureVector) -> f64;

    fn backend(&self) -> Backend;
}

impl Predictor for NeuralPredictor {
    fn score(&self, vector: &FeatureVector) -> f64 {
        NeuralPredictor::score(self, vector)
    }

    fn backend(&self) -> Backend {
        Backend::Model
    }
}

impl Predictor for HeuristicPredictor {
    fn score(&self, vector: &FeatureVector) -> f64 {
        HeuristicPredictor::score(self, vector)
    }

    fn backend(&self) -> Backend {
        Backend::Heuristic
    }
}
