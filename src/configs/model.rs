use serde::{Deserialize, Serialize};

use crate::activation::ActFn;

/// Describes a fresh network: its topology and the hyperparameters shared by its layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Neurons per layer, input layer first.
    pub neuron_counts: Vec<usize>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default)]
    pub moment: f64,
    #[serde(default)]
    pub act_fn: ActFn,
    /// Seeds the weight initialisation, drawn from the thread rng when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_learning_rate() -> f64 {
    0.3
}

impl NetworkConfig {
    /// Creates a config with the default hyperparameters.
    pub fn new(neuron_counts: Vec<usize>) -> Self {
        Self {
            neuron_counts,
            learning_rate: default_learning_rate(),
            moment: 0.,
            act_fn: ActFn::default(),
            seed: None,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_moment(mut self, moment: f64) -> Self {
        self.moment = moment;
        self
    }

    pub fn with_act_fn(mut self, act_fn: ActFn) -> Self {
        self.act_fn = act_fn;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_the_defaults() {
        let config: NetworkConfig =
            serde_json::from_str(r#"{ "neuron_counts": [2, 3, 1] }"#).unwrap();

        assert_eq!(config, NetworkConfig::new(vec![2, 3, 1]));
        assert_eq!(config.learning_rate, 0.3);
        assert_eq!(config.moment, 0.);
        assert_eq!(config.act_fn, ActFn::Sigmoid);
        assert_eq!(config.seed, None);
    }
}
