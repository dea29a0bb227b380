use serde::{Deserialize, Serialize};

/// The activation function of a layer. Persisted by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFn {
    #[default]
    Sigmoid,
    Identity,
    Tanh,
}

use ActFn::*;

impl ActFn {
    pub fn f(&self, x: f64) -> f64 {
        match self {
            Sigmoid => 1. / (1. + (-x).exp()),
            Identity => x,
            Tanh => x.tanh(),
        }
    }

    /// The derivative expressed in terms of the function's output `y = f(x)`.
    pub fn df_from_output(&self, y: f64) -> f64 {
        match self {
            Sigmoid => y * (1. - y),
            Identity => 1.,
            Tanh => 1. - y * y,
        }
    }
}
