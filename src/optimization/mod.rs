mod back_prop;
mod optimizer;
mod quick_prop;
mod rprop;

use serde::{Deserialize, Serialize};

pub use back_prop::BackProp;
pub use optimizer::Optimizer;
pub use quick_prop::QuickProp;
pub use rprop::RProp;

pub(crate) use quick_prop::QuickPropState;
pub(crate) use rprop::RPropState;

/// The gradient based learning algorithms a network can be trained with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradAlgorithm {
    /// Backpropagation with optional momentum.
    BackProp,
    /// Resilient propagation.
    RProp,
    /// Quick propagation.
    QuickProp,
}

impl GradAlgorithm {
    /// Returns the weight update rule implementing this algorithm.
    pub fn optimizer(self) -> &'static dyn Optimizer {
        match self {
            GradAlgorithm::BackProp => &BackProp,
            GradAlgorithm::RProp => &RProp,
            GradAlgorithm::QuickProp => &QuickProp,
        }
    }
}

/// `-1`, `0` or `1` following the sign of `x`, unlike `f64::signum` zero maps to zero.
fn sign(x: f64) -> f64 {
    if x > 0. {
        1.
    } else if x < 0. {
        -1.
    } else {
        0.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithms_use_stable_identifiers() {
        let json = serde_json::to_string(&GradAlgorithm::QuickProp).unwrap();
        assert_eq!(json, "\"QUICK_PROP\"");
        let back: GradAlgorithm = serde_json::from_str("\"R_PROP\"").unwrap();
        assert_eq!(back, GradAlgorithm::RProp);
    }

    #[test]
    fn unknown_algorithms_are_rejected() {
        assert!(serde_json::from_str::<GradAlgorithm>("\"GENETIC\"").is_err());
    }

    #[test]
    fn sign_maps_zero_to_zero() {
        assert_eq!(sign(0.), 0.);
        assert_eq!(sign(-0.), 0.);
        assert_eq!(sign(3.), 1.);
        assert_eq!(sign(-0.1), -1.);
    }
}
