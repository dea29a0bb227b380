use super::{sign, Optimizer};
use crate::{layer::Layer, matrix::Matrix, Result};

const LR_INCREASE_FACTOR: f64 = 1.2;
const LR_DECREASE_FACTOR: f64 = 0.5;
const LR_MAX: f64 = 50.;
const LR_MIN: f64 = 0.000001;

/// Per-connection step sizes and the gradient of the previous step.
#[derive(Clone, Debug)]
pub(crate) struct RPropState {
    learning_rates: Matrix,
    prev_error_grad: Option<Matrix>,
}

/// Resilient propagation: every connection moves by its own step size in the direction
/// opposite to the sign of its gradient. A step size grows while the gradient keeps its sign
/// and shrinks when it flips.
#[derive(Debug, Clone, Copy, Default)]
pub struct RProp;

impl RProp {
    fn adapt(learning_rate: f64, change: f64) -> f64 {
        if change > 0. {
            (learning_rate * LR_INCREASE_FACTOR).min(LR_MAX)
        } else if change < 0. {
            (learning_rate * LR_DECREASE_FACTOR).max(LR_MIN)
        } else {
            learning_rate
        }
    }
}

impl Optimizer for RProp {
    fn update_weights(&self, layer: &mut Layer, signal: &Matrix, inputs: &Matrix) -> Result<()> {
        // gradient of the squared error, the signal already carries `target - output`
        let error_grad = signal.dot(&inputs.transpose())?.multiply(-1.);
        let base_lr = layer.learning_rate().clamp(LR_MIN, LR_MAX);

        let state = layer.rprop.get_or_insert_with(|| RPropState {
            learning_rates: Matrix::from_params(error_grad.size(), base_lr),
            prev_error_grad: None,
        });

        if let Some(prev) = &state.prev_error_grad {
            let changes = prev.hadamard(&error_grad)?;
            state.learning_rates = state.learning_rates.zip_map(&changes, Self::adapt)?;
        }

        let delta = error_grad.apply(sign).hadamard(&state.learning_rates)?;
        state.prev_error_grad = Some(error_grad);

        let weights = layer.weights_mut()?;
        *weights = weights.subtract(&delta)?;
        Ok(())
    }
}
