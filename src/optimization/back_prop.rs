use super::Optimizer;
use crate::{layer::Layer, matrix::Matrix, Result};

/// Plain gradient descent on the squared error, with momentum when the layer's moment is
/// not zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackProp;

impl Optimizer for BackProp {
    fn update_weights(&self, layer: &mut Layer, signal: &Matrix, inputs: &Matrix) -> Result<()> {
        let gradient = signal.dot(&inputs.transpose())?;
        let mut delta = gradient.multiply(layer.learning_rate());
        let moment = layer.moment();

        if moment != 0. {
            if let Some(prev) = &layer.prev_delta_weights {
                delta = delta.add(&prev.multiply(moment))?;
            }

            layer.prev_delta_weights = Some(delta.clone());
        }

        let weights = layer.weights_mut()?;
        *weights = weights.add(&delta)?;
        Ok(())
    }
}
