use super::Optimizer;
use crate::{layer::Layer, matrix::Matrix, Result};

const QP_LR_MIN: f64 = 0.01;
const QP_LR_MAX: f64 = 0.6;
const QP_MOMENT_MAX: f64 = 1.75;
const QP_REG_FACTOR: f64 = 0.0001;

/// Per-connection learning rates and moments of the last step plus its gradient.
#[derive(Clone, Debug)]
pub(crate) struct QuickPropState {
    learning_rates: Matrix,
    moments: Matrix,
    prev_error_grad: Matrix,
}

/// Quick propagation: approximates the error curve of every connection with a parabola
/// through the last two gradients and jumps towards its minimum, with a small weight decay.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickProp;

impl QuickProp {
    /// Computes the learning rate and moment of a single connection.
    fn coefficients(
        first_iteration: bool,
        base_lr: f64,
        prev_delta: f64,
        grad: f64,
        prev_grad: f64,
    ) -> (f64, f64) {
        let learning_rate = if first_iteration || -prev_delta * grad > 0. {
            base_lr
        } else {
            0.
        };

        let beta = grad / (prev_grad - grad);
        let gamma = -grad * beta * prev_delta;

        // 0 / 0 happens when a connection has seen no gradient at all
        let moment = if beta.is_nan() {
            0.
        } else if beta > QP_MOMENT_MAX || gamma < 0. || beta.is_infinite() {
            QP_MOMENT_MAX
        } else {
            beta
        };

        (learning_rate, moment)
    }
}

impl Optimizer for QuickProp {
    fn update_weights(&self, layer: &mut Layer, signal: &Matrix, inputs: &Matrix) -> Result<()> {
        let weights = layer.weights_mut()?.clone();
        let size = weights.size();
        let base_lr = layer.learning_rate().clamp(QP_LR_MIN, QP_LR_MAX);
        let mut first_iteration = false;

        // the layer keeps the change applied to the weights, the same way back propagation
        // does, while the update below subtracts its delta
        let prev_delta = match layer.prev_delta_weights.take() {
            Some(prev) => prev.multiply(-1.),
            None => {
                first_iteration = true;
                Matrix::from_params(size, 0.)
            }
        };

        let state = layer.quick_prop.get_or_insert_with(|| {
            first_iteration = true;
            QuickPropState {
                learning_rates: Matrix::from_params(size, base_lr),
                moments: Matrix::from_params(size, 0.),
                prev_error_grad: Matrix::from_params(size, 0.),
            }
        });

        let error_grad = signal
            .dot(&inputs.transpose())?
            .multiply(-1.)
            .add(&weights.multiply(QP_REG_FACTOR))?;

        let (learning_rates, moments): (Vec<f64>, Vec<f64>) = prev_delta
            .iter()
            .zip(error_grad.iter())
            .zip(state.prev_error_grad.iter())
            .map(|((prev_delta, grad), prev_grad)| {
                Self::coefficients(first_iteration, base_lr, prev_delta, grad, prev_grad)
            })
            .unzip();

        state.learning_rates = Matrix::from_shape_vec(size, learning_rates)?;
        state.moments = Matrix::from_shape_vec(size, moments)?;

        let delta = error_grad
            .hadamard(&state.learning_rates)?
            .add(&prev_delta.hadamard(&state.moments)?)?;

        state.prev_error_grad = error_grad;
        *layer.weights_mut()? = weights.subtract(&delta)?;
        layer.prev_delta_weights = Some(delta.multiply(-1.));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{activation::ActFn, layer::LayerType, optimization::BackProp};

    fn layer_with_moment(weights: &[f64], learning_rate: f64, moment: f64) -> Layer {
        let weights = Matrix::from_array(&[weights.to_vec()]).unwrap();
        Layer::from_weights(
            LayerType::Output,
            weights,
            learning_rate,
            moment,
            ActFn::Identity,
        )
        .unwrap()
    }

    fn layer(weights: &[f64], learning_rate: f64) -> Layer {
        layer_with_moment(weights, learning_rate, 0.)
    }

    #[test]
    fn first_step_is_a_clamped_gradient_step() {
        let mut layer = layer(&[0.5, -0.5], 5.);
        let inputs = Matrix::column(&[1., 0.]);

        QuickProp
            .update_weights(&mut layer, &Matrix::column(&[1.]), &inputs)
            .unwrap();

        let grad0 = -1. + 0.5 * QP_REG_FACTOR;
        let grad1 = -0.5 * QP_REG_FACTOR;
        let weights = layer.weights().unwrap().to_vec();
        assert!((weights[0] - (0.5 - QP_LR_MAX * grad0)).abs() < 1e-12);
        assert!((weights[1] - (-0.5 - QP_LR_MAX * grad1)).abs() < 1e-12);

        // stored as the change applied to the weights
        let delta = layer.prev_delta_weights().unwrap().to_vec();
        assert!((delta[0] + QP_LR_MAX * grad0).abs() < 1e-12);
        assert!((weights[0] - 0.5 - delta[0]).abs() < 1e-12);
    }

    #[test]
    fn momentum_keeps_the_direction_of_a_quick_prop_step() {
        let mut layer = layer_with_moment(&[0., 0.], 0.3, 0.5);
        let inputs = Matrix::column(&[1., 1.]);

        QuickProp
            .update_weights(&mut layer, &Matrix::column(&[1.]), &inputs)
            .unwrap();
        assert_eq!(layer.weights().unwrap().to_vec(), [0.3, 0.3]);

        // no error left, only the momentum moves the weights
        BackProp
            .update_weights(&mut layer, &Matrix::column(&[0.]), &inputs)
            .unwrap();
        let weights = layer.weights().unwrap().to_vec();
        assert!(weights.iter().all(|w| (w - 0.45).abs() < 1e-12), "{weights:?}");
    }

    #[test]
    fn learning_rate_drops_when_the_step_overshoots() {
        // a positive delta is subtracted, so the previous step moved the weight down, and the
        // gradient is positive too
        let (lr, _) = QuickProp::coefficients(false, 0.3, 0.2, 0.5, 0.1);
        assert_eq!(lr, 0.);

        let (lr, _) = QuickProp::coefficients(false, 0.3, -0.2, 0.5, 0.1);
        assert_eq!(lr, 0.3);
    }

    #[test]
    fn moment_is_clipped() {
        // beta = 0.9 / (1.0 - 0.9) = 9
        let (_, moment) = QuickProp::coefficients(false, 0.3, -0.1, 0.9, 1.);
        assert_eq!(moment, QP_MOMENT_MAX);

        // beta = 0.5 / (2.5 - 0.5) = 0.25, gamma = -0.5 * 0.25 * -0.1 > 0
        let (_, moment) = QuickProp::coefficients(false, 0.3, -0.1, 0.5, 2.5);
        assert_eq!(moment, 0.25);

        // gamma < 0
        let (_, moment) = QuickProp::coefficients(false, 0.3, 0.1, 0.5, 2.5);
        assert_eq!(moment, QP_MOMENT_MAX);
    }

    #[test]
    fn degenerate_gradients_keep_weights_finite() {
        let mut layer = layer(&[0., 0.], 0.3);
        let inputs = Matrix::column(&[0., 0.]);

        for _ in 0..3 {
            QuickProp
                .update_weights(&mut layer, &Matrix::column(&[0.]), &inputs)
                .unwrap();
        }

        assert!(layer.weights().unwrap().iter().all(f64::is_finite));
    }
}
