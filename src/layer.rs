use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    activation::ActFn,
    matrix::Matrix,
    optimization::{Optimizer, QuickPropState, RPropState},
    NnErr, Result,
};

/// The position of a layer inside a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerType {
    Input,
    Hidden,
    Output,
}

/// The parameters needed to build a fresh layer.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub layer_type: LayerType,
    pub layer_size: usize,
    pub prev_layer_size: Option<usize>,
    pub learning_rate: f64,
    pub moment: f64,
    pub act_fn: ActFn,
}

/// The signals seen by a layer during one forward pass, consumed by the backward pass
/// that immediately follows it.
#[derive(Clone, Debug)]
pub struct ForwardContext {
    inputs: Matrix,
    outputs: Matrix,
}

impl ForwardContext {
    pub fn inputs(&self) -> &Matrix {
        &self.inputs
    }

    pub fn outputs(&self) -> &Matrix {
        &self.outputs
    }

    pub fn into_outputs(self) -> Matrix {
        self.outputs
    }
}

/// A fully connected layer.
///
/// Input layers hold no weights and pass their input through untouched. Every other layer
/// owns a `size x prev_size` weight matrix plus the state its optimizers keep between steps.
/// Only the hyperparameters, the weights and the previous weight deltas are persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    #[serde(rename = "type")]
    layer_type: LayerType,
    learning_rate: f64,
    moment: f64,
    #[serde(rename = "activation", default)]
    act_fn: ActFn,
    #[serde(default)]
    weights: Option<Matrix>,
    #[serde(default)]
    pub(crate) prev_delta_weights: Option<Matrix>,

    #[serde(skip)]
    pub(crate) rprop: Option<RPropState>,
    #[serde(skip)]
    pub(crate) quick_prop: Option<QuickPropState>,
}

impl Layer {
    /// Creates a new layer with weights drawn uniformly from `[-0.5, 0.5)`.
    ///
    /// # Arguments
    /// * `config` - The layer's parameters.
    /// * `rng` - The source of the initial weights.
    ///
    /// # Returns
    /// The new layer, or `NnErr::MissingPrevLayerSize` if a hidden or output layer has no
    /// previous layer size.
    pub fn new<R: Rng>(config: &LayerConfig, rng: &mut R) -> Result<Self> {
        let weights = match config.layer_type {
            LayerType::Input => None,
            _ => {
                let prev = config.prev_layer_size.ok_or(NnErr::MissingPrevLayerSize)?;
                let size = (config.layer_size, prev);
                Some(Matrix::from_fn(size, || rng.random::<f64>() - 0.5))
            }
        };

        Ok(Self::assemble(
            config.layer_type,
            weights,
            config.learning_rate,
            config.moment,
            config.act_fn,
        ))
    }

    /// Creates an input layer.
    pub fn input() -> Self {
        Self::assemble(LayerType::Input, None, 0., 0., ActFn::Identity)
    }

    /// Creates a hidden or output layer around existing weights.
    pub fn from_weights(
        layer_type: LayerType,
        weights: Matrix,
        learning_rate: f64,
        moment: f64,
        act_fn: ActFn,
    ) -> Result<Self> {
        if layer_type == LayerType::Input {
            return Err(NnErr::InvalidLayerStack(
                "input layers do not hold weights".into(),
            ));
        }

        Ok(Self::assemble(
            layer_type,
            Some(weights),
            learning_rate,
            moment,
            act_fn,
        ))
    }

    fn assemble(
        layer_type: LayerType,
        weights: Option<Matrix>,
        learning_rate: f64,
        moment: f64,
        act_fn: ActFn,
    ) -> Self {
        Self {
            layer_type,
            learning_rate,
            moment,
            act_fn,
            weights,
            prev_delta_weights: None,
            rprop: None,
            quick_prop: None,
        }
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn moment(&self) -> f64 {
        self.moment
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    pub fn weights(&self) -> Option<&Matrix> {
        self.weights.as_ref()
    }

    pub fn prev_delta_weights(&self) -> Option<&Matrix> {
        self.prev_delta_weights.as_ref()
    }

    /// The amount of neurons of this layer, unknown for input layers.
    pub fn size(&self) -> Option<usize> {
        self.weights.as_ref().map(Matrix::rows)
    }

    /// The amount of neurons this layer expects from the previous one.
    pub fn prev_size(&self) -> Option<usize> {
        self.weights.as_ref().map(Matrix::cols)
    }

    /// Propagates a column of signals through the layer.
    ///
    /// # Arguments
    /// * `inputs` - The outputs of the previous layer as a column matrix.
    ///
    /// # Returns
    /// The inputs and outputs of this pass, or a shape error if `inputs` does not match the
    /// weights.
    pub fn forward(&self, inputs: Matrix) -> Result<ForwardContext> {
        let Some(weights) = &self.weights else {
            return Ok(ForwardContext {
                outputs: inputs.clone(),
                inputs,
            });
        };

        let act_fn = self.act_fn;
        let outputs = weights.dot(&inputs)?.apply(|z| act_fn.f(z));
        Ok(ForwardContext { inputs, outputs })
    }

    /// Updates the weights from the errors of this layer's outputs.
    ///
    /// # Arguments
    /// * `optimizer` - The weight update rule.
    /// * `ctx` - The context returned by the forward pass that produced the errors.
    /// * `errors` - The errors of this layer's outputs.
    ///
    /// # Returns
    /// The errors of the previous layer's outputs, computed with the weights as they were
    /// before the update. Input layers return `errors` unchanged.
    pub fn backward(
        &mut self,
        optimizer: &dyn Optimizer,
        ctx: &ForwardContext,
        errors: &Matrix,
    ) -> Result<Matrix> {
        let Some(weights) = &self.weights else {
            return Ok(errors.clone());
        };

        let upstream = weights.transpose().dot(errors)?;
        let act_fn = self.act_fn;
        let derivative = ctx.outputs.apply(|y| act_fn.df_from_output(y));
        let signal = errors.hadamard(&derivative)?;

        optimizer.update_weights(self, &signal, &ctx.inputs)?;
        Ok(upstream)
    }

    /// Mutable access to the weights for the optimizers.
    pub(crate) fn weights_mut(&mut self) -> Result<&mut Matrix> {
        self.weights
            .as_mut()
            .ok_or_else(|| NnErr::InvalidLayerStack("input layers cannot be trained".into()))
    }

    /// Checks the invariants a deserialized layer must hold.
    pub(crate) fn validate(&self) -> Result<()> {
        match (self.layer_type, &self.weights) {
            (LayerType::Input, Some(_)) => Err(NnErr::InvalidLayerStack(
                "input layers do not hold weights".into(),
            )),
            (LayerType::Hidden | LayerType::Output, None) => Err(NnErr::InvalidLayerStack(
                format!("{:?} layers require weights", self.layer_type),
            )),
            (_, Some(weights)) => match &self.prev_delta_weights {
                Some(prev) if prev.size() != weights.size() => Err(NnErr::ShapeMismatch {
                    op: "prev_delta_weights",
                    left: weights.size(),
                    right: prev.size(),
                }),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}
