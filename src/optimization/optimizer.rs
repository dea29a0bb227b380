use crate::{layer::Layer, matrix::Matrix, Result};

/// Defines the strategy for updating a layer's weights from its back-propagated error.
pub trait Optimizer: Send + Sync {
    /// Updates the weights of `layer` in place.
    ///
    /// # Arguments
    /// * `layer` - The layer to update, it also holds the optimizer's per-layer state.
    /// * `signal` - The layer's output errors times the activation derivative, a column.
    /// * `inputs` - The inputs the layer received in the forward pass, a column.
    ///
    /// # Returns
    /// An error if the shapes of `signal`, `inputs` and the weights don't line up.
    fn update_weights(&self, layer: &mut Layer, signal: &Matrix, inputs: &Matrix) -> Result<()>;
}
