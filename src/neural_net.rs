use std::{ops::ControlFlow, time::Instant};

use log::{debug, trace, warn};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    configs::NetworkConfig,
    dataset::{arg_max, TrainItem},
    layer::{Layer, LayerConfig, LayerType},
    matrix::Matrix,
    optimization::{GradAlgorithm, Optimizer},
    NnErr, Result,
};

/// Progress of a training run, emitted once per finished epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochReport {
    /// Starts at 1.
    pub epoch_number: usize,
    pub epoch_elapsed_millis: u64,
}

/// How a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainSummary {
    pub epochs_run: usize,
    /// Whether the progress callback stopped the run before all its epochs ran.
    pub cancelled: bool,
}

/// A feed forward network: an input layer, any amount of hidden layers and an output layer.
///
/// The topology is fixed once built, training only mutates the weights. The network
/// serializes as the array of its layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct NeuralNetwork {
    layers: Vec<Layer>,
}

impl NeuralNetwork {
    /// Builds a network with freshly initialised weights.
    ///
    /// # Arguments
    /// * `config` - The neuron counts and the hyperparameters of every layer.
    ///
    /// # Returns
    /// The network, or `NnErr::InvalidNeuronCounts` if there are less than two counts or any of
    /// them is zero.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        match config.seed {
            Some(seed) => Self::with_rng(config, &mut StdRng::seed_from_u64(seed)),
            None => Self::with_rng(config, &mut rand::rng()),
        }
    }

    /// Like [`NeuralNetwork::new`], drawing the initial weights from `rng`.
    pub fn with_rng<R: Rng>(config: &NetworkConfig, rng: &mut R) -> Result<Self> {
        let counts = &config.neuron_counts;
        if counts.len() < 2 || counts.contains(&0) {
            return Err(NnErr::InvalidNeuronCounts(counts.clone()));
        }

        let last = counts.len() - 1;
        let layers = counts
            .iter()
            .enumerate()
            .map(|(i, &layer_size)| {
                let layer_type = match i {
                    0 => LayerType::Input,
                    i if i == last => LayerType::Output,
                    _ => LayerType::Hidden,
                };

                let layer_config = LayerConfig {
                    layer_type,
                    layer_size,
                    prev_layer_size: i.checked_sub(1).map(|prev| counts[prev]),
                    learning_rate: config.learning_rate,
                    moment: config.moment,
                    act_fn: config.act_fn,
                };

                Layer::new(&layer_config, &mut *rng)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(layers = counts.len(); "built network {counts:?}");
        Ok(Self { layers })
    }

    /// Rebuilds a network from its layers.
    ///
    /// # Returns
    /// The network, or `NnErr::InvalidLayerStack` if the layer types are out of place or the
    /// weight matrices of consecutive layers do not chain.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        if layers.len() < 2 {
            return Err(NnErr::InvalidLayerStack(format!(
                "a network needs at least 2 layers, got {}",
                layers.len()
            )));
        }

        let last = layers.len() - 1;
        for (i, layer) in layers.iter().enumerate() {
            layer.validate()?;

            let expected = match i {
                0 => LayerType::Input,
                i if i == last => LayerType::Output,
                _ => LayerType::Hidden,
            };
            if layer.layer_type() != expected {
                return Err(NnErr::InvalidLayerStack(format!(
                    "layer {i} is {:?}, expected {expected:?}",
                    layer.layer_type()
                )));
            }
        }

        // the input layer has no size of its own, the first weights define it
        for (i, pair) in layers.windows(2).enumerate().skip(1) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.prev_size() != prev.size() {
                return Err(NnErr::InvalidLayerStack(format!(
                    "layer {} expects {:?} inputs but layer {i} has {:?} neurons",
                    i + 1,
                    next.prev_size(),
                    prev.size()
                )));
            }
        }

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The length of the input vectors this network accepts.
    pub fn input_size(&self) -> usize {
        self.layers.get(1).and_then(Layer::prev_size).unwrap_or(0)
    }

    /// The length of the output vectors this network produces.
    pub fn output_size(&self) -> usize {
        self.layers.last().and_then(Layer::size).unwrap_or(0)
    }

    /// Runs a single forward pass.
    ///
    /// # Arguments
    /// * `inputs` - One value per input neuron.
    ///
    /// # Returns
    /// The outputs as a column matrix.
    pub fn query(&self, inputs: &[f64]) -> Result<Matrix> {
        self.layers
            .iter()
            .try_fold(Matrix::column(inputs), |signal, layer| {
                Ok(layer.forward(signal)?.into_outputs())
            })
    }

    /// The index of the strongest output for `inputs`.
    pub fn classify(&self, inputs: &[f64]) -> Result<Option<usize>> {
        Ok(arg_max(&self.query(inputs)?.to_vec()))
    }

    /// The share of `test_set` items whose strongest output matches their strongest target.
    pub fn accuracy(&self, test_set: &[TrainItem]) -> Result<f64> {
        if test_set.is_empty() {
            return Ok(0.);
        }

        let mut hits = 0;
        for item in test_set {
            if self.classify(&item.inputs)? == item.label() {
                hits += 1;
            }
        }

        Ok(hits as f64 / test_set.len() as f64)
    }

    /// The mean squared error over every output of every item of `test_set`.
    pub fn mse(&self, test_set: &[TrainItem]) -> Result<f64> {
        let mut total = 0.;
        let mut count = 0;
        for item in test_set {
            let outputs = self.query(&item.inputs)?;
            let errors = Matrix::column(&item.targets).subtract(&outputs)?;
            total += errors.iter().map(|e| e * e).sum::<f64>();
            count += errors.rows();
        }

        Ok(if count == 0 { 0. } else { total / count as f64 })
    }

    /// Trains the network, shuffling `train_set` with the thread rng.
    ///
    /// See [`NeuralNetwork::train_with_rng`].
    pub fn train<F>(
        &mut self,
        algorithm: GradAlgorithm,
        train_set: &[TrainItem],
        epochs: usize,
        on_epoch: F,
    ) -> Result<TrainSummary>
    where
        F: FnMut(&EpochReport) -> ControlFlow<()>,
    {
        self.train_with_rng(algorithm, train_set, epochs, &mut rand::rng(), on_epoch)
    }

    /// Trains the network.
    ///
    /// Every epoch visits `train_set` in a new random order and, for each item, runs a forward
    /// pass followed by a backward pass of `algorithm`.
    ///
    /// # Arguments
    /// * `algorithm` - The weight update rule.
    /// * `train_set` - The examples to learn.
    /// * `epochs` - The amount of passes over `train_set`.
    /// * `rng` - Shuffles the examples.
    /// * `on_epoch` - Called after every epoch, returning `ControlFlow::Break` stops the run.
    ///
    /// # Returns
    /// A summary of the run, `NnErr::TrainItemSize` if an item does not fit the network or
    /// `NnErr::NonFiniteWeights` if an epoch left NaN or infinite weights behind. The weights
    /// are not restored on error.
    pub fn train_with_rng<R, F>(
        &mut self,
        algorithm: GradAlgorithm,
        train_set: &[TrainItem],
        epochs: usize,
        rng: &mut R,
        mut on_epoch: F,
    ) -> Result<TrainSummary>
    where
        R: Rng,
        F: FnMut(&EpochReport) -> ControlFlow<()>,
    {
        self.check_train_set(train_set)?;

        let optimizer = algorithm.optimizer();
        let mut order: Vec<usize> = (0..train_set.len()).collect();

        for epoch_number in 1..=epochs {
            let start = Instant::now();
            order.shuffle(rng);

            for &i in &order {
                self.train_item(optimizer, &train_set[i])?;
            }

            if let Err(e) = self.check_finite() {
                warn!(epoch = epoch_number; "training diverged: {e}");
                return Err(e);
            }

            let report = EpochReport {
                epoch_number,
                epoch_elapsed_millis: start.elapsed().as_millis() as u64,
            };
            trace!(epoch = epoch_number, elapsed_ms = report.epoch_elapsed_millis; "epoch finished");

            if on_epoch(&report).is_break() {
                debug!(epoch = epoch_number; "training stopped early");
                return Ok(TrainSummary {
                    epochs_run: epoch_number,
                    cancelled: true,
                });
            }
        }

        Ok(TrainSummary {
            epochs_run: epochs,
            cancelled: false,
        })
    }

    fn train_item(&mut self, optimizer: &dyn Optimizer, item: &TrainItem) -> Result<()> {
        let mut contexts = Vec::with_capacity(self.layers.len());
        let mut signal = Matrix::column(&item.inputs);
        for layer in &self.layers {
            let ctx = layer.forward(signal)?;
            signal = ctx.outputs().clone();
            contexts.push(ctx);
        }

        let mut errors = Matrix::column(&item.targets).subtract(&signal)?;
        for (layer, ctx) in self.layers.iter_mut().zip(&contexts).skip(1).rev() {
            errors = layer.backward(optimizer, ctx, &errors)?;
        }

        Ok(())
    }

    fn check_train_set(&self, train_set: &[TrainItem]) -> Result<()> {
        let (input_size, output_size) = (self.input_size(), self.output_size());

        for (item, example) in train_set.iter().enumerate() {
            if example.inputs.len() != input_size {
                return Err(NnErr::TrainItemSize {
                    item,
                    what: "inputs",
                    got: example.inputs.len(),
                    expected: input_size,
                });
            }
            if example.targets.len() != output_size {
                return Err(NnErr::TrainItemSize {
                    item,
                    what: "targets",
                    got: example.targets.len(),
                    expected: output_size,
                });
            }
        }

        Ok(())
    }

    /// The index of the first layer holding a NaN or infinite weight, as an error.
    fn check_finite(&self) -> Result<()> {
        let diverged = self.layers.iter().position(|layer| {
            layer
                .weights()
                .is_some_and(|weights| !weights.iter().all(f64::is_finite))
        });

        match diverged {
            Some(layer) => Err(NnErr::NonFiniteWeights { layer }),
            None => Ok(()),
        }
    }

    /// Serializes the network as a JSON array of its layers.
    ///
    /// JSON has no NaN nor infinity, so a network with such weights is rejected with
    /// `NnErr::NonFiniteWeights` instead of being written out unreadable.
    pub fn serialize(&self) -> Result<String> {
        self.check_finite()?;
        Ok(serde_json::to_string(&self.layers)?)
    }

    /// Rebuilds a network from the output of [`NeuralNetwork::serialize`].
    pub fn deserialize(serialized: &str) -> Result<Self> {
        let layers: Vec<Layer> = serde_json::from_str(serialized)?;
        Self::from_layers(layers)
    }
}

impl TryFrom<Vec<Layer>> for NeuralNetwork {
    type Error = NnErr;

    fn try_from(layers: Vec<Layer>) -> Result<Self> {
        Self::from_layers(layers)
    }
}

impl From<NeuralNetwork> for Vec<Layer> {
    fn from(network: NeuralNetwork) -> Self {
        network.layers
    }
}
