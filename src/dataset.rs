use serde::{Deserialize, Serialize};

/// A labeled example: an input vector and the output the network should produce for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainItem {
    pub inputs: Vec<f64>,
    pub targets: Vec<f64>,
}

impl TrainItem {
    pub fn new(inputs: Vec<f64>, targets: Vec<f64>) -> Self {
        Self { inputs, targets }
    }

    /// The class of this item, the index of its largest target.
    pub fn label(&self) -> Option<usize> {
        arg_max(&self.targets)
    }
}

/// Supplies training and test examples.
pub trait TrainSetProvider {
    /// Returns up to `size` examples to train with.
    fn train_set(&self, size: usize) -> Vec<TrainItem>;

    /// Returns up to `count_per_class` examples of every class, grouped by class.
    fn test_sets(&self, count_per_class: usize) -> Vec<Vec<TrainItem>>;
}

/// An in-memory `TrainSetProvider` over separate training and test examples.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LabeledDataset {
    training: Vec<TrainItem>,
    test: Vec<TrainItem>,
}

impl LabeledDataset {
    pub fn new(training: Vec<TrainItem>, test: Vec<TrainItem>) -> Self {
        Self { training, test }
    }

    /// Builds a dataset whose items are used both for training and for testing.
    pub fn from_items(items: Vec<TrainItem>) -> Self {
        Self {
            test: items.clone(),
            training: items,
        }
    }
}

impl TrainSetProvider for LabeledDataset {
    fn train_set(&self, size: usize) -> Vec<TrainItem> {
        self.training.iter().take(size).cloned().collect()
    }

    fn test_sets(&self, count_per_class: usize) -> Vec<Vec<TrainItem>> {
        let classes = self
            .test
            .iter()
            .filter_map(TrainItem::label)
            .max()
            .map_or(0, |max| max + 1);

        let mut sets = vec![Vec::new(); classes];
        for item in &self.test {
            if let Some(set) = item.label().and_then(|label| sets.get_mut(label)) {
                if set.len() < count_per_class {
                    set.push(item.clone());
                }
            }
        }

        sets
    }
}

/// Index of the largest value, the first one on ties.
pub fn arg_max(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
