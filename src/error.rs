use std::{error::Error, fmt, io};

/// The result type used by the numeric engine and the network model.
pub type Result<T> = std::result::Result<T, NnErr>;

/// Failures of the matrix engine, the layers and the network.
#[derive(Debug)]
pub enum NnErr {
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
    ElementCountMismatch {
        from: (usize, usize),
        to: (usize, usize),
    },
    RaggedRows {
        row: usize,
        got: usize,
        expected: usize,
    },
    EmptyMatrix,
    IndexOutOfBounds {
        index: (usize, usize),
        size: (usize, usize),
    },
    InvalidNeuronCounts(Vec<usize>),
    MissingPrevLayerSize,
    InvalidLayerStack(String),
    TrainItemSize {
        item: usize,
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// Training drove the weights of a layer to NaN or infinity.
    NonFiniteWeights {
        layer: usize,
    },
    Serde(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for NnErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnErr::ShapeMismatch { op, left, right } => write!(
                f,
                "incompatible shapes for {op}: {}x{} and {}x{}",
                left.0, left.1, right.0, right.1
            ),
            NnErr::ElementCountMismatch { from, to } => write!(
                f,
                "cannot reshape {}x{} into {}x{}, element counts differ",
                from.0, from.1, to.0, to.1
            ),
            NnErr::RaggedRows { row, got, expected } => {
                write!(f, "row {row} has {got} columns, expected {expected}")
            }
            NnErr::EmptyMatrix => write!(f, "a matrix needs at least one row and one column"),
            NnErr::IndexOutOfBounds { index, size } => write!(
                f,
                "index ({}, {}) is out of bounds for a {}x{} matrix",
                index.0, index.1, size.0, size.1
            ),
            NnErr::InvalidNeuronCounts(counts) => write!(
                f,
                "neuron counts {counts:?} are invalid, at least 2 positive counts are required"
            ),
            NnErr::MissingPrevLayerSize => {
                write!(f, "hidden and output layers require the previous layer size")
            }
            NnErr::InvalidLayerStack(msg) => write!(f, "invalid layer stack: {msg}"),
            NnErr::TrainItemSize {
                item,
                what,
                got,
                expected,
            } => write!(
                f,
                "train item {item} has {got} {what}, the network expects {expected}"
            ),
            NnErr::NonFiniteWeights { layer } => {
                write!(f, "the weights of layer {layer} diverged to non-finite values")
            }
            NnErr::Serde(e) => write!(f, "serialization error: {e}"),
            NnErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for NnErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NnErr::Serde(e) => Some(e),
            NnErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for NnErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<io::Error> for NnErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
