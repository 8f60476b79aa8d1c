use std::fmt;

use ff_structure::StructureError;
use ff_energy::SequenceError;
use ff_energy::ParamError;

#[derive(Debug)]
pub enum FoldError {
    /// Invalid input or an unsupported combination of options.
    Construction(String),
    /// A matrix could not be allocated.
    Allocation { array: &'static str, bytes: usize },
    /// The partition function vanished or is not finite.
    NoValidEnsemble(f64),
    /// No structure is compatible with the constraints.
    NoValidStructure,
    /// The compound was built without the parameters for this operation.
    MissingParameters(&'static str),
    /// The requested matrix is not allocated or not yet computed.
    NotAllocated(&'static str),
    /// Backtracking found no decomposition for (i, j).
    Backtrack(usize, usize),
    Sequence(SequenceError),
    Structure(StructureError),
    Parameters(ParamError),
}

impl fmt::Display for FoldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoldError::Construction(msg) => write!(f, "Cannot build fold compound: {}", msg),
            FoldError::Allocation { array, bytes } => {
                write!(f, "Failed to allocate {} bytes for matrix '{}'", bytes, array)
            }
            FoldError::NoValidEnsemble(q) => {
                write!(f, "No valid ensemble (partition function = {})", q)
            }
            FoldError::NoValidStructure => {
                write!(f, "No structure satisfies the constraints")
            }
            FoldError::MissingParameters(op) => {
                write!(f, "Fold compound has no parameters for {}", op)
            }
            FoldError::NotAllocated(array) => {
                write!(f, "Matrix '{}' is not available", array)
            }
            FoldError::Backtrack(i, j) => {
                write!(f, "Backtracking failed at ({}, {})", i, j)
            }
            FoldError::Sequence(e) => write!(f, "{}", e),
            FoldError::Structure(e) => write!(f, "{}", e),
            FoldError::Parameters(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FoldError {}

impl From<SequenceError> for FoldError {
    fn from(e: SequenceError) -> Self {
        match e {
            SequenceError::Empty => FoldError::Construction("empty sequence".to_string()),
            e => FoldError::Sequence(e),
        }
    }
}

impl From<StructureError> for FoldError {
    fn from(e: StructureError) -> Self {
        FoldError::Structure(e)
    }
}

impl From<ParamError> for FoldError {
    fn from(e: ParamError) -> Self {
        FoldError::Parameters(e)
    }
}
