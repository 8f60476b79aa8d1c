use std::fmt;

use ff_structure::StructureError;
use ff_fold::FoldError;

#[derive(Debug)]
pub enum TwoDError {
    Fold(FoldError),
    Structure(StructureError),
    /// The compound uses a feature that distance classes do not cover.
    Unsupported(&'static str),
    /// Reference structure length vs sequence length.
    LengthMismatch(usize, usize),
}

impl fmt::Display for TwoDError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwoDError::Fold(e) => write!(f, "{}", e),
            TwoDError::Structure(e) => write!(f, "{}", e),
            TwoDError::Unsupported(what) => {
                write!(f, "Distance classes are not available for {}", what)
            }
            TwoDError::LengthMismatch(got, expected) => {
                write!(f, "Reference structure of length {} for sequence of length {}", got, expected)
            }
        }
    }
}

impl std::error::Error for TwoDError {}

impl From<FoldError> for TwoDError {
    fn from(e: FoldError) -> Self {
        TwoDError::Fold(e)
    }
}

impl From<StructureError> for TwoDError {
    fn from(e: StructureError) -> Self {
        TwoDError::Structure(e)
    }
}
