//! Dynamic programming engines for RNA secondary structures: minimum free
//! energy, partition function and base-pair probabilities.

/// The fold compound error type.
mod error;

/// Triangular matrix offsets.
mod index;

/// Single sequences and alignments.
mod sequence;

/// Hard and soft constraints.
mod constraints;

/// Folding options, allocation masks.
mod options;

/// MFE and partition function arrays.
mod matrices;

/// The fold compound.
mod compound;

/// Loop energies as the recursions see them.
mod loops;

/// Boltzmann weights of the loops.
mod exp_loops;

/// G-quadruplex enumeration.
mod gquad;

/// Minimum free energy fill and backtrack.
mod mfe;

/// Partition function.
mod pf;

/// Pair probabilities.
mod outside;

/// Structure evaluation.
mod eval;

/// Pair lists, pair info, solutions.
mod records;

pub use error::*;
pub use index::*;
pub use sequence::*;
pub use constraints::*;
pub use options::*;
pub use matrices::*;
pub use compound::*;
pub use loops::*;
pub use exp_loops::*;
pub use gquad::*;
pub use records::*;
