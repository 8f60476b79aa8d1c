//! Minimum free energies and partition functions of the structures of an
//! RNA, classified by their base-pair distances (k, l) to two reference
//! structures.

/// Errors of distance-classified folding.
mod error;

/// Min-plus and sum-product semirings.
mod algebra;

/// Ragged (k, l) storage with a remainder.
mod classes;

/// Reference pair counts and distance shifts.
mod reference;

/// Loop contributions per algebra.
mod scorer;

/// The class recursions.
mod engine;

/// Solutions and the distance fold object.
mod fold;

/// Minimum free energy classes and backtracking.
mod mfe;

/// Partition function classes.
mod pf;

pub use error::*;
pub use algebra::*;
pub use classes::*;
pub use reference::*;
pub use scorer::*;
pub use engine::TwoDMatrices;
pub use fold::DistanceFold;
pub use fold::TwoDSolution;
