//! # fuzzyfold
//!
//! Unified API for RNA secondary structure folding: minimum free energy,
//! partition function, pair probabilities and distance-classified folding.
//!
//! This crate re-exports the main functionality from its submodules.

pub mod structure {
    pub use ::ff_structure::*;
}

pub mod energy {
    pub use ::ff_energy::*;
}

pub mod fold {
    pub use ::ff_fold::*;
}

pub mod twod {
    pub use ::ff_twod::*;
}
