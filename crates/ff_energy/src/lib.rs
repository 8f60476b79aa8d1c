//! Nearest neighbor free energy parameters for RNA secondary structures.

/// Base, NucleotideVec, PairTypeRNA, ....
mod nucleotides;

/// Raw parameter tables in ViennaRNA file layout.
mod energy_tables;

/// Parameter file parsing.
pub mod parameter_parsing;

/// Model settings (temperature, dangles, ...).
mod model;

/// Free energy evaluation of loops.
mod params;

/// Boltzmann weights for the partition function.
mod boltzmann;

/// G-quadruplex free energies.
mod gquad;

pub use nucleotides::*;
pub use energy_tables::*;
pub use model::*;
pub use params::*;
pub use boltzmann::*;
pub use gquad::*;
