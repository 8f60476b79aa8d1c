
mod error;
mod dotbracket;
mod pair_table;
mod distance;

pub use error::*;
pub use dotbracket::*;
pub use pair_table::*;
pub use distance::*;

