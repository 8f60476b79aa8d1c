//! Hard and soft constraints on the structure space.

mod hard;
mod soft;

pub use hard::*;
pub use soft::*;
