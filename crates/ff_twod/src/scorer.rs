//! Loop contributions in the algebra of a recursion.

use ff_fold::LoopEnergies;
use ff_fold::LoopWeights;

use crate::Algebra;
use crate::MinPlus;
use crate::SumProduct;

/// The loop decompositions of the distance class recursions. Positions
/// are 1-based; forbidden loops score `A::ZERO`.
pub trait Scorer {
    type A: Algebra;

    fn pair(&self, i: usize, j: usize) -> <Self::A as Algebra>::Value;
    fn hairpin(&self, i: usize, j: usize) -> <Self::A as Algebra>::Value;
    fn interior(&self, i: usize, j: usize, p: usize, q: usize) -> <Self::A as Algebra>::Value;
    fn ml_closing(&self, i: usize, j: usize) -> <Self::A as Algebra>::Value;
    fn ml_stem(&self, i: usize, j: usize) -> <Self::A as Algebra>::Value;
    /// Unpaired stretch i..=j in a multi-branch loop (`ONE` if empty).
    fn ml_unpaired(&self, i: usize, j: usize) -> <Self::A as Algebra>::Value;
    fn ext_stem(&self, i: usize, j: usize) -> <Self::A as Algebra>::Value;
    /// Unpaired stretch i..=j in the exterior loop (`ONE` if empty).
    fn ext_unpaired(&self, i: usize, j: usize) -> <Self::A as Algebra>::Value;
    fn hairpin_circ(&self, p: usize, q: usize) -> <Self::A as Algebra>::Value;
    fn interior_circ(&self, p: usize, q: usize, k: usize, l: usize) -> <Self::A as Algebra>::Value;
    fn ml_closing_circ(&self) -> <Self::A as Algebra>::Value;
}

impl Scorer for LoopEnergies<'_> {
    type A = MinPlus;

    fn pair(&self, i: usize, j: usize) -> i32 {
        LoopEnergies::pair(self, i, j)
    }

    fn hairpin(&self, i: usize, j: usize) -> i32 {
        LoopEnergies::hairpin(self, i, j)
    }

    fn interior(&self, i: usize, j: usize, p: usize, q: usize) -> i32 {
        LoopEnergies::interior(self, i, j, p, q)
    }

    fn ml_closing(&self, i: usize, j: usize) -> i32 {
        LoopEnergies::ml_closing(self, i, j)
    }

    fn ml_stem(&self, i: usize, j: usize) -> i32 {
        LoopEnergies::ml_stem(self, i, j)
    }

    fn ml_unpaired(&self, i: usize, j: usize) -> i32 {
        LoopEnergies::ml_unpaired(self, i, j)
    }

    fn ext_stem(&self, i: usize, j: usize) -> i32 {
        LoopEnergies::ext_stem(self, i, j)
    }

    fn ext_unpaired(&self, i: usize, j: usize) -> i32 {
        LoopEnergies::ext_unpaired(self, i, j)
    }

    fn hairpin_circ(&self, p: usize, q: usize) -> i32 {
        LoopEnergies::hairpin_circ(self, p, q)
    }

    fn interior_circ(&self, p: usize, q: usize, k: usize, l: usize) -> i32 {
        LoopEnergies::interior_circ(self, p, q, k, l)
    }

    fn ml_closing_circ(&self) -> i32 {
        LoopEnergies::ml_closing_circ(self)
    }
}

impl Scorer for LoopWeights<'_> {
    type A = SumProduct;

    fn pair(&self, i: usize, j: usize) -> f64 {
        LoopWeights::pair(self, i, j)
    }

    fn hairpin(&self, i: usize, j: usize) -> f64 {
        LoopWeights::hairpin(self, i, j)
    }

    fn interior(&self, i: usize, j: usize, p: usize, q: usize) -> f64 {
        LoopWeights::interior(self, i, j, p, q)
    }

    fn ml_closing(&self, i: usize, j: usize) -> f64 {
        LoopWeights::ml_closing(self, i, j)
    }

    fn ml_stem(&self, i: usize, j: usize) -> f64 {
        LoopWeights::ml_stem(self, i, j)
    }

    fn ml_unpaired(&self, i: usize, j: usize) -> f64 {
        LoopWeights::ml_unpaired(self, i, j)
    }

    fn ext_stem(&self, i: usize, j: usize) -> f64 {
        LoopWeights::ext_stem(self, i, j)
    }

    fn ext_unpaired(&self, i: usize, j: usize) -> f64 {
        LoopWeights::ext_unpaired(self, i, j)
    }

    fn hairpin_circ(&self, p: usize, q: usize) -> f64 {
        LoopWeights::hairpin_circ(self, p, q)
    }

    fn interior_circ(&self, p: usize, q: usize, k: usize, l: usize) -> f64 {
        LoopWeights::interior_circ(self, p, q, k, l)
    }

    fn ml_closing_circ(&self) -> f64 {
        LoopWeights::ml_closing_circ(self)
    }
}
