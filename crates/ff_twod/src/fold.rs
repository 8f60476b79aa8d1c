//! Distance-classified folding of a compound against two references.

use std::fmt;
use colored::*;
use log::info;
use serde::Serialize;
use serde::Deserialize;

use ff_energy::INF;
use ff_fold::FoldCompound;

use crate::Algebra;
use crate::Bounds;
use crate::DistanceClasses;
use crate::ReferencePairs;
use crate::TwoDError;

/// One distance class of a result list. A list holds the tracked classes
/// by increasing (k, l), then the remainder (`k = l = -1`) if it is not
/// empty, and ends with a sentinel entry (`k = INF`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoDSolution {
    pub k: i32,
    pub l: i32,
    /// Free energy (kcal/mol): the minimum of the class, or the ensemble
    /// free energy of the class.
    pub value: f64,
    /// A minimum free energy structure of the class.
    pub structure: Option<String>,
}

impl TwoDSolution {
    pub const REMAINDER: i32 = -1;

    pub fn sentinel() -> Self {
        TwoDSolution { k: INF, l: INF, value: 0.0, structure: None }
    }

    pub fn is_sentinel(&self) -> bool {
        self.k == INF
    }

    pub fn is_remainder(&self) -> bool {
        self.k == Self::REMAINDER
    }
}

impl fmt::Display for TwoDSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.structure.as_deref().unwrap_or("");
        if self.is_remainder() {
            write!(f, "{:>4} {:>4} {:>8.2} {}", "r".yellow(), "r".yellow(), self.value, s)
        } else {
            write!(f, "{:>4} {:>4} {:>8.2} {}", self.k, self.l, self.value, s)
        }
    }
}

/// Solution lists in the documented order, with `value` and `structure`
/// supplied per class.
pub(crate) fn solution_list<A, V, S>(classes: &DistanceClasses<A>, value: V, structure: S)
    -> Result<Vec<TwoDSolution>, TwoDError>
where
    A: Algebra,
    V: Fn(A::Value) -> f64,
    S: Fn(usize, usize) -> Result<Option<String>, TwoDError>,
{
    let mut out = Vec::new();
    for (k, l, v) in classes.iter() {
        out.push(TwoDSolution {
            k: k as i32,
            l: l as i32,
            value: value(v),
            structure: structure(k, l)?,
        });
    }
    if !A::is_zero(classes.remainder()) {
        out.push(TwoDSolution {
            k: TwoDSolution::REMAINDER,
            l: TwoDSolution::REMAINDER,
            value: value(classes.remainder()),
            structure: None,
        });
    }
    out.push(TwoDSolution::sentinel());
    Ok(out)
}

/// A fold compound together with two reference structures.
#[derive(Debug, Clone)]
pub struct DistanceFold {
    pub(crate) fc: FoldCompound,
    pub(crate) refs: ReferencePairs,
    pub(crate) bounds: Bounds,
}

impl DistanceFold {
    /// Classify the structures of `fc` by their distances to `ref1` and
    /// `ref2`. All classes are tracked until
    /// [`DistanceFold::with_max_distances`] restricts them.
    pub fn new(fc: FoldCompound, ref1: &str, ref2: &str) -> Result<Self, TwoDError> {
        if fc.sequence().is_alignment() {
            return Err(TwoDError::Unsupported("alignments"));
        }
        if fc.cut().is_some() {
            return Err(TwoDError::Unsupported("hybrids"));
        }
        if fc.model().gquad {
            return Err(TwoDError::Unsupported("G-quadruplexes"));
        }
        let refs = ReferencePairs::new(ref1, ref2, fc.len())?;
        let (max_k, max_l) = refs.max_distances();
        info!("{} references with {} and {} pairs, n = {}",
            "Distance classes:".green(),
            refs.first().num_pairs(),
            refs.second().num_pairs(),
            fc.len());
        Ok(DistanceFold { fc, refs, bounds: Bounds { max_k, max_l } })
    }

    /// Track only k <= max_d1 and l <= max_d2, everything else goes to the
    /// remainder.
    pub fn with_max_distances(mut self, max_d1: usize, max_d2: usize) -> Self {
        self.bounds = Bounds { max_k: max_d1, max_l: max_d2 };
        self
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn compound(&self) -> &FoldCompound {
        &self.fc
    }

    pub fn compound_mut(&mut self) -> &mut FoldCompound {
        &mut self.fc
    }

    pub fn references(&self) -> &ReferencePairs {
        &self.refs
    }

    pub fn into_compound(self) -> FoldCompound {
        self.fc
    }
}
