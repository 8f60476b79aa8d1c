use std::fmt;
use std::sync::Arc;
use nohash_hasher::IntMap;

use ff_energy::BoltzmannParams;
use crate::TriangularIndex;
use crate::FoldError;

/// The decomposition step a soft constraint contribution is requested for.
///
/// Callbacks receive `(i, j, k, l, decomposition)`: for interior loops (k, l)
/// is the enclosed pair, for exterior loops of circular molecules (i, j)
/// and (k, l) are the pairs delimiting the wrapped loop, otherwise k and l
/// repeat i and j.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decomposition {
    /// Formation of the pair (i, j).
    Pair,
    /// Hairpin loop closed by (i, j).
    Hairpin,
    /// Interior loop closed by (i, j) enclosing (k, l).
    Interior,
    /// Multi-branch loop closed by (i, j).
    Multi,
    /// Branch (i, j) inside a multi-branch loop.
    MultiStem,
    /// Unpaired stretch i..=j inside a multi-branch loop.
    MultiUnpaired,
    /// Branch (i, j) in the exterior loop.
    ExteriorStem,
    /// Unpaired stretch i..=j in the exterior loop.
    ExteriorUnpaired,
    /// Circular exterior hairpin closed by (i, j).
    ExteriorHairpin,
    /// Circular exterior interior loop formed by (i, j) and (k, l).
    ExteriorInterior,
    /// Circular exterior multi-branch loop.
    ExteriorMulti,
}

pub type EnergyCallback = Arc<dyn Fn(usize, usize, usize, usize, Decomposition) -> i32 + Send + Sync>;
pub type WeightCallback = Arc<dyn Fn(usize, usize, usize, usize, Decomposition) -> f64 + Send + Sync>;

/// Pseudo-energy contributions (dcal/mol) for one sequence.
#[derive(Clone)]
pub struct SoftConstraints {
    index: TriangularIndex,
    unpaired: Vec<i32>,
    /// Prefix sums: up_sum[i] = Σ unpaired[1..=i].
    up_sum: Vec<i32>,
    pairs: IntMap<usize, i32>,
    stack: Vec<i32>,
    energy_cb: Option<EnergyCallback>,
    weight_cb: Option<WeightCallback>,
}

impl fmt::Debug for SoftConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftConstraints")
            .field("n", &self.len())
            .field("unpaired", &self.unpaired)
            .field("pairs", &self.pairs)
            .field("stack", &self.stack)
            .field("energy_cb", &self.energy_cb.is_some())
            .field("weight_cb", &self.weight_cb.is_some())
            .finish()
    }
}

impl SoftConstraints {
    pub fn new(n: usize) -> Self {
        SoftConstraints {
            index: TriangularIndex::new(n),
            unpaired: vec![0; n + 2],
            up_sum: vec![0; n + 2],
            pairs: IntMap::default(),
            stack: vec![0; n + 2],
            energy_cb: None,
            weight_cb: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn check(&self, i: usize) -> Result<(), FoldError> {
        if i == 0 || i > self.len() {
            return Err(FoldError::Construction(format!(
                "soft constraint position {} out of range 1..={}", i, self.len())));
        }
        Ok(())
    }

    /// Pseudo-energy for position i being unpaired (replaces earlier values).
    pub fn set_unpaired(&mut self, i: usize, energy: i32) -> Result<(), FoldError> {
        self.check(i)?;
        self.unpaired[i] = energy;
        for k in 1..=self.len() {
            self.up_sum[k] = self.up_sum[k - 1] + self.unpaired[k];
        }
        Ok(())
    }

    /// Add a pseudo-energy to the formation of the pair (i, j).
    pub fn add_pair(&mut self, i: usize, j: usize, energy: i32) -> Result<(), FoldError> {
        self.check(i)?;
        self.check(j)?;
        if i >= j {
            return Err(FoldError::Construction(format!("invalid pair ({}, {})", i, j)));
        }
        *self.pairs.entry(self.index.ji(i, j)).or_insert(0) += energy;
        Ok(())
    }

    /// Pseudo-energy of position i being part of a stacked pair.
    pub fn set_stack(&mut self, i: usize, energy: i32) -> Result<(), FoldError> {
        self.check(i)?;
        self.stack[i] = energy;
        Ok(())
    }

    pub fn with_energy_callback(mut self, cb: EnergyCallback) -> Self {
        self.energy_cb = Some(cb);
        self
    }

    pub fn with_weight_callback(mut self, cb: WeightCallback) -> Self {
        self.weight_cb = Some(cb);
        self
    }

    pub fn has_callback(&self) -> bool {
        self.energy_cb.is_some() || self.weight_cb.is_some()
    }

    /// Sum of the unpaired contributions over i..=j.
    #[inline]
    pub fn unpaired_stretch(&self, i: usize, j: usize) -> i32 {
        if j < i || i == 0 {
            return 0;
        }
        let j = j.min(self.len());
        self.up_sum[j] - self.up_sum[i - 1]
    }

    pub fn pair(&self, i: usize, j: usize) -> i32 {
        if i == 0 || i >= j || j > self.len() {
            return 0;
        }
        self.pairs.get(&self.index.ji(i, j)).copied().unwrap_or(0)
    }

    /// The position-based contributions of a decomposition.
    pub fn fixed(&self, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        let n = self.len();
        match d {
            Decomposition::Pair => self.pair(i, j),
            Decomposition::Hairpin => self.unpaired_stretch(i + 1, j - 1),
            Decomposition::Interior => {
                let mut e = self.unpaired_stretch(i + 1, k - 1)
                    + self.unpaired_stretch(l + 1, j - 1);
                if k == i + 1 && l + 1 == j {
                    e += self.stack[i] + self.stack[k] + self.stack[l] + self.stack[j];
                }
                e
            }
            Decomposition::MultiUnpaired | Decomposition::ExteriorUnpaired => {
                self.unpaired_stretch(i, j)
            }
            Decomposition::ExteriorHairpin => {
                self.unpaired_stretch(j + 1, n) + self.unpaired_stretch(1, i - 1)
            }
            Decomposition::ExteriorInterior => {
                self.unpaired_stretch(j + 1, k - 1)
                    + self.unpaired_stretch(l + 1, n)
                    + self.unpaired_stretch(1, i - 1)
            }
            Decomposition::Multi
            | Decomposition::MultiStem
            | Decomposition::ExteriorStem
            | Decomposition::ExteriorMulti => 0,
        }
    }

    /// The callback pseudo-energy of a decomposition (0 without callback).
    pub fn callback(&self, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        self.energy_cb.as_ref().map_or(0, |cb| cb(i, j, k, l, d))
    }

    /// Total pseudo-energy of a decomposition: position-based plus callback.
    pub fn evaluate(&self, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        self.fixed(i, j, k, l, d) + self.callback(i, j, k, l, d)
    }

    /// The callback Boltzmann factor of a decomposition (1 without callback).
    pub fn callback_factor(&self,
        bp: &BoltzmannParams,
        i: usize, j: usize, k: usize, l: usize,
        d: Decomposition
    ) -> f64 {
        match (&self.weight_cb, &self.energy_cb) {
            (Some(w), _) => w(i, j, k, l, d),
            (None, Some(e)) => bp.boltzmann(e(i, j, k, l, d), 1),
            (None, None) => 1.0,
        }
    }
}

/// Soft constraints attached to a fold compound: one set for the single
/// sequence (or shared by all sequences of an alignment), or one set per
/// aligned sequence.
#[derive(Debug, Clone)]
pub enum SoftConstraintSet {
    Shared(SoftConstraints),
    PerSequence(Vec<SoftConstraints>),
}

impl SoftConstraintSet {
    /// Check the set against a compound of length n with n_seq sequences.
    pub(crate) fn validate(&self, n: usize, n_seq: usize) -> Result<(), FoldError> {
        let bad_len = |sc: &SoftConstraints| sc.len() != n;
        match self {
            SoftConstraintSet::Shared(sc) if bad_len(sc) => Err(FoldError::Construction(
                format!("soft constraints of length {} for sequence of length {}", sc.len(), n))),
            SoftConstraintSet::PerSequence(v) if v.len() != n_seq => Err(FoldError::Construction(
                format!("{} soft constraint sets for {} sequences", v.len(), n_seq))),
            SoftConstraintSet::PerSequence(v) if v.iter().any(bad_len) => Err(FoldError::Construction(
                "soft constraint set length does not match the alignment".to_string())),
            _ => Ok(()),
        }
    }

    pub fn has_callback(&self) -> bool {
        match self {
            SoftConstraintSet::Shared(sc) => sc.has_callback(),
            SoftConstraintSet::PerSequence(v) => v.iter().any(|sc| sc.has_callback()),
        }
    }

    /// Position-based contributions, in the units of the compound (summed
    /// over the sequences of an alignment).
    pub fn fixed(&self, n_seq: usize, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        match self {
            SoftConstraintSet::Shared(sc) => n_seq as i32 * sc.fixed(i, j, k, l, d),
            SoftConstraintSet::PerSequence(v) => v.iter().map(|sc| sc.fixed(i, j, k, l, d)).sum(),
        }
    }

    pub fn callback(&self, n_seq: usize, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        match self {
            SoftConstraintSet::Shared(sc) => n_seq as i32 * sc.callback(i, j, k, l, d),
            SoftConstraintSet::PerSequence(v) => v.iter().map(|sc| sc.callback(i, j, k, l, d)).sum(),
        }
    }

    pub fn evaluate(&self, n_seq: usize, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        self.fixed(n_seq, i, j, k, l, d) + self.callback(n_seq, i, j, k, l, d)
    }

    /// Boltzmann factor of the callback contributions. Per-sequence
    /// factors enter as their geometric mean.
    pub fn callback_factor(&self,
        bp: &BoltzmannParams,
        i: usize, j: usize, k: usize, l: usize,
        d: Decomposition
    ) -> f64 {
        match self {
            SoftConstraintSet::Shared(sc) => sc.callback_factor(bp, i, j, k, l, d),
            SoftConstraintSet::PerSequence(v) => {
                let inv = 1.0 / v.len() as f64;
                v.iter()
                    .map(|sc| sc.callback_factor(bp, i, j, k, l, d).powf(inv))
                    .product()
            }
        }
    }
}
