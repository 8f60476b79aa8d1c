//! Loop free energies as seen by the recursions: nearest neighbor
//! parameters summed over the sequences of a compound, hard constraint
//! checks and soft constraint contributions.
//!
//! Positions are 1-based. Every function returns `INF` for a
//! decomposition that the constraints (or the model) forbid. The
//! `*_energy` functions exclude soft constraint callbacks, which the
//! partition function applies as Boltzmann factors of their own.

use ff_energy::Base;
use ff_energy::PairTypeRNA;
use ff_energy::EnergyParams;
use ff_energy::Dangles;
use ff_energy::INF;
use ff_energy::MAXLOOP;

use crate::FoldCompound;
use crate::LoopContext;
use crate::Decomposition;

#[inline]
fn base(b: Option<Base>) -> Base {
    b.unwrap_or(Base::N)
}

/// Penalty for an aligned hairpin that is shorter than three nucleotides
/// in one of the sequences.
const SHORT_HAIRPIN: i32 = 600;

#[derive(Clone, Copy)]
pub struct LoopEnergies<'a> {
    pub fc: &'a FoldCompound,
    pub params: &'a EnergyParams,
}

impl<'a> LoopEnergies<'a> {
    pub fn new(fc: &'a FoldCompound, params: &'a EnergyParams) -> Self {
        LoopEnergies { fc, params }
    }

    #[inline]
    fn n_seq(&self) -> i32 {
        self.fc.n_seq() as i32
    }

    #[inline]
    fn fixed(&self, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        self.fc.sc.as_ref().map_or(0, |sc| sc.fixed(self.fc.n_seq(), i, j, k, l, d))
    }

    /// The soft constraint callback contribution of a decomposition.
    #[inline]
    pub fn callback(&self, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        self.fc.sc.as_ref().map_or(0, |sc| sc.callback(self.fc.n_seq(), i, j, k, l, d))
    }

    #[inline]
    fn with_callback(&self, e: i32, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> i32 {
        if e >= INF { INF } else { e + self.callback(i, j, k, l, d) }
    }

    /// Pairs sharing no nucleotide with a cut point in between.
    #[inline]
    fn same_strand(&self, i: usize, j: usize) -> bool {
        self.fc.same_strand(i, j)
    }

    /// Energy of forming the pair (i, j) itself: covariance score of an
    /// alignment and pair soft constraints.
    pub fn pair_energy(&self, i: usize, j: usize) -> i32 {
        if !self.fc.hc.evaluate(i, j, LoopContext::ALL) {
            return INF;
        }
        match self.fc.sequence.pair_contribution(self.fc.index.ji(i, j)) {
            Some(e) => e + self.fixed(i, j, i, j, Decomposition::Pair),
            None => INF,
        }
    }

    pub fn pair(&self, i: usize, j: usize) -> i32 {
        self.with_callback(self.pair_energy(i, j), i, j, i, j, Decomposition::Pair)
    }

    /// Hairpin loop closed by (i, j).
    pub fn hairpin_energy(&self, i: usize, j: usize) -> i32 {
        let fc = self.fc;
        if !self.same_strand(i, j) || !fc.hc.evaluate(i, j, LoopContext::HP) {
            return INF;
        }
        let u = j - i - 1;
        if u > 0 && fc.hc.up_hp(i + 1) < u {
            return INF;
        }
        let single = !fc.sequence.is_alignment();
        if single && u < fc.model.min_loop_size {
            return INF;
        }
        let mut e = 0;
        for row in fc.rows() {
            let us = row.nucleotides(i + 1, j - 1);
            if !single && us < 3 {
                e += SHORT_HAIRPIN;
                continue;
            }
            let pt = row.pair_type(&fc.model, i, j);
            let loop_seq = single.then(|| &row.s[i..=j]);
            let h = self.params.hairpin(us, pt, base(row.s3[i]), base(row.s5[j]), loop_seq);
            if h >= INF {
                return INF;
            }
            e += h;
        }
        e + self.fixed(i, j, i, j, Decomposition::Hairpin)
    }

    pub fn hairpin(&self, i: usize, j: usize) -> i32 {
        self.with_callback(self.hairpin_energy(i, j), i, j, i, j, Decomposition::Hairpin)
    }

    /// Interior loop (stack, bulge) closed by (i, j) enclosing (p, q).
    pub fn interior_energy(&self, i: usize, j: usize, p: usize, q: usize) -> i32 {
        let fc = self.fc;
        let (u1, u2) = (p - i - 1, j - q - 1);
        if u1 + u2 > MAXLOOP {
            return INF;
        }
        if !self.same_strand(i, p) || !self.same_strand(q, j) {
            return INF;
        }
        if !fc.hc.evaluate(i, j, LoopContext::INT) || !fc.hc.evaluate(p, q, LoopContext::INT_ENC) {
            return INF;
        }
        if (u1 > 0 && fc.hc.up_int(i + 1) < u1) || (u2 > 0 && fc.hc.up_int(q + 1) < u2) {
            return INF;
        }
        let mut e = 0;
        for row in fc.rows() {
            let pt = row.pair_type(&fc.model, i, j);
            let pt2 = row.pair_type(&fc.model, q, p);
            let x = self.params.interior(
                row.nucleotides(i + 1, p - 1),
                row.nucleotides(q + 1, j - 1),
                pt, pt2,
                base(row.s3[i]), base(row.s5[j]), base(row.s5[p]), base(row.s3[q]));
            if x >= INF {
                return INF;
            }
            e += x;
        }
        e + self.fixed(i, j, p, q, Decomposition::Interior)
    }

    pub fn interior(&self, i: usize, j: usize, p: usize, q: usize) -> i32 {
        self.with_callback(self.interior_energy(i, j, p, q), i, j, p, q, Decomposition::Interior)
    }

    /// Closing pair (i, j) of a multi-branch loop.
    pub fn ml_closing_energy(&self, i: usize, j: usize) -> i32 {
        let fc = self.fc;
        if !fc.hc.evaluate(i, j, LoopContext::ML)
            || !self.same_strand(i, i + 1)
            || !self.same_strand(j - 1, j)
        {
            return INF;
        }
        let mut e = self.params.ml_closing * self.n_seq();
        for row in fc.rows() {
            let pt = row.pair_type(&fc.model, j, i);
            e += self.params.multi_stem(pt, row.s5[j], row.s3[i]);
        }
        e + self.fixed(i, j, i, j, Decomposition::Multi)
    }

    pub fn ml_closing(&self, i: usize, j: usize) -> i32 {
        self.with_callback(self.ml_closing_energy(i, j), i, j, i, j, Decomposition::Multi)
    }

    /// Branch (i, j) inside a multi-branch loop.
    pub fn ml_stem_energy(&self, i: usize, j: usize) -> i32 {
        let fc = self.fc;
        if !fc.hc.evaluate(i, j, LoopContext::ML_ENC) {
            return INF;
        }
        let mut e = 0;
        for row in fc.rows() {
            let pt = row.pair_type(&fc.model, i, j);
            e += self.params.multi_stem(pt, row.s5[i], row.s3[j]);
        }
        e + self.fixed(i, j, i, j, Decomposition::MultiStem)
    }

    pub fn ml_stem(&self, i: usize, j: usize) -> i32 {
        self.with_callback(self.ml_stem_energy(i, j), i, j, i, j, Decomposition::MultiStem)
    }

    /// A G-quadruplex as a branch of a multi-branch loop.
    pub fn ml_gquad(&self) -> i32 {
        self.params.ml_intern * self.n_seq()
    }

    /// Whether i..=j may stay unpaired inside a multi-branch loop.
    pub fn ml_unpaired_allowed(&self, i: usize, j: usize) -> bool {
        j < i || (self.fc.hc.up_ml(i) > j - i && self.same_strand(i, j))
    }

    /// The unpaired stretch i..=j inside a multi-branch loop.
    pub fn ml_unpaired_energy(&self, i: usize, j: usize) -> i32 {
        if j < i {
            return 0;
        }
        if !self.ml_unpaired_allowed(i, j) {
            return INF;
        }
        self.params.ml_base * self.n_seq() * (j - i + 1) as i32
            + self.fixed(i, j, i, j, Decomposition::MultiUnpaired)
    }

    pub fn ml_unpaired(&self, i: usize, j: usize) -> i32 {
        if j < i {
            return 0;
        }
        self.with_callback(self.ml_unpaired_energy(i, j), i, j, i, j, Decomposition::MultiUnpaired)
    }

    /// Branch (i, j) in the exterior loop of a linear molecule.
    pub fn ext_stem_energy(&self, i: usize, j: usize) -> i32 {
        let fc = self.fc;
        if !fc.hc.evaluate(i, j, LoopContext::EXT) {
            return INF;
        }
        let n = fc.len();
        let mut e = 0;
        for row in fc.rows() {
            let pt = row.pair_type(&fc.model, i, j);
            let n5 = if i > 1 && self.same_strand(i - 1, i) { row.s5[i] } else { None };
            let n3 = if j < n && self.same_strand(j, j + 1) { row.s3[j] } else { None };
            e += self.params.exterior_stem(pt, n5, n3);
        }
        e + self.fixed(i, j, i, j, Decomposition::ExteriorStem)
    }

    pub fn ext_stem(&self, i: usize, j: usize) -> i32 {
        self.with_callback(self.ext_stem_energy(i, j), i, j, i, j, Decomposition::ExteriorStem)
    }

    /// The unpaired stretch i..=j in the exterior loop.
    pub fn ext_unpaired_energy(&self, i: usize, j: usize) -> i32 {
        if j < i {
            return 0;
        }
        if self.fc.hc.up_ext(i) < j - i + 1 {
            return INF;
        }
        self.fixed(i, j, i, j, Decomposition::ExteriorUnpaired)
    }

    pub fn ext_unpaired(&self, i: usize, j: usize) -> i32 {
        if j < i {
            return 0;
        }
        self.with_callback(self.ext_unpaired_energy(i, j), i, j, i, j, Decomposition::ExteriorUnpaired)
    }

    /// Pair (i, j) of a hybrid that closes the exterior loop, i.e. the
    /// loop it closes contains the cut point.
    pub fn cut_stem_energy(&self, i: usize, j: usize) -> i32 {
        let fc = self.fc;
        if !fc.hc.evaluate(i, j, LoopContext::EXT) {
            return INF;
        }
        let mut e = 0;
        for row in fc.rows() {
            let pt = row.pair_type(&fc.model, j, i);
            let n5 = if self.same_strand(j - 1, j) { row.s5[j] } else { None };
            let n3 = if self.same_strand(i, i + 1) { row.s3[i] } else { None };
            e += self.params.exterior_stem(pt, n5, n3);
        }
        e + self.fixed(j, i, j, i, Decomposition::ExteriorStem)
    }

    pub fn cut_stem(&self, i: usize, j: usize) -> i32 {
        self.with_callback(self.cut_stem_energy(i, j), j, i, j, i, Decomposition::ExteriorStem)
    }

    /// Whether (i, j) may enclose a G-quadruplex spanning p..=q.
    pub fn gquad_interior_allowed(i: usize, j: usize, p: usize, q: usize) -> bool {
        let (l1, l2) = (p - i - 1, j - q - 1);
        l1 + l2 <= MAXLOOP && if l1 == 0 { l2 >= 3 } else { l2 >= 1 }
    }

    /// Pair (i, j) enclosing a G-quadruplex spanning p..=q.
    pub fn gquad_interior(&self, i: usize, j: usize, p: usize, q: usize) -> i32 {
        let fc = self.fc;
        if !Self::gquad_interior_allowed(i, j, p, q) || !fc.hc.evaluate(i, j, LoopContext::INT) {
            return INF;
        }
        let (l1, l2) = (p - i - 1, j - q - 1);
        if (l1 > 0 && fc.hc.up_int(i + 1) < l1) || (l2 > 0 && fc.hc.up_int(q + 1) < l2) {
            return INF;
        }
        let mut e = 0;
        for row in fc.rows() {
            let pt = row.pair_type(&fc.model, i, j);
            if self.params.model.dangles == Dangles::Double {
                e += self.params.mismatch_interior[pt as usize]
                    [base(row.s3[i]) as usize][base(row.s5[j]) as usize];
            }
            if pt.is_terminal_penalized() {
                e += self.params.terminal_au;
            }
            e += self.params.interior[l1 + l2];
        }
        e + self.fixed(i, j, p, q, Decomposition::Interior)
    }

    /// The exterior loop of a circular molecule as a hairpin closed by (p, q).
    pub fn hairpin_circ_energy(&self, p: usize, q: usize) -> i32 {
        let fc = self.fc;
        let n = fc.len();
        let u = n - q + p - 1;
        if !fc.hc.evaluate(p, q, LoopContext::HP) {
            return INF;
        }
        if (q < n && fc.hc.up_hp(q + 1) < n - q) || (p > 1 && fc.hc.up_hp(1) < p - 1) {
            return INF;
        }
        let single = !fc.sequence.is_alignment();
        if single && u < fc.model.min_loop_size {
            return INF;
        }
        let mut e = 0;
        for row in fc.rows() {
            let us = row.nucleotides(q + 1, n) + row.nucleotides(1, p - 1);
            if !single && us < 3 {
                e += SHORT_HAIRPIN;
                continue;
            }
            let pt = row.pair_type(&fc.model, q, p);
            let rotated: Option<Vec<Base>> = (single && matches!(u, 3 | 4 | 6))
                .then(|| row.s[q..=n].iter().chain(row.s[1..=p].iter()).copied().collect());
            let h = self.params.hairpin(us, pt, base(row.s3[q]), base(row.s5[p]), rotated.as_deref());
            if h >= INF {
                return INF;
            }
            e += h;
        }
        e + self.fixed(p, q, p, q, Decomposition::ExteriorHairpin)
    }

    pub fn hairpin_circ(&self, p: usize, q: usize) -> i32 {
        self.with_callback(self.hairpin_circ_energy(p, q), p, q, p, q, Decomposition::ExteriorHairpin)
    }

    /// The exterior loop of a circular molecule as an interior loop formed
    /// by (p, q) and (k, l), q < k.
    pub fn interior_circ_energy(&self, p: usize, q: usize, k: usize, l: usize) -> i32 {
        let fc = self.fc;
        let n = fc.len();
        let (n1, n2) = (k - q - 1, n - l + p - 1);
        if n1 + n2 > MAXLOOP {
            return INF;
        }
        let ctx = LoopContext::INT | LoopContext::INT_ENC;
        if !fc.hc.evaluate(p, q, ctx) || !fc.hc.evaluate(k, l, ctx) {
            return INF;
        }
        if (n1 > 0 && fc.hc.up_int(q + 1) < n1)
            || (l < n && fc.hc.up_int(l + 1) < n - l)
            || (p > 1 && fc.hc.up_int(1) < p - 1)
        {
            return INF;
        }
        let mut e = 0;
        for row in fc.rows() {
            let pt = row.pair_type(&fc.model, q, p);
            let pt2 = row.pair_type(&fc.model, l, k);
            let x = self.params.interior(
                row.nucleotides(q + 1, k - 1),
                row.nucleotides(l + 1, n) + row.nucleotides(1, p - 1),
                pt, pt2,
                base(row.s3[q]), base(row.s5[p]), base(row.s5[k]), base(row.s3[l]));
            if x >= INF {
                return INF;
            }
            e += x;
        }
        e + self.fixed(p, q, k, l, Decomposition::ExteriorInterior)
    }

    pub fn interior_circ(&self, p: usize, q: usize, k: usize, l: usize) -> i32 {
        self.with_callback(self.interior_circ_energy(p, q, k, l), p, q, k, l, Decomposition::ExteriorInterior)
    }

    /// The exterior loop of a circular molecule as a multi-branch loop.
    pub fn ml_closing_circ_energy(&self) -> i32 {
        let n = self.fc.len();
        self.params.ml_closing * self.n_seq() + self.fixed(1, n, 1, n, Decomposition::ExteriorMulti)
    }

    pub fn ml_closing_circ(&self) -> i32 {
        let n = self.fc.len();
        self.with_callback(self.ml_closing_circ_energy(), 1, n, 1, n, Decomposition::ExteriorMulti)
    }

    /// Type of pair (i, j) in the single sequence or the consensus.
    pub fn pair_type(&self, i: usize, j: usize) -> PairTypeRNA {
        let s = self.fc.sequence.encoding();
        self.fc.model.pair_type(s[i], s[j]).unwrap_or(PairTypeRNA::NN)
    }
}
