//! The distance class recursions, generic over the algebra.
//!
//! The grammar is the one of the unrestricted partition function: `qb`
//! (paired), `qm1` (one multi-loop branch starting at i), `qm` (at least
//! one branch) and `q` (exterior loop). Each entry holds one value per
//! class (k, l). The distances of a decomposition are the sums of the
//! distances of its parts, plus the reference pairs of the interval that
//! none of the parts covers, plus ±1 for a new pair that is absent from /
//! present in a reference.

use log::debug;
use itertools::Itertools;

use ff_energy::MAXLOOP;
use ff_fold::CircularTerms;
use ff_fold::ExteriorLoop;
use ff_fold::FoldCompound;

use crate::Algebra;
use crate::Bounds;
use crate::DistanceClasses;
use crate::ReferencePairs;
use crate::Scorer;

/// Distance class arrays of a compound. Interval arrays use the `ij`
/// index of the compound.
#[derive(Debug, Clone)]
pub struct TwoDMatrices<A: Algebra> {
    pub n: usize,
    pub bounds: Bounds,
    /// Offset of (1, n).
    pub root: usize,
    pub qb: Vec<DistanceClasses<A>>,
    pub qm: Vec<DistanceClasses<A>>,
    pub qm1: Vec<DistanceClasses<A>>,
    /// Exterior loop intervals (linear molecules).
    pub q: Vec<DistanceClasses<A>>,
    /// Multi-loop suffixes k..=n with at least two branches (circular).
    pub qm2: Vec<DistanceClasses<A>>,
    /// Exterior loop of a circular molecule by closing loop type.
    pub circ: Option<CircularTerms<DistanceClasses<A>>>,
}

impl<A: Algebra> TwoDMatrices<A> {
    /// The classes of the whole molecule.
    pub fn total(&self) -> &DistanceClasses<A> {
        self.exterior(ExteriorLoop::Total)
    }

    /// The classes of the whole molecule whose exterior loop is of the
    /// given type. A linear molecule has only the `Total` classes.
    pub fn exterior(&self, which: ExteriorLoop) -> &DistanceClasses<A> {
        match &self.circ {
            Some(c) => &c[which],
            None => &self.q[self.root],
        }
    }

    /// Number of stored class values over all arrays.
    pub fn stored(&self) -> usize {
        [&self.qb, &self.qm, &self.qm1, &self.q, &self.qm2].iter()
            .flat_map(|v| v.iter())
            .map(|c| c.stored())
            .sum()
    }
}

pub(crate) struct TwoDFill<'a, S: Scorer> {
    pub fc: &'a FoldCompound,
    pub s: S,
    pub refs: &'a ReferencePairs,
    pub bounds: Bounds,
    pub m: TwoDMatrices<S::A>,
}

impl<'a, S: Scorer> TwoDFill<'a, S> {
    pub fn new(fc: &'a FoldCompound, s: S, refs: &'a ReferencePairs, bounds: Bounds) -> Self {
        let n = fc.len();
        let size = fc.index().size();
        let circular = fc.is_circular();
        let m = TwoDMatrices {
            n,
            bounds,
            root: fc.index().ij(1, n),
            qb: vec![DistanceClasses::new(); size],
            qm: vec![DistanceClasses::new(); size],
            qm1: vec![DistanceClasses::new(); size],
            q: if circular { Vec::new() } else { vec![DistanceClasses::new(); size] },
            qm2: if circular { vec![DistanceClasses::new(); n + 2] } else { Vec::new() },
            circ: None,
        };
        TwoDFill { fc, s, refs, bounds, m }
    }

    #[inline]
    fn ij(&self, i: usize, j: usize) -> usize {
        self.fc.index().ij(i, j)
    }

    pub fn run(mut self) -> TwoDMatrices<S::A> {
        let n = self.m.n;
        for i in (1..=n).rev() {
            for j in i..=n {
                self.cell(i, j);
            }
        }
        if self.fc.is_circular() {
            self.circular();
        }
        debug!("Distance classes: n = {}, {} stored values", n, self.m.stored());
        self.m
    }

    fn cell(&mut self, i: usize, j: usize) {
        let ij = self.ij(i, j);
        let qb = if j > i { self.paired(i, j) } else { DistanceClasses::new() };
        self.m.qb[ij] = qb;
        let qm1 = self.qm1(i, j);
        self.m.qm1[ij] = qm1;
        let qm = self.qm(i, j);
        self.m.qm[ij] = qm;
        if !self.fc.is_circular() {
            let q = self.exterior(i, j);
            self.m.q[ij] = q;
        }
    }

    fn paired(&self, i: usize, j: usize) -> DistanceClasses<S::A> {
        let s = &self.s;
        let b = self.bounds;
        let m = &self.m;
        let mut out = DistanceClasses::new();
        let pair = s.pair(i, j);
        if S::A::is_zero(pair) {
            return out;
        }

        let (dk, dl) = self.refs.pair_shift(i, j, &[]);
        let hp = S::A::times(s.hairpin(i, j), pair);
        if let (Ok(k), Ok(l)) = (usize::try_from(dk), usize::try_from(dl)) {
            out.add(k, l, hp, b);
        }

        for p in i + 1..j.min(i + MAXLOOP + 2) {
            let u1 = p - i - 1;
            let min_q = (p + 1).max(j.saturating_sub(MAXLOOP - u1 + 1));
            for q in min_q..j {
                let inner = &m.qb[self.ij(p, q)];
                if inner.is_empty() {
                    continue;
                }
                let (dk, dl) = self.refs.pair_shift(i, j, &[(p, q)]);
                out.accumulate(inner, dk, dl, S::A::times(s.interior(i, j, p, q), pair), b);
            }
        }

        let closing = s.ml_closing(i, j);
        if !S::A::is_zero(closing) {
            let w = S::A::times(closing, pair);
            for u in i + 2..j {
                let (dk, dl) = self.refs.pair_shift(i, j, &[(i + 1, u - 1), (u, j - 1)]);
                out.accumulate_product(&m.qm[self.ij(i + 1, u - 1)], &m.qm1[self.ij(u, j - 1)], dk, dl, w, b);
            }
        }
        out
    }

    fn qm1(&self, i: usize, j: usize) -> DistanceClasses<S::A> {
        let b = self.bounds;
        let mut out = DistanceClasses::new();
        out.accumulate(&self.m.qb[self.ij(i, j)], 0, 0, self.s.ml_stem(i, j), b);
        if j > i {
            let (dk, dl) = self.refs.shift(i, j, &[(i, j - 1)]);
            out.accumulate(&self.m.qm1[self.ij(i, j - 1)], dk, dl, self.s.ml_unpaired(j, j), b);
        }
        out
    }

    fn qm(&self, i: usize, j: usize) -> DistanceClasses<S::A> {
        let b = self.bounds;
        let m = &self.m;
        let mut out = DistanceClasses::new();
        for u in i..=j {
            let tail = &m.qm1[self.ij(u, j)];
            if tail.is_empty() {
                continue;
            }
            if u == i {
                out.accumulate(tail, 0, 0, S::A::ONE, b);
                continue;
            }
            let (dk, dl) = self.refs.shift(i, j, &[(u, j)]);
            out.accumulate(tail, dk, dl, self.s.ml_unpaired(i, u - 1), b);
            let (dk, dl) = self.refs.shift(i, j, &[(i, u - 1), (u, j)]);
            out.accumulate_product(&m.qm[self.ij(i, u - 1)], tail, dk, dl, S::A::ONE, b);
        }
        out
    }

    fn exterior(&self, i: usize, j: usize) -> DistanceClasses<S::A> {
        let s = &self.s;
        let b = self.bounds;
        let m = &self.m;
        if j == i {
            let (dk, dl) = self.refs.shift(i, i, &[]);
            return DistanceClasses::single(dk as usize, dl as usize, s.ext_unpaired(i, i), b);
        }
        let mut out = DistanceClasses::new();
        let (dk, dl) = self.refs.shift(i, j, &[(i, j - 1)]);
        out.accumulate(&m.q[self.ij(i, j - 1)], dk, dl, s.ext_unpaired(j, j), b);
        for k in i..j {
            let branch = &m.qb[self.ij(k, j)];
            if branch.is_empty() {
                continue;
            }
            let stem = s.ext_stem(k, j);
            if k == i {
                out.accumulate(branch, 0, 0, stem, b);
            } else {
                let (dk, dl) = self.refs.shift(i, j, &[(i, k - 1), (k, j)]);
                out.accumulate_product(&m.q[self.ij(i, k - 1)], branch, dk, dl, stem, b);
            }
        }
        out
    }

    fn circular(&mut self) {
        let n = self.m.n;
        let b = self.bounds;
        for k in 1..=n {
            let mut out = DistanceClasses::new();
            for u in k..n {
                let (dk, dl) = self.refs.shift(k, n, &[(k, u), (u + 1, n)]);
                out.accumulate_product(&self.m.qm1[self.ij(k, u)], &self.m.qm1[self.ij(u + 1, n)], dk, dl, S::A::ONE, b);
            }
            self.m.qm2[k] = out;
        }

        let s = &self.s;
        let m = &self.m;
        let mut hairpin = DistanceClasses::new();
        let mut interior = DistanceClasses::new();
        for (p, q) in (1..=n).tuple_combinations() {
            let qb = &m.qb[self.ij(p, q)];
            if qb.is_empty() {
                continue;
            }
            let (dk, dl) = self.refs.shift(1, n, &[(p, q)]);
            hairpin.accumulate(qb, dk, dl, s.hairpin_circ(p, q), b);
            if p - 1 > MAXLOOP {
                continue;
            }
            for k in q + 1..=n.min(q + 1 + MAXLOOP) {
                let n1 = k - q - 1;
                if n1 + p - 1 > MAXLOOP {
                    break;
                }
                let min_l = (k + 1).max((n + p + n1).saturating_sub(MAXLOOP + 1));
                for l in min_l..=n {
                    let qb2 = &m.qb[self.ij(k, l)];
                    if qb2.is_empty() {
                        continue;
                    }
                    let (dk, dl) = self.refs.shift(1, n, &[(p, q), (k, l)]);
                    interior.accumulate_product(qb, qb2, dk, dl, s.interior_circ(p, q, k, l), b);
                }
            }
        }

        let mut multi = DistanceClasses::new();
        let closing = s.ml_closing_circ();
        for k in 1..n {
            let (dk, dl) = self.refs.shift(1, n, &[(1, k), (k + 1, n)]);
            multi.accumulate_product(&m.qm[self.ij(1, k)], &m.qm2[k + 1], dk, dl, closing, b);
        }

        let (rk, rl) = self.refs.shift(1, n, &[]);
        let mut total = DistanceClasses::single(rk as usize, rl as usize, s.ext_unpaired(1, n), b);
        for part in [&hairpin, &interior, &multi] {
            total.accumulate(part, 0, 0, S::A::ONE, b);
        }
        self.m.circ = Some(CircularTerms([total, hairpin, interior, multi]));
    }
}
