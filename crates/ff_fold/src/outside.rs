//! Outside pass: base-pair and G-quadruplex probabilities.
//!
//! The outside value of an entry is the derivative of the total partition
//! function with respect to that entry. Cells are visited in the exact
//! reverse of the inside fill, so every entry has received all of its
//! contributions before it propagates its own.

use log::debug;

use ff_energy::BoltzmannParams;
use ff_energy::MAXLOOP;

use crate::FoldCompound;
use crate::LoopEnergies;
use crate::LoopWeights;
use crate::PfMatrices;
use crate::FoldError;
use crate::matrices::alloc_array;

struct Outside<'a> {
    fc: &'a FoldCompound,
    lw: LoopWeights<'a>,
    m: &'a PfMatrices,
    n: usize,
    q_out: Vec<f64>,
    qb_out: Vec<f64>,
    qm_out: Vec<f64>,
    qm1_out: Vec<f64>,
    g_out: Vec<f64>,
}

impl Outside<'_> {
    #[inline]
    fn idx(&self, i: usize, j: usize) -> Option<usize> {
        (i >= 1 && i <= j && j <= self.n).then(|| self.fc.index.ij(i, j))
    }

    #[inline]
    fn get(&self, v: &Option<Vec<f64>>, i: usize, j: usize) -> f64 {
        match (v, self.idx(i, j)) {
            (Some(v), Some(ij)) => v[ij],
            _ => 0.0,
        }
    }

    #[inline]
    fn q(&self, i: usize, j: usize) -> f64 {
        if j < i { 1.0 } else { self.get(&self.m.q, i, j) }
    }

    fn qb(&self, i: usize, j: usize) -> f64 { self.get(&self.m.qb, i, j) }
    fn qm(&self, i: usize, j: usize) -> f64 { self.get(&self.m.qm, i, j) }
    fn qm1(&self, i: usize, j: usize) -> f64 { self.get(&self.m.qm1, i, j) }
    fn g(&self, i: usize, j: usize) -> f64 { self.get(&self.m.g, i, j) }

    #[inline]
    fn add(v: &mut [f64], ij: Option<usize>, x: f64) {
        if let Some(ij) = ij {
            v[ij] += x;
        }
    }

    fn seed(&mut self) -> Result<(), FoldError> {
        let n = self.n;
        if !self.fc.model.circ {
            let root = self.idx(1, n);
            Self::add(&mut self.q_out, root, 1.0);
            return Ok(());
        }
        let lw = self.lw;
        for p in 1..n {
            for q in p + 1..=n {
                let qb = self.qb(p, q);
                if qb == 0.0 {
                    continue;
                }
                let pq = self.idx(p, q);
                Self::add(&mut self.qb_out, pq, lw.hairpin_circ(p, q));
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
                        let qb2 = self.qb(k, l);
                        if qb2 == 0.0 {
                            continue;
                        }
                        let w = lw.interior_circ(p, q, k, l);
                        Self::add(&mut self.qb_out, pq, qb2 * w);
                        let kl = self.idx(k, l);
                        Self::add(&mut self.qb_out, kl, qb * w);
                    }
                }
            }
        }
        let m = self.m;
        let qm2 = m.qm2()?;
        let closing = lw.ml_closing_circ();
        for k in 1..n {
            let qm = self.qm(1, k);
            let qm2_out = qm * closing;
            let one_k = self.idx(1, k);
            Self::add(&mut self.qm_out, one_k, qm2[k + 1] * closing);
            if qm2_out == 0.0 {
                continue;
            }
            for u in k + 1..n {
                let left = self.idx(k + 1, u);
                let right = self.idx(u + 1, n);
                let (wl, wr) = (self.qm1(u + 1, n), self.qm1(k + 1, u));
                Self::add(&mut self.qm1_out, left, qm2_out * wl);
                Self::add(&mut self.qm1_out, right, qm2_out * wr);
            }
        }
        Ok(())
    }

    fn cell(&mut self, i: usize, j: usize) {
        let ij = self.fc.index.ij(i, j);
        let lw = self.lw;

        let oq = self.q_out[ij];
        if oq != 0.0 {
            let prev = self.idx(i, j - 1);
            Self::add(&mut self.q_out, prev, oq * lw.ext_unpaired(j, j));
            for k in i..=j {
                let left = self.q(i, k - 1);
                let stem = lw.ext_stem(k, j);
                let branch = self.qb(k, j) * stem + self.g(k, j);
                if k > i {
                    let ik = self.idx(i, k - 1);
                    Self::add(&mut self.q_out, ik, oq * branch);
                }
                let kj = self.idx(k, j);
                Self::add(&mut self.qb_out, kj, oq * left * stem);
                Self::add(&mut self.g_out, kj, oq * left);
            }
        }

        let om = self.qm_out[ij];
        if om != 0.0 {
            for u in i..=j {
                let uj = self.idx(u, j);
                if u == i {
                    Self::add(&mut self.qm1_out, uj, om);
                    continue;
                }
                let mut prefix = 0.0;
                if self.fc.same_strand(i, u) {
                    prefix += lw.ml_unpaired(i, u - 1);
                }
                if self.fc.same_strand(u - 1, u) {
                    prefix += self.qm(i, u - 1);
                    let iu = self.idx(i, u - 1);
                    let tail = self.qm1(u, j);
                    Self::add(&mut self.qm_out, iu, om * tail);
                }
                Self::add(&mut self.qm1_out, uj, om * prefix);
            }
        }

        let o1 = self.qm1_out[ij];
        if o1 != 0.0 {
            self.qb_out[ij] += o1 * lw.ml_stem(i, j);
            self.g_out[ij] += o1 * lw.ml_gquad();
            if j > i && self.fc.same_strand(j - 1, j) {
                let prev = self.idx(i, j - 1);
                Self::add(&mut self.qm1_out, prev, o1 * lw.ml_unpaired(j, j));
            }
        }

        let ob = self.qb_out[ij];
        if ob != 0.0 && self.qb(i, j) > 0.0 {
            self.paired(i, j, ob * lw.pair(i, j));
        }
    }

    /// Propagate the outside value `o` (times the pair weight) of qb[i, j]
    /// to the entries enclosed by the pair.
    fn paired(&mut self, i: usize, j: usize, o: f64) {
        let lw = self.lw;
        for p in i + 1..j.min(i + MAXLOOP + 2) {
            let u1 = p - i - 1;
            let min_q = (p + 1).max(j.saturating_sub(MAXLOOP - u1 + 1));
            for q in min_q..j {
                if self.qb(p, q) > 0.0 {
                    let pq = self.idx(p, q);
                    Self::add(&mut self.qb_out, pq, o * lw.interior(i, j, p, q));
                }
            }
        }

        let closing = lw.ml_closing(i, j);
        if closing > 0.0 {
            for u in i + 2..j {
                if !self.fc.same_strand(u - 1, u) {
                    continue;
                }
                let left = self.idx(i + 1, u - 1);
                let right = self.idx(u, j - 1);
                let (wl, wr) = (self.qm1(u, j - 1), self.qm(i + 1, u - 1));
                Self::add(&mut self.qm_out, left, o * closing * wl);
                Self::add(&mut self.qm1_out, right, o * closing * wr);
            }
        }

        if self.m.g.is_some() {
            for p in i + 1..j.min(i + MAXLOOP + 2) {
                for q in p + 1..j {
                    if self.g(p, q) > 0.0 && LoopEnergies::gquad_interior_allowed(i, j, p, q) {
                        let pq = self.idx(p, q);
                        Self::add(&mut self.g_out, pq, o * lw.gquad_interior(i, j, p, q));
                    }
                }
            }
        }

        if let Some(cut) = self.fc.cut {
            if i < cut && cut <= j {
                let w = o * lw.cut_stem(i, j);
                let left = self.idx(i + 1, cut - 1);
                let right = self.idx(cut, j - 1);
                let (wl, wr) = (self.q(cut, j - 1), self.q(i + 1, cut - 1));
                Self::add(&mut self.q_out, left, w * wl);
                Self::add(&mut self.q_out, right, w * wr);
            }
        }
    }
}

/// Run the outside pass and store `probs` (and `g_probs`) in `m`.
pub(crate) fn pf_outside(fc: &FoldCompound, bp: &BoltzmannParams, m: &mut PfMatrices) -> Result<(), FoldError> {
    let n = fc.len();
    let z = m.total;
    if !z.is_finite() || z <= 0.0 {
        return Err(FoldError::NoValidEnsemble(z));
    }
    let size = fc.index.size();
    let scale = m.scale.clone();
    let ml_base = m.exp_ml_base.clone();
    let mut out = Outside {
        fc,
        lw: LoopWeights::new(fc, bp, &scale).with_ml_base(&ml_base),
        m,
        n,
        q_out: alloc_array("q_out", size, 0.0)?,
        qb_out: alloc_array("qb_out", size, 0.0)?,
        qm_out: alloc_array("qm_out", size, 0.0)?,
        qm1_out: alloc_array("qm1_out", size, 0.0)?,
        g_out: alloc_array("g_out", size, 0.0)?,
    };
    out.seed()?;
    for i in 1..=n {
        for j in (i..=n).rev() {
            out.cell(i, j);
        }
    }

    let mut probs = alloc_array("probs", size, 0.0)?;
    let mut g_probs = m.g_probs.as_ref().map(|_| alloc_array("g_probs", size, 0.0)).transpose()?;
    for i in 1..=n {
        for j in i..=n {
            let ij = fc.index.ij(i, j);
            probs[ij] = out.qb(i, j) * out.qb_out[ij] / z;
            if let Some(gp) = g_probs.as_mut() {
                gp[ij] = out.g(i, j) * out.g_out[ij] / z;
            }
        }
    }
    debug!("Outside pass done: n = {}", n);
    m.probs = Some(probs);
    m.g_probs = g_probs;
    Ok(())
}

impl FoldCompound {
    /// Base-pair probabilities of the last [`FoldCompound::pf`], indexed
    /// by `index().ij(i, j)`.
    pub fn bpp(&self) -> Result<&[f64], FoldError> {
        self.pf_matrices.as_ref()
            .ok_or(FoldError::NotAllocated("probs"))?
            .probs()
    }

    /// Probability of the pair (i, j), i < j.
    pub fn pair_probability(&self, i: usize, j: usize) -> Result<f64, FoldError> {
        let probs = self.bpp()?;
        if i == 0 || j <= i || j > self.len() {
            return Ok(0.0);
        }
        Ok(probs[self.index.ij(i, j)])
    }

    /// Probability that a G-quadruplex spans exactly i..=j.
    pub fn gquad_probability(&self, i: usize, j: usize) -> Result<f64, FoldError> {
        let g_probs = self.pf_matrices.as_ref()
            .ok_or(FoldError::NotAllocated("g_probs"))?
            .g_probs()?;
        if i == 0 || j < i || j > self.len() {
            return Ok(0.0);
        }
        Ok(g_probs[self.index.ij(i, j)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_energy::ModelDetails;
    use ff_energy::Dangles;
    use crate::FoldOptions;

    fn probabilities(seq: &str, md: &ModelDetails) -> FoldCompound {
        let mut fc = FoldCompound::build(seq, md, FoldOptions::default()).unwrap();
        fc.pf().unwrap();
        fc
    }

    fn unpaired_sum(fc: &FoldCompound, k: usize) -> f64 {
        (1..=fc.len())
            .filter(|&l| l != k)
            .map(|l| fc.pair_probability(k.min(l), k.max(l)).unwrap())
            .sum()
    }

    #[test]
    fn test_stem_probabilities() {
        let md = ModelDetails::default().with_dangles(Dangles::None);
        let fc = probabilities("GGGGAAAACCCC", &md);
        let p = fc.pair_probability(1, 12).unwrap();
        assert!(p > 0.5 && p <= 1.0);
        // Inner pairs are at least as likely as the pairs they are stacked on.
        assert!(fc.pair_probability(2, 11).unwrap() >= p - 1e-9);
        assert_eq!(fc.pair_probability(5, 6).unwrap(), 0.0);
        for k in 1..=12 {
            assert!(unpaired_sum(&fc, k) <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_probabilities_bounded() {
        let md = ModelDetails::default();
        let fc = probabilities("GCGCUUCGGCGCAAAGCGCAAGCGCAUAUGCAUGCAUCGUAGCUAGCU", &md);
        let probs = fc.bpp().unwrap();
        assert!(probs.iter().all(|&p| (0.0..=1.0 + 1e-9).contains(&p)));
        for k in 1..=fc.len() {
            assert!(unpaired_sum(&fc, k) <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_circular_probabilities() {
        let md = ModelDetails::default().with_circ(true);
        let fc = probabilities("GGGGAAAACCCCAAAAGGGGAAAACCCCAAAA", &md);
        assert!(fc.pair_probability(1, 12).unwrap() > 0.0);
        for k in 1..=fc.len() {
            assert!(unpaired_sum(&fc, k) <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_gquad_probability() {
        let md = ModelDetails::default().with_gquad(true);
        let fc = probabilities("GGGAGGGAGGGAGGG", &md);
        let p = fc.gquad_probability(1, 15).unwrap();
        assert!(p > 0.5 && p <= 1.0 + 1e-9);
        // Position 3 starts a run of a single G.
        assert_eq!(fc.gquad_probability(3, 15).unwrap(), 0.0);
    }

    #[test]
    fn test_pf_without_probs() {
        let md = ModelDetails::default();
        let mut fc = FoldCompound::build("GGGAAACCC", &md, FoldOptions::PF).unwrap();
        fc.pf_without_probs().unwrap();
        assert!(matches!(fc.bpp(), Err(FoldError::NotAllocated("probs"))));
    }
}
