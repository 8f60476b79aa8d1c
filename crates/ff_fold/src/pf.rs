//! Partition function (inside) recursions.
//!
//! Every array entry carries `scale[L]` for the L nucleotides its interval
//! covers, so that sub-sums of different lengths combine without any
//! further correction and `Q_unscaled = Q / scale[n]`.

use log::debug;
use log::info;
use log::warn;
use colored::*;

use ff_energy::BoltzmannParams;
use ff_energy::INF;
use ff_energy::MAXLOOP;

use crate::FoldCompound;
use crate::LoopWeights;
use crate::PfMatrices;
use crate::ExteriorLoop;
use crate::FoldError;
use crate::gquad::gquad_pf_matrix;
use crate::mfe::mfe_fill;

struct PfFill<'a> {
    fc: &'a FoldCompound,
    lw: LoopWeights<'a>,
    n: usize,
    q: Vec<f64>,
    qb: Vec<f64>,
    qm: Vec<f64>,
    qm1: Vec<f64>,
    g: Option<Vec<f64>>,
}

impl PfFill<'_> {
    #[inline]
    fn get(&self, v: &[f64], i: usize, j: usize) -> f64 {
        if i == 0 || j < i || j > self.n { 0.0 } else { v[self.fc.index.ij(i, j)] }
    }

    /// q[i, j], or 1 for the empty interval.
    #[inline]
    fn q(&self, i: usize, j: usize) -> f64 {
        if j < i { 1.0 } else { self.get(&self.q, i, j) }
    }

    #[inline]
    fn qb(&self, i: usize, j: usize) -> f64 { self.get(&self.qb, i, j) }

    #[inline]
    fn qm(&self, i: usize, j: usize) -> f64 { self.get(&self.qm, i, j) }

    #[inline]
    fn qm1(&self, i: usize, j: usize) -> f64 { self.get(&self.qm1, i, j) }

    #[inline]
    fn g(&self, i: usize, j: usize) -> f64 {
        self.g.as_ref().map_or(0.0, |g| self.get(g, i, j))
    }

    fn cell(&mut self, i: usize, j: usize) {
        let ij = self.fc.index.ij(i, j);
        let lw = &self.lw;
        let qb = if j > i { self.paired(i, j) } else { 0.0 };
        self.qb[ij] = qb;

        let mut qm1 = qb * lw.ml_stem(i, j) + self.g(i, j) * lw.ml_gquad();
        if j > i && self.fc.same_strand(j - 1, j) {
            qm1 += self.qm1(i, j - 1) * lw.ml_unpaired(j, j);
        }
        self.qm1[ij] = qm1;

        let mut qm = 0.0;
        for u in i..=j {
            let tail = self.qm1(u, j);
            if tail == 0.0 {
                continue;
            }
            qm += self.ml_prefix(i, u) * tail;
        }
        self.qm[ij] = qm;

        let mut q = self.q(i, j - 1) * lw.ext_unpaired(j, j);
        for k in i..=j {
            let branch = self.qb(k, j) * lw.ext_stem(k, j) + self.g(k, j);
            if branch > 0.0 {
                q += self.q(i, k - 1) * branch;
            }
        }
        self.q[ij] = q;
    }

    /// Weight of what precedes the first branch at u in qm[i, ..].
    fn ml_prefix(&self, i: usize, u: usize) -> f64 {
        if u == i {
            return 1.0;
        }
        let mut w = 0.0;
        if self.fc.same_strand(i, u) {
            w += self.lw.ml_unpaired(i, u - 1);
        }
        if self.fc.same_strand(u - 1, u) {
            w += self.qm(i, u - 1);
        }
        w
    }

    fn paired(&self, i: usize, j: usize) -> f64 {
        let lw = &self.lw;
        let pair = lw.pair(i, j);
        if pair == 0.0 {
            return 0.0;
        }
        let mut w = lw.hairpin(i, j);

        for p in i + 1..j.min(i + MAXLOOP + 2) {
            let u1 = p - i - 1;
            let min_q = (p + 1).max(j.saturating_sub(MAXLOOP - u1 + 1));
            for q in min_q..j {
                let inner = self.qb(p, q);
                if inner > 0.0 {
                    w += lw.interior(i, j, p, q) * inner;
                }
            }
        }

        let closing = lw.ml_closing(i, j);
        if closing > 0.0 {
            let mut branches = 0.0;
            for u in i + 2..j {
                if self.fc.same_strand(u - 1, u) {
                    branches += self.qm(i + 1, u - 1) * self.qm1(u, j - 1);
                }
            }
            w += closing * branches;
        }

        if self.g.is_some() {
            for p in i + 1..j.min(i + MAXLOOP + 2) {
                for q in p + 1..j {
                    let g = self.g(p, q);
                    if g > 0.0 && crate::LoopEnergies::gquad_interior_allowed(i, j, p, q) {
                        w += lw.gquad_interior(i, j, p, q) * g;
                    }
                }
            }
        }

        if let Some(cut) = self.fc.cut {
            if i < cut && cut <= j {
                w += lw.cut_stem(i, j) * self.q(i + 1, cut - 1) * self.q(cut, j - 1);
            }
        }
        pair * w
    }

    fn qm2(&self, qm2: &mut [f64]) {
        let n = self.n;
        for k in 1..=n {
            qm2[k] = (k..n).map(|u| self.qm1(k, u) * self.qm1(u + 1, n)).sum();
        }
    }

    fn circular(&self, qm2: &[f64], m: &mut PfMatrices) {
        let lw = &self.lw;
        let n = self.n;
        let mut qho = 0.0;
        let mut qio = 0.0;
        for p in 1..n {
            for q in p + 1..=n {
                let qb = self.qb(p, q);
                if qb == 0.0 {
                    continue;
                }
                qho += qb * lw.hairpin_circ(p, q);
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
                        if qb2 > 0.0 {
                            qio += qb * qb2 * lw.interior_circ(p, q, k, l);
                        }
                    }
                }
            }
        }
        let closing = lw.ml_closing_circ();
        let qmo: f64 = (1..n).map(|k| self.qm(1, k) * qm2[k + 1]).sum::<f64>() * closing;
        let qo = lw.ext_unpaired(1, n);
        m.circ[ExteriorLoop::Hairpin] = qho;
        m.circ[ExteriorLoop::Interior] = qio;
        m.circ[ExteriorLoop::Multi] = qmo;
        m.circ[ExteriorLoop::Total] = qo + qho + qio + qmo;
    }
}

/// Fill the partition function arrays of a compound. Returns the matrices
/// with `total` set to the scaled partition function.
pub(crate) fn pf_fill(fc: &FoldCompound, bp: &BoltzmannParams, with_probs: bool) -> Result<PfMatrices, FoldError> {
    let n = fc.len();
    let mut m = PfMatrices::allocate(n, fc.pf_mask(with_probs))?;
    m.set_scaling(bp, fc.n_seq());
    let scale = m.scale.clone();
    let ml_base = m.exp_ml_base.clone();
    let mut fill = PfFill {
        fc,
        lw: LoopWeights::new(fc, bp, &scale).with_ml_base(&ml_base),
        n,
        q: m.q.take().ok_or(FoldError::NotAllocated("q"))?,
        qb: m.qb.take().ok_or(FoldError::NotAllocated("qb"))?,
        qm: m.qm.take().ok_or(FoldError::NotAllocated("qm"))?,
        qm1: m.qm1.take().ok_or(FoldError::NotAllocated("qm1"))?,
        g: m.g.take(),
    };
    if let Some(g) = fill.g.as_mut() {
        gquad_pf_matrix(fc, bp, &scale, g);
    }

    for i in (1..=n).rev() {
        for j in i..=n {
            fill.cell(i, j);
        }
    }

    m.total = if fc.model.circ {
        let mut qm2 = m.qm2.take().ok_or(FoldError::NotAllocated("qm2"))?;
        fill.qm2(&mut qm2);
        fill.circular(&qm2, &mut m);
        m.qm2 = Some(qm2);
        m.circ[ExteriorLoop::Total]
    } else {
        fill.q(1, n)
    };

    if let (Some(q1k), Some(qln)) = (m.q1k.as_mut(), m.qln.as_mut()) {
        q1k[0] = 1.0;
        qln[n + 1] = 1.0;
        for k in 1..=n {
            q1k[k] = fill.q(1, k);
            qln[k] = fill.q(k, n);
        }
    }
    debug!("PF fill done: n = {}, Q (scaled) = {:e}", n, m.total);

    m.q = Some(fill.q);
    m.qb = Some(fill.qb);
    m.qm = Some(fill.qm);
    m.qm1 = Some(fill.qm1);
    m.g = fill.g;
    Ok(m)
}

impl FoldCompound {
    /// Choose the partition function scaling factor: the model's
    /// `pf_scale` if given, otherwise an estimate from the minimum free
    /// energy of this compound.
    pub fn prepare_pf_scale(&mut self) -> Result<f64, FoldError> {
        let bp = self.exp_params.as_ref().ok_or(FoldError::MissingParameters("partition function"))?;
        let scale = match self.model.pf_scale {
            Some(s) => s,
            None => {
                let (_, mfe) = mfe_fill(self, &bp.energy)?;
                let per_seq = if mfe >= INF { INF } else { mfe / self.n_seq() as i32 };
                let n = self.len();
                let bp = self.exp_params.as_mut().ok_or(FoldError::MissingParameters("partition function"))?;
                return Ok(bp.estimate_pf_scale(per_seq, n));
            }
        };
        if let Some(bp) = self.exp_params.as_mut() {
            bp.pf_scale = scale;
        }
        Ok(scale)
    }

    /// Compute the partition function and base-pair probabilities. Returns
    /// the ensemble free energy in kcal/mol.
    pub fn pf(&mut self) -> Result<f64, FoldError> {
        self.partition_function(true)
    }

    /// Compute the partition function only (no outside pass).
    pub fn pf_without_probs(&mut self) -> Result<f64, FoldError> {
        self.partition_function(false)
    }

    fn partition_function(&mut self, with_probs: bool) -> Result<f64, FoldError> {
        self.prepare_pf_scale()?;
        let bp = self.exp_params.as_ref().ok_or(FoldError::MissingParameters("partition function"))?;
        let mut m = pf_fill(self, bp, with_probs)?;
        let z = m.total;
        if !z.is_finite() || z <= 0.0 {
            warn!("Partition function is {} (pf_scale {:.4})", z, bp.pf_scale);
            return Err(FoldError::NoValidEnsemble(z));
        }
        if with_probs {
            crate::outside::pf_outside(self, bp, &mut m)?;
        }
        self.pf_matrices = Some(m);
        let energy = self.ensemble_energy()?;
        info!("{} {:.4} kcal/mol", "Ensemble free energy:".green(), energy);
        Ok(energy)
    }

    /// Ensemble free energy (kcal/mol) of the last partition function.
    /// Hybrids include the duplex initiation.
    pub fn ensemble_energy(&self) -> Result<f64, FoldError> {
        let m = self.pf_matrices.as_ref().ok_or(FoldError::NotAllocated("q"))?;
        let bp = self.exp_params.as_ref().ok_or(FoldError::MissingParameters("partition function"))?;
        let mut g = bp.ensemble_energy(m.total, self.len());
        if self.cut.is_some() {
            g += bp.energy.duplex_init as f64 / 100.0;
        }
        Ok(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_energy::ModelDetails;
    use ff_energy::Dangles;
    use crate::FoldOptions;
    use crate::HardConstraints;
    use crate::LoopContext;
    use crate::AllocMask;

    fn compound(seq: &str, md: &ModelDetails) -> FoldCompound {
        FoldCompound::build(seq, md, FoldOptions::default()).unwrap()
    }

    #[test]
    fn test_small_partition_function() {
        let md = ModelDetails::default().with_dangles(Dangles::None).with_pf_scale(1.0);
        let mut fc = compound("GGGAAACCC", &md);
        let g = fc.pf_without_probs().unwrap();
        let bp = fc.exp_params().unwrap();
        let m = fc.pf_matrices().unwrap();
        let q = m.q().unwrap();
        assert!((q[fc.index().ij(1, 9)] - m.total).abs() < 1e-12);
        // Open chain plus at least the MFE structure.
        assert!(m.total > 1.0 + bp.boltzmann(-120, 1) - 1e-9);
        assert!(g < -1.2);
        assert!(m.probs.is_none());
    }

    #[test]
    fn test_scaling_invariance() {
        let seq = "GGGGAAACCGGAAACCAACCGCGCUUCGGCGCAAAGCGCAAGCGCAUAUAUAUGGGG";
        let md1 = ModelDetails::default().with_pf_scale(1.0);
        let mut fc1 = compound(seq, &md1);
        fc1.pf_without_probs().unwrap();
        let q1 = fc1.pf_matrices().unwrap().total;

        let md2 = ModelDetails::default().with_pf_scale(1.7);
        let mut fc2 = compound(seq, &md2);
        fc2.pf_without_probs().unwrap();
        let m2 = fc2.pf_matrices().unwrap();
        let unscaled = m2.total / m2.scale[seq.len()];
        assert!((unscaled - q1).abs() < 1e-9 * q1);
        assert!((fc1.ensemble_energy().unwrap() - fc2.ensemble_energy().unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_estimated_scale() {
        let md = ModelDetails::default();
        let mut fc = compound("GGGGAAAACCCCAUGCGGGAAACCCGC", &md);
        let s = fc.prepare_pf_scale().unwrap();
        assert!(s > 1.0);
        assert_eq!(fc.exp_params().unwrap().pf_scale, s);
        let g = fc.pf().unwrap();
        let mfe = fc.mfe().unwrap();
        assert!(g <= mfe.energy + 1e-9);
    }

    #[test]
    fn test_forced_unpaired_has_zero_weight() {
        let md = ModelDetails::default();
        let mut fc = compound("GGGAGAAACUCCC", &md);
        let mut hc = HardConstraints::new(13);
        hc.force_unpaired(5);
        fc.attach_constraints(Some(hc), None).unwrap();
        fc.pf().unwrap();
        let m = fc.pf_matrices().unwrap();
        let qb = m.qb().unwrap();
        let probs = m.probs().unwrap();
        for k in 1..=13 {
            if k == 5 {
                continue;
            }
            let (i, j) = if k < 5 { (k, 5) } else { (5, k) };
            assert_eq!(qb[fc.index().ij(i, j)], 0.0);
            assert_eq!(probs[fc.index().ij(i, j)], 0.0);
        }
        assert!(!fc.hard_constraints().evaluate(5, 9, LoopContext::ALL));
    }

    #[test]
    fn test_no_valid_ensemble() {
        let md = ModelDetails::default().with_pf_scale(1.0);
        let mut fc = compound("AAAAAAA", &md);
        let mut hc = HardConstraints::new(7);
        hc.force_paired(3);
        fc.attach_constraints(Some(hc), None).unwrap();
        assert!(matches!(fc.pf(), Err(FoldError::NoValidEnsemble(_))));
        assert!(fc.pf_matrices().is_none());
    }

    #[test]
    fn test_circular_and_aux() {
        let md = ModelDetails::default().with_circ(true);
        let mut fc = compound("GGGGAAAACCCCAAAAGGGGAAAACCCCAAAA", &md);
        fc.pf().unwrap();
        let m = fc.pf_matrices().unwrap();
        assert!(m.present().contains(AllocMask::CIRC | AllocMask::AUX));
        let parts = m.circ[ExteriorLoop::Hairpin] + m.circ[ExteriorLoop::Interior]
            + m.circ[ExteriorLoop::Multi];
        assert!(m.circ[ExteriorLoop::Total] > parts);
        let q1k = m.q1k().unwrap();
        assert_eq!(q1k[0], 1.0);
        assert_eq!(q1k[32], m.q().unwrap()[fc.index().ij(1, 32)]);
    }

    #[test]
    fn test_hybrid_ensemble() {
        let md = ModelDetails::default();
        let opts = FoldOptions::default() | FoldOptions::HYBRID;
        let mut fc = FoldCompound::build("GGGGAAA&UUUCCCC", &md, opts).unwrap();
        let g = fc.pf().unwrap();
        let mfe = fc.mfe().unwrap();
        assert!(g <= mfe.energy + 1e-9);
        let probs = fc.pf_matrices().unwrap().probs().unwrap();
        assert!(probs[fc.index().ij(1, 14)] > 0.5);
    }
}
