//! Boltzmann weights of the loops in [`crate::loops`].
//!
//! A weight is `exp(-E / kT)` of the loop energy (averaged over the
//! sequences of an alignment), times the soft constraint callback factor,
//! times `scale[L]` for the L nucleotides the loop covers on its own.

use ff_energy::BoltzmannParams;

use crate::FoldCompound;
use crate::LoopEnergies;
use crate::Decomposition;

#[derive(Clone, Copy)]
pub struct LoopWeights<'a> {
    pub energies: LoopEnergies<'a>,
    pub bp: &'a BoltzmannParams,
    pub scale: &'a [f64],
    /// Weights of L unpaired multi-loop nucleotides, used while no soft
    /// constraints are attached.
    pub ml_base: Option<&'a [f64]>,
}

impl<'a> LoopWeights<'a> {
    pub fn new(fc: &'a FoldCompound, bp: &'a BoltzmannParams, scale: &'a [f64]) -> Self {
        LoopWeights {
            energies: LoopEnergies::new(fc, &bp.energy),
            bp,
            scale,
            ml_base: None,
        }
    }

    pub fn with_ml_base(mut self, ml_base: &'a [f64]) -> Self {
        self.ml_base = Some(ml_base);
        self
    }

    #[inline]
    fn fc(&self) -> &'a FoldCompound {
        self.energies.fc
    }

    #[inline]
    fn factor(&self, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> f64 {
        match &self.fc().sc {
            Some(sc) if sc.has_callback() => sc.callback_factor(self.bp, i, j, k, l, d),
            _ => 1.0,
        }
    }

    #[inline]
    fn weight(&self, e: i32, i: usize, j: usize, k: usize, l: usize, d: Decomposition) -> f64 {
        let w = self.bp.boltzmann(e, self.fc().n_seq());
        if w == 0.0 { 0.0 } else { w * self.factor(i, j, k, l, d) }
    }

    pub fn pair(&self, i: usize, j: usize) -> f64 {
        self.weight(self.energies.pair_energy(i, j), i, j, i, j, Decomposition::Pair)
    }

    pub fn hairpin(&self, i: usize, j: usize) -> f64 {
        self.weight(self.energies.hairpin_energy(i, j), i, j, i, j, Decomposition::Hairpin)
            * self.scale[j - i + 1]
    }

    pub fn interior(&self, i: usize, j: usize, p: usize, q: usize) -> f64 {
        let u = (p - i - 1) + (j - q - 1);
        self.weight(self.energies.interior_energy(i, j, p, q), i, j, p, q, Decomposition::Interior)
            * self.scale[u + 2]
    }

    pub fn ml_closing(&self, i: usize, j: usize) -> f64 {
        self.weight(self.energies.ml_closing_energy(i, j), i, j, i, j, Decomposition::Multi)
            * self.scale[2]
    }

    pub fn ml_stem(&self, i: usize, j: usize) -> f64 {
        self.weight(self.energies.ml_stem_energy(i, j), i, j, i, j, Decomposition::MultiStem)
    }

    pub fn ml_gquad(&self) -> f64 {
        self.bp.boltzmann(self.energies.ml_gquad(), self.fc().n_seq())
    }

    /// The unpaired stretch i..=j inside a multi-branch loop.
    pub fn ml_unpaired(&self, i: usize, j: usize) -> f64 {
        if j < i {
            return 1.0;
        }
        let len = j - i + 1;
        match self.ml_base {
            Some(ml_base) if self.fc().sc.is_none() => {
                if self.energies.ml_unpaired_allowed(i, j) {
                    ml_base[len] * self.scale[len]
                } else {
                    0.0
                }
            }
            _ => self.weight(self.energies.ml_unpaired_energy(i, j), i, j, i, j, Decomposition::MultiUnpaired)
                * self.scale[len],
        }
    }

    pub fn ext_stem(&self, i: usize, j: usize) -> f64 {
        self.weight(self.energies.ext_stem_energy(i, j), i, j, i, j, Decomposition::ExteriorStem)
    }

    pub fn ext_unpaired(&self, i: usize, j: usize) -> f64 {
        if j < i {
            return 1.0;
        }
        self.weight(self.energies.ext_unpaired_energy(i, j), i, j, i, j, Decomposition::ExteriorUnpaired)
            * self.scale[j - i + 1]
    }

    pub fn cut_stem(&self, i: usize, j: usize) -> f64 {
        self.weight(self.energies.cut_stem_energy(i, j), j, i, j, i, Decomposition::ExteriorStem)
            * self.scale[2]
    }

    pub fn gquad_interior(&self, i: usize, j: usize, p: usize, q: usize) -> f64 {
        let u = (p - i - 1) + (j - q - 1);
        self.bp.boltzmann(self.energies.gquad_interior(i, j, p, q), 1) * self.scale[u + 2]
    }

    pub fn hairpin_circ(&self, p: usize, q: usize) -> f64 {
        let n = self.fc().len();
        let u = n - q + p - 1;
        self.weight(self.energies.hairpin_circ_energy(p, q), p, q, p, q, Decomposition::ExteriorHairpin)
            * self.scale[u]
    }

    pub fn interior_circ(&self, p: usize, q: usize, k: usize, l: usize) -> f64 {
        let n = self.fc().len();
        let u = (k - q - 1) + (n - l + p - 1);
        self.weight(self.energies.interior_circ_energy(p, q, k, l), p, q, k, l, Decomposition::ExteriorInterior)
            * self.scale[u]
    }

    pub fn ml_closing_circ(&self) -> f64 {
        let n = self.fc().len();
        self.weight(self.energies.ml_closing_circ_energy(), 1, n, 1, n, Decomposition::ExteriorMulti)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ff_energy::ModelDetails;
    use crate::FoldOptions;
    use crate::SoftConstraints;
    use crate::SoftConstraintSet;

    #[test]
    fn test_weights_match_energies() {
        let md = ModelDetails::default().with_pf_scale(1.0);
        let fc = FoldCompound::build("GGGAAACCC", &md, FoldOptions::PF).unwrap();
        let bp = fc.exp_params().unwrap();
        let scale = bp.scale_factors(fc.len());
        let lw = LoopWeights::new(&fc, bp, &scale);
        let le = LoopEnergies::new(&fc, &bp.energy);
        assert!((lw.hairpin(3, 7) - bp.boltzmann(le.hairpin(3, 7), 1)).abs() < 1e-12);
        assert!((lw.interior(1, 9, 2, 8) - bp.boltzmann(-330, 1)).abs() < 1e-12);
        assert_eq!(lw.hairpin(4, 6), 0.0);
        assert_eq!(lw.ml_unpaired(5, 4), 1.0);
        assert_eq!(lw.pair(1, 9), 1.0);
    }

    #[test]
    fn test_scaled_weights() {
        let md = ModelDetails::default().with_pf_scale(2.0);
        let fc = FoldCompound::build("GGGAAACCC", &md, FoldOptions::PF).unwrap();
        let bp = fc.exp_params().unwrap();
        let scale = bp.scale_factors(fc.len());
        let lw = LoopWeights::new(&fc, bp, &scale);
        let unscaled = bp.boltzmann(lw.energies.hairpin(3, 7), 1);
        assert!((lw.hairpin(3, 7) * 2f64.powi(5) - unscaled).abs() < 1e-12);
        assert!((lw.ext_unpaired(1, 3) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_ml_base_table() {
        let md = ModelDetails::default().with_pf_scale(1.5);
        let mut fc = FoldCompound::build("GGGAAACCCAGGGAAACCC", &md, FoldOptions::PF).unwrap();
        let bp = fc.exp_params().unwrap().clone();
        let n = fc.len();
        let scale = bp.scale_factors(n);
        let ml_base = bp.ml_base_factors(n, fc.n_seq());
        let plain = LoopWeights::new(&fc, &bp, &scale);
        let table = LoopWeights::new(&fc, &bp, &scale).with_ml_base(&ml_base);
        for (i, j) in [(2, 2), (4, 6), (1, 19), (10, 9)] {
            let (a, b) = (plain.ml_unpaired(i, j), table.ml_unpaired(i, j));
            assert!((a - b).abs() <= 1e-12 * a.max(1.0), "{} {}: {} vs {}", i, j, a, b);
        }

        // Unpaired soft constraints bypass the table.
        let mut sc = SoftConstraints::new(n);
        sc.set_unpaired(5, -100).unwrap();
        fc.attach_constraints(None, Some(SoftConstraintSet::Shared(sc))).unwrap();
        let lw = LoopWeights::new(&fc, &bp, &scale).with_ml_base(&ml_base);
        let expected = ml_base[1] * scale[1] * bp.boltzmann(-100, 1);
        assert!((lw.ml_unpaired(5, 5) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_callback_factor() {
        let md = ModelDetails::default().with_pf_scale(1.0);
        let mut fc = FoldCompound::build("GGGAAACCC", &md, FoldOptions::PF).unwrap();
        let sc = SoftConstraints::new(9)
            .with_weight_callback(Arc::new(|_, _, _, _, d| {
                if d == Decomposition::Hairpin { 0.5 } else { 1.0 }
            }));
        fc.attach_constraints(None, Some(SoftConstraintSet::Shared(sc))).unwrap();
        let bp = fc.exp_params().unwrap();
        let scale = bp.scale_factors(fc.len());
        let lw = LoopWeights::new(&fc, bp, &scale);
        let plain = bp.boltzmann(lw.energies.hairpin_energy(3, 7), 1);
        assert!((lw.hairpin(3, 7) - 0.5 * plain).abs() < 1e-12);
        assert!((lw.interior(1, 9, 2, 8) - bp.boltzmann(-330, 1)).abs() < 1e-12);
    }
}
