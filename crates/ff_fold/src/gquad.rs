//! G-quadruplex enumeration: four runs of `L` guanines separated by three
//! linkers, `4L + l1 + l2 + l3` nucleotides in total.

use ff_energy::Base;
use ff_energy::BoltzmannParams;
use ff_energy::EnergyParams;
use ff_energy::INF;
use ff_energy::GQUAD_MIN_STACK_SIZE;
use ff_energy::GQUAD_MAX_STACK_SIZE;
use ff_energy::GQUAD_MIN_LINKER_LENGTH;
use ff_energy::GQUAD_MAX_LINKER_LENGTH;
use ff_energy::GQUAD_MIN_BOX_SIZE;
use ff_energy::GQUAD_MAX_BOX_SIZE;

use crate::FoldCompound;
use crate::LoopContext;

/// A G-quadruplex layout: number of layers and the three linker lengths.
pub type GquadLayout = (usize, [usize; 3]);

#[derive(Debug, Clone)]
pub struct GquadScanner {
    /// Length of the G-run starting at each position.
    gg: Vec<usize>,
    /// blocked[i]: positions in 1..=i that must pair.
    blocked: Vec<usize>,
}

impl GquadScanner {
    pub fn new(fc: &FoldCompound) -> Self {
        let s = fc.sequence.encoding();
        let n = fc.len();
        let mut gg = vec![0; n + 2];
        for i in (1..=n).rev() {
            if s[i] == Base::G {
                gg[i] = gg[i + 1] + 1;
            }
        }
        let mut blocked = vec![0; n + 1];
        for i in 1..=n {
            let must_pair = !fc.hc.evaluate(i, i, LoopContext::UNPAIRED);
            blocked[i] = blocked[i - 1] + usize::from(must_pair);
        }
        GquadScanner { gg, blocked }
    }

    /// Whether a G-quadruplex may span exactly i..=j.
    pub fn spans(&self, i: usize, j: usize) -> bool {
        let len = j + 1 - i;
        (GQUAD_MIN_BOX_SIZE..=GQUAD_MAX_BOX_SIZE).contains(&len)
            && self.gg[i] >= GQUAD_MIN_STACK_SIZE
            && self.gg[j + 1 - GQUAD_MIN_STACK_SIZE] >= GQUAD_MIN_STACK_SIZE
            && self.blocked[j] == self.blocked[i - 1]
    }

    /// Call `f` for every layout spanning exactly i..=j.
    pub fn for_each<F: FnMut(usize, [usize; 3])>(&self, i: usize, j: usize, mut f: F) {
        if !self.spans(i, j) {
            return;
        }
        let len = j + 1 - i;
        let linkers = GQUAD_MIN_LINKER_LENGTH..=GQUAD_MAX_LINKER_LENGTH;
        for layers in GQUAD_MIN_STACK_SIZE..=GQUAD_MAX_STACK_SIZE.min(self.gg[i]) {
            if 4 * layers + 3 * GQUAD_MIN_LINKER_LENGTH > len {
                break;
            }
            let last = j + 1 - layers;
            if self.gg[last] < layers {
                continue;
            }
            let free = len - 4 * layers;
            for l1 in linkers.clone() {
                let p2 = i + layers + l1;
                if l1 + 2 > free || self.gg[p2] < layers {
                    continue;
                }
                for l2 in linkers.clone() {
                    if l1 + l2 + 1 > free {
                        break;
                    }
                    let p3 = p2 + layers + l2;
                    let l3 = free - l1 - l2;
                    if !linkers.contains(&l3) || self.gg[p3] < layers {
                        continue;
                    }
                    f(layers, [l1, l2, l3]);
                }
            }
        }
    }

    /// The minimum free energy layout spanning i..=j.
    pub fn mfe(&self, params: &EnergyParams, i: usize, j: usize) -> Option<(i32, GquadLayout)> {
        let mut best: Option<(i32, GquadLayout)> = None;
        self.for_each(i, j, |layers, l| {
            let e = params.gquad(layers, l.iter().sum());
            if e < INF && best.is_none_or(|(b, _)| e < b) {
                best = Some((e, (layers, l)));
            }
        });
        best
    }

    /// Sum of the Boltzmann weights of all layouts spanning i..=j.
    pub fn weight(&self, bp: &BoltzmannParams, i: usize, j: usize) -> f64 {
        let mut q = 0.0;
        self.for_each(i, j, |layers, l| {
            q += bp.boltzmann(bp.energy.gquad(layers, l.iter().sum()), 1);
        });
        q
    }
}

/// Minimum free energies of G-quadruplexes by `ji(i, j)`.
pub(crate) fn gquad_mfe_matrix(fc: &FoldCompound, params: &EnergyParams, out: &mut [i32]) {
    let scanner = GquadScanner::new(fc);
    let n = fc.len();
    for i in 1..=n {
        for j in i + GQUAD_MIN_BOX_SIZE - 1..=(i + GQUAD_MAX_BOX_SIZE - 1).min(n) {
            if let Some((e, _)) = scanner.mfe(params, i, j) {
                out[fc.index.ji(i, j)] = e;
            }
        }
    }
}

/// Scaled G-quadruplex partition functions by `ij(i, j)`.
pub(crate) fn gquad_pf_matrix(fc: &FoldCompound, bp: &BoltzmannParams, scale: &[f64], out: &mut [f64]) {
    let scanner = GquadScanner::new(fc);
    let n = fc.len();
    for i in 1..=n {
        for j in i + GQUAD_MIN_BOX_SIZE - 1..=(i + GQUAD_MAX_BOX_SIZE - 1).min(n) {
            let q = scanner.weight(bp, i, j);
            if q > 0.0 {
                out[fc.index.ij(i, j)] = q * scale[j - i + 1];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_energy::ModelDetails;
    use crate::FoldOptions;
    use crate::HardConstraints;

    fn compound(seq: &str) -> FoldCompound {
        let md = ModelDetails::default().with_gquad(true);
        FoldCompound::build(seq, &md, FoldOptions::default()).unwrap()
    }

    #[test]
    fn test_single_layout() {
        // GG A GG A GG A GG: two layers, linkers of one.
        let fc = compound("GGAGGAGGAGG");
        let scanner = GquadScanner::new(&fc);
        let mut layouts = Vec::new();
        scanner.for_each(1, 11, |l, links| layouts.push((l, links)));
        assert_eq!(layouts, vec![(2, [1, 1, 1])]);
        let p = fc.params().unwrap();
        assert_eq!(scanner.mfe(p, 1, 11), Some((p.gquad(2, 3), (2, [1, 1, 1]))));
        assert!(!scanner.spans(1, 10));
    }

    #[test]
    fn test_multiple_layouts() {
        let fc = compound("GGGAGGGAGGGAGGG");
        let scanner = GquadScanner::new(&fc);
        let mut layouts = Vec::new();
        scanner.for_each(1, 15, |l, links| layouts.push((l, links)));
        assert!(layouts.contains(&(3, [1, 1, 1])));
        assert!(layouts.contains(&(2, [2, 3, 2])));
        let p = fc.params().unwrap();
        // Three layers beat every two layer alternative.
        assert_eq!(scanner.mfe(p, 1, 15).map(|(_, l)| l), Some((3, [1, 1, 1])));

        let bp = fc.exp_params().unwrap();
        let w: f64 = layouts.iter()
            .map(|&(l, links)| bp.boltzmann(bp.energy.gquad(l, links.iter().sum()), 1))
            .sum();
        assert!((scanner.weight(bp, 1, 15) - w).abs() < 1e-9 * w);
    }

    #[test]
    fn test_blocked_by_constraints() {
        let mut fc = compound("GGAGGAGGAGG");
        let mut hc = HardConstraints::new(11);
        hc.force_paired(6);
        fc.attach_constraints(Some(hc), None).unwrap();
        let scanner = GquadScanner::new(&fc);
        assert!(!scanner.spans(1, 11));
        assert_eq!(scanner.mfe(fc.params().unwrap(), 1, 11), None);
    }

    #[test]
    fn test_gquad_matrices() {
        let fc = compound("AGGAGGAGGAGGA");
        let p = fc.params().unwrap();
        let mut ggg = vec![INF; fc.index.size()];
        gquad_mfe_matrix(&fc, p, &mut ggg);
        assert_eq!(ggg[fc.index.ji(2, 12)], p.gquad(2, 3));
        assert_eq!(ggg[fc.index.ji(1, 12)], INF);

        let bp = fc.exp_params().unwrap();
        let scale = bp.scale_factors(fc.len());
        let mut g = vec![0.0; fc.index.size()];
        gquad_pf_matrix(&fc, bp, &scale, &mut g);
        assert!(g[fc.index.ij(2, 12)] > 0.0);
        assert_eq!(g[fc.index.ij(2, 13)], 0.0);
    }
}
