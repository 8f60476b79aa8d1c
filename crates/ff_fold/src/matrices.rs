//! Dynamic programming arrays of the MFE and partition function engines.
//!
//! Every array is optional and exists iff its bit is set in `allocated`.
//! Triangular MFE arrays use the `ji` offsets of a [`TriangularIndex`],
//! triangular partition function arrays the `ij` offsets.
//!
//! [`TriangularIndex`]: crate::TriangularIndex

use std::mem::size_of;
use log::debug;

use ff_energy::BoltzmannParams;
use ff_energy::INF;

use crate::AllocMask;
use crate::CircularTerms;
use crate::FoldError;

/// Allocate an array of `len` copies of `value`, reporting exhaustion as
/// an error instead of aborting.
pub(crate) fn alloc_array<T: Clone>(array: &'static str, len: usize, value: T) -> Result<Vec<T>, FoldError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| FoldError::Allocation {
        array,
        bytes: len.saturating_mul(size_of::<T>()),
    })?;
    v.resize(len, value);
    Ok(v)
}

fn alloc_if<T: Clone>(mask: AllocMask, bit: AllocMask, array: &'static str, len: usize, value: T)
    -> Result<Option<Vec<T>>, FoldError>
{
    if mask.contains(bit) {
        alloc_array(array, len, value).map(Some)
    } else {
        Ok(None)
    }
}

fn get<'a, T>(array: &'a Option<Vec<T>>, name: &'static str) -> Result<&'a [T], FoldError> {
    array.as_deref().ok_or(FoldError::NotAllocated(name))
}

fn bytes<T>(array: &Option<Vec<T>>) -> usize {
    array.as_ref().map_or(0, |v| v.capacity() * size_of::<T>())
}

fn triangle(n: usize) -> usize {
    n * (n + 1) / 2 + 2
}

#[derive(Debug, Clone)]
pub struct MfeMatrices {
    pub n: usize,
    pub allocated: AllocMask,
    /// Energy of (i, j) given that i and j pair.
    pub c: Option<Vec<i32>>,
    /// Exterior loop prefixes 1..=j (`f5[0] = 0`).
    pub f5: Option<Vec<i32>>,
    /// Exterior loop suffixes i..=n.
    pub f3: Option<Vec<i32>>,
    /// Exterior loops of a hybrid: i..cut-1 for i < cut, cut..=j for j >= cut.
    pub fc: Option<Vec<i32>>,
    /// Multi-branch intervals with at least one branch.
    pub fml: Option<Vec<i32>>,
    /// Multi-branch intervals with exactly one branch starting at i.
    pub fm1: Option<Vec<i32>>,
    /// Circular multi-branch suffixes k..=n with at least two branches.
    pub fm2: Option<Vec<i32>>,
    /// G-quadruplexes spanning exactly (i, j).
    pub ggg: Option<Vec<i32>>,
    pub circ: CircularTerms<i32>,
}

impl MfeMatrices {
    pub fn allocate(n: usize, mask: AllocMask) -> Result<Self, FoldError> {
        let tri = triangle(n);
        let m = MfeMatrices {
            n,
            allocated: mask,
            c: alloc_if(mask, AllocMask::C, "c", tri, INF)?,
            f5: alloc_if(mask, AllocMask::F5, "f5", n + 2, INF)?,
            f3: alloc_if(mask, AllocMask::F3, "f3", n + 2, INF)?,
            fc: alloc_if(mask, AllocMask::FC, "fc", n + 2, INF)?,
            fml: alloc_if(mask, AllocMask::FML, "fml", tri, INF)?,
            fm1: alloc_if(mask, AllocMask::UNIQ, "fm1", tri, INF)?,
            fm2: alloc_if(mask, AllocMask::CIRC, "fm2", n + 2, INF)?,
            ggg: alloc_if(mask, AllocMask::GQUAD, "ggg", tri, INF)?,
            circ: CircularTerms::splat(INF),
        };
        debug!("Allocated MFE matrices {:?} for n = {} ({} bytes)", mask, n, m.bytes());
        Ok(m)
    }

    /// The arrays that are actually present.
    pub fn present(&self) -> AllocMask {
        let mut mask = AllocMask::NONE;
        for (array, bit) in [
            (&self.c, AllocMask::C),
            (&self.f5, AllocMask::F5),
            (&self.f3, AllocMask::F3),
            (&self.fc, AllocMask::FC),
            (&self.fml, AllocMask::FML),
            (&self.fm1, AllocMask::UNIQ),
            (&self.fm2, AllocMask::CIRC),
            (&self.ggg, AllocMask::GQUAD),
        ] {
            if array.is_some() {
                mask |= bit;
            }
        }
        mask
    }

    pub fn bytes(&self) -> usize {
        bytes(&self.c) + bytes(&self.f5) + bytes(&self.f3) + bytes(&self.fc)
            + bytes(&self.fml) + bytes(&self.fm1) + bytes(&self.fm2) + bytes(&self.ggg)
    }

    pub fn c(&self) -> Result<&[i32], FoldError> { get(&self.c, "c") }
    pub fn f5(&self) -> Result<&[i32], FoldError> { get(&self.f5, "f5") }
    pub fn f3(&self) -> Result<&[i32], FoldError> { get(&self.f3, "f3") }
    pub fn fc(&self) -> Result<&[i32], FoldError> { get(&self.fc, "fc") }
    pub fn fml(&self) -> Result<&[i32], FoldError> { get(&self.fml, "fml") }
    pub fn fm1(&self) -> Result<&[i32], FoldError> { get(&self.fm1, "fm1") }
    pub fn fm2(&self) -> Result<&[i32], FoldError> { get(&self.fm2, "fm2") }
    pub fn ggg(&self) -> Result<&[i32], FoldError> { get(&self.ggg, "ggg") }
}

#[derive(Debug, Clone)]
pub struct PfMatrices {
    pub n: usize,
    pub allocated: AllocMask,
    /// Exterior-like intervals (i, j), scaled.
    pub q: Option<Vec<f64>>,
    /// Intervals (i, j) given that i and j pair.
    pub qb: Option<Vec<f64>>,
    pub qm: Option<Vec<f64>>,
    pub qm1: Option<Vec<f64>>,
    /// Base-pair probabilities.
    pub probs: Option<Vec<f64>>,
    /// q[1, k].
    pub q1k: Option<Vec<f64>>,
    /// q[l, n].
    pub qln: Option<Vec<f64>>,
    /// G-quadruplexes spanning exactly (i, j).
    pub g: Option<Vec<f64>>,
    /// Probabilities of the G-quadruplexes spanning exactly (i, j).
    pub g_probs: Option<Vec<f64>>,
    pub qm2: Option<Vec<f64>>,
    pub circ: CircularTerms<f64>,
    /// Scaled partition function of the whole molecule (0 until filled).
    pub total: f64,
    /// scale[L] = pf_scale^-L.
    pub scale: Vec<f64>,
    /// Weights of L unpaired multi-loop nucleotides.
    pub exp_ml_base: Vec<f64>,
}

impl PfMatrices {
    pub fn allocate(n: usize, mask: AllocMask) -> Result<Self, FoldError> {
        let tri = triangle(n);
        let gprobs = mask.contains(AllocMask::GQUAD | AllocMask::PROBS);
        let m = PfMatrices {
            n,
            allocated: mask,
            q: alloc_if(mask, AllocMask::F, "q", tri, 0.0)?,
            qb: alloc_if(mask, AllocMask::C, "qb", tri, 0.0)?,
            qm: alloc_if(mask, AllocMask::FML, "qm", tri, 0.0)?,
            qm1: alloc_if(mask, AllocMask::FML, "qm1", tri, 0.0)?,
            probs: alloc_if(mask, AllocMask::PROBS, "probs", tri, 0.0)?,
            q1k: alloc_if(mask, AllocMask::AUX, "q1k", n + 2, 0.0)?,
            qln: alloc_if(mask, AllocMask::AUX, "qln", n + 2, 0.0)?,
            g: alloc_if(mask, AllocMask::GQUAD, "g", tri, 0.0)?,
            g_probs: if gprobs { Some(alloc_array("g_probs", tri, 0.0)?) } else { None },
            qm2: alloc_if(mask, AllocMask::CIRC, "qm2", n + 2, 0.0)?,
            circ: CircularTerms::splat(0.0),
            total: 0.0,
            scale: alloc_array("scale", n + 2, 1.0)?,
            exp_ml_base: alloc_array("exp_ml_base", n + 2, 1.0)?,
        };
        debug!("Allocated PF matrices {:?} for n = {} ({} bytes)", mask, n, m.bytes());
        Ok(m)
    }

    /// Fill `scale` and `exp_ml_base` from the Boltzmann parameters.
    pub fn set_scaling(&mut self, bp: &BoltzmannParams, n_seq: usize) {
        self.scale = bp.scale_factors(self.n);
        self.exp_ml_base = bp.ml_base_factors(self.n, n_seq);
    }

    pub fn present(&self) -> AllocMask {
        let mut mask = AllocMask::NONE;
        for (array, bit) in [
            (&self.q, AllocMask::F),
            (&self.qb, AllocMask::C),
            (&self.qm, AllocMask::FML),
            (&self.qm1, AllocMask::FML),
            (&self.probs, AllocMask::PROBS),
            (&self.q1k, AllocMask::AUX),
            (&self.qln, AllocMask::AUX),
            (&self.g, AllocMask::GQUAD),
            (&self.qm2, AllocMask::CIRC),
        ] {
            if array.is_some() {
                mask |= bit;
            }
        }
        mask
    }

    pub fn bytes(&self) -> usize {
        bytes(&self.q) + bytes(&self.qb) + bytes(&self.qm) + bytes(&self.qm1)
            + bytes(&self.probs) + bytes(&self.q1k) + bytes(&self.qln)
            + bytes(&self.g) + bytes(&self.g_probs) + bytes(&self.qm2)
            + (self.scale.capacity() + self.exp_ml_base.capacity()) * size_of::<f64>()
    }

    pub fn q(&self) -> Result<&[f64], FoldError> { get(&self.q, "q") }
    pub fn qb(&self) -> Result<&[f64], FoldError> { get(&self.qb, "qb") }
    pub fn qm(&self) -> Result<&[f64], FoldError> { get(&self.qm, "qm") }
    pub fn qm1(&self) -> Result<&[f64], FoldError> { get(&self.qm1, "qm1") }
    pub fn probs(&self) -> Result<&[f64], FoldError> { get(&self.probs, "probs") }
    pub fn q1k(&self) -> Result<&[f64], FoldError> { get(&self.q1k, "q1k") }
    pub fn qln(&self) -> Result<&[f64], FoldError> { get(&self.qln, "qln") }
    pub fn g(&self) -> Result<&[f64], FoldError> { get(&self.g, "g") }
    pub fn g_probs(&self) -> Result<&[f64], FoldError> { get(&self.g_probs, "g_probs") }
    pub fn qm2(&self) -> Result<&[f64], FoldError> { get(&self.qm2, "qm2") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mfe_allocation_mask() {
        let m = MfeMatrices::allocate(20, AllocMask::MFE_DEFAULT).unwrap();
        assert_eq!(m.present(), AllocMask::MFE_DEFAULT);
        assert_eq!(m.c().unwrap().len(), 20 * 21 / 2 + 2);
        assert_eq!(m.f5().unwrap().len(), 22);
        assert!(matches!(m.f3(), Err(FoldError::NotAllocated("f3"))));
        assert!(m.ggg.is_none() && m.fm2.is_none() && m.fc.is_none());

        let mask = AllocMask::MFE_DEFAULT | AllocMask::CIRC | AllocMask::GQUAD;
        let m = MfeMatrices::allocate(20, mask).unwrap();
        assert_eq!(m.present(), mask);
        assert!(m.bytes() > 0);
    }

    #[test]
    fn test_pf_allocation_mask() {
        let m = PfMatrices::allocate(15, AllocMask::PF_WO_PROBS).unwrap();
        assert_eq!(m.present(), AllocMask::PF_WO_PROBS);
        assert!(m.probs().is_err());
        assert!(m.q1k().is_err());
        assert_eq!(m.scale.len(), 17);

        let m = PfMatrices::allocate(15, AllocMask::PF_DEFAULT | AllocMask::GQUAD).unwrap();
        assert_eq!(m.present(), AllocMask::PF_DEFAULT | AllocMask::GQUAD);
        assert!(m.g_probs().is_ok());
        assert!(m.qm2().is_err());
    }

    #[test]
    fn test_alloc_failure() {
        let r = alloc_array::<f64>("huge", usize::MAX / 4, 0.0);
        assert!(matches!(r, Err(FoldError::Allocation { array: "huge", .. })));
    }
}
