//! Serializable result records: pair lists, pair statistics and solutions.

use std::fmt;
use colored::*;
use serde::Serialize;
use serde::Deserialize;

use ff_energy::PairTypeRNA;
use ff_structure::PairTable;
use ff_structure::StructureError;

use crate::FoldCompound;
use crate::FoldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    BasePair,
    /// A G-quadruplex spanning i..=j.
    GQuad,
}

/// One entry of an ensemble pair list (1-based positions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairListRecord {
    pub i: usize,
    pub j: usize,
    pub p: f64,
    pub kind: PairKind,
}

impl fmt::Display for PairListRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PairKind::BasePair => "bp".normal(),
            PairKind::GQuad => "gq".magenta(),
        };
        write!(f, "{:>5} {:>5} {:.6} {}", self.i, self.j, self.p, kind)
    }
}

/// Ensemble statistics of a pair.
///
/// `bp[0]` counts the sequences that cannot form the pair, `bp[1..=6]`
/// the sequences forming CG, GC, GU, UG, AU and UA, `bp[7]` those with a
/// gap at both positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairInfo {
    pub i: usize,
    pub j: usize,
    pub p: f64,
    /// Positional entropy of i and j, the pair's own term counted once.
    pub ent: f64,
    pub bp: [u32; 8],
    /// Whether the pair is part of the reference (usually MFE) structure.
    pub comp: bool,
}

impl fmt::Display for PairInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.comp { "*".green() } else { " ".normal() };
        write!(f, "{:>5} {:>5} {:.6} {:.4} {:?} {}", self.i, self.j, self.p, self.ent, self.bp, mark)
    }
}

/// A structure together with its free energy (kcal/mol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub energy: f64,
    pub structure: String,
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:>7.2}", self.structure, self.energy)
    }
}

fn pair_bucket(pt: Option<PairTypeRNA>, gaps: bool) -> usize {
    match pt {
        Some(PairTypeRNA::CG) => 1,
        Some(PairTypeRNA::GC) => 2,
        Some(PairTypeRNA::GU) => 3,
        Some(PairTypeRNA::UG) => 4,
        Some(PairTypeRNA::AU) => 5,
        Some(PairTypeRNA::UA) => 6,
        _ if gaps => 7,
        _ => 0,
    }
}

fn xlogx(p: f64) -> f64 {
    if p > 0.0 { p * p.ln() } else { 0.0 }
}

impl FoldCompound {
    /// Base pairs (and G-quadruplexes, if computed) with probability of at
    /// least `cutoff`, sorted by (i, j).
    pub fn pair_list(&self, cutoff: f64) -> Result<Vec<PairListRecord>, FoldError> {
        let m = self.pf_matrices.as_ref().ok_or(FoldError::NotAllocated("probs"))?;
        let probs = m.probs()?;
        let g_probs = m.g_probs.as_deref();
        let n = self.len();
        let mut out = Vec::new();
        for i in 1..=n {
            for j in i..=n {
                let ij = self.index.ij(i, j);
                if j > i && probs[ij] >= cutoff && probs[ij] > 0.0 {
                    out.push(PairListRecord { i, j, p: probs[ij], kind: PairKind::BasePair });
                }
                if let Some(gp) = g_probs {
                    if gp[ij] >= cutoff && gp[ij] > 0.0 {
                        out.push(PairListRecord { i, j, p: gp[ij], kind: PairKind::GQuad });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Statistics of all pairs with probability of at least `cutoff`,
    /// compared against a reference structure (e.g. the MFE structure).
    pub fn pair_info(&self, structure: &str, cutoff: f64) -> Result<Vec<PairInfo>, FoldError> {
        let n = self.len();
        let plain: String = structure.chars().filter(|&c| c != '&').collect();
        let pt = PairTable::try_from(plain.as_str())?;
        if pt.len() != n {
            return Err(StructureError::LengthMismatch(pt.len(), n).into());
        }
        let probs = self.bpp()?;
        let p = |i: usize, j: usize| -> f64 {
            let (a, b) = if i < j { (i, j) } else { (j, i) };
            probs[self.index.ij(a, b)]
        };

        // Positional entropies, unpaired probability included.
        let mut entropy = vec![0.0; n + 1];
        for (k, s) in entropy.iter_mut().enumerate().skip(1) {
            let mut paired = 0.0;
            let mut h = 0.0;
            for l in (1..=n).filter(|&l| l != k) {
                let x = p(k, l);
                paired += x;
                h -= xlogx(x);
            }
            *s = h - xlogx((1.0 - paired).max(0.0));
        }

        let model = &self.model;
        let mut out = Vec::new();
        for i in 1..n {
            for j in i + 1..=n {
                let pij = p(i, j);
                if pij < cutoff || pij == 0.0 {
                    continue;
                }
                let mut bp = [0u32; 8];
                for row in self.rows() {
                    let gaps = row.is_gap(i) && row.is_gap(j);
                    bp[pair_bucket(model.pair_type(row.s[i], row.s[j]), gaps)] += 1;
                }
                out.push(PairInfo {
                    i,
                    j,
                    p: pij,
                    ent: entropy[i] + entropy[j] + xlogx(pij),
                    bp,
                    comp: pt[i - 1] == Some(j - 1),
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_energy::ModelDetails;
    use crate::FoldOptions;

    fn folded(seq: &str) -> (FoldCompound, Solution) {
        let md = ModelDetails::default();
        let mut fc = FoldCompound::build(seq, &md, FoldOptions::default()).unwrap();
        fc.pf().unwrap();
        let mfe = fc.mfe().unwrap();
        (fc, mfe)
    }

    #[test]
    fn test_pair_list() {
        let (fc, _) = folded("GGGGAAAACCCC");
        let list = fc.pair_list(0.1).unwrap();
        assert!(!list.is_empty());
        assert!(list.iter().all(|r| r.p >= 0.1 && r.kind == PairKind::BasePair && r.i < r.j));
        assert!(list.iter().any(|r| (r.i, r.j) == (1, 12)));
        assert!(fc.pair_list(1.1).unwrap().is_empty());
    }

    #[test]
    fn test_pair_info() {
        let (fc, mfe) = folded("GGGGAAAACCCC");
        let info = fc.pair_info(&mfe.structure, 0.01).unwrap();
        let outer = info.iter().find(|x| (x.i, x.j) == (1, 12)).unwrap();
        assert!(outer.comp);
        assert_eq!(outer.bp, [0, 0, 1, 0, 0, 0, 0, 0]);
        assert!(outer.ent >= 0.0);
        assert!(fc.pair_info("((..))", 0.01).is_err());
    }

    #[test]
    fn test_alignment_histogram() {
        let md = ModelDetails::default();
        let rows = ["GGGGAAAACCCC", "GGGAAAAAUCCC", "GGG-AAAA-CCC"];
        let mut fc = FoldCompound::build_aligned(&rows, &md, FoldOptions::default()).unwrap();
        fc.pf().unwrap();
        let info = fc.pair_info("((((....))))", 0.0).unwrap();
        let x = info.iter().find(|x| (x.i, x.j) == (4, 9)).unwrap();
        // G-C, A-U and gap-gap.
        assert_eq!(x.bp, [0, 0, 1, 0, 0, 1, 0, 1]);

        // Unknown nucleotides are not gaps.
        let rows = ["GGGGAAAACCCC", "GGGNAAAANCCC", "GGG-AAAA-CCC"];
        let mut fc = FoldCompound::build_aligned(&rows, &md, FoldOptions::default()).unwrap();
        fc.pf().unwrap();
        let info = fc.pair_info("((((....))))", 0.0).unwrap();
        let x = info.iter().find(|x| (x.i, x.j) == (4, 9)).unwrap();
        assert_eq!(x.bp, [1, 0, 1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_records_json() {
        let rec = PairListRecord { i: 1, j: 12, p: 0.5, kind: PairKind::GQuad };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"kind\":\"g_quad\""));
        let back: PairListRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
        let sol = Solution { energy: -1.2, structure: "(((...)))".into() };
        assert_eq!(format!("{}", sol), "(((...)))   -1.20");
    }
}
