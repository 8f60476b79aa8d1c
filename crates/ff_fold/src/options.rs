use std::fmt;
use std::ops::BitAnd;
use std::ops::BitOr;
use std::ops::BitOrAssign;
use std::ops::Index;
use std::ops::IndexMut;

/// What a fold compound is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FoldOptions(u8);

impl FoldOptions {
    pub const MFE: FoldOptions = FoldOptions(1);
    pub const PF: FoldOptions = FoldOptions(2);
    /// Two strands joined at a cut point.
    pub const HYBRID: FoldOptions = FoldOptions(4);

    pub fn contains(self, other: FoldOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for FoldOptions {
    fn default() -> Self {
        FoldOptions::MFE | FoldOptions::PF
    }
}

impl BitOr for FoldOptions {
    type Output = FoldOptions;
    fn bitor(self, rhs: Self) -> Self::Output {
        FoldOptions(self.0 | rhs.0)
    }
}

/// Selects the dynamic programming arrays to allocate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AllocMask(u32);

impl AllocMask {
    pub const NONE: AllocMask = AllocMask(0);
    /// Exterior partition function `q`.
    pub const F: AllocMask = AllocMask(1);
    pub const F5: AllocMask = AllocMask(2);
    pub const F3: AllocMask = AllocMask(4);
    /// Exterior loops of the two strands of a hybrid.
    pub const FC: AllocMask = AllocMask(8);
    /// Paired intervals (`c`, `qb`).
    pub const C: AllocMask = AllocMask(16);
    /// Multi-branch intervals (`fml`, `qm`, `qm1`).
    pub const FML: AllocMask = AllocMask(32);
    pub const PROBS: AllocMask = AllocMask(256);
    /// End-position marginals (`q1k`, `qln`).
    pub const AUX: AllocMask = AllocMask(512);
    pub const CIRC: AllocMask = AllocMask(1024);
    pub const HYBRID: AllocMask = AllocMask(2048);
    /// Single-branch multi-loop intervals for unique backtracking (`fm1`).
    pub const UNIQ: AllocMask = AllocMask(4096);
    pub const GQUAD: AllocMask = AllocMask(8192);

    pub const MFE_DEFAULT: AllocMask = AllocMask(2 | 16 | 32 | 4096);
    pub const PF_WO_PROBS: AllocMask = AllocMask(1 | 16 | 32);
    pub const PF_DEFAULT: AllocMask = AllocMask(1 | 16 | 32 | 256 | 512);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: AllocMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AllocMask {
    type Output = AllocMask;
    fn bitor(self, rhs: Self) -> Self::Output {
        AllocMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for AllocMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for AllocMask {
    type Output = AllocMask;
    fn bitand(self, rhs: Self) -> Self::Output {
        AllocMask(self.0 & rhs.0)
    }
}

impl fmt::Debug for AllocMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(AllocMask, &str); 12] = [
            (AllocMask::F, "F"), (AllocMask::F5, "F5"), (AllocMask::F3, "F3"),
            (AllocMask::FC, "FC"), (AllocMask::C, "C"), (AllocMask::FML, "FML"),
            (AllocMask::PROBS, "PROBS"), (AllocMask::AUX, "AUX"),
            (AllocMask::CIRC, "CIRC"), (AllocMask::HYBRID, "HYBRID"),
            (AllocMask::UNIQ, "UNIQ"), (AllocMask::GQUAD, "GQUAD"),
        ];
        let names: Vec<&str> = NAMES.iter()
            .filter(|(m, _)| self.contains(*m))
            .map(|(_, s)| *s)
            .collect();
        write!(f, "AllocMask({})", names.join("|"))
    }
}

/// The loop type closing the exterior loop of a circular molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExteriorLoop {
    /// All contributions, including the open chain.
    Total = 0,
    Hairpin = 1,
    Interior = 2,
    Multi = 3,
}

impl ExteriorLoop {
    pub const ALL: [ExteriorLoop; 4] = [
        ExteriorLoop::Total,
        ExteriorLoop::Hairpin,
        ExteriorLoop::Interior,
        ExteriorLoop::Multi,
    ];
}

/// Per loop type accumulators of a circular exterior loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularTerms<T>(pub [T; 4]);

impl<T: Copy> CircularTerms<T> {
    pub fn splat(value: T) -> Self {
        CircularTerms([value; 4])
    }
}

impl<T> Index<ExteriorLoop> for CircularTerms<T> {
    type Output = T;
    fn index(&self, idx: ExteriorLoop) -> &T {
        &self.0[idx as usize]
    }
}

impl<T> IndexMut<ExteriorLoop> for CircularTerms<T> {
    fn index_mut(&mut self, idx: ExteriorLoop) -> &mut T {
        &mut self.0[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_options() {
        let opts = FoldOptions::MFE | FoldOptions::HYBRID;
        assert!(opts.contains(FoldOptions::MFE));
        assert!(!opts.contains(FoldOptions::PF));
        assert!(FoldOptions::default().contains(FoldOptions::PF));
    }

    #[test]
    fn test_alloc_mask_values() {
        assert_eq!(AllocMask::MFE_DEFAULT.bits(), 4146);
        assert!(AllocMask::PF_DEFAULT.contains(AllocMask::PF_WO_PROBS));
        assert!(!AllocMask::PF_WO_PROBS.contains(AllocMask::PROBS));
        let mask = AllocMask::C | AllocMask::GQUAD;
        assert_eq!(format!("{:?}", mask), "AllocMask(C|GQUAD)");
        assert!((mask & AllocMask::F).is_empty());
    }

    #[test]
    fn test_circular_terms() {
        let mut terms = CircularTerms::splat(0);
        terms[ExteriorLoop::Multi] = 3;
        terms[ExteriorLoop::Total] += 1;
        assert_eq!(terms.0, [1, 0, 0, 3]);
    }
}
