use std::fmt;
use std::ops::BitAnd;
use std::ops::BitAndAssign;
use std::ops::BitOr;
use std::ops::BitOrAssign;
use log::debug;

use ff_structure::StructureError;
use crate::TriangularIndex;

/// The loop contexts a pair (or an unpaired nucleotide) may appear in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoopContext(u8);

impl LoopContext {
    pub const NONE: LoopContext = LoopContext(0);
    /// Exterior loop.
    pub const EXT: LoopContext = LoopContext(1);
    /// Closing a hairpin loop.
    pub const HP: LoopContext = LoopContext(2);
    /// Closing an interior loop.
    pub const INT: LoopContext = LoopContext(4);
    /// Enclosed by an interior loop.
    pub const INT_ENC: LoopContext = LoopContext(8);
    /// Closing a multi-branch loop.
    pub const ML: LoopContext = LoopContext(16);
    /// Enclosed by a multi-branch loop.
    pub const ML_ENC: LoopContext = LoopContext(32);

    pub const ALL: LoopContext = LoopContext(63);
    /// The contexts of an unpaired nucleotide.
    pub const UNPAIRED: LoopContext = LoopContext(1 | 2 | 4 | 16);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: LoopContext) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: LoopContext) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for LoopContext {
    type Output = LoopContext;
    fn bitor(self, rhs: Self) -> Self::Output {
        LoopContext(self.0 | rhs.0)
    }
}

impl BitOrAssign for LoopContext {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LoopContext {
    type Output = LoopContext;
    fn bitand(self, rhs: Self) -> Self::Output {
        LoopContext(self.0 & rhs.0)
    }
}

impl BitAndAssign for LoopContext {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

/// Hard constraints: which pairs and unpaired nucleotides are permitted in
/// which loop context. Pairs (i, j) are stored by `ji(i, j)`, the
/// diagonal (i, i) holds the unpaired contexts of i.
#[derive(Debug, Clone, PartialEq)]
pub struct HardConstraints {
    index: TriangularIndex,
    mx: Vec<LoopContext>,
    up_ext: Vec<usize>,
    up_hp: Vec<usize>,
    up_int: Vec<usize>,
    up_ml: Vec<usize>,
}

impl HardConstraints {
    /// No constraints: every pair in every context, every nucleotide may be unpaired.
    pub fn new(n: usize) -> Self {
        let index = TriangularIndex::new(n);
        let mut mx = vec![LoopContext::ALL; index.size()];
        for i in 1..=n {
            mx[index.ji(i, i)] = LoopContext::UNPAIRED;
        }
        let mut hc = HardConstraints {
            index,
            mx,
            up_ext: vec![0; n + 2],
            up_hp: vec![0; n + 2],
            up_int: vec![0; n + 2],
            up_ml: vec![0; n + 2],
        };
        hc.update_up();
        hc
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn in_range(&self, i: usize, j: usize) -> bool {
        1 <= i && i <= j && j <= self.len()
    }

    pub fn context(&self, i: usize, j: usize) -> LoopContext {
        if self.in_range(i, j) {
            self.mx[self.index.ji(i, j)]
        } else {
            LoopContext::NONE
        }
    }

    /// Whether pair (i, j), or for i == j the unpaired nucleotide i, is
    /// permitted in (any of) the given context(s).
    #[inline]
    pub fn evaluate(&self, i: usize, j: usize, ctx: LoopContext) -> bool {
        self.context(i, j).intersects(ctx)
    }

    /// Consecutive positions from i on that may be unpaired in the
    /// exterior loop (0 beyond the sequence).
    pub fn up_ext(&self, i: usize) -> usize {
        self.up_ext.get(i).copied().unwrap_or(0)
    }

    pub fn up_hp(&self, i: usize) -> usize {
        self.up_hp.get(i).copied().unwrap_or(0)
    }

    pub fn up_int(&self, i: usize) -> usize {
        self.up_int.get(i).copied().unwrap_or(0)
    }

    pub fn up_ml(&self, i: usize) -> usize {
        self.up_ml.get(i).copied().unwrap_or(0)
    }

    /// Whether all of i..=j may be unpaired in the given (single) context.
    pub fn unpaired_stretch(&self, i: usize, j: usize, ctx: LoopContext) -> bool {
        if j < i {
            return true;
        }
        let len = j - i + 1;
        let up = match ctx {
            LoopContext::EXT => self.up_ext(i),
            LoopContext::HP => self.up_hp(i),
            LoopContext::INT => self.up_int(i),
            LoopContext::ML => self.up_ml(i),
            _ => 0,
        };
        up >= len
    }

    fn set(&mut self, i: usize, j: usize, ctx: LoopContext) {
        let ji = self.index.ji(i, j);
        self.mx[ji] = ctx;
    }

    pub fn forbid_pair(&mut self, i: usize, j: usize) {
        if self.in_range(i, j) && i < j {
            self.set(i, j, LoopContext::NONE);
        }
    }

    /// Restrict pair (i, j) to the given contexts.
    pub fn restrict_pair(&mut self, i: usize, j: usize, ctx: LoopContext) {
        if self.in_range(i, j) && i < j {
            let cur = self.context(i, j);
            self.set(i, j, cur & ctx);
        }
    }

    /// Enforce pair (i, j): i and j pair with nobody else, no pair crosses
    /// (i, j), neither i nor j stays unpaired.
    pub fn force_pair(&mut self, i: usize, j: usize) {
        if !(self.in_range(i, j) && i < j) {
            return;
        }
        let n = self.len();
        for k in 1..=n {
            for l in k + 1..=n {
                if (k, l) == (i, j) {
                    continue;
                }
                let touches = k == i || k == j || l == i || l == j;
                let crosses = (k < i && i < l && l < j) || (i < k && k < j && j < l);
                if touches || crosses {
                    self.set(k, l, LoopContext::NONE);
                }
            }
        }
        self.set(i, i, LoopContext::NONE);
        self.set(j, j, LoopContext::NONE);
        self.update_up();
        debug!("Enforced base pair ({}, {})", i, j);
    }

    /// Position i must not pair.
    pub fn force_unpaired(&mut self, i: usize) {
        if !self.in_range(i, i) {
            return;
        }
        for k in 1..=self.len() {
            match k.cmp(&i) {
                std::cmp::Ordering::Less => self.set(k, i, LoopContext::NONE),
                std::cmp::Ordering::Greater => self.set(i, k, LoopContext::NONE),
                std::cmp::Ordering::Equal => self.set(i, i, LoopContext::UNPAIRED),
            }
        }
        self.update_up();
    }

    /// Position i must pair with some other position.
    pub fn force_paired(&mut self, i: usize) {
        if self.in_range(i, i) {
            self.set(i, i, LoopContext::NONE);
            self.update_up();
        }
    }

    /// Position i may be unpaired only in the given contexts.
    pub fn restrict_unpaired(&mut self, i: usize, ctx: LoopContext) {
        if self.in_range(i, i) {
            let cur = self.context(i, i);
            self.set(i, i, cur & ctx & LoopContext::UNPAIRED);
            self.update_up();
        }
    }

    /// Constraints from a pseudo dot-bracket string: `.` no constraint,
    /// `x` unpaired, `|` paired, `()` enforced pair, `<` pairs downstream,
    /// `>` pairs upstream.
    pub fn from_constraint_string(s: &str) -> Result<Self, StructureError> {
        let n = s.chars().count();
        let mut hc = HardConstraints::new(n);
        let mut stack = Vec::new();
        for (k, c) in s.chars().enumerate() {
            let i = k + 1;
            match c {
                '.' => (),
                'x' => hc.force_unpaired(i),
                '|' => hc.force_paired(i),
                '(' => stack.push(i),
                ')' => {
                    let p = stack.pop().ok_or(StructureError::UnmatchedClose(k))?;
                    hc.force_pair(p, i);
                }
                '<' => {
                    for l in 1..i {
                        hc.forbid_pair(l, i);
                    }
                    hc.force_paired(i);
                }
                '>' => {
                    for l in i + 1..=n {
                        hc.forbid_pair(i, l);
                    }
                    hc.force_paired(i);
                }
                _ => {
                    return Err(StructureError::InvalidToken(
                        format!("character '{}'", c), "constraint".to_string(), k));
                }
            }
        }
        if let Some(p) = stack.pop() {
            return Err(StructureError::UnmatchedOpen(p - 1));
        }
        hc.update_up();
        Ok(hc)
    }

    /// Recompute the number of consecutive unpaired positions per context.
    fn update_up(&mut self) {
        let n = self.len();
        for (ctx, up) in [
            (LoopContext::EXT, &mut self.up_ext),
            (LoopContext::HP, &mut self.up_hp),
            (LoopContext::INT, &mut self.up_int),
            (LoopContext::ML, &mut self.up_ml),
        ] {
            up[n + 1] = 0;
            for i in (1..=n).rev() {
                let diag = self.mx[self.index.ji(i, i)];
                up[i] = if diag.contains(ctx) { up[i + 1] + 1 } else { 0 };
            }
        }
    }
}

impl fmt::Display for HardConstraints {
    /// The unpaired constraints as a string of `.` (free), `x` (unpaired
    /// only in some contexts) and `|` (must pair).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 1..=self.len() {
            let c = match self.context(i, i) {
                LoopContext::UNPAIRED => '.',
                ctx if ctx.is_empty() => '|',
                _ => 'x',
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_context_bits() {
        let ctx = LoopContext::HP | LoopContext::INT;
        assert!(ctx.contains(LoopContext::HP));
        assert!(!ctx.contains(LoopContext::HP | LoopContext::ML));
        assert!(ctx.intersects(LoopContext::INT | LoopContext::ML));
        assert_eq!((ctx & LoopContext::ML).bits(), 0);
        assert!(LoopContext::ALL.contains(LoopContext::UNPAIRED));
    }

    #[test]
    fn test_unconstrained() {
        let hc = HardConstraints::new(6);
        assert!(hc.evaluate(1, 6, LoopContext::EXT));
        assert!(hc.evaluate(3, 3, LoopContext::HP));
        assert!(!hc.evaluate(3, 3, LoopContext::INT_ENC));
        assert_eq!(hc.up_ext(1), 6);
        assert_eq!(hc.up_ml(4), 3);
        assert_eq!(hc.up_hp(7), 0);
        assert_eq!(hc.up_hp(100), 0);
        assert!(hc.unpaired_stretch(2, 6, LoopContext::INT));
        assert!(hc.unpaired_stretch(4, 3, LoopContext::INT));
        assert!(!hc.evaluate(0, 3, LoopContext::ALL));
    }

    #[test]
    fn test_force_unpaired() {
        let mut hc = HardConstraints::new(8);
        hc.force_unpaired(5);
        for k in 1..=8 {
            if k < 5 {
                assert!(!hc.evaluate(k, 5, LoopContext::ALL));
            } else if k > 5 {
                assert!(!hc.evaluate(5, k, LoopContext::ALL));
            }
        }
        assert!(hc.evaluate(5, 5, LoopContext::EXT));
        assert!(hc.evaluate(1, 8, LoopContext::EXT));
    }

    #[test]
    fn test_force_paired_and_up_arrays() {
        let mut hc = HardConstraints::new(8);
        hc.force_paired(4);
        assert_eq!(hc.up_ext(1), 3);
        assert_eq!(hc.up_ext(4), 0);
        assert_eq!(hc.up_ext(5), 4);
        assert!(!hc.unpaired_stretch(2, 5, LoopContext::ML));

        hc.restrict_unpaired(6, LoopContext::ML);
        assert_eq!(hc.up_ml(5), 4);
        assert_eq!(hc.up_hp(5), 1);
        assert_eq!(format!("{}", hc), "...|.x..");
    }

    #[test]
    fn test_force_pair() {
        let mut hc = HardConstraints::new(10);
        hc.force_pair(2, 8);
        assert!(hc.evaluate(2, 8, LoopContext::ALL));
        assert!(!hc.evaluate(1, 8, LoopContext::ALL));
        assert!(!hc.evaluate(2, 9, LoopContext::ALL));
        // Crossing pairs are gone, nested and disjoint ones remain.
        assert!(!hc.evaluate(5, 9, LoopContext::ALL));
        assert!(!hc.evaluate(1, 4, LoopContext::ALL));
        assert!(hc.evaluate(3, 7, LoopContext::ALL));
        assert!(hc.evaluate(1, 10, LoopContext::ALL));
        assert_eq!(hc.up_ext(2), 0);
    }

    #[test]
    fn test_constraint_string() {
        let hc = HardConstraints::from_constraint_string("((x..))<..>").unwrap();
        assert!(hc.evaluate(1, 7, LoopContext::ALL));
        assert!(hc.evaluate(2, 6, LoopContext::ALL));
        assert!(!hc.evaluate(3, 5, LoopContext::ALL));
        assert!(!hc.evaluate(1, 8, LoopContext::ALL));
        assert!(hc.evaluate(8, 11, LoopContext::ALL));
        assert!(!hc.evaluate(8, 8, LoopContext::UNPAIRED));

        assert!(matches!(HardConstraints::from_constraint_string("(.."),
            Err(StructureError::UnmatchedOpen(0))));
        assert!(matches!(HardConstraints::from_constraint_string("..)"),
            Err(StructureError::UnmatchedClose(2))));
        assert!(HardConstraints::from_constraint_string("..?").is_err());
    }

    #[test]
    fn test_restrict_pair() {
        let mut hc = HardConstraints::new(10);
        hc.restrict_pair(1, 10, LoopContext::EXT | LoopContext::HP);
        assert!(hc.evaluate(1, 10, LoopContext::HP));
        assert!(!hc.evaluate(1, 10, LoopContext::ML));
        hc.forbid_pair(1, 10);
        assert!(!hc.evaluate(1, 10, LoopContext::ALL));
    }
}
