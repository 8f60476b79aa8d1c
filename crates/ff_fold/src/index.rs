//! Triangular index schemes for arrays keyed by a subsequence (i, j).
//!
//! Both schemes are 1-based and map 1 <= i <= j <= n onto offsets
//! 1..=n(n+1)/2 of a flat backing array:
//!
//! - `ij(i, j) = iindx[i] - j` (rows grow towards the 5' end),
//! - `ji(i, j) = jindx[j] + i` (columns grow towards the 3' end).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriangularIndex {
    n: usize,
    iindx: Vec<usize>,
    jindx: Vec<usize>,
}

impl TriangularIndex {
    pub fn new(n: usize) -> Self {
        let mut iindx = vec![0; n + 2];
        let mut jindx = vec![0; n + 2];
        for i in 1..=n {
            iindx[i] = ((n + 1 - i) * (n - i)) / 2 + n + 1;
        }
        for (j, jx) in jindx.iter_mut().enumerate().skip(1) {
            *jx = (j * (j - 1)) / 2;
        }
        TriangularIndex { n, iindx, jindx }
    }

    /// The sequence length.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Length of a backing array that holds every (i, j) with i <= j.
    pub fn size(&self) -> usize {
        self.n * (self.n + 1) / 2 + 2
    }

    #[inline]
    pub fn ij(&self, i: usize, j: usize) -> usize {
        debug_assert!(1 <= i && i <= j && j <= self.n);
        self.iindx[i] - j
    }

    #[inline]
    pub fn ji(&self, i: usize, j: usize) -> usize {
        debug_assert!(1 <= i && i <= j && j <= self.n);
        self.jindx[j] + i
    }

    pub fn iindx(&self) -> &[usize] {
        &self.iindx
    }

    pub fn jindx(&self) -> &[usize] {
        &self.jindx
    }

    /// Recover (i, j) from an `ij` offset.
    pub fn invert_ij(&self, offset: usize) -> Option<(usize, usize)> {
        // Row i covers offsets iindx[i] - n ..= iindx[i] - i.
        let i = 1 + (1..=self.n)
            .filter(|&i| self.iindx[i] - self.n > offset)
            .count();
        if i > self.n || offset < self.iindx[i] - self.n {
            return None;
        }
        let j = self.iindx[i] - offset;
        (i <= j).then_some((i, j))
    }

    /// Recover (i, j) from a `ji` offset.
    pub fn invert_ji(&self, offset: usize) -> Option<(usize, usize)> {
        let j = (1..=self.n).filter(|&j| self.jindx[j] < offset).count();
        if j == 0 {
            return None;
        }
        let i = offset - self.jindx[j];
        (1 <= i && i <= j).then_some((i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    #[test]
    fn test_index_bijection() {
        for n in 1..=25 {
            let idx = TriangularIndex::new(n);
            let mut seen_ij = AHashSet::new();
            let mut seen_ji = AHashSet::new();
            for i in 1..=n {
                for j in i..=n {
                    let a = idx.ij(i, j);
                    let b = idx.ji(i, j);
                    assert!(a >= 1 && a < idx.size());
                    assert!(b >= 1 && b < idx.size());
                    assert!(seen_ij.insert(a));
                    assert!(seen_ji.insert(b));
                    assert_eq!(idx.invert_ij(a), Some((i, j)));
                    assert_eq!(idx.invert_ji(b), Some((i, j)));
                }
            }
            assert_eq!(seen_ij.len(), n * (n + 1) / 2);
        }
    }

    #[test]
    fn test_index_monotonicity() {
        let n = 30;
        let idx = TriangularIndex::new(n);
        for i in 1..=n {
            for j in i + 1..=n {
                assert!(idx.ji(i, j) > idx.ji(i, j - 1));
            }
        }
        for j in 1..=n {
            for i in (1..j).rev() {
                assert!(idx.ij(i, j) > idx.ij(i + 1, j));
            }
        }
    }

    #[test]
    fn test_invert_out_of_range() {
        let idx = TriangularIndex::new(5);
        assert_eq!(idx.invert_ij(0), None);
        assert_eq!(idx.invert_ji(0), None);
        assert_eq!(idx.invert_ji(idx.size()), None);
        assert_eq!(idx.size(), 17);
    }
}
