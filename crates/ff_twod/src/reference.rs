//! The two reference structures and their pair counts per interval.

use ff_structure::PairTable;
use ff_structure::bp_distance;
use ff_fold::TriangularIndex;

use crate::TwoDError;

/// Pair tables of the two references together with, for every interval
/// [i, j], the number of reference pairs (p, q) with i <= p < q <= j.
#[derive(Debug, Clone)]
pub struct ReferencePairs {
    index: TriangularIndex,
    pt1: PairTable,
    pt2: PairTable,
    within1: Vec<u32>,
    within2: Vec<u32>,
}

fn parse(structure: &str, n: usize) -> Result<PairTable, TwoDError> {
    let pt = PairTable::try_from(structure)?;
    if pt.len() != n {
        return Err(TwoDError::LengthMismatch(pt.len(), n));
    }
    Ok(pt)
}

/// Interval pair counts, filled from the 3' end.
fn count_within(pt: &PairTable, index: &TriangularIndex) -> Vec<u32> {
    let n = index.len();
    let mut within = vec![0; index.size()];
    for i in (1..=n).rev() {
        for j in i..=n {
            let inner = if i < j { within[index.ij(i + 1, j)] } else { 0 };
            let opens = pt[i - 1].is_some_and(|q| q + 1 > i && q < j);
            within[index.ij(i, j)] = inner + opens as u32;
        }
    }
    within
}

impl ReferencePairs {
    pub fn new(ref1: &str, ref2: &str, n: usize) -> Result<Self, TwoDError> {
        let pt1 = parse(ref1, n)?;
        let pt2 = parse(ref2, n)?;
        let index = TriangularIndex::new(n);
        let within1 = count_within(&pt1, &index);
        let within2 = count_within(&pt2, &index);
        Ok(ReferencePairs { index, pt1, pt2, within1, within2 })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first(&self) -> &PairTable {
        &self.pt1
    }

    pub fn second(&self) -> &PairTable {
        &self.pt2
    }

    /// Number of reference pairs of both references within [i, j] (0 for
    /// an empty interval).
    #[inline]
    pub fn within(&self, i: usize, j: usize) -> (i64, i64) {
        if i == 0 || j < i || j > self.len() {
            return (0, 0);
        }
        let ij = self.index.ij(i, j);
        (self.within1[ij] as i64, self.within2[ij] as i64)
    }

    /// The distance shift of a decomposition of [i, j] into the given
    /// disjoint sub-intervals: every reference pair of [i, j] outside the
    /// sub-intervals is missing from the structure.
    #[inline]
    pub fn shift(&self, i: usize, j: usize, parts: &[(usize, usize)]) -> (i64, i64) {
        let (mut d1, mut d2) = self.within(i, j);
        for &(p, q) in parts {
            let (a, b) = self.within(p, q);
            d1 -= a;
            d2 -= b;
        }
        (d1, d2)
    }

    /// The distance shift of closing [i, j] with the pair (i, j) around the
    /// given sub-intervals.
    #[inline]
    pub fn pair_shift(&self, i: usize, j: usize, parts: &[(usize, usize)]) -> (i64, i64) {
        let (d1, d2) = self.shift(i, j, parts);
        let own = |pt: &PairTable| if pt[i - 1] == Some(j - 1) { -1 } else { 1 };
        (d1 + own(&self.pt1), d2 + own(&self.pt2))
    }

    /// Base-pair distances of a structure to both references.
    pub fn distances(&self, structure: &str) -> Result<(usize, usize), TwoDError> {
        let pt = parse(structure, self.len())?;
        Ok((bp_distance(&pt, &self.pt1)?, bp_distance(&pt, &self.pt2)?))
    }

    /// Upper bounds of the two distances over all structures.
    pub fn max_distances(&self) -> (usize, usize) {
        let n = self.len();
        (self.pt1.num_pairs() + n / 2, self.pt2.num_pairs() + n / 2)
    }
}
