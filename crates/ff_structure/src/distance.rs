use crate::PairTable;
use crate::StructureError;

/// Base-pair distance: the number of pairs present in exactly one of the
/// two structures.
pub fn bp_distance(a: &PairTable, b: &PairTable) -> Result<usize, StructureError> {
    if a.len() != b.len() {
        return Err(StructureError::LengthMismatch(a.len(), b.len()));
    }
    let mut dist = 0;
    for (i, (&pa, &pb)) in a.iter().zip(b.iter()).enumerate() {
        if pa == pb {
            continue;
        }
        if pa.is_some_and(|j| j > i) {
            dist += 1;
        }
        if pb.is_some_and(|j| j > i) {
            dist += 1;
        }
    }
    Ok(dist)
}

/// Number of pairs (p, q) of the structure with i <= p < q <= j (0-based,
/// inclusive).
pub fn pairs_within(pt: &PairTable, i: usize, j: usize) -> usize {
    (i..=j.min(pt.len().saturating_sub(1)))
        .filter(|&p| pt[p].is_some_and(|q| q > p && q <= j))
        .count()
}
