use std::ops::{Deref, DerefMut};
use std::convert::TryFrom;
use crate::StructureError;
use crate::{DotBracket, DotBracketVec};

/// A 0-based pair table: `pt[i] == Some(j)` iff i and j form a base pair.
/// G-quadruplex layers ('+') are unpaired in the pair table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairTable(pub Vec<Option<usize>>);

impl PairTable {
    /// Check if the substructure from `i..j` is well-formed:
    /// - All pairings are internal to the interval
    pub fn is_well_formed(&self, i: usize, j: usize) -> bool {
        assert!(j <= self.len(), "Invalid interval: j must be <= length");

        for k in i..j {
            if let Some(l) = self[k] {
                if l < i || l >= j {
                    return false; // points outside
                }
            }
        }
        true
    }

    /// Build a pair table of length `len` from a list of (0-based) pairs.
    pub fn from_pairs(len: usize, pairs: &[(usize, usize)]) -> Result<Self, StructureError> {
        let mut table = vec![None; len];
        for &(i, j) in pairs {
            if i >= len || j >= len || i == j {
                return Err(StructureError::InvalidPairTable(i.max(j)));
            }
            if table[i].is_some() {
                return Err(StructureError::InvalidPairTable(i));
            }
            if table[j].is_some() {
                return Err(StructureError::InvalidPairTable(j));
            }
            table[i] = Some(j);
            table[j] = Some(i);
        }
        Ok(PairTable(table))
    }

    /// All pairs (i, j) with i < j in 5' to 3' order of i.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.iter()
            .enumerate()
            .filter_map(|(i, &j)| j.filter(|&j| j > i).map(|j| (i, j)))
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs().count()
    }

    /// Is the structure free of crossing pairs?
    pub fn is_nested(&self) -> bool {
        let mut stack: Vec<usize> = Vec::new();
        for (i, &j) in self.iter().enumerate() {
            match j {
                Some(j) if j > i => stack.push(j),
                Some(j) if j < i => {
                    if stack.pop() != Some(i) {
                        return false;
                    }
                }
                _ => (),
            }
        }
        stack.is_empty()
    }
}

impl Deref for PairTable {
    type Target = [Option<usize>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PairTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl TryFrom<&str> for PairTable {
    type Error = StructureError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut stack = Vec::new();
        let mut table = vec![None; s.chars().count()];

        for (i, c) in s.chars().enumerate() {
            match c {
                '(' => stack.push(i),
                ')' => {
                    let j = stack.pop().ok_or(StructureError::UnmatchedClose(i))?;
                    table[i] = Some(j);
                    table[j] = Some(i);
                }
                '.' | '+' => (),
                _ => return Err(StructureError::InvalidToken(format!("character '{}'", c), "structure".to_string(), i)),
            }
        }

        if let Some(i) = stack.pop() {
            return Err(StructureError::UnmatchedOpen(i));
        }
        Ok(PairTable(table))
    }
}

impl TryFrom<&DotBracketVec> for PairTable {
    type Error = StructureError;

    fn try_from(db: &DotBracketVec) -> Result<Self, Self::Error> {
        let mut stack: Vec<usize> = Vec::new();
        let mut table = vec![None; db.len()];

        for (i, dot) in db.iter().enumerate() {
            match dot {
                DotBracket::Open => stack.push(i),
                DotBracket::Close => {
                    let j = stack.pop().ok_or(StructureError::UnmatchedClose(i))?;
                    table[i] = Some(j);
                    table[j] = Some(i);
                }
                DotBracket::Unpaired | DotBracket::Quadruplex => {}
            }
        }

        if let Some(i) = stack.pop() {
            return Err(StructureError::UnmatchedOpen(i));
        }

        Ok(PairTable(table))
    }
}
