
use std::fmt;
use std::ops::Deref;
use std::ops::DerefMut;
use std::convert::TryFrom;

use crate::PairTable;
use crate::StructureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DotBracket {
    Unpaired,   // '.'
    Open,       // '('
    Close,      // ')'
    Quadruplex, // '+', a G-quadruplex layer nucleotide
}

impl TryFrom<char> for DotBracket {
    type Error = StructureError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '.' => Ok(DotBracket::Unpaired),
            '(' => Ok(DotBracket::Open),
            ')' => Ok(DotBracket::Close),
            '+' => Ok(DotBracket::Quadruplex),
            _ => Err(StructureError::InvalidToken(c.to_string(), "dot-bracket".into(), 0)),
        }
    }
}

impl From<DotBracket> for char {
    fn from(db: DotBracket) -> Self {
        match db {
            DotBracket::Open => '(',
            DotBracket::Close => ')',
            DotBracket::Unpaired => '.',
            DotBracket::Quadruplex => '+',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DotBracketVec(pub Vec<DotBracket>);

impl Deref for DotBracketVec {
    type Target = [DotBracket];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DotBracketVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl TryFrom<&str> for DotBracketVec {
    type Error = StructureError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut vec = Vec::with_capacity(s.len());
        for (i, c) in s.chars().enumerate() {
            match DotBracket::try_from(c) {
                Ok(db) => vec.push(db),
                Err(StructureError::InvalidToken(tok, src, _)) => {
                    return Err(StructureError::InvalidToken(tok, src, i));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(DotBracketVec(vec))
    }
}

impl From<&PairTable> for DotBracketVec {
    fn from(pt: &PairTable) -> Self {
        let mut result: Vec<DotBracket> = Vec::with_capacity(pt.len());
        for (i, &j_opt) in pt.iter().enumerate() {
            match j_opt {
                None => result.push(DotBracket::Unpaired),
                Some(j) if j > i => result.push(DotBracket::Open),
                Some(j) if j < i => result.push(DotBracket::Close),
                Some(_) => {
                    unreachable!("PairTable construction prevents self-pairing! ({})", i);
                }
            }
        }
        DotBracketVec(result)
    }
}

impl DotBracketVec {
    /// An open chain of the given length.
    pub fn unpaired(len: usize) -> Self {
        DotBracketVec(vec![DotBracket::Unpaired; len])
    }

    /// Mark the layers of a G-quadruplex starting at (0-based) `start`.
    pub fn mark_quadruplex(&mut self, start: usize, layers: usize, linkers: [usize; 3]) {
        let mut p = start;
        for l in 0..4 {
            for k in 0..layers {
                self.0[p + k] = DotBracket::Quadruplex;
            }
            p += layers;
            if l < 3 {
                p += linkers[l];
            }
        }
    }

    /// The (0-based, inclusive) spans of all G-quadruplexes: every four
    /// consecutive runs of '+' form one quadruplex.
    pub fn quadruplexes(&self) -> Result<Vec<(usize, usize)>, StructureError> {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        let mut i = 0;
        while i < self.len() {
            if self[i] == DotBracket::Quadruplex {
                let start = i;
                while i < self.len() && self[i] == DotBracket::Quadruplex {
                    i += 1;
                }
                runs.push((start, i - 1));
            } else {
                i += 1;
            }
        }
        if runs.len() % 4 != 0 {
            let last = runs.last().map(|r| r.0).unwrap_or(0);
            return Err(StructureError::InvalidToken("quadruplex".into(), "dot-bracket".into(), last));
        }
        Ok(runs.chunks(4).map(|c| (c[0].0, c[3].1)).collect())
    }
}

impl fmt::Display for DotBracketVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for db in &self.0 {
            write!(f, "{}", char::from(*db))?;
        }
        Ok(())
    }
}
