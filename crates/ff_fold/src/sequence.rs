//! Sequence representations of a fold compound.
//!
//! All encodings are 1-based: position 0 and n+1 hold sentinels. Energy
//! evaluation works on [`EncodedRow`]s, so that a single sequence and each
//! sequence of an alignment are treated alike.

use std::fmt;
use itertools::Itertools;

use ff_energy::Base;
use ff_energy::NucleotideVec;
use ff_energy::PairTypeRNA;
use ff_energy::ModelDetails;
use ff_energy::SequenceError;

use crate::TriangularIndex;
use crate::FoldError;

const UNIT: f64 = 100.0;
const MIN_PSCORE: i32 = -2 * UNIT as i32;

/// One encoded sequence, as seen by the loop energy evaluation.
#[derive(Debug, Clone)]
pub struct EncodedRow {
    /// Bases with neutral sentinels, gaps are `N`.
    pub s: Vec<Base>,
    /// 5' neighbor of each position (next non-gap base upstream).
    pub s5: Vec<Option<Base>>,
    /// 3' neighbor of each position (next non-gap base downstream).
    pub s3: Vec<Option<Base>>,
    /// Number of (non-gap) nucleotides up to and including each column.
    pub a2s: Vec<usize>,
}

impl EncodedRow {
    fn new(bases: &[Option<Base>], circ: bool) -> Self {
        let n = bases.len();
        let mut s = vec![Base::N; n + 2];
        let mut a2s = vec![0; n + 2];
        for (k, b) in bases.iter().enumerate() {
            s[k + 1] = b.unwrap_or(Base::N);
            a2s[k + 1] = a2s[k] + usize::from(b.is_some());
        }
        a2s[n + 1] = a2s[n];

        let mut s5 = vec![None; n + 2];
        let mut s3 = vec![None; n + 2];
        let mut last = if circ { bases.iter().rev().find_map(|&b| b) } else { None };
        for i in 1..=n {
            s5[i] = last;
            if let Some(b) = bases[i - 1] {
                last = Some(b);
            }
        }
        let mut next = if circ { bases.iter().find_map(|&b| b) } else { None };
        for i in (1..=n).rev() {
            s3[i] = next;
            if let Some(b) = bases[i - 1] {
                next = Some(b);
            }
        }
        EncodedRow { s, s5, s3, a2s }
    }

    /// Type of the pair (i, j) in this row; non-canonical pairs are `NN`.
    #[inline]
    pub fn pair_type(&self, model: &ModelDetails, i: usize, j: usize) -> PairTypeRNA {
        model.pair_type(self.s[i], self.s[j]).unwrap_or(PairTypeRNA::NN)
    }

    /// Whether column k holds a gap.
    #[inline]
    pub fn is_gap(&self, k: usize) -> bool {
        self.nucleotides(k, k) == 0
    }

    /// Number of nucleotides in the columns i..=j.
    #[inline]
    pub fn nucleotides(&self, i: usize, j: usize) -> usize {
        if j < i { 0 } else { self.a2s[j] - self.a2s[i - 1] }
    }
}

#[derive(Debug, Clone)]
pub struct SingleSequence {
    pub sequence: NucleotideVec,
    /// Encoding with neutral sentinels.
    pub s: Vec<Base>,
    /// Encoding with circular sentinels: s1[0] = s[n], s1[n+1] = s[1].
    pub s1: Vec<Base>,
    /// Pair types by `ji(i, j)`; `None` where the model forbids the pair.
    pub ptype: Vec<Option<PairTypeRNA>>,
    row: EncodedRow,
}

impl SingleSequence {
    pub fn new(sequence: NucleotideVec, model: &ModelDetails, index: &TriangularIndex) -> Self {
        let n = sequence.len();
        let bases: Vec<Option<Base>> = sequence.iter().map(|&b| Some(b)).collect();
        let row = EncodedRow::new(&bases, model.circ);
        let s = row.s.clone();
        let mut s1 = s.clone();
        s1[0] = s[n];
        s1[n + 1] = s[1];

        let mut ptype = vec![None; index.size()];
        for j in 1..=n {
            for i in 1..j {
                ptype[index.ji(i, j)] = model.pair_type(s[i], s[j]);
            }
        }
        SingleSequence { sequence, s, s1, ptype, row }
    }
}

#[derive(Debug, Clone)]
pub struct AlignedSequences {
    /// The aligned input rows, gaps included.
    pub sequences: Vec<String>,
    pub consensus: NucleotideVec,
    /// Encoding of the consensus sequence.
    pub s_cons: Vec<Base>,
    /// Covariance scores by `ji(i, j)`; `None` for pairs that too many
    /// sequences cannot form.
    pub pscore: Vec<Option<i32>>,
    rows: Vec<EncodedRow>,
}

fn is_gap(c: char) -> bool {
    matches!(c, '-' | '.' | '_' | '~')
}

/// Hamming distance of two pair types.
fn pair_distance(a: PairTypeRNA, b: PairTypeRNA) -> usize {
    match (a.bases(), b.bases()) {
        (Some((a1, a2)), Some((b1, b2))) => usize::from(a1 != b1) + usize::from(a2 != b2),
        _ => 0,
    }
}

impl AlignedSequences {
    pub fn new(sequences: &[&str], model: &ModelDetails, index: &TriangularIndex) -> Result<Self, FoldError> {
        let n = index.len();
        let mut columns: Vec<Vec<Option<Base>>> = Vec::with_capacity(sequences.len());
        for seq in sequences {
            let row = seq.chars()
                .map(|c| if is_gap(c) { Ok(None) } else { Base::try_from(c).map(Some) })
                .collect::<Result<Vec<_>, SequenceError>>()?;
            debug_assert_eq!(row.len(), n);
            columns.push(row);
        }
        let rows: Vec<EncodedRow> = columns.iter()
            .map(|bases| EncodedRow::new(bases, model.circ))
            .collect();

        let consensus = NucleotideVec((0..n).map(|k| {
            let counts = columns.iter()
                .filter_map(|r| r[k])
                .filter(|&b| b != Base::N)
                .counts();
            [Base::A, Base::C, Base::G, Base::U].into_iter()
                .filter(|b| counts.contains_key(b))
                .max_by_key(|b| (counts[b], std::cmp::Reverse(*b as usize)))
                .unwrap_or(Base::N)
        }).collect());
        let mut s_cons = vec![Base::N; n + 2];
        for (k, &b) in consensus.iter().enumerate() {
            s_cons[k + 1] = b;
        }

        let n_seq = rows.len();
        let mut pscore = vec![None; index.size()];
        for j in 1..=n {
            for i in 1..j {
                pscore[index.ji(i, j)] = Self::covariance(&rows, model, i, j, n_seq);
            }
        }

        Ok(AlignedSequences {
            sequences: sequences.iter().map(|s| s.to_string()).collect(),
            consensus,
            s_cons,
            pscore,
            rows,
        })
    }

    /// Consensus pair score: covariation bonus minus a penalty for
    /// sequences that cannot form the pair.
    fn covariance(rows: &[EncodedRow], model: &ModelDetails, i: usize, j: usize, n_seq: usize) -> Option<i32> {
        if j - i <= model.min_loop_size {
            return None;
        }
        // Index 0 counts non-compatible sequences, 7 gap-gap columns.
        let mut pfreq = [0usize; 8];
        let mut types = Vec::with_capacity(n_seq);
        for row in rows {
            let (a, b) = (row.s[i], row.s[j]);
            match model.pair_type(a, b) {
                Some(pt) => types.push(pt),
                None if a == Base::N && b == Base::N => pfreq[7] += 1,
                None => pfreq[0] += 1,
            }
        }
        if 2 * pfreq[0] + pfreq[7] > n_seq {
            return None;
        }
        let mut score = 0;
        for (k, &a) in types.iter().enumerate() {
            for &b in &types[k + 1..] {
                score += pair_distance(a, b);
            }
        }
        let pscore = UNIT * score as f64 / n_seq as f64
            - UNIT * (pfreq[0] as f64 + 0.25 * pfreq[7] as f64);
        let pscore = pscore as i32;
        (pscore >= MIN_PSCORE).then_some(pscore)
    }
}

/// The two mutually exclusive sequence representations.
#[derive(Debug, Clone)]
pub enum SequenceData {
    Single(SingleSequence),
    Alignment(AlignedSequences),
}

impl SequenceData {
    pub fn rows(&self) -> &[EncodedRow] {
        match self {
            SequenceData::Single(s) => std::slice::from_ref(&s.row),
            SequenceData::Alignment(a) => &a.rows,
        }
    }

    pub fn n_seq(&self) -> usize {
        self.rows().len()
    }

    pub fn is_alignment(&self) -> bool {
        matches!(self, SequenceData::Alignment(_))
    }

    /// Encoding of the single sequence, or of the consensus.
    pub fn encoding(&self) -> &[Base] {
        match self {
            SequenceData::Single(s) => &s.s,
            SequenceData::Alignment(a) => &a.s_cons,
        }
    }

    /// The energy contribution (per alignment, dcal/mol) of forming the
    /// pair at offset `ji`, or `None` if the pair cannot form.
    #[inline]
    pub fn pair_contribution(&self, ji: usize) -> Option<i32> {
        match self {
            SequenceData::Single(s) => s.ptype[ji].map(|_| 0),
            SequenceData::Alignment(a) => a.pscore[ji].map(|p| -p),
        }
    }
}

impl fmt::Display for SequenceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceData::Single(s) => write!(f, "{}", s.sequence),
            SequenceData::Alignment(a) => write!(f, "{}", a.consensus),
        }
    }
}
