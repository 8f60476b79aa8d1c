use log::info;
use colored::*;

use ff_energy::NucleotideVec;
use ff_energy::ModelDetails;
use ff_energy::EnergyParams;
use ff_energy::BoltzmannParams;

use crate::TriangularIndex;
use crate::SequenceData;
use crate::SingleSequence;
use crate::AlignedSequences;
use crate::EncodedRow;
use crate::HardConstraints;
use crate::SoftConstraintSet;
use crate::MfeMatrices;
use crate::PfMatrices;
use crate::FoldOptions;
use crate::AllocMask;
use crate::FoldError;

/// Everything the folding recursions read: the sequence (or alignment),
/// the index scheme, parameters, constraints and the matrices.
#[derive(Debug, Clone)]
pub struct FoldCompound {
    pub(crate) sequence: SequenceData,
    pub(crate) model: ModelDetails,
    pub(crate) options: FoldOptions,
    pub(crate) index: TriangularIndex,
    /// First nucleotide of the second strand of a hybrid (1-based).
    pub(crate) cut: Option<usize>,
    pub(crate) params: Option<EnergyParams>,
    pub(crate) exp_params: Option<BoltzmannParams>,
    pub(crate) hc: HardConstraints,
    pub(crate) sc: Option<SoftConstraintSet>,
    pub(crate) mfe_matrices: Option<MfeMatrices>,
    pub(crate) pf_matrices: Option<PfMatrices>,
}

fn construction<T>(msg: &str) -> Result<T, FoldError> {
    Err(FoldError::Construction(msg.to_string()))
}

impl FoldCompound {
    /// A compound for a single sequence. With [`FoldOptions::HYBRID`] the
    /// sequence consists of two strands separated by '&'.
    pub fn build(sequence: &str, model: &ModelDetails, options: FoldOptions) -> Result<Self, FoldError> {
        let (seq, cut) = NucleotideVec::from_strands(sequence)?;
        let hybrid = options.contains(FoldOptions::HYBRID);
        match (hybrid, cut) {
            (true, None) => return construction("hybrid folding requires a cut point ('&')"),
            (false, Some(_)) => return construction("cut point ('&') given without hybrid option"),
            _ => (),
        }
        if hybrid && model.circ {
            return construction("hybrids cannot be circular");
        }
        if hybrid && model.gquad {
            return construction("G-quadruplexes are not supported for hybrids");
        }
        if model.gquad && model.circ {
            return construction("G-quadruplexes are not supported for circular molecules");
        }

        let index = TriangularIndex::new(seq.len());
        let single = SingleSequence::new(seq, model, &index);
        Self::assemble(SequenceData::Single(single), model, options, index, cut)
    }

    /// A compound for a set of aligned sequences (gaps: `-`, `.`, `_`, `~`).
    pub fn build_aligned(sequences: &[&str], model: &ModelDetails, options: FoldOptions) -> Result<Self, FoldError> {
        let Some(first) = sequences.first() else {
            return construction("empty alignment");
        };
        let n = first.chars().count();
        if n == 0 {
            return construction("empty sequence");
        }
        if let Some(s) = sequences.iter().find(|s| s.chars().count() != n) {
            return Err(FoldError::Construction(format!(
                "aligned sequences differ in length ({} vs {})", s.chars().count(), n)));
        }
        if options.contains(FoldOptions::HYBRID) {
            return construction("hybrid folding of alignments is not supported");
        }
        if model.gquad {
            return construction("G-quadruplexes are not supported for alignments");
        }
        let index = TriangularIndex::new(n);
        let aligned = AlignedSequences::new(sequences, model, &index)?;
        Self::assemble(SequenceData::Alignment(aligned), model, options, index, None)
    }

    fn assemble(sequence: SequenceData,
        model: &ModelDetails,
        options: FoldOptions,
        index: TriangularIndex,
        cut: Option<usize>
    ) -> Result<Self, FoldError> {
        let params = if options.contains(FoldOptions::MFE) {
            Some(EnergyParams::new(model)?)
        } else {
            None
        };
        let exp_params = if options.contains(FoldOptions::PF) {
            Some(BoltzmannParams::new(model)?)
        } else {
            None
        };
        let n = index.len();
        info!("{} {} with {} sequence(s) of length {}{}",
            "Fold compound:".green(),
            if sequence.is_alignment() { "alignment" } else { "single sequence" },
            sequence.n_seq(),
            n,
            cut.map_or(String::new(), |c| format!(", cut point at {}", c)));
        Ok(FoldCompound {
            sequence,
            model: model.clone(),
            options,
            index,
            cut,
            params,
            exp_params,
            hc: HardConstraints::new(n),
            sc: None,
            mfe_matrices: None,
            pf_matrices: None,
        })
    }

    /// Replace the hard and soft constraints. `None` resets hard
    /// constraints to "everything allowed" and removes soft constraints.
    /// Previously computed matrices are discarded.
    pub fn attach_constraints(&mut self,
        hc: Option<HardConstraints>,
        sc: Option<SoftConstraintSet>
    ) -> Result<(), FoldError> {
        let n = self.len();
        if let Some(h) = &hc {
            if h.len() != n {
                return Err(FoldError::Construction(format!(
                    "hard constraints of length {} for sequence of length {}", h.len(), n)));
            }
        }
        if let Some(s) = &sc {
            s.validate(n, self.n_seq())?;
        }
        self.hc = hc.unwrap_or_else(|| HardConstraints::new(n));
        self.sc = sc;
        self.mfe_matrices = None;
        self.pf_matrices = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn n_seq(&self) -> usize {
        self.sequence.n_seq()
    }

    pub fn sequence(&self) -> &SequenceData {
        &self.sequence
    }

    pub(crate) fn rows(&self) -> &[EncodedRow] {
        self.sequence.rows()
    }

    pub fn model(&self) -> &ModelDetails {
        &self.model
    }

    pub fn options(&self) -> FoldOptions {
        self.options
    }

    pub fn index(&self) -> &TriangularIndex {
        &self.index
    }

    pub fn cut(&self) -> Option<usize> {
        self.cut
    }

    pub fn is_circular(&self) -> bool {
        self.model.circ
    }

    pub fn hard_constraints(&self) -> &HardConstraints {
        &self.hc
    }

    pub fn soft_constraints(&self) -> Option<&SoftConstraintSet> {
        self.sc.as_ref()
    }

    pub fn params(&self) -> Option<&EnergyParams> {
        self.params.as_ref()
    }

    pub fn exp_params(&self) -> Option<&BoltzmannParams> {
        self.exp_params.as_ref()
    }

    pub fn mfe_matrices(&self) -> Option<&MfeMatrices> {
        self.mfe_matrices.as_ref()
    }

    pub fn pf_matrices(&self) -> Option<&PfMatrices> {
        self.pf_matrices.as_ref()
    }

    /// Whether i and j are on the same strand.
    #[inline]
    pub fn same_strand(&self, i: usize, j: usize) -> bool {
        self.cut.is_none_or(|c| !(i < c && c <= j))
    }

    /// The free energy parameters, from either parameter set.
    pub(crate) fn energy_params(&self) -> Result<&EnergyParams, FoldError> {
        self.params.as_ref()
            .or(self.exp_params.as_ref().map(|bp| &bp.energy))
            .ok_or(FoldError::MissingParameters("energy evaluation"))
    }

    fn feature_mask(&self) -> AllocMask {
        let mut mask = AllocMask::NONE;
        if self.cut.is_some() {
            mask |= AllocMask::FC | AllocMask::HYBRID;
        }
        if self.model.circ {
            mask |= AllocMask::CIRC;
        }
        if self.model.gquad {
            mask |= AllocMask::GQUAD;
        }
        mask
    }

    /// The MFE arrays the recursions of this compound need.
    pub fn mfe_mask(&self) -> AllocMask {
        let mut mask = AllocMask::MFE_DEFAULT | self.feature_mask();
        if !self.model.circ && self.cut.is_none() {
            mask |= AllocMask::F3;
        }
        mask
    }

    /// The partition function arrays the recursions of this compound need.
    pub fn pf_mask(&self, with_probs: bool) -> AllocMask {
        let base = if with_probs { AllocMask::PF_DEFAULT } else { AllocMask::PF_WO_PROBS };
        base | self.feature_mask()
    }
}
