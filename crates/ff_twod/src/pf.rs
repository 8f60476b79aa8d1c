//! Partition function per distance class.

use log::info;
use colored::*;

use ff_fold::ExteriorLoop;
use ff_fold::FoldError;
use ff_fold::LoopWeights;

use crate::DistanceFold;
use crate::SumProduct;
use crate::TwoDError;
use crate::TwoDMatrices;
use crate::TwoDSolution;
use crate::engine::TwoDFill;
use crate::fold::solution_list;

impl DistanceFold {
    /// Fill the partition function distance class arrays. The values are
    /// scaled by `pf_scale^-L` for the L nucleotides they cover, with
    /// `pf_scale` chosen as for the unrestricted partition function.
    pub fn pf_classes(&mut self) -> Result<TwoDMatrices<SumProduct>, TwoDError> {
        self.fc.prepare_pf_scale()?;
        let bp = self.fc.exp_params().ok_or(FoldError::MissingParameters("partition function"))?;
        let scale = bp.scale_factors(self.fc.len());
        let ml_base = bp.ml_base_factors(self.fc.len(), self.fc.n_seq());
        let weights = LoopWeights::new(&self.fc, bp, &scale).with_ml_base(&ml_base);
        let m = TwoDFill::new(&self.fc, weights, &self.refs, self.bounds).run();
        let z = m.total().total();
        if !z.is_finite() || z <= 0.0 {
            return Err(TwoDError::Fold(FoldError::NoValidEnsemble(z)));
        }
        Ok(m)
    }

    /// Ensemble free energy per distance class, followed by the remainder
    /// and the end sentinel.
    pub fn pf(&mut self) -> Result<Vec<TwoDSolution>, TwoDError> {
        self.pf_exterior(ExteriorLoop::Total)
    }

    /// As [`DistanceFold::pf`], for the structures of a circular molecule
    /// whose exterior loop is of the given type.
    pub fn pf_exterior(&mut self, which: ExteriorLoop) -> Result<Vec<TwoDSolution>, TwoDError> {
        if which != ExteriorLoop::Total && !self.fc.is_circular() {
            return Err(TwoDError::Unsupported("exterior loop types of linear molecules"));
        }
        let m = self.pf_classes()?;
        let bp = self.fc.exp_params().ok_or(FoldError::MissingParameters("partition function"))?;
        let n = self.fc.len();
        let classes = m.exterior(which);
        info!("{} {:.4} kcal/mol over {} classes",
            "2D ensemble energy:".green(),
            bp.ensemble_energy(classes.total(), n),
            classes.iter().count());
        solution_list(classes, |q: f64| bp.ensemble_energy(q, n), |_, _| Ok(None))
    }
}
