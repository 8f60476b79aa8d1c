//! Boltzmann weights for the partition function.

use log::info;

use crate::EnergyParams;
use crate::ModelDetails;
use crate::ParamError;
use crate::INF;
use crate::GASCONST;
use crate::K0;

/// The Boltzmann counterpart of [`EnergyParams`].
///
/// Loop weights are derived from the (temperature-scaled) free energies on
/// demand, `exp(-E / kT)`, where the thermal energy `kT` includes the
/// independent scaling factor `beta_scale` of the model. The free energy
/// parameters are kept so that a minimum free energy estimate (for the
/// choice of `pf_scale`) uses exactly the same model.
#[derive(Debug, Clone)]
pub struct BoltzmannParams {
    pub energy: EnergyParams,
    /// Thermal energy in cal/mol.
    pub kt: f64,
    /// Per-nucleotide scaling factor of partition function entries.
    pub pf_scale: f64,
}

impl BoltzmannParams {
    pub fn new(model: &ModelDetails) -> Result<Self, ParamError> {
        Ok(Self::from_energy_params(EnergyParams::new(model)?))
    }

    pub fn from_energy_params(energy: EnergyParams) -> Self {
        let model = &energy.model;
        let kt = (model.temperature + K0) * GASCONST * model.beta_scale;
        let pf_scale = model.pf_scale.unwrap_or(1.0);
        BoltzmannParams { energy, kt, pf_scale }
    }

    /// Weight of a free energy (dcal/mol) summed over `n_seq` aligned sequences.
    pub fn boltzmann(&self, energy: i32, n_seq: usize) -> f64 {
        if energy >= INF {
            return 0.0;
        }
        (-(energy as f64) * 10.0 / (self.kt * n_seq as f64)).exp()
    }

    /// Free energy (kcal/mol) of a partition function that was computed
    /// with `scale` applied to each of `n` nucleotides.
    pub fn ensemble_energy(&self, q: f64, n: usize) -> f64 {
        -self.kt * (q.ln() + n as f64 * self.pf_scale.ln()) / 1000.0
    }

    /// Choose the scaling factor from a minimum free energy estimate
    /// (dcal/mol, per sequence) of a molecule of length `n`.
    pub fn estimate_pf_scale(&mut self, mfe: i32, n: usize) -> f64 {
        let sfact = self.energy.model.sfact;
        let scale = if n == 0 || mfe >= INF {
            1.0
        } else {
            (-(sfact * mfe as f64 * 10.0) / (self.kt * n as f64)).exp()
        };
        info!("Partition function scaling factor: {:.6} (mfe estimate {:.2} kcal/mol)",
            scale, mfe as f64 / 100.0);
        self.pf_scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        self.pf_scale
    }

    /// Scaling factors `pf_scale^-L` for L = 0..=n+1.
    pub fn scale_factors(&self, n: usize) -> Vec<f64> {
        let inv = 1.0 / self.pf_scale;
        let mut scale = Vec::with_capacity(n + 2);
        let mut s = 1.0;
        for _ in 0..n + 2 {
            scale.push(s);
            s *= inv;
        }
        scale
    }

    /// Weights of `L` unpaired multi-loop nucleotides, L = 0..=n+1.
    pub fn ml_base_factors(&self, n: usize, n_seq: usize) -> Vec<f64> {
        let w = self.boltzmann(self.energy.ml_base, n_seq).powi(n_seq as i32);
        let mut out = Vec::with_capacity(n + 2);
        let mut x = 1.0;
        for _ in 0..n + 2 {
            out.push(x);
            x *= w;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boltzmann_factors() {
        let bp = BoltzmannParams::new(&ModelDetails::default()).unwrap();
        assert!((bp.kt - 616.3207).abs() < 1e-3);
        assert_eq!(bp.boltzmann(0, 1), 1.0);
        assert_eq!(bp.boltzmann(INF, 1), 0.0);
        // Aligned energies are averaged over the sequences.
        assert!((bp.boltzmann(-200, 2) - bp.boltzmann(-100, 1)).abs() < 1e-12);
        assert!(bp.boltzmann(-100, 1) > 1.0);
    }

    #[test]
    fn test_scaling() {
        let mut bp = BoltzmannParams::new(&ModelDetails::default()).unwrap();
        assert_eq!(bp.pf_scale, 1.0);
        let s = bp.estimate_pf_scale(-1000, 50);
        assert!(s > 1.0);
        let factors = bp.scale_factors(10);
        assert_eq!(factors.len(), 12);
        assert_eq!(factors[0], 1.0);
        assert!((factors[3] * s.powi(3) - 1.0).abs() < 1e-12);

        let ml = bp.ml_base_factors(10, 3);
        assert_eq!(ml.len(), 12);
        assert_eq!(ml[0], 1.0);
        assert!((ml[4] - bp.boltzmann(4 * bp.energy.ml_base, 1)).abs() < 1e-12);

        // Unscaling recovers the ensemble energy.
        let q = bp.boltzmann(-500, 1) * factors[10];
        assert!((bp.ensemble_energy(q, 10) + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_beta_scale() {
        let md = ModelDetails { beta_scale: 2.0, ..Default::default() };
        let bp = BoltzmannParams::new(&md).unwrap();
        let bp1 = BoltzmannParams::new(&ModelDetails::default()).unwrap();
        assert!((bp.kt - 2.0 * bp1.kt).abs() < 1e-9);
        assert!((bp.boltzmann(-200, 1) - bp1.boltzmann(-100, 1)).abs() < 1e-12);
    }
}
