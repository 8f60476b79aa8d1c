use crate::Base;
use crate::PairTypeRNA;

/// Dangling end treatment at helix ends in exterior and multi-branch loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dangles {
    /// No dangles or terminal mismatches (d0).
    None,
    /// Unconditional mismatch / dangle energies for both neighbors (d2).
    Double,
}

/// Model settings shared by the MFE and partition function parameter sets.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDetails {
    /// Temperature in °C.
    pub temperature: f64,
    /// Scaling of the thermal energy in Boltzmann factors.
    pub beta_scale: f64,
    pub dangles: Dangles,
    pub no_gu: bool,
    pub special_hairpins: bool,
    pub gquad: bool,
    pub circ: bool,
    pub min_loop_size: usize,
    /// Fixed partition function scaling factor per nucleotide. `None`
    /// derives one from a minimum free energy estimate.
    pub pf_scale: Option<f64>,
    /// Factor applied to the MFE when estimating `pf_scale`.
    pub sfact: f64,
}

impl Default for ModelDetails {
    fn default() -> Self {
        ModelDetails {
            temperature: 37.0,
            beta_scale: 1.0,
            dangles: Dangles::Double,
            no_gu: false,
            special_hairpins: true,
            gquad: false,
            circ: false,
            min_loop_size: 3,
            pf_scale: None,
            sfact: 1.07,
        }
    }
}

impl ModelDetails {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_dangles(mut self, dangles: Dangles) -> Self {
        self.dangles = dangles;
        self
    }

    pub fn with_circ(mut self, circ: bool) -> Self {
        self.circ = circ;
        self
    }

    pub fn with_gquad(mut self, gquad: bool) -> Self {
        self.gquad = gquad;
        self
    }

    pub fn with_pf_scale(mut self, pf_scale: f64) -> Self {
        self.pf_scale = Some(pf_scale);
        self
    }

    /// The pair type of (b1, b2) if the model allows the pair.
    pub fn pair_type(&self, b1: Base, b2: Base) -> Option<PairTypeRNA> {
        let pt = PairTypeRNA::from((b1, b2));
        if !pt.can_pair() || (self.no_gu && pt.is_wobble()) {
            None
        } else {
            Some(pt)
        }
    }

    pub fn can_pair(&self, b1: Base, b2: Base) -> bool {
        self.pair_type(b1, b2).is_some()
    }
}
