//! G-quadruplex free energies.
//!
//! A G-quadruplex of `L` stacked layers with three linkers of total length
//! `l_tot` has the free energy `α (L - 1) + β ln(l_tot - 2)`.

use ndarray::Array2;

use crate::INF;
use crate::K0;

pub const GQUAD_MIN_STACK_SIZE: usize = 2;
pub const GQUAD_MAX_STACK_SIZE: usize = 7;
pub const GQUAD_MIN_LINKER_LENGTH: usize = 1;
pub const GQUAD_MAX_LINKER_LENGTH: usize = 15;
pub const GQUAD_MIN_BOX_SIZE: usize = 4 * GQUAD_MIN_STACK_SIZE + 3 * GQUAD_MIN_LINKER_LENGTH;
pub const GQUAD_MAX_BOX_SIZE: usize = 4 * GQUAD_MAX_STACK_SIZE + 3 * GQUAD_MAX_LINKER_LENGTH;

const GQUAD_ALPHA37: f64 = -1800.;
const GQUAD_ALPHA_DH: f64 = -11934.;
const GQUAD_BETA37: f64 = 1200.;
const GQUAD_BETA_DH: f64 = 0.;

/// Energies indexed by `[layers][linker_total]`; impossible entries are INF.
pub fn gquad_energy_table(temperature: f64) -> Array2<i32> {
    let tt = (temperature + K0) / (37. + K0);
    let alpha = (GQUAD_ALPHA_DH - (GQUAD_ALPHA_DH - GQUAD_ALPHA37) * tt) as i32;
    let beta = GQUAD_BETA_DH - (GQUAD_BETA_DH - GQUAD_BETA37) * tt;

    let mut table = Array2::from_elem(
        (GQUAD_MAX_STACK_SIZE + 1, 3 * GQUAD_MAX_LINKER_LENGTH + 1), INF);
    for layers in GQUAD_MIN_STACK_SIZE..=GQUAD_MAX_STACK_SIZE {
        for l_tot in 3 * GQUAD_MIN_LINKER_LENGTH..=3 * GQUAD_MAX_LINKER_LENGTH {
            table[[layers, l_tot]] = alpha * (layers as i32 - 1)
                + (beta * ((l_tot - 2) as f64).ln()) as i32;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gquad_table_at_37() {
        let table = gquad_energy_table(37.0);
        assert_eq!(table[[2, 3]], -1800);
        assert_eq!(table[[3, 3]], -3600);
        assert_eq!(table[[2, 12]], -1800 + (1200. * 10f64.ln()) as i32);
        assert_eq!(table[[1, 3]], INF);
        assert_eq!(table[[2, 2]], INF);
        // More layers are more stable, longer linkers less.
        assert!(table[[4, 6]] < table[[3, 6]]);
        assert!(table[[3, 9]] > table[[3, 6]]);
    }

    #[test]
    fn test_gquad_box_sizes() {
        assert_eq!(GQUAD_MIN_BOX_SIZE, 11);
        assert_eq!(GQUAD_MAX_BOX_SIZE, 73);
    }
}
