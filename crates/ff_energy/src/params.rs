//! Temperature-scaled free energy parameters and the loop energy functions
//! of the nearest neighbor model.

use ahash::AHashMap;
use log::debug;
use ndarray::Array2;

use crate::Base;
use crate::PairTypeRNA;
use crate::NucleotideVec;
use crate::EnergyTables;
use crate::ParamError;
use crate::ModelDetails;
use crate::Dangles;
use crate::gquad_energy_table;
use crate::BCOUNT as B;
use crate::PCOUNT as P;

/// Energy of a forbidden configuration (dcal/mol).
pub const INF: i32 = 10_000_000;

/// Maximal number of unpaired nucleotides in an interior loop.
pub const MAXLOOP: usize = 30;

/// 0 °C in Kelvin.
pub const K0: f64 = 273.15;

/// Gas constant in cal/(mol K).
pub const GASCONST: f64 = 1.98717;

type Mismatch = [[[i32; B]; B]; P];
type Int11 = [[[[Option<i32>; B]; B]; P]; P];
type Int21 = [[[[[Option<i32>; B]; B]; B]; P]; P];
type Int22 = [[[[[[Option<i32>; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1];

/// Free energy parameters (dcal/mol) at the temperature of the model.
#[derive(Debug, Clone)]
pub struct EnergyParams {
    pub model: ModelDetails,

    pub stack: [[i32; P]; P],
    pub hairpin: [i32; MAXLOOP + 1],
    pub bulge: [i32; MAXLOOP + 1],
    pub interior: [i32; MAXLOOP + 1],

    pub mismatch_hairpin: Mismatch,
    pub mismatch_interior: Mismatch,
    pub mismatch_interior_1n: Mismatch,
    pub mismatch_interior_23: Mismatch,
    pub mismatch_multi: Mismatch,
    pub mismatch_exterior: Mismatch,
    pub dangle5: [[i32; B]; P],
    pub dangle3: [[i32; B]; P],

    int11: Box<Int11>,
    int21: Box<Int21>,
    int22: Box<Int22>,

    pub ml_base: i32,
    pub ml_closing: i32,
    pub ml_intern: i32,
    pub ninio: i32,
    pub ninio_max: i32,
    pub terminal_au: i32,
    pub duplex_init: i32,
    pub lxc: f64,

    special_hairpins: AHashMap<NucleotideVec, i32>,
    gquad: Array2<i32>,
}

fn resolve<const N: usize>(values: &[Option<i32>; N]) -> [i32; N] {
    let mut out = [INF; N];
    for (o, v) in out.iter_mut().zip(values.iter()) {
        *o = v.unwrap_or(INF);
    }
    out
}

impl EnergyParams {
    /// Parameters from the built-in tables, rescaled to the model temperature.
    pub fn new(model: &ModelDetails) -> Result<Self, ParamError> {
        Self::from_tables(&EnergyTables::builtin()?, model)
    }

    pub fn from_tables(tables: &EnergyTables, model: &ModelDetails) -> Result<Self, ParamError> {
        let mut et = tables.clone();
        if (model.temperature - 37.0).abs() > f64::EPSILON {
            et.rescale((model.temperature + K0) / (37.0 + K0));
        }

        if et.stack.iter().flatten().all(|v| v.is_none()) {
            return Err(ParamError::MissingValue("stack", 0));
        }
        if et.hairpin.iter().all(|v| v.is_none()) {
            return Err(ParamError::MissingValue("hairpin", 0));
        }

        let dangle5 = et.dangle5.map(|row| row.map(|v| v.unwrap_or(0)));
        let dangle3 = et.dangle3.map(|row| row.map(|v| v.unwrap_or(0)));

        // Missing terminal mismatches of exterior and multi-branch loops
        // are the sum of both dangles, all other mismatches vanish.
        let dangle_sum = |table: &[[[Option<i32>; B]; B]; P]| {
            let mut out = [[[0; B]; B]; P];
            for p in 0..P {
                for i in 0..B {
                    for j in 0..B {
                        out[p][i][j] = table[p][i][j].unwrap_or(dangle5[p][i] + dangle3[p][j]);
                    }
                }
            }
            out
        };
        let zero_default = |table: &[[[Option<i32>; B]; B]; P]| {
            table.map(|m5| m5.map(|m3| m3.map(|v| v.unwrap_or(0))))
        };

        let special_hairpins = if model.special_hairpins {
            et.hairpin_sequences.iter().map(|(k, &(g, _))| (k.clone(), g)).collect()
        } else {
            AHashMap::default()
        };

        debug!("Energy parameters at {:.2}°C ({} special hairpins)",
            model.temperature, special_hairpins.len());

        Ok(EnergyParams {
            model: model.clone(),
            stack: et.stack.map(|row| row.map(|v| v.unwrap_or(INF))),
            hairpin: resolve(&et.hairpin),
            bulge: resolve(&et.bulge),
            interior: resolve(&et.interior),
            mismatch_hairpin: zero_default(&et.mismatch_hairpin),
            mismatch_interior: zero_default(&et.mismatch_interior),
            mismatch_interior_1n: zero_default(&et.mismatch_interior_1n),
            mismatch_interior_23: zero_default(&et.mismatch_interior_23),
            mismatch_multi: dangle_sum(&et.mismatch_multi),
            mismatch_exterior: dangle_sum(&et.mismatch_exterior),
            dangle5,
            dangle3,
            int11: et.int11,
            int21: et.int21,
            int22: et.int22,
            ml_base: et.ml_params.base_en37,
            ml_closing: et.ml_params.closing_en37,
            ml_intern: et.ml_params.intern_en37,
            ninio: et.ninio.en37,
            ninio_max: et.ninio.max,
            terminal_au: et.misc.terminal_ru_en37,
            duplex_init: et.misc.duplex_initiation_en37,
            lxc: et.misc.lxc,
            special_hairpins,
            gquad: gquad_energy_table(model.temperature),
        })
    }

    pub fn temperature(&self) -> f64 {
        self.model.temperature
    }

    /// Logarithmic extrapolation for loops beyond the tabulated size.
    pub fn loop_extrapolation(&self, size: usize) -> i32 {
        (self.lxc * (size as f64 / MAXLOOP as f64).ln()) as i32
    }

    fn loop_table(&self, table: &[i32; MAXLOOP + 1], size: usize) -> i32 {
        if size <= MAXLOOP {
            table[size]
        } else if table[MAXLOOP] >= INF {
            INF
        } else {
            table[MAXLOOP] + self.loop_extrapolation(size)
        }
    }

    fn terminal(&self, pt: PairTypeRNA) -> i32 {
        if pt.is_terminal_penalized() { self.terminal_au } else { 0 }
    }

    /// Hairpin loop of `size` unpaired nucleotides closed by a pair of type
    /// `pt` with the mismatching neighbors `si1` (i+1) and `sj1` (j-1).
    /// `loop_seq` is the sequence from i to j, used for special hairpins.
    pub fn hairpin(&self,
        size: usize,
        pt: PairTypeRNA,
        si1: Base,
        sj1: Base,
        loop_seq: Option<&[Base]>,
    ) -> i32 {
        let mut e = self.loop_table(&self.hairpin, size);
        if e >= INF || size < 3 {
            return e;
        }

        if let Some(seq) = loop_seq {
            if matches!(size, 3 | 4 | 6) && seq.len() == size + 2 {
                if let Some(&en) = self.special_hairpins.get(seq) {
                    return en;
                }
            }
        }

        if size == 3 {
            return e + self.terminal(pt);
        }
        e += self.mismatch_hairpin[pt as usize][si1 as usize][sj1 as usize];
        e
    }

    /// Interior loop (including stacks and bulges) closed by (i,j) of type
    /// `pt` and enclosing (p,q), where `pt2` is the type of the reversed
    /// inner pair (q,p). `n1 = p-i-1`, `n2 = j-q-1`; the mismatching
    /// neighbors are i+1, j-1, p-1 and q+1.
    #[allow(clippy::too_many_arguments)]
    pub fn interior(&self,
        n1: usize,
        n2: usize,
        pt: PairTypeRNA,
        pt2: PairTypeRNA,
        si1: Base,
        sj1: Base,
        sp1: Base,
        sq1: Base,
    ) -> i32 {
        let (ns, nl) = if n1 > n2 { (n2, n1) } else { (n1, n2) };
        let (t1, t2) = (pt as usize, pt2 as usize);

        if nl == 0 {
            return self.stack[t1][t2];
        }

        if ns == 0 {
            let mut e = self.loop_table(&self.bulge, nl);
            if e >= INF {
                return INF;
            }
            if nl == 1 {
                e += self.stack[t1][t2];
            } else {
                e += self.terminal(pt) + self.terminal(pt2);
            }
            return e;
        }

        if ns == 1 {
            if nl == 1 {
                if let Some(e) = self.int11[t1][t2][si1 as usize][sj1 as usize] {
                    return e;
                }
            } else if nl == 2 {
                let e = if n1 == 1 {
                    self.int21[t1][t2][si1 as usize][sq1 as usize][sj1 as usize]
                } else {
                    self.int21[t2][t1][sq1 as usize][si1 as usize][sp1 as usize]
                };
                if let Some(e) = e {
                    return e;
                }
            }
            let e = self.loop_table(&self.interior, nl + 1);
            if e >= INF {
                return INF;
            }
            return e
                + self.ninio_max.min((nl - ns) as i32 * self.ninio)
                + self.mismatch_interior_1n[t1][si1 as usize][sj1 as usize]
                + self.mismatch_interior_1n[t2][sq1 as usize][sp1 as usize];
        }

        if ns == 2 {
            if nl == 2 {
                if let Some(e) = self.int22_entry(pt, pt2, [si1, sp1, sq1, sj1]) {
                    return e;
                }
            } else if nl == 3 {
                let e = self.interior[5];
                if e >= INF {
                    return INF;
                }
                return e + self.ninio
                    + self.mismatch_interior_23[t1][si1 as usize][sj1 as usize]
                    + self.mismatch_interior_23[t2][sq1 as usize][sp1 as usize];
            }
        }

        let e = self.loop_table(&self.interior, n1 + n2);
        if e >= INF {
            return INF;
        }
        e + self.ninio_max.min((nl - ns) as i32 * self.ninio)
          + self.mismatch_interior[t1][si1 as usize][sj1 as usize]
          + self.mismatch_interior[t2][sq1 as usize][sp1 as usize]
    }

    fn int22_entry(&self, pt: PairTypeRNA, pt2: PairTypeRNA, bases: [Base; 4]) -> Option<i32> {
        if !pt.can_pair() || !pt2.can_pair() || bases.contains(&Base::N) {
            return None;
        }
        let [a, b, c, d] = bases.map(|x| x as usize);
        self.int22[pt as usize][pt2 as usize][a][b][c][d]
    }

    fn stem(&self, mismatch: &Mismatch, pt: PairTypeRNA, n5d: Option<Base>, n3d: Option<Base>) -> i32 {
        let t = pt as usize;
        let mut e = match (self.model.dangles, n5d, n3d) {
            (Dangles::None, _, _) => 0,
            (Dangles::Double, Some(a), Some(b)) => mismatch[t][a as usize][b as usize],
            (Dangles::Double, Some(a), None) => self.dangle5[t][a as usize],
            (Dangles::Double, None, Some(b)) => self.dangle3[t][b as usize],
            (Dangles::Double, None, None) => 0,
        };
        e += self.terminal(pt);
        e
    }

    /// A helix end of type `pt` in the exterior loop with its 5' and 3'
    /// neighbors (if any).
    pub fn exterior_stem(&self, pt: PairTypeRNA, n5d: Option<Base>, n3d: Option<Base>) -> i32 {
        self.stem(&self.mismatch_exterior, pt, n5d, n3d)
    }

    /// A helix end of type `pt` in a multi-branch loop. For the closing pair
    /// (i,j) use the reversed type and the neighbors j-1 and i+1.
    pub fn multi_stem(&self, pt: PairTypeRNA, n5d: Option<Base>, n3d: Option<Base>) -> i32 {
        self.stem(&self.mismatch_multi, pt, n5d, n3d) + self.ml_intern
    }

    /// A G-quadruplex with the given number of layers and total linker length.
    pub fn gquad(&self, layers: usize, linker_total: usize) -> i32 {
        self.gquad.get([layers, linker_total]).copied().unwrap_or(INF)
    }

    pub fn gquad_table(&self) -> &Array2<i32> {
        &self.gquad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Base::*;
    use PairTypeRNA::*;

    fn params() -> EnergyParams {
        EnergyParams::new(&ModelDetails::default()).unwrap()
    }

    #[test]
    fn test_stacking() {
        let p = params();
        // 5'-CG-3' / 3'-GC-5'
        assert_eq!(p.interior(0, 0, CG, CG, N, N, N, N), -240);
        assert_eq!(p.interior(0, 0, GC, CG, N, N, N, N), -330);
        assert_eq!(p.interior(0, 0, CG, GC, N, N, N, N), -330);
    }

    #[test]
    fn test_hairpins() {
        let p = params();
        assert_eq!(p.hairpin(3, GC, A, A, Some(&[G, A, A, A, C])), 540);
        assert_eq!(p.hairpin(3, AU, A, A, Some(&[A, A, A, A, U])), 590);
        assert_eq!(p.hairpin(3, NN, A, A, Some(&[C, A, A, A, C])), 590);
        // Special tetraloop.
        assert_eq!(p.hairpin(4, CG, C, A, Some(&[C, C, G, A, G, G])), 350);
        // Too small.
        assert_eq!(p.hairpin(2, CG, A, A, None), INF);
        // Extrapolation beyond 30.
        let e31 = p.hairpin(31, CG, A, A, None);
        let e30 = p.hairpin(30, CG, A, A, None);
        assert_eq!(e31 - e30, p.loop_extrapolation(31) - p.loop_extrapolation(30));
    }

    #[test]
    fn test_special_hairpins_disabled() {
        let md = ModelDetails { special_hairpins: false, ..Default::default() };
        let p = EnergyParams::new(&md).unwrap();
        assert_eq!(p.hairpin(4, CG, C, A, Some(&[C, C, G, A, G, G])),
            p.hairpin[4] + p.mismatch_hairpin[CG as usize][C as usize][A as usize]);
    }

    #[test]
    fn test_bulges() {
        let p = params();
        // Single bulge includes the stack of the adjacent pairs.
        assert_eq!(p.interior(1, 0, CG, CG, A, N, A, N), 380 - 240);
        assert_eq!(p.interior(0, 2, CG, CG, N, A, N, A), 280);
        assert_eq!(p.interior(6, 0, CG, CG, A, N, A, N), 440);
        // Terminal penalties on both A-U ends.
        assert_eq!(p.interior(2, 0, AU, UA, A, N, A, N), 280 + 2 * p.terminal_au);
    }

    #[test]
    fn test_interior_asymmetry() {
        let p = params();
        let sym = p.interior(3, 3, CG, CG, A, A, A, A);
        let asym = p.interior(1, 5, CG, CG, A, A, A, A);
        assert!(sym < INF && asym < INF);
        let e = p.interior(4, 8, CG, CG, A, A, A, A);
        assert_eq!(e, p.interior[12] + p.ninio_max.min(4 * p.ninio)
            + p.mismatch_interior[CG as usize][A as usize][A as usize] * 2);
    }

    #[test]
    fn test_stems() {
        let p = params();
        let d5 = p.dangle5[CG as usize][A as usize];
        let d3 = p.dangle3[CG as usize][U as usize];
        assert_eq!(p.exterior_stem(CG, Some(A), None), d5);
        assert_eq!(p.exterior_stem(CG, None, Some(U)), d3);
        assert_eq!(p.exterior_stem(CG, None, None), 0);
        assert_eq!(p.exterior_stem(AU, None, None), p.terminal_au);
        assert_eq!(p.multi_stem(CG, None, None), p.ml_intern);

        let md = ModelDetails::default().with_dangles(Dangles::None);
        let p0 = EnergyParams::new(&md).unwrap();
        assert_eq!(p0.exterior_stem(CG, Some(A), Some(U)), 0);
        assert_eq!(p0.exterior_stem(GU, Some(A), Some(U)), p0.terminal_au);
    }

    #[test]
    fn test_temperature_rescaling() {
        let p37 = params();
        let p60 = EnergyParams::new(&ModelDetails::default().with_temperature(60.0)).unwrap();
        assert_eq!(p60.temperature(), 60.0);
        assert!(p60.stack[CG as usize][CG as usize] > p37.stack[CG as usize][CG as usize]);
        assert!(p60.gquad(3, 6) > p37.gquad(3, 6));
    }
}
