
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::io::{BufRead, BufReader, Cursor};
use ahash::AHashMap;
use log::warn;
use once_cell::sync::Lazy;

use crate::parameter_parsing::ParamFileSection;
use crate::parameter_parsing::SectionParser;
use crate::NucleotideVec;
use crate::BCOUNT as B;
use crate::PCOUNT as P;

/// The core parameter set that ships with the crate.
const CORE_PARAMETERS: &str = include_str!("../params/rna_turner2004_core.par");

static DEFAULT_TABLES: Lazy<Result<EnergyTables, String>> = Lazy::new(|| {
    EnergyTables::from_reader(Cursor::new(CORE_PARAMETERS)).map_err(|e| e.to_string())
});

#[derive(Debug)]
pub enum ParamError {
    Io(std::io::Error),
    Parse(String),
    MissingValue(&'static str, usize),
    InvalidLength(&'static str, usize, usize),
}

impl std::error::Error for ParamError {}

impl From<std::io::Error> for ParamError {
    fn from(e: std::io::Error) -> Self {
        ParamError::Io(e)
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::Io(e) => write!(f, "I/O error: {}", e),
            ParamError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ParamError::MissingValue(table, index) => {
                write!(f, "Missing value in parameter table '{}' at index {}", table, index)
            }
            ParamError::InvalidLength(table, expected, got) => {
                write!(
                    f,
                    "Invalid length for parameter table '{}': expected {}, got {}",
                    table, expected, got
                )
            }
        }
    }
}

#[derive(Default, Debug, Clone)]
pub struct MLParams {
    pub base_en37: i32,
    pub base_enth: i32,
    pub closing_en37: i32,
    pub closing_enth: i32,
    pub intern_en37: i32,
    pub intern_enth: i32,
}

impl MLParams {
    pub fn from_vrna_param_slice(slice: &[i32]) -> Result<Self, ParamError> {
        if slice.len() != 6 {
            return Err(ParamError::InvalidLength("ML_params", 6, slice.len()));
        }
        Ok(Self {
            base_en37: slice[0],
            base_enth: slice[1],
            closing_en37: slice[2],
            closing_enth: slice[3],
            intern_en37: slice[4],
            intern_enth: slice[5],
        })
    }
}

#[derive(Default, Debug, Clone)]
pub struct NINIO {
    pub en37: i32,
    pub enth: i32,
    pub max: i32,
}

impl NINIO {
    pub fn from_vrna_param_slice(slice: &[i32]) -> Result<Self, ParamError> {
        if slice.len() != 3 {
            return Err(ParamError::InvalidLength("NINIO", 3, slice.len()));
        }
        Ok(Self {
            en37: slice[0],
            enth: slice[1],
            max: slice[2],
        })
    }
}

#[derive(Default, Debug, Clone)]
pub struct Misc {
    pub duplex_initiation_en37: i32,
    pub duplex_initiation_enth: i32,
    pub terminal_ru_en37: i32,
    pub terminal_ru_enth: i32,
    pub lxc: f64,
}

impl Misc {
    /// Values as they appear in the file: the loop extrapolation factor is
    /// the only fractional entry.
    pub fn from_vrna_param_slice(slice: &[f64]) -> Result<Self, ParamError> {
        if slice.len() < 5 {
            return Err(ParamError::InvalidLength("Misc", 6, slice.len()));
        }
        Ok(Self {
            duplex_initiation_en37: slice[0] as i32,
            duplex_initiation_enth: slice[1] as i32,
            terminal_ru_en37: slice[2] as i32,
            terminal_ru_enth: slice[3] as i32,
            lxc: slice[4],
        })
    }
}

/// G(T) = H - (T/T37) (H - G37). Without an enthalpy the free energy is kept.
fn rescale_energy(g_old: Option<i32>, h: Option<i32>, temp_change: f64) -> Option<i32> {
    match (g_old, h) {
        (Some(g), Some(h)) => {
            let g = g as f64;
            let h = h as f64;
            let s = h - g;
            Some((h - temp_change * s).round() as i32)
        }
        (g, _) => g,
    }
}

trait RescaleWith {
    fn rescale_with(&mut self, enthalpies: &Self, temp_change: f64);
}

impl RescaleWith for Option<i32> {
    fn rescale_with(&mut self, enthalpies: &Self, temp_change: f64) {
        *self = rescale_energy(*self, *enthalpies, temp_change);
    }
}

impl<T: RescaleWith, const N: usize> RescaleWith for [T; N] {
    fn rescale_with(&mut self, enthalpies: &Self, temp_change: f64) {
        for (g, h) in self.iter_mut().zip(enthalpies.iter()) {
            g.rescale_with(h, temp_change);
        }
    }
}

impl RescaleWith for i32 {
    fn rescale_with(&mut self, enthalpies: &Self, temp_change: f64) {
        *self = rescale_energy(Some(*self), Some(*enthalpies), temp_change).unwrap_or(*self);
    }
}

/// Raw parameter tables in ViennaRNA file layout. Entries that are missing
/// from the parameter file remain `None`.
#[derive(Debug, Clone)]
pub struct EnergyTables {
    pub stack:            [[Option<i32>; P]; P],
    pub stack_enthalpies: [[Option<i32>; P]; P],

    pub mismatch_hairpin:            [[[Option<i32>; B]; B]; P],
    pub mismatch_hairpin_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior:            [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_1n:            [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_1n_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_23:            [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_23_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_multi:            [[[Option<i32>; B]; B]; P],
    pub mismatch_multi_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_exterior:            [[[Option<i32>; B]; B]; P],
    pub mismatch_exterior_enthalpies: [[[Option<i32>; B]; B]; P],

    pub dangle5:            [[Option<i32>; B]; P],
    pub dangle5_enthalpies: [[Option<i32>; B]; P],
    pub dangle3:            [[Option<i32>; B]; P],
    pub dangle3_enthalpies: [[Option<i32>; B]; P],

    pub int11:            Box<[[[[Option<i32>; B]; B]; P]; P]>,
    pub int11_enthalpies: Box<[[[[Option<i32>; B]; B]; P]; P]>,
    pub int21:            Box<[[[[[Option<i32>; B]; B]; B]; P]; P]>,
    pub int21_enthalpies: Box<[[[[[Option<i32>; B]; B]; B]; P]; P]>,
    pub int22:            Box<[[[[[[Option<i32>; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]>,
    pub int22_enthalpies: Box<[[[[[[Option<i32>; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]>,

    pub hairpin:            [Option<i32>; 31],
    pub hairpin_enthalpies: [Option<i32>; 31],
    pub bulge:            [Option<i32>; 31],
    pub bulge_enthalpies: [Option<i32>; 31],
    pub interior:            [Option<i32>; 31],
    pub interior_enthalpies: [Option<i32>; 31],

    pub ml_params: MLParams,
    pub ninio: NINIO,
    pub misc: Misc,

    pub hairpin_sequences: AHashMap<NucleotideVec, (i32, i32)>,
}

impl Default for EnergyTables {
    fn default() -> Self {
        EnergyTables {
            stack:            [[None; P]; P],
            stack_enthalpies: [[None; P]; P],

            mismatch_hairpin:            [[[None; B]; B]; P],
            mismatch_hairpin_enthalpies: [[[None; B]; B]; P],
            mismatch_interior:            [[[None; B]; B]; P],
            mismatch_interior_enthalpies: [[[None; B]; B]; P],
            mismatch_interior_1n:            [[[None; B]; B]; P],
            mismatch_interior_1n_enthalpies: [[[None; B]; B]; P],
            mismatch_interior_23:            [[[None; B]; B]; P],
            mismatch_interior_23_enthalpies: [[[None; B]; B]; P],
            mismatch_multi:            [[[None; B]; B]; P],
            mismatch_multi_enthalpies: [[[None; B]; B]; P],
            mismatch_exterior:            [[[None; B]; B]; P],
            mismatch_exterior_enthalpies: [[[None; B]; B]; P],
            dangle5:            [[None; B]; P],
            dangle5_enthalpies: [[None; B]; P],
            dangle3:            [[None; B]; P],
            dangle3_enthalpies: [[None; B]; P],

            int11:            Box::new([[[[None; B]; B]; P]; P]),
            int11_enthalpies: Box::new([[[[None; B]; B]; P]; P]),
            int21:            Box::new([[[[[None; B]; B]; B]; P]; P]),
            int21_enthalpies: Box::new([[[[[None; B]; B]; B]; P]; P]),
            int22:            Box::new([[[[[[None; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]),
            int22_enthalpies: Box::new([[[[[[None; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]),

            hairpin: [None; 31],
            hairpin_enthalpies: [None; 31],
            bulge: [None; 31],
            bulge_enthalpies: [None; 31],
            interior: [None; 31],
            interior_enthalpies: [None; 31],
            ml_params: MLParams::default(),
            ninio: NINIO::default(),
            misc: Misc::default(),

            hairpin_sequences: AHashMap::default(),
        }
    }
}

macro_rules! section_match {
    ($enum:expr, $line:expr, $tables:expr, $($struct:ident),+ $(,)?) => {
        match $enum {
            $(
                ParamFileSection::$struct(ref mut s) => s.parse_line($line, &mut $tables),
            )+
            ParamFileSection::None | ParamFileSection::Skip => Ok(()),
        }
    };
}

impl EnergyTables {
    /// The built-in core parameter set (37°C).
    pub fn builtin() -> Result<Self, ParamError> {
        (*DEFAULT_TABLES).clone().map_err(ParamError::Parse)
    }

    pub fn from_parameter_file<Q: AsRef<Path>>(path: Q) -> Result<Self, ParamError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParamError> {
        let mut tables = EnergyTables::default();
        let mut section = ParamFileSection::None;

        for line in reader.lines() {
            let line = line?;
            // Strip trailing comments such as "/* CG */".
            let line = match line.find("/*") {
                Some(pos) => &line[..pos],
                None => &line[..],
            };
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("# ") {
                section = match ParamFileSection::try_from(rest.trim()) {
                    Ok(sec) => sec,
                    Err(_) => {
                        warn!("Skipping unknown parameter file section: {:?}", rest);
                        ParamFileSection::Skip
                    }
                };
                continue;
            } else if line.starts_with('#') {
                continue;
            }

            section_match!(section, line, tables,
                Stack,
                StackEnthalpies,
                MismatchHairpin,
                MismatchHairpinEnthalpies,
                MismatchInterior,
                MismatchInteriorEnthalpies,
                MismatchInterior1n,
                MismatchInterior1nEnthalpies,
                MismatchInterior23,
                MismatchInterior23Enthalpies,
                MismatchMulti,
                MismatchMultiEnthalpies,
                MismatchExterior,
                MismatchExteriorEnthalpies,
                Dangle5,
                Dangle5Enthalpies,
                Dangle3,
                Dangle3Enthalpies,
                Int11,
                Int11Enthalpies,
                Int21,
                Int21Enthalpies,
                Int22,
                Int22Enthalpies,
                Hairpin,
                HairpinEnthalpies,
                Bulge,
                BulgeEnthalpies,
                Interior,
                InteriorEnthalpies,
                MLParams,
                Ninio,
                Misc,
                HairpinSequences,
            )?;
        }
        Ok(tables)
    }

    /// Rescale free energies by `temp_change = T_new / T_old` (Kelvin).
    pub fn rescale(&mut self, temp_change: f64) {
        self.stack.rescale_with(&self.stack_enthalpies, temp_change);
        self.mismatch_hairpin.rescale_with(&self.mismatch_hairpin_enthalpies, temp_change);
        self.mismatch_interior.rescale_with(&self.mismatch_interior_enthalpies, temp_change);
        self.mismatch_interior_1n.rescale_with(&self.mismatch_interior_1n_enthalpies, temp_change);
        self.mismatch_interior_23.rescale_with(&self.mismatch_interior_23_enthalpies, temp_change);
        self.mismatch_multi.rescale_with(&self.mismatch_multi_enthalpies, temp_change);
        self.mismatch_exterior.rescale_with(&self.mismatch_exterior_enthalpies, temp_change);
        self.dangle5.rescale_with(&self.dangle5_enthalpies, temp_change);
        self.dangle3.rescale_with(&self.dangle3_enthalpies, temp_change);
        (*self.int11).rescale_with(&*self.int11_enthalpies, temp_change);
        (*self.int21).rescale_with(&*self.int21_enthalpies, temp_change);
        (*self.int22).rescale_with(&*self.int22_enthalpies, temp_change);
        self.hairpin.rescale_with(&self.hairpin_enthalpies, temp_change);
        self.bulge.rescale_with(&self.bulge_enthalpies, temp_change);
        self.interior.rescale_with(&self.interior_enthalpies, temp_change);

        let ml = &mut self.ml_params;
        ml.base_en37.rescale_with(&ml.base_enth, temp_change);
        ml.closing_en37.rescale_with(&ml.closing_enth, temp_change);
        ml.intern_en37.rescale_with(&ml.intern_enth, temp_change);
        self.ninio.en37.rescale_with(&self.ninio.enth, temp_change);
        let misc = &mut self.misc;
        misc.duplex_initiation_en37.rescale_with(&misc.duplex_initiation_enth, temp_change);
        misc.terminal_ru_en37.rescale_with(&misc.terminal_ru_enth, temp_change);
        misc.lxc *= temp_change;

        for (g, h) in self.hairpin_sequences.values_mut() {
            g.rescale_with(h, temp_change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PairTypeRNA;
    use crate::Base;

    #[test]
    fn test_parse_stack() {
        let dummy = r#"
# stack
/*  CG    GC    GU    UG    AU    UA    NN          */
  -240  -330  -210  -140  -210  -210  -140    /* CG */
  -330  -340  -250  -150  -220  -240  -150    /* GC */
  -210  -250   130   -50  -140  -130   130    /* GU */
  -140  -150   -50    30   -60  -100    30    /* UG */
  -210  -220  -140   -60  -110   -90   -60    /* AU */
  -210  -240  -130  -100   -90  -130   -90    /* UA */
  -140  -150   130    30   -60   -90   130    /* NN */
"#;
        let tables = EnergyTables::from_reader(Cursor::new(dummy)).unwrap();
        assert_eq!(tables.stack[PairTypeRNA::CG as usize][PairTypeRNA::CG as usize], Some(-240));
        assert_eq!(tables.stack[PairTypeRNA::GC as usize][PairTypeRNA::CG as usize], Some(-330));
        assert_eq!(tables.stack[PairTypeRNA::GU as usize][PairTypeRNA::CG as usize], Some(-210));
        assert_eq!(tables.stack_enthalpies[0][0], None);
    }

    #[test]
    fn test_parse_mismatch() {
        use Base::*;
        use PairTypeRNA::*;
        let dummy = r#"
# mismatch_hairpin
  -80  -100  -110  -100   -80    /* CG,E */
 -140  -150  -150  -140  -150    /* CG,A */
  -80  -100  -110  -100   -80    /* CG,C */
"#;
        let tables = EnergyTables::from_reader(Cursor::new(dummy)).unwrap();
        assert_eq!(tables.mismatch_hairpin[CG as usize][N as usize][N as usize], Some(-80));
        assert_eq!(tables.mismatch_hairpin[CG as usize][N as usize][A as usize], Some(-100));
        assert_eq!(tables.mismatch_hairpin[CG as usize][A as usize][N as usize], Some(-140));
    }

    #[test]
    fn test_parse_int22_base_order() {
        use Base::*;
        use PairTypeRNA::*;
        let dummy = r#"
# int22
   120   160    20   160    /* CG,CG,A,A,A */
   110   150    20   150    /* CG,CG,A,A,C */
    20    60   -70    60    /* CG,CG,A,A,G */
   110   150    20   150    /* CG,CG,A,A,U */
   160   200    60   200    /* CG,CG,A,C,A */
"#;
        let tables = EnergyTables::from_reader(Cursor::new(dummy)).unwrap();
        assert_eq!(tables.int22[CG as usize][CG as usize][A as usize][A as usize][A as usize][A as usize], Some(120));
        assert_eq!(tables.int22[CG as usize][CG as usize][A as usize][A as usize][A as usize][C as usize], Some(160));
        assert_eq!(tables.int22[CG as usize][CG as usize][A as usize][A as usize][G as usize][G as usize], Some(-70));
        assert_eq!(tables.int22[CG as usize][CG as usize][A as usize][C as usize][A as usize][A as usize], Some(160));
    }

    #[test]
    fn test_parse_loops_and_scalars() {
        let dummy = r#"
# hairpin
   INF   INF   INF   540   560   570   540   600   550   640
   650   660   670   680   690   690   700   710   710   720
   720   730   730   740   740   750   750   750   760   760
   770

# ML_params
/* F = cu*n_unpaired + cc + ci*loop_degree (branches) */
	     0	     0	   930	  3000	   -90	  -220

# NINIO
    60   320   300

# Misc
   410   360    50   370   107.856   0

# END
"#;
        let tables = EnergyTables::from_reader(Cursor::new(dummy)).unwrap();
        assert_eq!(tables.hairpin[2], None);
        assert_eq!(tables.hairpin[3], Some(540));
        assert_eq!(tables.hairpin[30], Some(770));
        assert_eq!(tables.ml_params.closing_en37, 930);
        assert_eq!(tables.ml_params.intern_enth, -220);
        assert_eq!(tables.ninio.max, 300);
        assert_eq!(tables.misc.terminal_ru_en37, 50);
        assert!((tables.misc.lxc - 107.856).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let dummy = "# stack\n  -240  abc\n";
        assert!(matches!(EnergyTables::from_reader(Cursor::new(dummy)), Err(ParamError::Parse(_))));
    }

    #[test]
    fn test_sequence_parsing() {
        let dummy = r#"
# Tetraloops
CAACGG     550     690
CCAAGG     330   -1030

# Triloops
CAACG     680    2370
"#;
        let tables = EnergyTables::from_reader(Cursor::new(dummy)).unwrap();
        assert_eq!(tables.hairpin_sequences[&NucleotideVec::from_lossy("CCAAGG")], (330, -1030));
        assert_eq!(tables.hairpin_sequences[&NucleotideVec::from_lossy("CAACG")], (680, 2370));
    }

    #[test]
    fn test_builtin_tables() {
        let tables = EnergyTables::builtin().unwrap();
        assert_eq!(tables.stack[PairTypeRNA::CG as usize][PairTypeRNA::CG as usize], Some(-240));
        assert_eq!(tables.hairpin[3], Some(540));
        assert_eq!(tables.bulge[1], Some(380));
        assert!(tables.hairpin_sequences.contains_key(&NucleotideVec::from_lossy("CUUCGG")));
    }

    #[test]
    fn test_rescale_keeps_energies_without_enthalpy() {
        let mut tables = EnergyTables::builtin().unwrap();
        let hp = tables.hairpin[5];
        let st = tables.stack[PairTypeRNA::CG as usize][PairTypeRNA::CG as usize];
        tables.hairpin_enthalpies = [None; 31];
        tables.rescale((50.0 + 273.15) / (37.0 + 273.15));
        assert_eq!(tables.hairpin[5], hp);
        // Stacking becomes less favorable at higher temperatures.
        assert!(tables.stack[PairTypeRNA::CG as usize][PairTypeRNA::CG as usize] > st);
    }

    #[test]
    fn test_unknown_section_is_skipped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dummy = r#"
# coaxial_stacking
  -240  -330
# bulge
   INF   380   280
"#;
        let tables = EnergyTables::from_reader(Cursor::new(dummy)).unwrap();
        assert_eq!(tables.bulge[1], Some(380));
        assert_eq!(tables.bulge[2], Some(280));
    }
}
