/// A parser for the parameter file format shipped with ViennaRNA.
///
/// IMPORTANT: This module provides the hardcoded indices of parameter entries
/// as specified in the parsed file! Verify that orders are correct, before
/// using this parser!!
///
use crate::Base;
use crate::NucleotideVec;
use crate::PairTypeRNA;
use crate::EnergyTables;
use crate::ParamError;
use crate::{MLParams, NINIO, Misc};

const PARAM_FILE_PAIR_ORDER: [PairTypeRNA; 7] = [
    PairTypeRNA::CG,
    PairTypeRNA::GC,
    PairTypeRNA::GU,
    PairTypeRNA::UG,
    PairTypeRNA::AU,
    PairTypeRNA::UA,
    PairTypeRNA::NN,
];

const PARAM_FILE_MM_ORDER: [Base; 5] = [
    Base::N,
    Base::A,
    Base::C,
    Base::G,
    Base::U,
];

/// int22 tables omit the N rows and columns.
const PARAM_FILE_INT22_ORDER: [Base; 4] = [
    Base::A,
    Base::C,
    Base::G,
    Base::U,
];

pub trait SectionParser {
    fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError>;
}

fn parse_value(token: &str, field: &str, line: &str) -> Result<Option<i32>, ParamError> {
    if token == "INF" {
        return Ok(None);
    }
    token.parse::<i32>().map(Some).map_err(|_| ParamError::Parse(format!(
        "Failed to parse integer in {} while parsing line {:?}, token {:?}",
        field, line, token)))
}

fn pair_at(idx: usize, field: &'static str) -> Result<usize, ParamError> {
    PARAM_FILE_PAIR_ORDER.get(idx)
        .map(|&p| p as usize)
        .ok_or(ParamError::InvalidLength(field, PARAM_FILE_PAIR_ORDER.len(), idx + 1))
}

macro_rules! impl_stack_parser {
    ($struct_name:ident, $field:ident) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            outer: usize,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                let i1 = pair_at(self.outer, stringify!($field))?;
                for (inner, token) in line
                    .split_whitespace()
                    .take(PARAM_FILE_PAIR_ORDER.len())
                    .enumerate()
                {
                    let i2 = PARAM_FILE_PAIR_ORDER[inner] as usize;
                    tables.$field[i1][i2] = parse_value(token, stringify!($field), line)?;
                }
                self.outer += 1;
                Ok(())
            }
        }
    };
}

impl_stack_parser!(Stack, stack);
impl_stack_parser!(StackEnthalpies, stack_enthalpies);

macro_rules! impl_mismatch_parser {
    ($struct_name:ident, $field:ident) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            outer: usize,
            m5: usize,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                let i1 = pair_at(self.outer, stringify!($field))?;
                let i2 = PARAM_FILE_MM_ORDER[self.m5] as usize;
                for (m3, token) in line.split_whitespace()
                    .take(PARAM_FILE_MM_ORDER.len()).enumerate()
                {
                    let i3 = PARAM_FILE_MM_ORDER[m3] as usize;
                    tables.$field[i1][i2][i3] = parse_value(token, stringify!($field), line)?;
                }
                self.m5 += 1;
                if self.m5 == PARAM_FILE_MM_ORDER.len() {
                    self.outer += 1;
                    self.m5 = 0;
                }
                Ok(())
            }
        }
    };
}

impl_mismatch_parser!(MismatchHairpin, mismatch_hairpin);
impl_mismatch_parser!(MismatchHairpinEnthalpies, mismatch_hairpin_enthalpies);
impl_mismatch_parser!(MismatchInterior, mismatch_interior);
impl_mismatch_parser!(MismatchInteriorEnthalpies, mismatch_interior_enthalpies);
impl_mismatch_parser!(MismatchInterior1n, mismatch_interior_1n);
impl_mismatch_parser!(MismatchInterior1nEnthalpies, mismatch_interior_1n_enthalpies);
impl_mismatch_parser!(MismatchInterior23, mismatch_interior_23);
impl_mismatch_parser!(MismatchInterior23Enthalpies, mismatch_interior_23_enthalpies);
impl_mismatch_parser!(MismatchMulti, mismatch_multi);
impl_mismatch_parser!(MismatchMultiEnthalpies, mismatch_multi_enthalpies);
impl_mismatch_parser!(MismatchExterior, mismatch_exterior);
impl_mismatch_parser!(MismatchExteriorEnthalpies, mismatch_exterior_enthalpies);

macro_rules! impl_dangle_parser {
    ($struct_name:ident, $field:ident) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            outer: usize,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                let i1 = pair_at(self.outer, stringify!($field))?;
                for (m5, token) in line.split_whitespace()
                    .take(PARAM_FILE_MM_ORDER.len()).enumerate()
                {
                    let i2 = PARAM_FILE_MM_ORDER[m5] as usize;
                    tables.$field[i1][i2] = parse_value(token, stringify!($field), line)?;
                }
                self.outer += 1;
                Ok(())
            }
        }
    };
}

impl_dangle_parser!(Dangle5, dangle5);
impl_dangle_parser!(Dangle5Enthalpies, dangle5_enthalpies);
impl_dangle_parser!(Dangle3, dangle3);
impl_dangle_parser!(Dangle3Enthalpies, dangle3_enthalpies);

macro_rules! impl_int11_parser {
    ($struct_name:ident, $field:ident) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            outer: usize,
            inner: usize,
            mm5: usize,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                let i1 = pair_at(self.outer, stringify!($field))?;
                let i2 = PARAM_FILE_PAIR_ORDER[self.inner] as usize;
                let i3 = PARAM_FILE_MM_ORDER[self.mm5] as usize;
                for (mm3, token) in line.split_whitespace()
                    .take(PARAM_FILE_MM_ORDER.len()).enumerate()
                {
                    let i4 = PARAM_FILE_MM_ORDER[mm3] as usize;
                    tables.$field[i1][i2][i3][i4] = parse_value(token, stringify!($field), line)?;
                }

                self.mm5 += 1;
                if self.mm5 == PARAM_FILE_MM_ORDER.len() {
                    self.mm5 = 0;
                    self.inner += 1;
                }
                if self.inner == PARAM_FILE_PAIR_ORDER.len() {
                    self.outer += 1;
                    self.inner = 0;
                }
                Ok(())
            }
        }
    };
}

impl_int11_parser!(Int11, int11);
impl_int11_parser!(Int11Enthalpies, int11_enthalpies);

macro_rules! impl_int21_parser {
    ($struct_name:ident, $field:ident) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            outer: usize,
            inner: usize,
            mm55: usize,
            mm53: usize,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                let i1 = pair_at(self.outer, stringify!($field))?;
                let i2 = PARAM_FILE_PAIR_ORDER[self.inner] as usize;
                let i3 = PARAM_FILE_MM_ORDER[self.mm55] as usize;
                let i4 = PARAM_FILE_MM_ORDER[self.mm53] as usize;
                for (mm3, token) in line.split_whitespace()
                    .take(PARAM_FILE_MM_ORDER.len()).enumerate()
                {
                    let i5 = PARAM_FILE_MM_ORDER[mm3] as usize;
                    tables.$field[i1][i2][i3][i4][i5] = parse_value(token, stringify!($field), line)?;
                }
                self.mm53 += 1;
                if self.mm53 == PARAM_FILE_MM_ORDER.len() {
                    self.mm55 += 1;
                    self.mm53 = 0;
                }
                if self.mm55 == PARAM_FILE_MM_ORDER.len() {
                    self.mm55 = 0;
                    self.inner += 1;
                }
                if self.inner == PARAM_FILE_PAIR_ORDER.len() {
                    self.outer += 1;
                    self.inner = 0;
                }
                Ok(())
            }
        }
    };
}

impl_int21_parser!(Int21, int21);
impl_int21_parser!(Int21Enthalpies, int21_enthalpies);

macro_rules! impl_int22_parser {
    ($struct_name:ident, $field:ident) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            outer: usize,
            inner: usize,
            mm55: usize,
            mm53: usize,
            mm35: usize,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                // Only the six canonical pair types are listed.
                if self.outer >= PARAM_FILE_PAIR_ORDER.len() - 1 {
                    return Err(ParamError::InvalidLength(stringify!($field), 6, self.outer + 1));
                }
                let i1 = PARAM_FILE_PAIR_ORDER[self.outer] as usize;
                let i2 = PARAM_FILE_PAIR_ORDER[self.inner] as usize;
                let i3 = PARAM_FILE_INT22_ORDER[self.mm55] as usize;
                let i4 = PARAM_FILE_INT22_ORDER[self.mm53] as usize;
                let i5 = PARAM_FILE_INT22_ORDER[self.mm35] as usize;
                for (mm33, token) in line.split_whitespace()
                    .take(PARAM_FILE_INT22_ORDER.len()).enumerate()
                {
                    let i6 = PARAM_FILE_INT22_ORDER[mm33] as usize;
                    tables.$field[i1][i2][i3][i4][i5][i6] = parse_value(token, stringify!($field), line)?;
                }
                self.mm35 += 1;
                if self.mm35 == PARAM_FILE_INT22_ORDER.len() {
                    self.mm53 += 1;
                    self.mm35 = 0;
                }
                if self.mm53 == PARAM_FILE_INT22_ORDER.len() {
                    self.mm55 += 1;
                    self.mm53 = 0;
                }
                if self.mm55 == PARAM_FILE_INT22_ORDER.len() {
                    self.mm55 = 0;
                    self.inner += 1;
                }
                if self.inner == PARAM_FILE_PAIR_ORDER.len() - 1 {
                    self.outer += 1;
                    self.inner = 0;
                }
                Ok(())
            }
        }
    };
}

impl_int22_parser!(Int22, int22);
impl_int22_parser!(Int22Enthalpies, int22_enthalpies);

macro_rules! impl_loop_parser {
    ($struct_name:ident, $field:ident) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            base: usize,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                for token in line.split_whitespace() {
                    let slot = tables.$field.get_mut(self.base).ok_or(
                        ParamError::InvalidLength(stringify!($field), 31, self.base + 1))?;
                    *slot = parse_value(token, stringify!($field), line)?;
                    self.base += 1;
                }
                Ok(())
            }
        }
    };
}

impl_loop_parser!(Hairpin, hairpin);
impl_loop_parser!(HairpinEnthalpies, hairpin_enthalpies);
impl_loop_parser!(Bulge, bulge);
impl_loop_parser!(BulgeEnthalpies, bulge_enthalpies);
impl_loop_parser!(Interior, interior);
impl_loop_parser!(InteriorEnthalpies, interior_enthalpies);

/// Sections that list a fixed number of scalars, possibly over several lines.
macro_rules! impl_scalar_parser {
    ($struct_name:ident, $field:ident, $count:expr, $assign:expr) => {
        #[derive(Default, Debug)]
        pub struct $struct_name {
            values: Vec<f64>,
        }

        impl SectionParser for $struct_name {
            fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
                for token in line.split_whitespace() {
                    let val = token.parse::<f64>().map_err(|_| ParamError::Parse(format!(
                        "Failed to parse number in {} while parsing line {:?}, token {:?}",
                        stringify!($field), line, token)))?;
                    self.values.push(val);
                }
                if self.values.len() >= $count {
                    tables.$field = $assign(&self.values[..$count])?;
                }
                Ok(())
            }
        }
    };
}

fn as_ints(values: &[f64]) -> Vec<i32> {
    values.iter().map(|&v| v as i32).collect()
}

impl_scalar_parser!(MLParamsSection, ml_params, 6,
    |v: &[f64]| MLParams::from_vrna_param_slice(&as_ints(v)));
impl_scalar_parser!(Ninio, ninio, 3,
    |v: &[f64]| NINIO::from_vrna_param_slice(&as_ints(v)));
impl_scalar_parser!(MiscSection, misc, 5,
    |v: &[f64]| Misc::from_vrna_param_slice(v));

#[derive(Default, Debug)]
pub struct HairpinSequences { }

impl SectionParser for HairpinSequences {
    fn parse_line(&mut self, line: &str, tables: &mut EnergyTables) -> Result<(), ParamError> {
        let mut parts = line.split_whitespace();
        if let (Some(seq), Some(g), Some(h)) = (parts.next(), parts.next(), parts.next()) {
            let seq = NucleotideVec::try_from(seq)
                .map_err(|e| ParamError::Parse(e.to_string()))?;
            let g = parse_value(g, "hairpin_sequences", line)?
                .ok_or(ParamError::MissingValue("hairpin_sequences", 1))?;
            let h = parse_value(h, "hairpin_sequences", line)?
                .ok_or(ParamError::MissingValue("hairpin_sequences", 2))?;
            tables.hairpin_sequences.insert(seq, (g, h));
        }
        Ok(())
    }
}


#[derive(Debug)]
pub enum ParamFileSection {
    None,
    Skip,
    Stack(Stack),
    StackEnthalpies(StackEnthalpies),
    MismatchHairpin(MismatchHairpin),
    MismatchHairpinEnthalpies(MismatchHairpinEnthalpies),
    MismatchInterior(MismatchInterior),
    MismatchInteriorEnthalpies(MismatchInteriorEnthalpies),
    MismatchInterior1n(MismatchInterior1n),
    MismatchInterior1nEnthalpies(MismatchInterior1nEnthalpies),
    MismatchInterior23(MismatchInterior23),
    MismatchInterior23Enthalpies(MismatchInterior23Enthalpies),
    MismatchMulti(MismatchMulti),
    MismatchMultiEnthalpies(MismatchMultiEnthalpies),
    MismatchExterior(MismatchExterior),
    MismatchExteriorEnthalpies(MismatchExteriorEnthalpies),
    Dangle5(Dangle5),
    Dangle5Enthalpies(Dangle5Enthalpies),
    Dangle3(Dangle3),
    Dangle3Enthalpies(Dangle3Enthalpies),
    Int11(Int11),
    Int11Enthalpies(Int11Enthalpies),
    Int21(Int21),
    Int21Enthalpies(Int21Enthalpies),
    Int22(Int22),
    Int22Enthalpies(Int22Enthalpies),
    Hairpin(Hairpin),
    HairpinEnthalpies(HairpinEnthalpies),
    Bulge(Bulge),
    BulgeEnthalpies(BulgeEnthalpies),
    Interior(Interior),
    InteriorEnthalpies(InteriorEnthalpies),
    MLParams(MLParamsSection),
    Ninio(Ninio),
    Misc(MiscSection),
    HairpinSequences(HairpinSequences),
}

macro_rules! section_match {
    ($s:expr, $($field:literal, $variant:ident, $struct:ident),+ $(,)?) => {
        match $s {
            $(
                $field => Ok(ParamFileSection::$variant($struct::default())),
            )+
            "END" => Ok(ParamFileSection::None),
            _ => Err(()),
        }
    };
}

impl TryFrom<&str> for ParamFileSection {
    type Error = ();

    fn try_from(s: &str) -> Result<Self, ()> {
        let key = s.trim();
        section_match!(key,
            "stack", Stack, Stack,
            "stack_enthalpies", StackEnthalpies, StackEnthalpies,
            "mismatch_hairpin", MismatchHairpin, MismatchHairpin,
            "mismatch_hairpin_enthalpies", MismatchHairpinEnthalpies, MismatchHairpinEnthalpies,
            "mismatch_interior", MismatchInterior, MismatchInterior,
            "mismatch_interior_enthalpies", MismatchInteriorEnthalpies, MismatchInteriorEnthalpies,
            "mismatch_interior_1n", MismatchInterior1n, MismatchInterior1n,
            "mismatch_interior_1n_enthalpies", MismatchInterior1nEnthalpies, MismatchInterior1nEnthalpies,
            "mismatch_interior_23", MismatchInterior23, MismatchInterior23,
            "mismatch_interior_23_enthalpies", MismatchInterior23Enthalpies, MismatchInterior23Enthalpies,
            "mismatch_multi", MismatchMulti, MismatchMulti,
            "mismatch_multi_enthalpies", MismatchMultiEnthalpies, MismatchMultiEnthalpies,
            "mismatch_exterior", MismatchExterior, MismatchExterior,
            "mismatch_exterior_enthalpies", MismatchExteriorEnthalpies, MismatchExteriorEnthalpies,
            "dangle5", Dangle5, Dangle5,
            "dangle5_enthalpies", Dangle5Enthalpies, Dangle5Enthalpies,
            "dangle3", Dangle3, Dangle3,
            "dangle3_enthalpies", Dangle3Enthalpies, Dangle3Enthalpies,
            "int11", Int11, Int11,
            "int11_enthalpies", Int11Enthalpies, Int11Enthalpies,
            "int21", Int21, Int21,
            "int21_enthalpies", Int21Enthalpies, Int21Enthalpies,
            "int22", Int22, Int22,
            "int22_enthalpies", Int22Enthalpies, Int22Enthalpies,
            "hairpin", Hairpin, Hairpin,
            "hairpin_enthalpies", HairpinEnthalpies, HairpinEnthalpies,
            "bulge", Bulge, Bulge,
            "bulge_enthalpies", BulgeEnthalpies, BulgeEnthalpies,
            "interior", Interior, Interior,
            "interior_enthalpies", InteriorEnthalpies, InteriorEnthalpies,
            "ML_params", MLParams, MLParamsSection,
            "NINIO", Ninio, Ninio,
            "Misc", Misc, MiscSection,
            "Hexaloops", HairpinSequences, HairpinSequences,
            "Tetraloops", HairpinSequences, HairpinSequences,
            "Triloops", HairpinSequences, HairpinSequences,
        )
    }
}
