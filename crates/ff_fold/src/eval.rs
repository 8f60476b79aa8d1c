//! Free energy evaluation of a given structure under the compound's model,
//! constraints included.

use log::debug;

use ff_energy::INF;
use ff_structure::DotBracket;
use ff_structure::DotBracketVec;
use ff_structure::PairTable;
use ff_structure::StructureError;

use crate::FoldCompound;
use crate::LoopEnergies;
use crate::FoldError;
use crate::mfe::add;

#[derive(Debug, Clone, Copy)]
enum Element {
    Unpaired(usize),
    Pair(usize, usize),
    Gquad(usize, usize),
}

struct Evaluator<'a> {
    fc: &'a FoldCompound,
    le: LoopEnergies<'a>,
    /// 1-based pair partners.
    partner: Vec<Option<usize>>,
    /// G-quadruplex starting at i: last position and energy.
    gquad: Vec<Option<(usize, i32)>>,
}

impl Evaluator<'_> {
    /// The elements of the loop on i+1..=j-1.
    fn elements(&self, i: usize, j: usize) -> Vec<Element> {
        let mut out = Vec::new();
        let mut k = i + 1;
        while k < j {
            if let Some(l) = self.partner[k].filter(|&l| l > k) {
                out.push(Element::Pair(k, l));
                k = l + 1;
            } else if let Some((e, _)) = self.gquad[k] {
                out.push(Element::Gquad(k, e));
                k = e + 1;
            } else {
                out.push(Element::Unpaired(k));
                k += 1;
            }
        }
        out
    }

    fn gquad_energy(&self, p: usize) -> i32 {
        self.gquad[p].map_or(INF, |(_, e)| e)
    }

    /// Elements of a loop that is part of the exterior loop.
    fn exterior(&self, elements: &[Element]) -> i32 {
        let le = &self.le;
        elements.iter().fold(0, |e, &el| match el {
            Element::Unpaired(k) => add(e, le.ext_unpaired(k, k)),
            Element::Pair(p, q) => add(e, add(le.ext_stem(p, q), self.pair(p, q))),
            Element::Gquad(p, _) => add(e, self.gquad_energy(p)),
        })
    }

    fn contains_cut(&self, i: usize, j: usize, elements: &[Element]) -> bool {
        match self.fc.cut {
            Some(cut) if i < cut && cut <= j => !elements.iter().any(|el| match *el {
                Element::Pair(p, q) | Element::Gquad(p, q) => p < cut && cut <= q,
                Element::Unpaired(_) => false,
            }),
            _ => false,
        }
    }

    /// Energy of the substructure closed by (i, j).
    fn pair(&self, i: usize, j: usize) -> i32 {
        let le = &self.le;
        let elements = self.elements(i, j);
        let branches: Vec<Element> = elements.iter()
            .copied()
            .filter(|el| !matches!(el, Element::Unpaired(_)))
            .collect();

        let closed = if self.contains_cut(i, j, &elements) {
            add(le.cut_stem(i, j), self.exterior(&elements))
        } else {
            match branches.as_slice() {
                [] => le.hairpin(i, j),
                [Element::Pair(p, q)] => add(le.interior(i, j, *p, *q), self.pair(*p, *q)),
                [Element::Gquad(p, q)] if LoopEnergies::gquad_interior_allowed(i, j, *p, *q) => {
                    add(le.gquad_interior(i, j, *p, *q), self.gquad_energy(*p))
                }
                [_] => INF,
                _ => add(le.ml_closing(i, j), self.multi(&elements)),
            }
        };
        add(le.pair(i, j), closed)
    }

    /// Elements of a multi-branch loop, without the closing term.
    fn multi(&self, elements: &[Element]) -> i32 {
        let le = &self.le;
        elements.iter().fold(0, |e, &el| match el {
            Element::Unpaired(k) => add(e, le.ml_unpaired(k, k)),
            Element::Pair(p, q) => add(e, add(le.ml_stem(p, q), self.pair(p, q))),
            Element::Gquad(p, _) => add(e, add(le.ml_gquad(), self.gquad_energy(p))),
        })
    }

    fn total(&self) -> i32 {
        let n = self.fc.len();
        let elements = self.elements(0, n + 1);
        let mut e = if !self.fc.model.circ {
            self.exterior(&elements)
        } else {
            let le = &self.le;
            let pairs: Vec<(usize, usize)> = elements.iter()
                .filter_map(|el| match *el {
                    Element::Pair(p, q) => Some((p, q)),
                    _ => None,
                })
                .collect();
            match pairs.as_slice() {
                [] => le.ext_unpaired(1, n),
                [(p, q)] => add(le.hairpin_circ(*p, *q), self.pair(*p, *q)),
                [(p, q), (k, l)] => add(le.interior_circ(*p, *q, *k, *l),
                    add(self.pair(*p, *q), self.pair(*k, *l))),
                _ => add(le.ml_closing_circ(), self.multi(&elements)),
            }
        };
        if self.fc.cut.is_some() {
            e = add(e, self.le.params.duplex_init * self.fc.n_seq() as i32);
        }
        e
    }
}

/// The (layers, linker total) of the G-quadruplex on the 0-based span.
fn quadruplex_layout(db: &DotBracketVec, start: usize, end: usize) -> Result<(usize, usize), StructureError> {
    let mut runs = Vec::with_capacity(4);
    let mut k = start;
    while k <= end {
        if db[k] == DotBracket::Quadruplex {
            let s = k;
            while k <= end && db[k] == DotBracket::Quadruplex {
                k += 1;
            }
            runs.push(k - s);
        } else {
            k += 1;
        }
    }
    if runs.len() != 4 || runs.iter().any(|&r| r != runs[0]) {
        return Err(StructureError::InvalidToken("quadruplex".into(), "dot-bracket".into(), start));
    }
    Ok((runs[0], end + 1 - start - 4 * runs[0]))
}

impl FoldCompound {
    /// Free energy (kcal/mol) of a structure in dot-bracket notation. A
    /// hybrid structure may carry '&' at the cut point. Returns
    /// [`FoldError::NoValidStructure`] if a loop of the structure is
    /// forbidden by the model or the hard constraints.
    pub fn eval_structure(&self, structure: &str) -> Result<f64, FoldError> {
        let n = self.len();
        let plain: String = match (self.cut, structure.find('&')) {
            (Some(cut), Some(pos)) if pos + 1 != cut => {
                return Err(StructureError::InvalidToken("cut point".into(), "structure".into(), pos).into());
            }
            (None, Some(pos)) => {
                return Err(StructureError::InvalidToken("cut point".into(), "structure".into(), pos).into());
            }
            _ => structure.chars().filter(|&c| c != '&').collect(),
        };
        if plain.chars().count() != n {
            return Err(StructureError::LengthMismatch(plain.chars().count(), n).into());
        }
        let db = DotBracketVec::try_from(plain.as_str())?;
        let pt = PairTable::try_from(&db)?;
        let params = self.energy_params()?;

        let mut partner = vec![None; n + 2];
        for (i, j) in pt.pairs() {
            partner[i + 1] = Some(j + 1);
            partner[j + 1] = Some(i + 1);
        }
        let mut gquad = vec![None; n + 2];
        for (a, b) in db.quadruplexes()? {
            let (layers, linkers) = quadruplex_layout(&db, a, b)?;
            gquad[a + 1] = Some((b + 1, params.gquad(layers, linkers)));
        }

        let ev = Evaluator {
            fc: self,
            le: LoopEnergies::new(self, params),
            partner,
            gquad,
        };
        let e = ev.total();
        debug!("Evaluated {}: {}", structure, e);
        if e >= INF {
            return Err(FoldError::NoValidStructure);
        }
        Ok(e as f64 / (100.0 * self.n_seq() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_energy::ModelDetails;
    use ff_energy::Dangles;
    use crate::FoldOptions;
    use crate::HardConstraints;

    fn compound(seq: &str, md: &ModelDetails) -> FoldCompound {
        FoldCompound::build(seq, md, FoldOptions::MFE).unwrap()
    }

    #[test]
    fn test_eval_hairpin_stack() {
        let md = ModelDetails::default().with_dangles(Dangles::None);
        let fc = compound("GGGAAACCC", &md);
        assert!((fc.eval_structure("(((...)))").unwrap() - (-1.2)).abs() < 1e-9);
        assert_eq!(fc.eval_structure(".........").unwrap(), 0.0);
        assert!((fc.eval_structure(".((...)).").unwrap() - 0.0).abs() > 1e-9);
    }

    #[test]
    fn test_eval_multibranch() {
        let md = ModelDetails::default().with_dangles(Dangles::None);
        let fc = compound("GGGGAAACCGGAAACCAACC", &md);
        let p = fc.params().unwrap();
        // Two G-C hairpins with one stack each, closed by a G-C stack.
        let h1 = fc.eval_structure("...(...)............").unwrap();
        let h2 = fc.eval_structure("..........(...).....").unwrap();
        let ml = p.ml_closing + 3 * p.ml_intern + 2 * p.ml_base;
        let expected = 3.0 * -3.3 + h1 + h2 + ml as f64 / 100.0;
        let e = fc.eval_structure("((((...))((...))..))").unwrap();
        assert!((e - expected).abs() < 1e-9, "{} vs {}", e, expected);
    }

    #[test]
    fn test_eval_errors() {
        let md = ModelDetails::default();
        let fc = compound("GGGAAACCC", &md);
        assert!(matches!(fc.eval_structure("(((..)))"), Err(FoldError::Structure(_))));
        assert!(matches!(fc.eval_structure("((((.))))"), Err(FoldError::NoValidStructure)));
        assert!(fc.eval_structure("(((...))").is_err());
        assert!(fc.eval_structure("((((&))))").is_err());
    }

    #[test]
    fn test_eval_respects_constraints() {
        let md = ModelDetails::default();
        let mut fc = compound("GGGAAACCC", &md);
        let mut hc = HardConstraints::new(9);
        hc.force_unpaired(1);
        fc.attach_constraints(Some(hc), None).unwrap();
        assert!(matches!(fc.eval_structure("(((...)))"), Err(FoldError::NoValidStructure)));
        assert!(fc.eval_structure(".((...)).").is_ok());
    }

    #[test]
    fn test_eval_hybrid() {
        let md = ModelDetails::default().with_dangles(Dangles::None);
        let opts = FoldOptions::MFE | FoldOptions::HYBRID;
        let fc = FoldCompound::build("GGG&CCC", &md, opts).unwrap();
        let p = fc.params().unwrap();
        let e = fc.eval_structure("(((&)))").unwrap();
        let expected = (2 * -330 + p.duplex_init) as f64 / 100.0;
        assert!((e - expected).abs() < 1e-9);
        assert!((fc.eval_structure("...&...").unwrap() - p.duplex_init as f64 / 100.0).abs() < 1e-9);
        assert!(fc.eval_structure("((&.))").is_err());
    }

    #[test]
    fn test_eval_gquad() {
        let md = ModelDetails::default().with_gquad(true);
        let fc = compound("GGAGGAGGAGG", &md);
        let p = fc.params().unwrap();
        let e = fc.eval_structure("++.++.++.++").unwrap();
        assert!((e - p.gquad(2, 3) as f64 / 100.0).abs() < 1e-9);
        assert!(fc.eval_structure("++.++.++.+.").is_err());
    }
}
