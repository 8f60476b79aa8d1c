//! Minimum free energy per distance class, with one representative
//! structure per class.

use log::info;
use colored::*;
use itertools::Itertools;

use ff_energy::MAXLOOP;
use ff_fold::ExteriorLoop;
use ff_fold::FoldCompound;
use ff_fold::FoldError;
use ff_fold::LoopEnergies;

use crate::Algebra;
use crate::DistanceClasses;
use crate::DistanceFold;
use crate::MinPlus;
use crate::ReferencePairs;
use crate::Scorer;
use crate::TwoDError;
use crate::TwoDMatrices;
use crate::TwoDSolution;
use crate::engine::TwoDFill;
use crate::fold::solution_list;

type Classes = DistanceClasses<MinPlus>;

/// (k, l) minus the shift, if both stay non-negative.
#[inline]
fn minus(k: usize, l: usize, (dk, dl): (i64, i64)) -> Option<(usize, usize)> {
    let k = usize::try_from(k as i64 - dk).ok()?;
    let l = usize::try_from(l as i64 - dl).ok()?;
    Some((k, l))
}

/// The class of `a` that reaches energy `e` in (k, l) after the shift and
/// the loop energy `w`.
fn single(a: &Classes, k: usize, l: usize, shift: (i64, i64), w: i32, e: i32) -> Option<(usize, usize)> {
    let (k1, l1) = minus(k, l, shift)?;
    (MinPlus::times(a.get(k1, l1), w) == e).then_some((k1, l1))
}

/// Classes of `a` and `b` whose combination reaches energy `e` in (k, l).
fn split(a: &Classes, b: &Classes, k: usize, l: usize, shift: (i64, i64), w: i32, e: i32)
    -> Option<((usize, usize), (usize, usize))>
{
    let (kk, ll) = minus(k, l, shift)?;
    a.iter().find_map(|(ka, la, va)| {
        let kb = kk.checked_sub(ka)?;
        let lb = ll.checked_sub(la)?;
        let v = MinPlus::times(MinPlus::times(va, b.get(kb, lb)), w);
        (v == e && v < ff_energy::INF).then_some(((ka, la), (kb, lb)))
    })
}

#[derive(Debug, Clone, Copy)]
enum Task {
    Q(usize, usize, usize, usize),
    Qb(usize, usize, usize, usize),
    Qm(usize, usize, usize, usize),
    Qm1(usize, usize, usize, usize),
    Qm2(usize, usize, usize),
}

struct Backtrace<'a> {
    fc: &'a FoldCompound,
    le: LoopEnergies<'a>,
    refs: &'a ReferencePairs,
    m: &'a TwoDMatrices<MinPlus>,
    db: Vec<char>,
    stack: Vec<Task>,
}

impl<'a> Backtrace<'a> {
    fn new(fc: &'a FoldCompound, le: LoopEnergies<'a>, refs: &'a ReferencePairs, m: &'a TwoDMatrices<MinPlus>) -> Self {
        Backtrace { fc, le, refs, m, db: vec!['.'; m.n], stack: Vec::new() }
    }

    #[inline]
    fn at<'b>(&self, v: &'b [Classes], i: usize, j: usize) -> &'b Classes {
        &v[self.fc.index().ij(i, j)]
    }

    fn run(mut self) -> Result<String, TwoDError> {
        while let Some(task) = self.stack.pop() {
            match task {
                Task::Q(i, j, k, l) => self.exterior(i, j, k, l)?,
                Task::Qb(i, j, k, l) => self.paired(i, j, k, l)?,
                Task::Qm(i, j, k, l) => self.multi(i, j, k, l)?,
                Task::Qm1(i, j, k, l) => self.multi1(i, j, k, l)?,
                Task::Qm2(i, k, l) => self.multi2(i, k, l)?,
            }
        }
        Ok(self.db.into_iter().collect())
    }

    fn failed(i: usize, j: usize) -> TwoDError {
        TwoDError::Fold(FoldError::Backtrack(i, j))
    }

    fn exterior(&mut self, i: usize, j: usize, k: usize, l: usize) -> Result<(), TwoDError> {
        if j <= i {
            return Ok(());
        }
        let m = self.m;
        let e = self.at(&m.q, i, j).get(k, l);
        let shift = self.refs.shift(i, j, &[(i, j - 1)]);
        if let Some((k1, l1)) = single(self.at(&m.q, i, j - 1), k, l, shift, self.le.ext_unpaired(j, j), e) {
            self.stack.push(Task::Q(i, j - 1, k1, l1));
            return Ok(());
        }
        for p in i..j {
            let stem = self.le.ext_stem(p, j);
            if p == i {
                if MinPlus::times(self.at(&m.qb, i, j).get(k, l), stem) == e {
                    self.stack.push(Task::Qb(i, j, k, l));
                    return Ok(());
                }
                continue;
            }
            let shift = self.refs.shift(i, j, &[(i, p - 1), (p, j)]);
            if let Some((a, b)) = split(self.at(&m.q, i, p - 1), self.at(&m.qb, p, j), k, l, shift, stem, e) {
                self.stack.push(Task::Q(i, p - 1, a.0, a.1));
                self.stack.push(Task::Qb(p, j, b.0, b.1));
                return Ok(());
            }
        }
        Err(Self::failed(i, j))
    }

    fn paired(&mut self, i: usize, j: usize, k: usize, l: usize) -> Result<(), TwoDError> {
        let m = self.m;
        let le = self.le;
        let e = self.at(&m.qb, i, j).get(k, l);
        self.db[i - 1] = '(';
        self.db[j - 1] = ')';
        let pair = Scorer::pair(&le, i, j);

        let shift = self.refs.pair_shift(i, j, &[]);
        if minus(k, l, shift) == Some((0, 0)) && MinPlus::times(Scorer::hairpin(&le, i, j), pair) == e {
            return Ok(());
        }

        for p in i + 1..j.min(i + MAXLOOP + 2) {
            let u1 = p - i - 1;
            let min_q = (p + 1).max(j.saturating_sub(MAXLOOP - u1 + 1));
            for q in min_q..j {
                let inner = self.at(&m.qb, p, q);
                if inner.is_empty() {
                    continue;
                }
                let shift = self.refs.pair_shift(i, j, &[(p, q)]);
                let w = MinPlus::times(Scorer::interior(&le, i, j, p, q), pair);
                if let Some((k1, l1)) = single(inner, k, l, shift, w, e) {
                    self.stack.push(Task::Qb(p, q, k1, l1));
                    return Ok(());
                }
            }
        }

        let w = MinPlus::times(Scorer::ml_closing(&le, i, j), pair);
        for u in i + 2..j {
            let shift = self.refs.pair_shift(i, j, &[(i + 1, u - 1), (u, j - 1)]);
            if let Some((a, b)) = split(self.at(&m.qm, i + 1, u - 1), self.at(&m.qm1, u, j - 1), k, l, shift, w, e) {
                self.stack.push(Task::Qm(i + 1, u - 1, a.0, a.1));
                self.stack.push(Task::Qm1(u, j - 1, b.0, b.1));
                return Ok(());
            }
        }
        Err(Self::failed(i, j))
    }

    fn multi1(&mut self, i: usize, j: usize, k: usize, l: usize) -> Result<(), TwoDError> {
        let m = self.m;
        let e = self.at(&m.qm1, i, j).get(k, l);
        if MinPlus::times(self.at(&m.qb, i, j).get(k, l), Scorer::ml_stem(&self.le, i, j)) == e {
            self.stack.push(Task::Qb(i, j, k, l));
            return Ok(());
        }
        if j > i {
            let shift = self.refs.shift(i, j, &[(i, j - 1)]);
            let w = Scorer::ml_unpaired(&self.le, j, j);
            if let Some((k1, l1)) = single(self.at(&m.qm1, i, j - 1), k, l, shift, w, e) {
                self.stack.push(Task::Qm1(i, j - 1, k1, l1));
                return Ok(());
            }
        }
        Err(Self::failed(i, j))
    }

    fn multi(&mut self, i: usize, j: usize, k: usize, l: usize) -> Result<(), TwoDError> {
        let m = self.m;
        let e = self.at(&m.qm, i, j).get(k, l);
        for u in i..=j {
            let tail = self.at(&m.qm1, u, j);
            if tail.is_empty() {
                continue;
            }
            if u == i {
                if tail.get(k, l) == e {
                    self.stack.push(Task::Qm1(i, j, k, l));
                    return Ok(());
                }
                continue;
            }
            let shift = self.refs.shift(i, j, &[(u, j)]);
            let w = Scorer::ml_unpaired(&self.le, i, u - 1);
            if let Some((k1, l1)) = single(tail, k, l, shift, w, e) {
                self.stack.push(Task::Qm1(u, j, k1, l1));
                return Ok(());
            }
            let shift = self.refs.shift(i, j, &[(i, u - 1), (u, j)]);
            if let Some((a, b)) = split(self.at(&m.qm, i, u - 1), tail, k, l, shift, 0, e) {
                self.stack.push(Task::Qm(i, u - 1, a.0, a.1));
                self.stack.push(Task::Qm1(u, j, b.0, b.1));
                return Ok(());
            }
        }
        Err(Self::failed(i, j))
    }

    fn multi2(&mut self, i: usize, k: usize, l: usize) -> Result<(), TwoDError> {
        let m = self.m;
        let n = m.n;
        let e = m.qm2[i].get(k, l);
        for u in i..n {
            let shift = self.refs.shift(i, n, &[(i, u), (u + 1, n)]);
            if let Some((a, b)) = split(self.at(&m.qm1, i, u), self.at(&m.qm1, u + 1, n), k, l, shift, 0, e) {
                self.stack.push(Task::Qm1(i, u, a.0, a.1));
                self.stack.push(Task::Qm1(u + 1, n, b.0, b.1));
                return Ok(());
            }
        }
        Err(Self::failed(i, n))
    }

    /// Seed the backtrace of the circular exterior loop of class (k, l),
    /// restricted to the given loop type.
    fn circular(&mut self, which: ExteriorLoop, k: usize, l: usize) -> Result<(), TwoDError> {
        let m = self.m;
        let n = m.n;
        let le = self.le;
        let e = m.exterior(which).get(k, l);
        let any = which == ExteriorLoop::Total;

        if any && minus(k, l, self.refs.shift(1, n, &[])) == Some((0, 0))
            && Scorer::ext_unpaired(&le, 1, n) == e
        {
            return Ok(());
        }
        if any || which == ExteriorLoop::Hairpin {
            for (p, q) in (1..=n).tuple_combinations() {
                let shift = self.refs.shift(1, n, &[(p, q)]);
                let w = Scorer::hairpin_circ(&le, p, q);
                if let Some((k1, l1)) = single(self.at(&m.qb, p, q), k, l, shift, w, e) {
                    self.stack.push(Task::Qb(p, q, k1, l1));
                    return Ok(());
                }
            }
        }
        if any || which == ExteriorLoop::Interior {
            for (p, q) in (1..=n).tuple_combinations() {
                let qb = self.at(&m.qb, p, q);
                if qb.is_empty() || p - 1 > MAXLOOP {
                    continue;
                }
                for r in q + 1..=n.min(q + 1 + MAXLOOP) {
                    let n1 = r - q - 1;
                    if n1 + p - 1 > MAXLOOP {
                        break;
                    }
                    let min_s = (r + 1).max((n + p + n1).saturating_sub(MAXLOOP + 1));
                    for s in min_s..=n {
                        let shift = self.refs.shift(1, n, &[(p, q), (r, s)]);
                        let w = Scorer::interior_circ(&le, p, q, r, s);
                        if let Some((a, b)) = split(qb, self.at(&m.qb, r, s), k, l, shift, w, e) {
                            self.stack.push(Task::Qb(p, q, a.0, a.1));
                            self.stack.push(Task::Qb(r, s, b.0, b.1));
                            return Ok(());
                        }
                    }
                }
            }
        }
        if any || which == ExteriorLoop::Multi {
            let w = Scorer::ml_closing_circ(&le);
            for u in 1..n {
                let shift = self.refs.shift(1, n, &[(1, u), (u + 1, n)]);
                if let Some((a, b)) = split(self.at(&m.qm, 1, u), &m.qm2[u + 1], k, l, shift, w, e) {
                    self.stack.push(Task::Qm(1, u, a.0, a.1));
                    self.stack.push(Task::Qm2(u + 1, b.0, b.1));
                    return Ok(());
                }
            }
        }
        Err(Self::failed(1, n))
    }
}

impl DistanceFold {
    /// Fill the minimum free energy distance class arrays.
    pub fn mfe_classes(&self) -> Result<TwoDMatrices<MinPlus>, TwoDError> {
        let params = self.fc.params().ok_or(FoldError::MissingParameters("minimum free energy"))?;
        let le = LoopEnergies::new(&self.fc, params);
        Ok(TwoDFill::new(&self.fc, le, &self.refs, self.bounds).run())
    }

    /// A minimum free energy structure of class (k, l).
    pub fn backtrace(&self, m: &TwoDMatrices<MinPlus>, which: ExteriorLoop, k: usize, l: usize)
        -> Result<String, TwoDError>
    {
        let params = self.fc.params().ok_or(FoldError::MissingParameters("minimum free energy"))?;
        let le = LoopEnergies::new(&self.fc, params);
        let mut bt = Backtrace::new(&self.fc, le, &self.refs, m);
        if MinPlus::is_zero(m.exterior(which).get(k, l)) {
            return Err(TwoDError::Fold(FoldError::NoValidStructure));
        }
        if self.fc.is_circular() {
            bt.circular(which, k, l)?;
        } else {
            bt.stack.push(Task::Q(1, m.n, k, l));
        }
        bt.run()
    }

    /// Minimum free energy and a representative structure per distance
    /// class, followed by the remainder and the end sentinel.
    pub fn mfe(&self) -> Result<Vec<TwoDSolution>, TwoDError> {
        self.mfe_exterior(ExteriorLoop::Total)
    }

    /// As [`DistanceFold::mfe`], for the structures of a circular molecule
    /// whose exterior loop is of the given type.
    pub fn mfe_exterior(&self, which: ExteriorLoop) -> Result<Vec<TwoDSolution>, TwoDError> {
        if which != ExteriorLoop::Total && !self.fc.is_circular() {
            return Err(TwoDError::Unsupported("exterior loop types of linear molecules"));
        }
        let m = self.mfe_classes()?;
        let classes = m.exterior(which);
        if let Some((e, s)) = classes.iter().min_by_key(|c| c.2).map(|(k, l, e)| (e, (k, l))) {
            info!("{} {:.2} kcal/mol in class {:?}", "2D MFE:".green(), e as f64 / 100.0, s);
        }
        solution_list(classes,
            |e: i32| e as f64 / 100.0,
            |k, l| self.backtrace(&m, which, k, l).map(Some))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_energy::Dangles;
    use ff_energy::ModelDetails;
    use ff_fold::FoldOptions;

    fn fold(seq: &str, md: &ModelDetails, r1: &str, r2: &str) -> DistanceFold {
        let fc = FoldCompound::build(seq, md, FoldOptions::default()).unwrap();
        DistanceFold::new(fc, r1, r2).unwrap()
    }

    #[test]
    fn test_hairpin_classes() {
        let md = ModelDetails::default().with_dangles(Dangles::None);
        let df = fold("GGGAAACCC", &md, ".........", "(((...)))");
        let list = df.mfe().unwrap();
        assert!(list.last().unwrap().is_sentinel());
        let open = list.iter().find(|s| (s.k, s.l) == (0, 3)).unwrap();
        assert_eq!(open.value, 0.0);
        assert_eq!(open.structure.as_deref(), Some("........."));
        let stem = list.iter().find(|s| (s.k, s.l) == (3, 0)).unwrap();
        assert!((stem.value - (-1.2)).abs() < 1e-9);
        assert_eq!(stem.structure.as_deref(), Some("(((...)))"));
        // Every class has the distances it claims.
        for s in list.iter().filter(|s| s.structure.is_some()) {
            let db = s.structure.as_deref().unwrap();
            assert_eq!(df.references().distances(db).unwrap(), (s.k as usize, s.l as usize));
            let e = df.compound().eval_structure(db).unwrap();
            assert!((e - s.value).abs() < 1e-9);
        }
    }

    #[test]
    fn test_minimum_matches_mfe() {
        let md = ModelDetails::default();
        let seq = "GGGAGCUCCAAAGGAGCUCCCAUAUAGC";
        let mut fc = FoldCompound::build(seq, &md, FoldOptions::default()).unwrap();
        let mfe = fc.mfe().unwrap();
        let r1 = ".".repeat(seq.len());
        let df = DistanceFold::new(fc, &r1, &mfe.structure).unwrap();
        let list = df.mfe().unwrap();
        let best = list.iter()
            .filter(|s| !s.is_sentinel())
            .map(|s| s.value)
            .fold(f64::INFINITY, f64::min);
        assert!((best - mfe.energy).abs() < 1e-9);
        let own = list.iter().find(|s| s.l == 0).unwrap();
        assert!((own.value - mfe.energy).abs() < 1e-9);
    }

    #[test]
    fn test_remainder_keeps_minimum() {
        let md = ModelDetails::default();
        let seq = "GGGAGCUCCAAAGGAGCUCCC";
        let r = ".".repeat(seq.len());
        let mut fc = FoldCompound::build(seq, &md, FoldOptions::default()).unwrap();
        let mfe = fc.mfe().unwrap();
        let df = DistanceFold::new(fc, &r, &r).unwrap().with_max_distances(1, 1);
        let list = df.mfe().unwrap();
        assert!(list.iter().filter(|s| !s.is_sentinel() && !s.is_remainder()).all(|s| s.k <= 1 && s.l <= 1));
        let rem = list.iter().find(|s| s.is_remainder()).unwrap();
        assert!(rem.structure.is_none());
        assert!((rem.value - mfe.energy).abs() < 1e-9);
    }

    #[test]
    fn test_circular_classes() {
        let md = ModelDetails::default().with_circ(true);
        let seq = "GGGGAAAACCCCAUAUAUGGGAAACCC";
        let r = ".".repeat(seq.len());
        let mut fc = FoldCompound::build(seq, &md, FoldOptions::default()).unwrap();
        let mfe = fc.mfe().unwrap();
        let df = DistanceFold::new(fc, &r, &mfe.structure).unwrap();
        let list = df.mfe().unwrap();
        let own = list.iter().find(|s| s.l == 0).unwrap();
        assert!((own.value - mfe.energy).abs() < 1e-9);
        for s in list.iter().filter(|s| s.structure.is_some()) {
            let db = s.structure.as_deref().unwrap();
            assert!((df.compound().eval_structure(db).unwrap() - s.value).abs() < 1e-9);
        }
        let hairpins = df.mfe_exterior(ExteriorLoop::Hairpin).unwrap();
        assert!(hairpins.iter().filter(|s| !s.is_sentinel()).all(|s| s.value >= own.value - 1e-9));
        let fc = FoldCompound::build(seq, &ModelDetails::default(), FoldOptions::default()).unwrap();
        let linear = DistanceFold::new(fc, &r, &r).unwrap();
        assert!(linear.mfe_exterior(ExteriorLoop::Multi).is_err());
    }
}
