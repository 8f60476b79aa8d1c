//! Minimum free energy folding and backtracking.

use log::debug;
use log::info;
use colored::*;

use ff_energy::EnergyParams;
use ff_energy::INF;
use ff_energy::MAXLOOP;
use ff_structure::DotBracket;
use ff_structure::DotBracketVec;

use crate::FoldCompound;
use crate::LoopEnergies;
use crate::MfeMatrices;
use crate::GquadScanner;
use crate::ExteriorLoop;
use crate::Solution;
use crate::FoldError;
use crate::gquad::gquad_mfe_matrix;

#[inline]
pub(crate) fn add(a: i32, b: i32) -> i32 {
    if a >= INF || b >= INF { INF } else { a + b }
}

#[inline]
fn add3(a: i32, b: i32, c: i32) -> i32 {
    add(add(a, b), c)
}

/// The arrays of an ongoing fill, taken out of their [`MfeMatrices`].
struct MfeFill<'a> {
    fc: &'a FoldCompound,
    le: LoopEnergies<'a>,
    n: usize,
    c: Vec<i32>,
    fml: Vec<i32>,
    fm1: Vec<i32>,
    ggg: Option<Vec<i32>>,
    fcx: Option<Vec<i32>>,
}

impl MfeFill<'_> {
    #[inline]
    fn get(&self, v: &[i32], i: usize, j: usize) -> i32 {
        if i == 0 || j < i || j > self.n { INF } else { v[self.fc.index.ji(i, j)] }
    }

    #[inline]
    fn c(&self, i: usize, j: usize) -> i32 {
        self.get(&self.c, i, j)
    }

    #[inline]
    fn fml(&self, i: usize, j: usize) -> i32 {
        self.get(&self.fml, i, j)
    }

    #[inline]
    fn fm1(&self, i: usize, j: usize) -> i32 {
        self.get(&self.fm1, i, j)
    }

    #[inline]
    fn ggg(&self, i: usize, j: usize) -> i32 {
        self.ggg.as_ref().map_or(INF, |g| self.get(g, i, j))
    }

    /// Exterior loop on k..cut-1 (empty for k >= cut).
    fn fc_left(&self, k: usize) -> i32 {
        match (self.fc.cut, &self.fcx) {
            (Some(cut), Some(v)) if k < cut => v[k],
            _ => 0,
        }
    }

    /// Exterior loop on cut..=j (empty for j < cut).
    fn fc_right(&self, j: usize) -> i32 {
        match (self.fc.cut, &self.fcx) {
            (Some(cut), Some(v)) if j >= cut => v[j],
            _ => 0,
        }
    }

    fn cell(&mut self, i: usize, j: usize) {
        let ij = self.fc.index.ji(i, j);
        let c = self.paired(i, j);
        self.c[ij] = c;

        let le = &self.le;
        let mut fm1 = add(c, le.ml_stem(i, j));
        fm1 = fm1.min(add(self.ggg(i, j), le.ml_gquad()));
        if self.fc.same_strand(j - 1, j) {
            fm1 = fm1.min(add(self.fm1(i, j - 1), le.ml_unpaired(j, j)));
        }
        self.fm1[ij] = fm1;

        let mut fml = INF;
        for u in i..=j {
            let tail = self.fm1(u, j);
            if tail >= INF {
                continue;
            }
            let head = if u == i {
                0
            } else {
                let mut h = INF;
                if self.fc.same_strand(i, u) {
                    h = le.ml_unpaired(i, u - 1);
                }
                if self.fc.same_strand(u - 1, u) {
                    h = h.min(self.fml(i, u - 1));
                }
                h
            };
            fml = fml.min(add(head, tail));
        }
        self.fml[ij] = fml;
    }

    /// c[i, j]: the best structure on i..=j in which i and j pair.
    fn paired(&self, i: usize, j: usize) -> i32 {
        let le = &self.le;
        let pair = le.pair(i, j);
        if pair >= INF {
            return INF;
        }
        let mut best = le.hairpin(i, j);

        for p in i + 1..j.min(i + MAXLOOP + 2) {
            let u1 = p - i - 1;
            let min_q = (p + 1).max(j.saturating_sub(MAXLOOP - u1 + 1));
            for q in min_q..j {
                let inner = self.c(p, q);
                if inner >= INF {
                    continue;
                }
                best = best.min(add(le.interior(i, j, p, q), inner));
            }
        }

        let closing = le.ml_closing(i, j);
        if closing < INF {
            for u in i + 2..j {
                if !self.fc.same_strand(u - 1, u) {
                    continue;
                }
                best = best.min(add3(closing, self.fml(i + 1, u - 1), self.fm1(u, j - 1)));
            }
        }

        if self.ggg.is_some() {
            for p in i + 1..j.min(i + MAXLOOP + 2) {
                for q in p + 1..j {
                    if !LoopEnergies::gquad_interior_allowed(i, j, p, q) {
                        continue;
                    }
                    let g = self.ggg(p, q);
                    if g < INF {
                        best = best.min(add(le.gquad_interior(i, j, p, q), g));
                    }
                }
            }
        }

        if let Some(cut) = self.fc.cut {
            if i < cut && cut <= j {
                best = best.min(add3(le.cut_stem(i, j), self.fc_left(i + 1), self.fc_right(j - 1)));
            }
        }
        add(pair, best)
    }

    /// Exterior loop on i..=n, given f3 for i+1..=n+1.
    fn f3_entry(&self, f3: &[i32], i: usize) -> i32 {
        let le = &self.le;
        let mut e = add(f3[i + 1], le.ext_unpaired(i, i));
        for l in i + 1..=self.n {
            let rest = f3[l + 1];
            if rest >= INF {
                continue;
            }
            e = e.min(add3(self.c(i, l), le.ext_stem(i, l), rest));
            e = e.min(add(self.ggg(i, l), rest));
        }
        e
    }

    fn fc_left_entry(&self, i: usize, cut: usize) -> i32 {
        let le = &self.le;
        let mut e = add(le.ext_unpaired(i, i), self.fc_left(i + 1));
        for l in i + 1..cut {
            e = e.min(add3(self.c(i, l), le.ext_stem(i, l), self.fc_left(l + 1)));
        }
        e
    }

    fn fc_right_entry(&self, j: usize, cut: usize) -> i32 {
        let le = &self.le;
        let mut e = add(self.fc_right(j - 1), le.ext_unpaired(j, j));
        for k in cut..j {
            e = e.min(add3(self.fc_right(k - 1), self.c(k, j), le.ext_stem(k, j)));
        }
        e
    }

    fn f5(&self, f5: &mut [i32]) {
        let le = &self.le;
        f5[0] = 0;
        for j in 1..=self.n {
            let mut e = add(f5[j - 1], le.ext_unpaired(j, j));
            for k in 1..j {
                let before = f5[k - 1];
                if before >= INF {
                    continue;
                }
                e = e.min(add3(before, self.c(k, j), le.ext_stem(k, j)));
                e = e.min(add(before, self.ggg(k, j)));
            }
            f5[j] = e;
        }
    }

    /// fm2[k]: at least two branches on k..=n.
    fn fm2(&self, fm2: &mut [i32]) {
        for k in 1..=self.n {
            fm2[k] = (k..self.n)
                .map(|u| add(self.fm1(k, u), self.fm1(u + 1, self.n)))
                .min()
                .unwrap_or(INF);
        }
    }

    fn circular(&self, fm2: &[i32], m: &mut MfeMatrices) {
        let le = &self.le;
        let n = self.n;
        let mut hp = INF;
        let mut int = INF;
        for p in 1..n {
            for q in p + 1..=n {
                let c = self.c(p, q);
                if c >= INF {
                    continue;
                }
                hp = hp.min(add(c, le.hairpin_circ(p, q)));
                if p - 1 > MAXLOOP {
                    continue;
                }
                for k in q + 1..=n.min(q + 1 + MAXLOOP) {
                    let n1 = k - q - 1;
                    if n1 + p - 1 > MAXLOOP {
                        break;
                    }
                    let min_l = (k + 1).max((n + p + n1).saturating_sub(MAXLOOP + 1));
                    for l in min_l..=n {
                        let c2 = self.c(k, l);
                        if c2 < INF {
                            int = int.min(add3(c, c2, le.interior_circ(p, q, k, l)));
                        }
                    }
                }
            }
        }
        let closing = le.ml_closing_circ();
        let mut ml = INF;
        for k in 1..n {
            ml = ml.min(add3(self.fml(1, k), fm2[k + 1], closing));
        }
        let open = le.ext_unpaired(1, n);
        m.circ[ExteriorLoop::Hairpin] = hp;
        m.circ[ExteriorLoop::Interior] = int;
        m.circ[ExteriorLoop::Multi] = ml;
        m.circ[ExteriorLoop::Total] = open.min(hp).min(int).min(ml);
    }
}

/// Fill the MFE matrices of a compound with the given parameters. Returns
/// the matrices and the total minimum free energy (dcal/mol, summed over
/// the sequences of an alignment).
pub(crate) fn mfe_fill(fc: &FoldCompound, params: &EnergyParams) -> Result<(MfeMatrices, i32), FoldError> {
    let n = fc.len();
    let mut m = MfeMatrices::allocate(n, fc.mfe_mask())?;
    let mut fill = MfeFill {
        fc,
        le: LoopEnergies::new(fc, params),
        n,
        c: m.c.take().ok_or(FoldError::NotAllocated("c"))?,
        fml: m.fml.take().ok_or(FoldError::NotAllocated("fml"))?,
        fm1: m.fm1.take().ok_or(FoldError::NotAllocated("fm1"))?,
        ggg: m.ggg.take(),
        fcx: m.fc.take(),
    };
    if let Some(ggg) = fill.ggg.as_mut() {
        gquad_mfe_matrix(fc, params, ggg);
    }

    let mut f3 = m.f3.take();
    if let Some(f3) = f3.as_mut() {
        f3[n + 1] = 0;
    }
    for i in (1..=n).rev() {
        for j in i + 1..=n {
            fill.cell(i, j);
        }
        if let Some(f3) = f3.as_mut() {
            let e = fill.f3_entry(f3, i);
            f3[i] = e;
        }
        if let Some(cut) = fc.cut {
            if i < cut {
                let e = fill.fc_left_entry(i, cut);
                if let Some(v) = fill.fcx.as_mut() {
                    v[i] = e;
                }
            } else if i == cut {
                for j in cut..=n {
                    let e = fill.fc_right_entry(j, cut);
                    if let Some(v) = fill.fcx.as_mut() {
                        v[j] = e;
                    }
                }
            }
        }
    }

    let mut f5 = m.f5.take().ok_or(FoldError::NotAllocated("f5"))?;
    fill.f5(&mut f5);

    let total = if fc.model.circ {
        let mut fm2 = m.fm2.take().ok_or(FoldError::NotAllocated("fm2"))?;
        fill.fm2(&mut fm2);
        fill.circular(&fm2, &mut m);
        m.fm2 = Some(fm2);
        m.circ[ExteriorLoop::Total]
    } else if fc.cut.is_some() {
        add(f5[n], params.duplex_init * fc.n_seq() as i32)
    } else {
        f5[n]
    };
    debug!("MFE fill done: n = {}, total = {}", n, total);

    m.c = Some(fill.c);
    m.fml = Some(fill.fml);
    m.fm1 = Some(fill.fm1);
    m.ggg = fill.ggg;
    m.fc = fill.fcx;
    m.f5 = Some(f5);
    m.f3 = f3;
    Ok((m, total))
}

enum Task {
    F5(usize),
    C(usize, usize),
    Fml(usize, usize),
    Fm1(usize, usize),
    FcLeft(usize),
    FcRight(usize),
    Gquad(usize, usize),
}

/// Reconstructs one optimal structure from filled matrices.
struct Backtrack<'a> {
    fc: &'a FoldCompound,
    le: LoopEnergies<'a>,
    m: &'a MfeMatrices,
    scanner: Option<GquadScanner>,
    db: DotBracketVec,
    stack: Vec<Task>,
}

impl<'a> Backtrack<'a> {
    fn new(fc: &'a FoldCompound, params: &'a EnergyParams, m: &'a MfeMatrices) -> Self {
        Backtrack {
            fc,
            le: LoopEnergies::new(fc, params),
            m,
            scanner: fc.model.gquad.then(|| GquadScanner::new(fc)),
            db: DotBracketVec::unpaired(fc.len()),
            stack: Vec::new(),
        }
    }

    fn get(&self, v: &Option<Vec<i32>>, i: usize, j: usize) -> i32 {
        match v {
            Some(v) if i >= 1 && i <= j && j <= self.fc.len() => v[self.fc.index.ji(i, j)],
            _ => INF,
        }
    }

    fn c(&self, i: usize, j: usize) -> i32 { self.get(&self.m.c, i, j) }
    fn fml(&self, i: usize, j: usize) -> i32 { self.get(&self.m.fml, i, j) }
    fn fm1(&self, i: usize, j: usize) -> i32 { self.get(&self.m.fm1, i, j) }
    fn ggg(&self, i: usize, j: usize) -> i32 { self.get(&self.m.ggg, i, j) }

    fn fc_left(&self, k: usize) -> i32 {
        match (self.fc.cut, &self.m.fc) {
            (Some(cut), Some(v)) if k < cut => v[k],
            _ => 0,
        }
    }

    fn fc_right(&self, j: usize) -> i32 {
        match (self.fc.cut, &self.m.fc) {
            (Some(cut), Some(v)) if j >= cut => v[j],
            _ => 0,
        }
    }

    fn run(mut self) -> Result<DotBracketVec, FoldError> {
        while let Some(task) = self.stack.pop() {
            match task {
                Task::F5(j) => self.f5(j)?,
                Task::C(i, j) => self.paired(i, j)?,
                Task::Fml(i, j) => self.fml_split(i, j)?,
                Task::Fm1(i, j) => self.fm1_split(i, j)?,
                Task::FcLeft(i) => self.fc_left_split(i)?,
                Task::FcRight(j) => self.fc_right_split(j)?,
                Task::Gquad(i, j) => self.gquad(i, j)?,
            }
        }
        Ok(self.db)
    }

    fn f5(&mut self, j: usize) -> Result<(), FoldError> {
        if j == 0 {
            return Ok(());
        }
        let f5 = self.m.f5()?;
        let target = f5[j];
        if add(f5[j - 1], self.le.ext_unpaired(j, j)) == target {
            self.stack.push(Task::F5(j - 1));
            return Ok(());
        }
        for k in 1..j {
            if add3(f5[k - 1], self.c(k, j), self.le.ext_stem(k, j)) == target {
                self.stack.push(Task::F5(k - 1));
                self.stack.push(Task::C(k, j));
                return Ok(());
            }
            if add(f5[k - 1], self.ggg(k, j)) == target {
                self.stack.push(Task::F5(k - 1));
                self.stack.push(Task::Gquad(k, j));
                return Ok(());
            }
        }
        Err(FoldError::Backtrack(1, j))
    }

    fn paired(&mut self, i: usize, j: usize) -> Result<(), FoldError> {
        self.db[i - 1] = DotBracket::Open;
        self.db[j - 1] = DotBracket::Close;
        let le = self.le;
        let target = self.c(i, j) - le.pair(i, j);
        if le.hairpin(i, j) == target {
            return Ok(());
        }
        for p in i + 1..j.min(i + MAXLOOP + 2) {
            let u1 = p - i - 1;
            let min_q = (p + 1).max(j.saturating_sub(MAXLOOP - u1 + 1));
            for q in min_q..j {
                let inner = self.c(p, q);
                if inner < INF && add(le.interior(i, j, p, q), inner) == target {
                    self.stack.push(Task::C(p, q));
                    return Ok(());
                }
            }
        }
        let closing = le.ml_closing(i, j);
        if closing < INF {
            for u in i + 2..j {
                if self.fc.same_strand(u - 1, u)
                    && add3(closing, self.fml(i + 1, u - 1), self.fm1(u, j - 1)) == target
                {
                    self.stack.push(Task::Fml(i + 1, u - 1));
                    self.stack.push(Task::Fm1(u, j - 1));
                    return Ok(());
                }
            }
        }
        if self.m.ggg.is_some() {
            for p in i + 1..j.min(i + MAXLOOP + 2) {
                for q in p + 1..j {
                    if LoopEnergies::gquad_interior_allowed(i, j, p, q)
                        && add(le.gquad_interior(i, j, p, q), self.ggg(p, q)) == target
                    {
                        self.stack.push(Task::Gquad(p, q));
                        return Ok(());
                    }
                }
            }
        }
        if let Some(cut) = self.fc.cut {
            if i < cut && cut <= j
                && add3(le.cut_stem(i, j), self.fc_left(i + 1), self.fc_right(j - 1)) == target
            {
                self.stack.push(Task::FcLeft(i + 1));
                self.stack.push(Task::FcRight(j - 1));
                return Ok(());
            }
        }
        Err(FoldError::Backtrack(i, j))
    }

    fn fml_split(&mut self, i: usize, j: usize) -> Result<(), FoldError> {
        let target = self.fml(i, j);
        for u in i..=j {
            let tail = self.fm1(u, j);
            if tail >= INF {
                continue;
            }
            if u == i {
                if tail == target {
                    self.stack.push(Task::Fm1(u, j));
                    return Ok(());
                }
                continue;
            }
            if self.fc.same_strand(i, u) && add(self.le.ml_unpaired(i, u - 1), tail) == target {
                self.stack.push(Task::Fm1(u, j));
                return Ok(());
            }
            if self.fc.same_strand(u - 1, u) && add(self.fml(i, u - 1), tail) == target {
                self.stack.push(Task::Fml(i, u - 1));
                self.stack.push(Task::Fm1(u, j));
                return Ok(());
            }
        }
        Err(FoldError::Backtrack(i, j))
    }

    fn fm1_split(&mut self, i: usize, j: usize) -> Result<(), FoldError> {
        let target = self.fm1(i, j);
        if add(self.c(i, j), self.le.ml_stem(i, j)) == target {
            self.stack.push(Task::C(i, j));
            return Ok(());
        }
        if add(self.ggg(i, j), self.le.ml_gquad()) == target {
            self.stack.push(Task::Gquad(i, j));
            return Ok(());
        }
        if j > i && self.fc.same_strand(j - 1, j)
            && add(self.fm1(i, j - 1), self.le.ml_unpaired(j, j)) == target
        {
            self.stack.push(Task::Fm1(i, j - 1));
            return Ok(());
        }
        Err(FoldError::Backtrack(i, j))
    }

    fn fc_left_split(&mut self, i: usize) -> Result<(), FoldError> {
        let Some(cut) = self.fc.cut else { return Ok(()) };
        if i >= cut {
            return Ok(());
        }
        let target = self.fc_left(i);
        if add(self.le.ext_unpaired(i, i), self.fc_left(i + 1)) == target {
            self.stack.push(Task::FcLeft(i + 1));
            return Ok(());
        }
        for l in i + 1..cut {
            if add3(self.c(i, l), self.le.ext_stem(i, l), self.fc_left(l + 1)) == target {
                self.stack.push(Task::FcLeft(l + 1));
                self.stack.push(Task::C(i, l));
                return Ok(());
            }
        }
        Err(FoldError::Backtrack(i, cut - 1))
    }

    fn fc_right_split(&mut self, j: usize) -> Result<(), FoldError> {
        let Some(cut) = self.fc.cut else { return Ok(()) };
        if j < cut {
            return Ok(());
        }
        let target = self.fc_right(j);
        if add(self.fc_right(j - 1), self.le.ext_unpaired(j, j)) == target {
            self.stack.push(Task::FcRight(j - 1));
            return Ok(());
        }
        for k in cut..j {
            if add3(self.fc_right(k - 1), self.c(k, j), self.le.ext_stem(k, j)) == target {
                self.stack.push(Task::FcRight(k - 1));
                self.stack.push(Task::C(k, j));
                return Ok(());
            }
        }
        Err(FoldError::Backtrack(cut, j))
    }

    fn gquad(&mut self, i: usize, j: usize) -> Result<(), FoldError> {
        let layout = self.scanner.as_ref()
            .and_then(|s| s.mfe(self.le.params, i, j))
            .map(|(_, layout)| layout);
        match layout {
            Some((layers, linkers)) => {
                self.db.mark_quadruplex(i - 1, layers, linkers);
                Ok(())
            }
            None => Err(FoldError::Backtrack(i, j)),
        }
    }

    /// Seed the stack for the exterior loop of a circular molecule.
    fn circular(&mut self) -> Result<(), FoldError> {
        let n = self.fc.len();
        let le = self.le;
        let circ = self.m.circ;
        let total = circ[ExteriorLoop::Total];
        if le.ext_unpaired(1, n) == total {
            return Ok(());
        }
        if circ[ExteriorLoop::Hairpin] == total {
            for p in 1..n {
                for q in p + 1..=n {
                    if add(self.c(p, q), le.hairpin_circ(p, q)) == total {
                        self.stack.push(Task::C(p, q));
                        return Ok(());
                    }
                }
            }
        }
        if circ[ExteriorLoop::Interior] == total {
            for p in 1..n {
                for q in p + 1..=n {
                    let c = self.c(p, q);
                    if c >= INF || p - 1 > MAXLOOP {
                        continue;
                    }
                    for k in q + 1..=n.min(q + 1 + MAXLOOP) {
                        let n1 = k - q - 1;
                        if n1 + p - 1 > MAXLOOP {
                            break;
                        }
                        let min_l = (k + 1).max((n + p + n1).saturating_sub(MAXLOOP + 1));
                        for l in min_l..=n {
                            if add3(c, self.c(k, l), le.interior_circ(p, q, k, l)) == total {
                                self.stack.push(Task::C(p, q));
                                self.stack.push(Task::C(k, l));
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
        if circ[ExteriorLoop::Multi] == total {
            let fm2 = self.m.fm2()?;
            let closing = le.ml_closing_circ();
            for k in 1..n {
                if add3(self.fml(1, k), fm2[k + 1], closing) == total {
                    self.stack.push(Task::Fml(1, k));
                    for u in k + 1..n {
                        if add(self.fm1(k + 1, u), self.fm1(u + 1, n)) == fm2[k + 1] {
                            self.stack.push(Task::Fm1(k + 1, u));
                            self.stack.push(Task::Fm1(u + 1, n));
                            return Ok(());
                        }
                    }
                    return Err(FoldError::Backtrack(k + 1, n));
                }
            }
        }
        Err(FoldError::Backtrack(1, n))
    }
}

/// Dot-bracket string of a structure, with '&' at the cut point.
pub(crate) fn with_cut(db: &DotBracketVec, cut: Option<usize>) -> String {
    let mut s = db.to_string();
    if let Some(c) = cut {
        s.insert(c - 1, '&');
    }
    s
}

impl FoldCompound {
    /// Compute the minimum free energy and one optimal structure. The MFE
    /// matrices stay available until constraints change.
    pub fn mfe(&mut self) -> Result<Solution, FoldError> {
        let params = self.params.as_ref().ok_or(FoldError::MissingParameters("mfe"))?;
        let (m, total) = mfe_fill(self, params)?;
        if total >= INF {
            self.mfe_matrices = Some(m);
            return Err(FoldError::NoValidStructure);
        }
        let structure = self.mfe_backtrack(params, &m)?;
        let energy = total as f64 / (100.0 * self.n_seq() as f64);
        info!("{} {} ({:.2} kcal/mol)", "MFE:".green(), structure, energy);
        self.mfe_matrices = Some(m);
        Ok(Solution { energy, structure })
    }

    fn mfe_backtrack(&self, params: &EnergyParams, m: &MfeMatrices) -> Result<String, FoldError> {
        let mut bt = Backtrack::new(self, params, m);
        if self.model.circ {
            bt.circular()?;
        } else {
            bt.stack.push(Task::F5(self.len()));
        }
        let db = bt.run()?;
        Ok(with_cut(&db, self.cut))
    }
}
