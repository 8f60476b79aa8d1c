//! Ragged storage of values per distance class (k, l).
//!
//! For every k a contiguous run of l values is stored, starting at its own
//! `l_min`. Classes beyond the distance bounds are not stored individually
//! but combined into a single remainder.

use crate::Algebra;

/// Largest k and l that are tracked individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub max_k: usize,
    pub max_l: usize,
}

impl Bounds {
    #[inline]
    fn contains(&self, k: usize, l: usize) -> bool {
        k <= self.max_k && l <= self.max_l
    }
}

/// The tracked l values of one k.
#[derive(Debug, Clone, PartialEq)]
pub struct LRange<V> {
    pub l_min: usize,
    pub values: Vec<V>,
}

impl<V> LRange<V> {
    pub fn l_max(&self) -> Option<usize> {
        (!self.values.is_empty()).then(|| self.l_min + self.values.len() - 1)
    }
}

#[derive(Debug, Clone)]
pub struct DistanceClasses<A: Algebra> {
    k_min: usize,
    rows: Vec<LRange<A::Value>>,
    rem: A::Value,
}

impl<A: Algebra> Default for DistanceClasses<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// `base + shift` as a class coordinate, if it is one.
#[inline]
fn coordinate(base: usize, shift: i64) -> Option<usize> {
    usize::try_from(base as i64 + shift).ok()
}

impl<A: Algebra> DistanceClasses<A> {
    pub fn new() -> Self {
        DistanceClasses {
            k_min: 0,
            rows: Vec::new(),
            rem: A::ZERO,
        }
    }

    /// Only the class (k, l) holds `value`.
    pub fn single(k: usize, l: usize, value: A::Value, bounds: Bounds) -> Self {
        let mut c = Self::new();
        c.add(k, l, value, bounds);
        c
    }

    /// No tracked class and no remainder.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && A::is_zero(self.rem)
    }

    pub fn get(&self, k: usize, l: usize) -> A::Value {
        if k < self.k_min {
            return A::ZERO;
        }
        match self.rows.get(k - self.k_min) {
            Some(row) if l >= row.l_min => row.values.get(l - row.l_min).copied().unwrap_or(A::ZERO),
            _ => A::ZERO,
        }
    }

    pub fn remainder(&self) -> A::Value {
        self.rem
    }

    /// The range of tracked k values.
    pub fn k_range(&self) -> Option<(usize, usize)> {
        (!self.rows.is_empty()).then(|| (self.k_min, self.k_min + self.rows.len() - 1))
    }

    /// The tracked l values of k.
    pub fn row(&self, k: usize) -> Option<&LRange<A::Value>> {
        k.checked_sub(self.k_min).and_then(|x| self.rows.get(x))
    }

    /// Tracked classes that hold a value, by increasing k, then l.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, A::Value)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(x, row)| {
            row.values.iter()
                .enumerate()
                .filter(|(_, v)| !A::is_zero(**v))
                .map(move |(y, &v)| (self.k_min + x, row.l_min + y, v))
        })
    }

    /// ⊕ over all tracked classes.
    pub fn tracked(&self) -> A::Value {
        self.rows.iter()
            .flat_map(|row| row.values.iter())
            .fold(A::ZERO, |acc, &v| A::plus(acc, v))
    }

    /// ⊕ over all tracked classes and the remainder.
    pub fn total(&self) -> A::Value {
        A::plus(self.tracked(), self.rem)
    }

    /// Number of stored values.
    pub fn stored(&self) -> usize {
        self.rows.iter().map(|r| r.values.len()).sum()
    }

    pub fn add_remainder(&mut self, value: A::Value) {
        self.rem = A::plus(self.rem, value);
    }

    /// Combine `value` into class (k, l), or into the remainder if the
    /// class is out of bounds.
    pub fn add(&mut self, k: usize, l: usize, value: A::Value, bounds: Bounds) {
        if A::is_zero(value) {
            return;
        }
        if !bounds.contains(k, l) {
            self.add_remainder(value);
            return;
        }
        let slot = self.slot(k, l);
        *slot = A::plus(*slot, value);
    }

    /// The storage of (k, l), growing the ragged rows as needed.
    fn slot(&mut self, k: usize, l: usize) -> &mut A::Value {
        if self.rows.is_empty() {
            self.k_min = k;
        }
        if k < self.k_min {
            let extra = self.k_min - k;
            self.rows.splice(0..0, (0..extra).map(|_| LRange { l_min: 0, values: Vec::new() }));
            self.k_min = k;
        }
        let x = k - self.k_min;
        if x >= self.rows.len() {
            self.rows.resize_with(x + 1, || LRange { l_min: 0, values: Vec::new() });
        }
        let row = &mut self.rows[x];
        if row.values.is_empty() {
            row.l_min = l;
        } else if l < row.l_min {
            let extra = row.l_min - l;
            row.values.splice(0..0, std::iter::repeat_n(A::ZERO, extra));
            row.l_min = l;
        }
        let y = l - row.l_min;
        if y >= row.values.len() {
            row.values.resize(y + 1, A::ZERO);
        }
        &mut row.values[y]
    }

    /// self ⊕= (src shifted by (dk, dl)) ⊗ w.
    pub fn accumulate(&mut self, src: &Self, dk: i64, dl: i64, w: A::Value, bounds: Bounds) {
        if A::is_zero(w) {
            return;
        }
        for (k, l, v) in src.iter() {
            if let (Some(k), Some(l)) = (coordinate(k, dk), coordinate(l, dl)) {
                self.add(k, l, A::times(v, w), bounds);
            }
        }
        if !A::is_zero(src.rem) {
            self.add_remainder(A::times(src.rem, w));
        }
    }

    /// self ⊕= (a ⊛ b shifted by (dk, dl)) ⊗ w, where ⊛ adds the
    /// distances of every pair of classes and multiplies their values.
    pub fn accumulate_product(&mut self, a: &Self, b: &Self, dk: i64, dl: i64, w: A::Value, bounds: Bounds) {
        if A::is_zero(w) || a.is_empty() || b.is_empty() {
            return;
        }
        for (ka, la, va) in a.iter() {
            let wa = A::times(va, w);
            for (kb, lb, vb) in b.iter() {
                if let (Some(k), Some(l)) = (coordinate(ka + kb, dk), coordinate(la + lb, dl)) {
                    self.add(k, l, A::times(wa, vb), bounds);
                }
            }
        }
        // Anything involving a remainder stays in the remainder.
        let rem = A::plus(
            A::times(a.rem, b.total()),
            A::times(a.tracked(), b.rem),
        );
        if !A::is_zero(rem) {
            self.add_remainder(A::times(rem, w));
        }
    }
}
