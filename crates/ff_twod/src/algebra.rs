//! The two semirings the distance class recursions run over.

use std::fmt::Debug;
use ff_energy::INF;

/// A commutative semiring: `plus` combines alternatives, `times`
/// combines the parts of one decomposition.
pub trait Algebra: Debug + Clone + Copy {
    type Value: Debug + Clone + Copy + PartialEq;

    /// Neutral element of `plus`, absorbing for `times`.
    const ZERO: Self::Value;
    /// Neutral element of `times`.
    const ONE: Self::Value;

    fn plus(a: Self::Value, b: Self::Value) -> Self::Value;
    fn times(a: Self::Value, b: Self::Value) -> Self::Value;

    fn is_zero(a: Self::Value) -> bool;
}

/// Minimum free energies in dcal/mol, `INF` for "no structure".
#[derive(Debug, Clone, Copy)]
pub struct MinPlus;

impl Algebra for MinPlus {
    type Value = i32;

    const ZERO: i32 = INF;
    const ONE: i32 = 0;

    #[inline]
    fn plus(a: i32, b: i32) -> i32 {
        a.min(b)
    }

    #[inline]
    fn times(a: i32, b: i32) -> i32 {
        if a >= INF || b >= INF { INF } else { a + b }
    }

    #[inline]
    fn is_zero(a: i32) -> bool {
        a >= INF
    }
}

/// Scaled Boltzmann weights.
#[derive(Debug, Clone, Copy)]
pub struct SumProduct;

impl Algebra for SumProduct {
    type Value = f64;

    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;

    #[inline]
    fn plus(a: f64, b: f64) -> f64 {
        a + b
    }

    #[inline]
    fn times(a: f64, b: f64) -> f64 {
        a * b
    }

    #[inline]
    fn is_zero(a: f64) -> bool {
        a == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_plus() {
        assert_eq!(MinPlus::plus(-30, 20), -30);
        assert_eq!(MinPlus::times(-30, 20), -10);
        assert_eq!(MinPlus::times(INF, -500), INF);
        assert_eq!(MinPlus::times(MinPlus::ONE, 7), 7);
        assert_eq!(MinPlus::plus(MinPlus::ZERO, 7), 7);
        assert!(MinPlus::is_zero(INF + 3));
    }

    #[test]
    fn test_sum_product() {
        assert_eq!(SumProduct::plus(0.5, 0.25), 0.75);
        assert_eq!(SumProduct::times(0.5, 0.25), 0.125);
        assert_eq!(SumProduct::times(SumProduct::ZERO, 3.0), 0.0);
        assert!(!SumProduct::is_zero(1e-300));
    }
}
