//! Sentinel-aware utility types and the optimization direction.

use crate::traits::Utility;
use std::cmp::Ordering;
use std::fmt;

/// Direction of optimization.
///
/// Every comparison in the crate goes through [`Objective::better`], so
/// maximization and minimization share one code path. "Infeasible" is the
/// sentinel that loses every comparison (`-∞` when maximizing, `+∞` when
/// minimizing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    #[default]
    Maximize,
    Minimize,
}

impl Objective {
    /// `a` is strictly preferable to `b`.
    #[inline]
    pub fn better<U: Utility>(self, a: U, b: U) -> bool {
        match self {
            Objective::Maximize => a > b,
            Objective::Minimize => a < b,
        }
    }

    /// The sentinel that loses every comparison.
    #[inline]
    pub fn infeasible<U: Utility>(self) -> U {
        match self {
            Objective::Maximize => U::minus_infinity(),
            Objective::Minimize => U::plus_infinity(),
        }
    }

    /// The sentinel that wins every comparison.
    #[inline]
    pub fn unbounded<U: Utility>(self) -> U {
        match self {
            Objective::Maximize => U::plus_infinity(),
            Objective::Minimize => U::minus_infinity(),
        }
    }

    #[inline]
    pub fn is_infeasible<U: Utility>(self, u: U) -> bool {
        u == self.infeasible()
    }

    #[inline]
    pub fn worse_of<U: Utility>(self, a: U, b: U) -> U {
        if self.better(b, a) {
            a
        } else {
            b
        }
    }
}

macro_rules! integer_utility {
    ($($t:ty),*) => {$(
        impl Utility for $t {
            #[inline]
            fn zero() -> Self {
                0
            }
            #[inline]
            fn plus_infinity() -> Self {
                <$t>::MAX
            }
            #[inline]
            fn minus_infinity() -> Self {
                <$t>::MIN
            }
            #[inline]
            fn plus(self, rhs: Self) -> Self {
                if self.is_infinite() {
                    self
                } else if rhs.is_infinite() {
                    rhs
                } else {
                    self.saturating_add(rhs)
                }
            }
            #[inline]
            fn minus(self, rhs: Self) -> Self {
                if self.is_infinite() {
                    self
                } else if rhs == <$t>::MAX {
                    <$t>::MIN
                } else if rhs == <$t>::MIN {
                    <$t>::MAX
                } else {
                    self.saturating_sub(rhs)
                }
            }
        }
    )*};
}

integer_utility!(i32, i64);

/// `f64` with a total order, usable as a [`Utility`].
///
/// Ordering follows [`f64::total_cmp`]; equality compares bit patterns so it
/// agrees with the ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct TotalF64(pub f64);

impl PartialEq for TotalF64 {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for TotalF64 {}
impl PartialOrd for TotalF64 {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TotalF64 {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
impl fmt::Display for TotalF64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Utility for TotalF64 {
    #[inline]
    fn zero() -> Self {
        TotalF64(0.0)
    }
    #[inline]
    fn plus_infinity() -> Self {
        TotalF64(f64::INFINITY)
    }
    #[inline]
    fn minus_infinity() -> Self {
        TotalF64(f64::NEG_INFINITY)
    }
    #[inline]
    fn plus(self, rhs: Self) -> Self {
        if self.is_infinite() {
            self
        } else if rhs.is_infinite() {
            rhs
        } else {
            TotalF64(self.0 + rhs.0)
        }
    }
    #[inline]
    fn minus(self, rhs: Self) -> Self {
        if self.is_infinite() {
            self
        } else if rhs.is_infinite() {
            TotalF64(-rhs.0)
        } else {
            TotalF64(self.0 - rhs.0)
        }
    }
}
