//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  In JavaScript/floating point:                                      │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                       │
//! │                                                                     │
//! │  OUR SOLUTION: integer minor units                                  │
//! │    Rp18.000 is stored as 18000, exactly.                            │
//! │    Totals are sums of integers and can be replayed bit-for-bit      │
//! │    during sync reconciliation.                                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use nadi_core::money::Money;
//!
//! let price = Money::from_minor(18_000); // Rp18.000
//! let line = price * 2;
//! assert_eq!(line.minor(), 36_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// A monetary value in the smallest currency unit (whole rupiah).
///
/// ## Design Decisions
/// - **i64 (signed)**: discounts and corrections may be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for JSON serialization
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity to get a line total.
    #[inline]
    pub const fn times(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Display implementation for logs and receipts.
///
/// Thousands are separated with dots, the Indonesian convention
/// (Rp18.000). Localization beyond that is a presentation concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.0.abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        write!(f, "{}Rp{}", sign, grouped)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(18_000);
        assert_eq!(money.minor(), 18_000);
    }

    #[test]
    fn test_display_grouping() {
        assert_eq!(format!("{}", Money::from_minor(18_000)), "Rp18.000");
        assert_eq!(format!("{}", Money::from_minor(1_250_000)), "Rp1.250.000");
        assert_eq!(format!("{}", Money::from_minor(500)), "Rp500");
        assert_eq!(format!("{}", Money::from_minor(-7_500)), "-Rp7.500");
        assert_eq!(format!("{}", Money::zero()), "Rp0");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(10_000);
        let b = Money::from_minor(2_500);

        assert_eq!((a + b).minor(), 12_500);
        assert_eq!((a - b).minor(), 7_500);
        assert_eq!((a * 3).minor(), 30_000);
        assert_eq!(a.times(2).minor(), 20_000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [18_000, 5_000, 2_000]
            .into_iter()
            .map(Money::from_minor)
            .sum();
        assert_eq!(total.minor(), 25_000);
    }

    #[test]
    fn test_zero_and_checks() {
        assert!(Money::zero().is_zero());
        assert!(!Money::from_minor(100).is_zero());
        assert!(Money::from_minor(-100).is_negative());
        assert!(!Money::from_minor(100).is_negative());
    }
}
