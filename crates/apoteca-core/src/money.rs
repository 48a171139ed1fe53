//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Prices here are fixed-point with 2 fraction digits. We store the      │
//! │  count of cents in an i64, so 125.50 MZN is Money(12550).              │
//! │                                                                         │
//! │  The only division in the ledger is box price → blister price, and     │
//! │  it rounds half-up explicitly (see `div_round_half_up`).               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use apoteca_core::money::Money;
//!
//! let box_price = Money::from_major_minor(125, 50); // 125.50
//! let line = box_price.multiply_quantity(2);
//! assert_eq!(line.cents(), 25100);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

/// A monetary value in cents (2 fraction digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use apoteca_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
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

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use apoteca_core::money::Money;
    ///
    /// let blister = Money::from_cents(1255);
    /// assert_eq!(blister.multiply_quantity(3).cents(), 3765);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Divides by a positive integer, rounding half away from zero to the
    /// nearest cent.
    ///
    /// A divisor `<= 0` is treated as 1.
    ///
    /// ## Example
    /// ```rust
    /// use apoteca_core::money::Money;
    ///
    /// // 125.50 / 10 = 12.55
    /// assert_eq!(Money::from_cents(12550).div_round_half_up(10).cents(), 1255);
    /// // 10.00 / 3 = 3.333.. → 3.33
    /// assert_eq!(Money::from_cents(1000).div_round_half_up(3).cents(), 333);
    /// // 0.05 / 2 = 0.025 → 0.03
    /// assert_eq!(Money::from_cents(5).div_round_half_up(2).cents(), 3);
    /// ```
    pub fn div_round_half_up(&self, divisor: i64) -> Money {
        let divisor = divisor.max(1) as i128;
        let value = self.0 as i128;
        // Integer half-up: (2v + d) / 2d, mirrored for negatives
        let rounded = if value >= 0 {
            (2 * value + divisor) / (2 * divisor)
        } else {
            -((-2 * value + divisor) / (2 * divisor))
        };
        Money(rounded as i64)
    }

    /// Clamps negative amounts to zero.
    #[inline]
    pub const fn floor_zero(&self) -> Money {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }
}

/// Renders as `125.50`. Currency symbols are a caller concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
