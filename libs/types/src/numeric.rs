//! Monetary value types
//!
//! Validated wrappers over `rust_decimal::Decimal`. A [`Price`] is
//! strictly positive; a [`Quantity`] is non-negative, with zero marking
//! an unfilled amount. Construction is fallible — out-of-range values
//! surface as [`NumericError`] instead of panicking — and both types
//! cross the wire as JSON strings so number precision survives transit.
//!
//! Arithmetic is deliberately narrow: quantities add and subtract,
//! everything else goes through [`Quantity::notional`] or raw
//! [`Decimal`] math at the call site.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Rejected monetary values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("price must be strictly positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("quantity cannot be negative, got {0}")]
    NegativeQuantity(Decimal),

    #[error("not a decimal number: {0}")]
    Unparseable(String),
}

/// A strictly positive execution or quote price.
///
/// Wire format is a decimal string (`"50000.25"`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Price(Decimal);

impl Price {
    /// Validate a decimal as a price.
    pub fn new(value: Decimal) -> Result<Self, NumericError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(NumericError::NonPositivePrice(value))
        }
    }

    /// Whole-number price for fixtures and tables.
    ///
    /// # Panics
    /// Panics on zero; whole-number price literals are nonzero.
    pub fn from_u64(value: u64) -> Self {
        assert!(value > 0, "price literal must be nonzero");
        Self(Decimal::from(value))
    }

    /// Raw decimal value, for formula work at the call site.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Price {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| NumericError::Unparseable(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<String> for Price {
    type Error = NumericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Price> for String {
    fn from(price: Price) -> Self {
        price.0.to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative amount of base asset (or contract count).
///
/// Zero is a valid quantity: fresh orders carry zero filled amount.
/// Wire format is a decimal string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity(Decimal);

impl Quantity {
    /// Validate a decimal as a quantity.
    pub fn new(value: Decimal) -> Result<Self, NumericError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(NumericError::NegativeQuantity(value))
        }
    }

    /// The zero quantity (nothing filled yet).
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Whole-number quantity for fixtures.
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Raw decimal value, for formula work at the call site.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The smaller of two quantities (fill sizing against quoted size).
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Notional value of this amount at `price`, in quote units.
    pub fn notional(&self, price: Price) -> Decimal {
        self.0 * price.as_decimal()
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    /// # Panics
    /// Panics if `rhs` exceeds `self`; amount accounting never takes more
    /// out of an order or position than it holds.
    fn sub(self, rhs: Self) -> Self::Output {
        assert!(rhs.0 <= self.0, "quantity underflow");
        Self(self.0 - rhs.0)
    }
}

impl FromStr for Quantity {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| NumericError::Unparseable(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<String> for Quantity {
    type Error = NumericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quantity> for String {
    fn from(quantity: Quantity) -> Self {
        quantity.0.to_string()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
