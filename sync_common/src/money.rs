use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";

/// ISO-4217 currencies that have no minor unit.
const ZERO_DECIMAL_CURRENCIES: [&str; 16] =
    ["BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "VND", "VUV", "XAF", "XOF", "XPF"];
/// ISO-4217 currencies with three decimal places.
const THREE_DECIMAL_CURRENCIES: [&str; 5] = ["BHD", "JOD", "KWD", "OMR", "TND"];

//--------------------------------------     MinorUnits       ---------------------------------------------------------
/// An amount of money in the smallest unit of its currency (cents, for USD). This is the representation the gateway
/// uses on the wire. The currency itself travels alongside the amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Mul<i64> for MinorUnits {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}¤", self.0)
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MoneyConversionError(String);

/// The number of decimal places used by the minor unit of the given ISO-4217 currency code.
pub fn currency_exponent(currency: &str) -> u32 {
    let code = currency.trim().to_ascii_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        3
    } else {
        2
    }
}

/// Converts a decimal amount in major units into minor units.
///
/// Amounts with more precision than the currency supports are rounded half-to-even ("banker's rounding"), so that
/// `10.005 USD` becomes `1000` and `10.015 USD` becomes `1002`. This is the only rounding rule used when local totals
/// are compared against gateway totals.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<MinorUnits, MoneyConversionError> {
    let scale = Decimal::from(10i64.pow(currency_exponent(currency)));
    amount
        .checked_mul(scale)
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
        .and_then(|v| v.to_i64())
        .map(MinorUnits)
        .ok_or_else(|| MoneyConversionError(format!("{amount} {currency}")))
}

/// Converts minor units back into a decimal amount in major units. This conversion is exact.
pub fn from_minor_units(amount: MinorUnits, currency: &str) -> Decimal {
    Decimal::new(amount.value(), currency_exponent(currency))
}
