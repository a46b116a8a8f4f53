//! Money and quantity value objects.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Money amount in paise (1 INR = 100 paise) to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    paise: i64,
}

impl Money {
    /// Creates a new amount from paise.
    pub fn from_paise(paise: i64) -> Self {
        Self { paise }
    }

    /// Creates a new amount from whole rupees.
    pub fn from_rupees(rupees: i64) -> Self {
        Self {
            paise: rupees * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { paise: 0 }
    }

    /// Returns the amount in paise.
    pub fn paise(&self) -> i64 {
        self.paise
    }

    /// Returns the whole-rupee portion.
    pub fn rupees(&self) -> i64 {
        self.paise / 100
    }

    /// Returns the paise remainder after whole rupees.
    pub fn paise_part(&self) -> i64 {
        self.paise.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.paise > 0
    }

    pub fn is_zero(&self) -> bool {
        self.paise == 0
    }

    pub fn is_negative(&self) -> bool {
        self.paise < 0
    }

    /// Multiplies by a fractional quantity, rounding to the nearest paisa.
    /// `None` if the result does not fit.
    pub fn checked_times(&self, quantity: Quantity) -> Option<Money> {
        Decimal::from(self.paise)
            .checked_mul(quantity.value())
            .and_then(round_paise)
    }

    /// Returns `percent`% of this amount, rounded to the nearest paisa.
    /// `None` if the result does not fit.
    pub fn checked_percent(&self, percent: Decimal) -> Option<Money> {
        Decimal::from(self.paise)
            .checked_mul(percent)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .and_then(round_paise)
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.paise.checked_add(rhs.paise).map(Money::from_paise)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.paise.checked_sub(rhs.paise).map(Money::from_paise)
    }

    /// Sums amounts, `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Clamps the amount into `[low, high]`.
    pub fn clamp(self, low: Money, high: Money) -> Money {
        Ord::clamp(self, low, high.max(low))
    }

    /// Formats as a plain decimal rupee amount, e.g. `"900.00"`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.paise < 0 { "-" } else { "" };
        format!("{sign}{}.{:02}", self.rupees().abs(), self.paise_part())
    }
}

fn round_paise(value: Decimal) -> Option<Money> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .map(Money::from_paise)
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.paise < 0 {
            write!(f, "-₹{}.{:02}", self.rupees().abs(), self.paise_part())
        } else {
            write!(f, "₹{}.{:02}", self.rupees(), self.paise_part())
        }
    }
}

/// Rejected quantity value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidQuantity(pub Decimal);

impl std::fmt::Display for InvalidQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid quantity {} (must be greater than 0 and at most {MAX_QUANTITY})",
            self.0
        )
    }
}

impl std::error::Error for InvalidQuantity {}

/// Largest quantity a single cart line or order item may carry.
pub const MAX_QUANTITY: u32 = 100_000;

/// A strictly positive amount in the product's base measurement unit, at
/// most [`MAX_QUANTITY`].
///
/// Fractional values are allowed (e.g. 0.5 kg).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub fn new(value: Decimal) -> Result<Self, InvalidQuantity> {
        if value > Decimal::ZERO && value <= Decimal::from(MAX_QUANTITY) {
            Ok(Self(value.normalize()))
        } else {
            Err(InvalidQuantity(value))
        }
    }

    /// Creates a whole-unit quantity. Zero is rejected.
    pub fn from_units(units: u32) -> Result<Self, InvalidQuantity> {
        Self::new(Decimal::from(units))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = InvalidQuantity;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
