//! Monetary amounts.

use core::iter::Sum;

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Price in the smallest currency unit (e.g. cents).
///
/// Captured from the menu when an entry is added and never re-priced afterwards.
/// Arithmetic saturates instead of wrapping.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    /// `self * quantity`.
    pub fn times(self, quantity: u32) -> Price {
        Price(self.0.saturating_mul(u64::from(quantity)))
    }

    pub fn saturating_add(self, other: Price) -> Price {
        Price(self.0.saturating_add(other.0))
    }
}

impl ValueObject for Price {}

impl Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Self {
        iter.fold(Price::ZERO, Price::saturating_add)
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_decimal() {
        assert_eq!(Price::from_cents(1299).to_string(), "12.99");
        assert_eq!(Price::from_cents(5).to_string(), "0.05");
    }

    #[test]
    fn times_and_sum() {
        let p = Price::from_cents(999);
        assert_eq!(p.times(3), Price::from_cents(2997));
        assert_eq!(p.times(0), Price::ZERO);

        let total: Price = [p, Price::from_cents(1)].into_iter().sum();
        assert_eq!(total, Price::from_cents(1000));
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(Price::from_cents(u64::MAX).times(2).cents(), u64::MAX);
    }
}
