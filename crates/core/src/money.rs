//! Monetary amounts in integer minor units (e.g. cents).
//!
//! Floating point never touches money in this codebase. Display formatting is
//! a UI concern and out of scope.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// An amount in the smallest currency unit.
///
/// Signed so that discounts and ledger deltas can be expressed; most domain
/// call sites validate non-negativity at their boundary.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(amount: i64) -> Self {
        Self(amount)
    }

    pub const fn minor(&self) -> i64 {
        self.0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Line-total arithmetic: unit cost × quantity.
    pub fn checked_mul_qty(self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Document-level monetary breakdown shared by purchase orders and sales
/// orders.
///
/// Invariant: every component is non-negative and
/// `total = subtotal + tax + shipping - discount` is non-negative.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
}

impl Totals {
    pub fn new(subtotal: Money, tax: Money, shipping: Money, discount: Money) -> DomainResult<Self> {
        let totals = Self {
            subtotal,
            tax,
            shipping,
            discount,
        };
        totals.validate()?;
        Ok(totals)
    }

    fn validate(&self) -> DomainResult<()> {
        for (name, amount) in [
            ("subtotal", self.subtotal),
            ("tax", self.tax),
            ("shipping", self.shipping),
            ("discount", self.discount),
        ] {
            if amount.is_negative() {
                return Err(DomainError::validation(format!(
                    "{name} must not be negative"
                )));
            }
        }
        self.total()?;
        Ok(())
    }

    /// `subtotal + tax + shipping - discount`, rejecting overflow and
    /// negative results.
    pub fn total(&self) -> DomainResult<Money> {
        let total = self
            .subtotal
            .checked_add(self.tax)
            .and_then(|m| m.checked_add(self.shipping))
            .and_then(|m| m.checked_sub(self.discount))
            .ok_or_else(|| DomainError::validation("monetary total overflowed"))?;
        if total.is_negative() {
            return Err(DomainError::validation(
                "discount exceeds subtotal + tax + shipping",
            ));
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_additive() {
        let totals = Totals::new(
            Money::from_minor(4000),
            Money::from_minor(300),
            Money::from_minor(500),
            Money::from_minor(200),
        )
        .unwrap();
        assert_eq!(totals.total().unwrap(), Money::from_minor(4600));
    }

    #[test]
    fn negative_component_is_rejected() {
        let err = Totals::new(
            Money::from_minor(-1),
            Money::ZERO,
            Money::ZERO,
            Money::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn discount_exceeding_charges_is_rejected() {
        let err = Totals::new(
            Money::from_minor(100),
            Money::ZERO,
            Money::ZERO,
            Money::from_minor(200),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
