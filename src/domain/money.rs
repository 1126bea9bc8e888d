use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::AppError;

/// Minor-unit currency amount (cents, pence, rappen). `amount` is always >= 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Money {
    pub amount: i64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema, Display, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum Currency {
    EUR,
    USD,
    GBP,
    CHF,
}

impl Money {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Money { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Money { amount: 0, currency }
    }

    /// Fails on currency mismatch. Commutative, associative, zero is identity.
    pub fn add(self, other: Money) -> Result<Money, AppError> {
        if self.currency != other.currency {
            return Err(AppError::CurrencyMismatch(format!(
                "{} vs {}",
                self.currency, other.currency
            )));
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// Multiplies by a non-negative integer scalar (seat count). Exact, no rounding needed.
    pub fn multiply_by(self, n: u32) -> Money {
        Money {
            amount: self.amount * n as i64,
            currency: self.currency,
        }
    }

    /// Multiplies by an arbitrary non-negative decimal scalar, rounding to the nearest
    /// integer minor unit (e.g. an overbooking or proration factor).
    pub fn multiply_by_decimal(self, scalar: Decimal) -> Money {
        debug_assert!(scalar >= Decimal::ZERO);
        let product = Decimal::from(self.amount) * scalar;
        let rounded = product.round().to_i64().unwrap_or(i64::MAX);
        Money {
            amount: rounded.max(0),
            currency: self.currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_commutative_and_associative() {
        let a = Money::new(100, Currency::EUR);
        let b = Money::new(250, Currency::EUR);
        let c = Money::new(7, Currency::EUR);
        assert_eq!(a.add(b).unwrap(), b.add(a).unwrap());
        assert_eq!(
            a.add(b).unwrap().add(c).unwrap(),
            a.add(b.add(c).unwrap()).unwrap()
        );
    }

    #[test]
    fn zero_is_identity() {
        let a = Money::new(500, Currency::USD);
        let zero = Money::zero(Currency::USD);
        assert_eq!(a.add(zero).unwrap(), a);
    }

    #[test]
    fn add_rejects_mismatched_currency() {
        let a = Money::new(100, Currency::EUR);
        let b = Money::new(100, Currency::USD);
        assert!(a.add(b).is_err());
    }

    #[test]
    fn multiply_by_zero_and_one() {
        let a = Money::new(999, Currency::GBP);
        assert_eq!(a.multiply_by(0).amount, 0);
        assert_eq!(a.multiply_by(1), a);
    }

    #[test]
    fn multiply_by_n_matches_repeated_addition() {
        let a = Money::new(333, Currency::CHF);
        let tripled = a.multiply_by(3);
        let via_add = a.add(a).unwrap().add(a).unwrap();
        assert_eq!(tripled, via_add);
    }

    #[test]
    fn decimal_multiply_rounds_to_nearest_minor_unit() {
        let a = Money::new(100, Currency::EUR);
        let half = a.multiply_by_decimal(Decimal::new(15, 1)); // 1.5
        assert_eq!(half.amount, 150);
    }
}
