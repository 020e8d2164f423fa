use crate::error::LedgerError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places carried by a minor unit (cents).
const MINOR_UNIT_SCALE: u32 = 2;

/// A monetary value in integer minor units.
///
/// All ledger arithmetic happens on this type; decimal values coming from the
/// accrual service are converted once, at the response boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Converts an amount expressed in whole currency units into minor units.
    ///
    /// Sub-minor precision is rounded half-to-even. Negative or out-of-range
    /// values are rejected.
    pub fn from_units(units: Decimal, minor_per_unit: u32) -> Result<Self, LedgerError> {
        if units.is_sign_negative() && !units.is_zero() {
            return Err(LedgerError::ValidationError(format!(
                "negative amount {units}"
            )));
        }
        let scaled = units
            .checked_mul(Decimal::from(minor_per_unit))
            .ok_or_else(|| LedgerError::ValidationError(format!("amount {units} overflows")))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
        scaled
            .to_i64()
            .map(Self)
            .ok_or_else(|| LedgerError::ValidationError(format!("amount {units} overflows")))
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Sums `amounts`, failing instead of wrapping when the total leaves `i64`.
    pub fn try_sum<I>(amounts: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts.into_iter().try_fold(Money::ZERO, |total, amount| {
            total.checked_add(amount).ok_or_else(|| {
                LedgerError::ValidationError(format!("total overflows after adding {amount}"))
            })
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

/// A strictly positive amount, as requested by a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Money", into = "Money")]
pub struct Amount(Money);

impl Amount {
    pub fn new(value: Money) -> Result<Self, LedgerError> {
        if value > Money::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Money {
        self.0
    }
}

impl TryFrom<Money> for Amount {
    type Error = LedgerError;

    fn try_from(value: Money) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A user's derived balance.
///
/// `current` is confirmed accruals minus withdrawals; `withdrawn` is the sum of
/// all withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub current: Money,
    pub withdrawn: Money,
}

impl Balance {
    pub fn from_totals(accrued: Money, withdrawn: Money) -> Result<Self, LedgerError> {
        let current = accrued.checked_sub(withdrawn).ok_or_else(|| {
            LedgerError::ValidationError(format!(
                "balance overflows: accrued {accrued}, withdrawn {withdrawn}"
            ))
        })?;
        Ok(Self { current, withdrawn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(250);
        assert_eq!(a.checked_add(b), Some(Money::from_minor(1250)));
        assert_eq!(a.checked_sub(b), Some(Money::from_minor(750)));
        assert_eq!(Money::try_sum([a, b, b]).unwrap(), Money::from_minor(1500));
        assert_eq!(Money::try_sum(std::iter::empty()).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_large_accruals_do_not_wrap() {
        let huge = Money::from_units(dec!(50000000000000000), 100).unwrap();
        assert_eq!(huge.minor(), 5_000_000_000_000_000_000);
        assert_eq!(huge.checked_add(huge), None);
        assert!(matches!(
            Money::try_sum([huge, huge]),
            Err(LedgerError::ValidationError(_))
        ));
        assert!(matches!(
            Balance::from_totals(Money::from_minor(i64::MIN), Money::from_minor(1)),
            Err(LedgerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_from_units_scales_to_minor() {
        assert_eq!(Money::from_units(dec!(5), 100).unwrap(), Money::from_minor(500));
        assert_eq!(
            Money::from_units(dec!(729.98), 100).unwrap(),
            Money::from_minor(72998)
        );
        assert_eq!(Money::from_units(dec!(0), 100).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_from_units_rounds_half_even() {
        assert_eq!(Money::from_units(dec!(0.125), 100).unwrap(), Money::from_minor(12));
        assert_eq!(Money::from_units(dec!(0.135), 100).unwrap(), Money::from_minor(14));
    }

    #[test]
    fn test_from_units_rejects_negative() {
        assert!(matches!(
            Money::from_units(dec!(-1), 100),
            Err(LedgerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_display_in_units() {
        assert_eq!(Money::from_minor(72998).to_string(), "729.98");
        assert_eq!(Money::from_minor(500).to_string(), "5.00");
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(Money::from_minor(1)).is_ok());
        assert!(matches!(
            Amount::new(Money::ZERO),
            Err(LedgerError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(Money::from_minor(-5)),
            Err(LedgerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_balance_from_totals() {
        let balance = Balance::from_totals(Money::from_minor(900), Money::from_minor(300)).unwrap();
        assert_eq!(balance.current, Money::from_minor(600));
        assert_eq!(balance.withdrawn, Money::from_minor(300));
    }
}
