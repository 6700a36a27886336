//! Valuation of a position against a resolved price

use super::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
}

pub(crate) fn out_of_range() -> Error {
    Error::Validation("amount out of range".into())
}

/// Cost basis of a position.
pub fn total_invested(quantity: Decimal, average_price: Decimal) -> Result<Decimal> {
    quantity.checked_mul(average_price).ok_or_else(out_of_range)
}

/// Values a position at `price`.
///
/// Returns `None` when nothing was invested: the percentage is undefined and the
/// position is left unvalued.
pub fn revalue(
    quantity: Decimal,
    total_invested: Decimal,
    price: Decimal,
) -> Result<Option<Valuation>> {
    if total_invested.is_zero() {
        return Ok(None);
    }
    let current_value = quantity.checked_mul(price).ok_or_else(out_of_range)?;
    let profit_loss = current_value
        .checked_sub(total_invested)
        .ok_or_else(out_of_range)?;
    let profit_loss_percent = profit_loss
        .checked_div(total_invested)
        .and_then(|ratio| ratio.checked_mul(HUNDRED))
        .ok_or_else(out_of_range)?;
    Ok(Some(Valuation {
        current_price: price,
        current_value,
        profit_loss,
        profit_loss_percent,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_revalue_gain() {
        let invested = total_invested(dec!(10), dec!(20)).unwrap();
        assert_eq!(invested, dec!(200));

        let v = revalue(dec!(10), invested, dec!(25)).unwrap().unwrap();
        assert_eq!(v.current_price, dec!(25));
        assert_eq!(v.current_value, dec!(250));
        assert_eq!(v.profit_loss, dec!(50));
        assert_eq!(v.profit_loss_percent, dec!(25));
    }

    #[test]
    fn test_revalue_loss() {
        let v = revalue(dec!(4), dec!(100), dec!(20)).unwrap().unwrap();
        assert_eq!(v.current_value, dec!(80));
        assert_eq!(v.profit_loss, dec!(-20));
        assert_eq!(v.profit_loss_percent, dec!(-20));
    }

    #[test]
    fn test_zero_invested_is_not_valued() {
        assert_eq!(revalue(dec!(10), Decimal::ZERO, dec!(25)).unwrap(), None);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let err = total_invested(Decimal::MAX, dec!(2)).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "amount out of range"));

        let err = revalue(Decimal::MAX, dec!(1), dec!(10)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
