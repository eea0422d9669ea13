//! Helpers for monetary amounts.
//!
//! Amounts are carried as [`Decimal`] and settled to the cent.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds an amount to cents using half-up rounding (away from zero).
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use farm_core::money::round_cents;
///
/// assert_eq!(round_cents(dec!(12.344)), dec!(12.34));
/// assert_eq!(round_cents(dec!(12.345)), dec!(12.35));
/// assert_eq!(round_cents(dec!(-12.345)), dec!(-12.35));
/// ```
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// True when `value` carries no more precision than whole cents.
pub fn is_whole_cents(value: Decimal) -> bool {
    round_cents(value) == value
}

/// Sum of an iterator of amounts.
pub fn sum<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |acc, d| acc + d)
}
