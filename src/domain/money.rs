//! Monetary rounding
//!
//! All monetary values in the system are `rust_decimal::Decimal` and are
//! normalized to two decimal places through `round2` before comparison or
//! persistence. Using a single helper keeps the many sum/subtract paths
//! (totals, payment splits, drawer balances) from drifting apart.

use rust_decimal::{Decimal, RoundingStrategy};

/// One cent, the comparison tolerance used across the settlement engine.
pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round to two decimal places, half away from zero.
///
/// Matches conventional cash-register rounding: multiply by 100, round
/// half-up on cents, divide back.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// True when two already-rounded amounts differ by less than one cent.
pub fn within_cent(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < CENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round2_passthrough() {
        assert_eq!(round2(dec!(51.00)), dec!(51.00));
        assert_eq!(round2(dec!(0)), dec!(0.00));
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(dec!(10.005)), dec!(10.01));
        assert_eq!(round2(dec!(10.004)), dec!(10.00));
        assert_eq!(round2(dec!(2.675)), dec!(2.68));
    }

    #[test]
    fn test_round2_truncates_long_fractions() {
        assert_eq!(round2(dec!(33.333333)), dec!(33.33));
        assert_eq!(round2(dec!(66.666666)), dec!(66.67));
    }

    #[test]
    fn test_within_cent() {
        assert!(within_cent(dec!(100.00), dec!(100.00)));
        assert!(within_cent(dec!(100.00), dec!(100.009)));
        assert!(!within_cent(dec!(100.00), dec!(100.01)));
        assert!(!within_cent(dec!(100.00), dec!(99.99)));
    }

    #[test]
    fn test_cent_constant() {
        assert_eq!(CENT, dec!(0.01));
    }
}
