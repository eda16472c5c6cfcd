//! Integer helpers for wei-scale amounts.
//!
//! Pro-rata shares multiply two amounts before dividing. At 18 decimals
//! the product routinely exceeds `u128`, so [`mul_div_floor`] carries it
//! in a `U256`.

use alloy_primitives::U256;

use crate::{Amount, Result, VaultError};

/// `floor(a * b / c)` without intermediate overflow.
///
/// # Errors
/// `ArithmeticOverflow` when `c` is zero or the quotient exceeds `u128`.
pub fn mul_div_floor(a: Amount, b: Amount, c: Amount, context: &str) -> Result<Amount> {
    if c == 0 {
        return Err(VaultError::overflow(format!("{context}: division by zero")));
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / c);
    }
    // Two u128 factors always fit in 256 bits.
    let quotient = U256::from(a) * U256::from(b) / U256::from(c);
    u128::try_from(quotient).map_err(|_| VaultError::overflow(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ONE_UNIT;

    #[test]
    fn small_values_take_fast_path() {
        assert_eq!(mul_div_floor(7, 10, 3, "t").unwrap(), 23);
        assert_eq!(mul_div_floor(0, 10, 3, "t").unwrap(), 0);
    }

    #[test]
    fn wei_scale_share_does_not_overflow() {
        let amount = 3_000_000 * ONE_UNIT;
        let remaining = 9_000_000 * ONE_UNIT;
        let total = 6_000_000 * ONE_UNIT;
        assert!(amount.checked_mul(remaining).is_none());
        assert_eq!(
            mul_div_floor(amount, remaining, total, "share").unwrap(),
            4_500_000 * ONE_UNIT
        );
    }

    #[test]
    fn extreme_operands() {
        assert_eq!(
            mul_div_floor(u128::MAX, u128::MAX, u128::MAX, "t").unwrap(),
            u128::MAX
        );
        assert_eq!(mul_div_floor(u128::MAX, 2, 4, "t").unwrap(), u128::MAX / 2);
    }

    #[test]
    fn floors_inexact_wide_quotients() {
        // 3 * 2^127 does not fit in u128.
        let a = 1u128 << 127;
        let expected = (a / 7) * 3 + ((a % 7) * 3) / 7;
        assert_eq!(mul_div_floor(a, 3, 7, "t").unwrap(), expected);
    }

    #[test]
    fn zero_divisor_and_oversized_quotient_fail() {
        assert!(matches!(
            mul_div_floor(1, 1, 0, "t").unwrap_err(),
            VaultError::ArithmeticOverflow { .. }
        ));
        assert!(mul_div_floor(u128::MAX, u128::MAX, 1, "t").is_err());
    }
}
