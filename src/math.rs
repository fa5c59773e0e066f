//! Numeric helpers

use crate::error::{ConfdbError, Result};

/// `n!` for non-negative `n`
///
/// Fails with [`ConfdbError::InvalidArgument`] for negative input, and for
/// results that do not fit in a `u64` (`n > 20`).
pub fn factorial(n: i64) -> Result<u64> {
    if n < 0 {
        return Err(ConfdbError::invalid_argument("Negative input"));
    }

    (2..=n.unsigned_abs()).try_fold(1u64, |acc, i| {
        acc.checked_mul(i)
            .ok_or_else(|| ConfdbError::invalid_argument(format!("{n}! overflows u64")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_factorial_small_values() {
        assert_eq!(factorial(0).unwrap(), 1);
        assert_eq!(factorial(1).unwrap(), 1);
        assert_eq!(factorial(5).unwrap(), 120);
        assert_eq!(factorial(20).unwrap(), 2_432_902_008_176_640_000);
    }

    #[test]
    fn test_factorial_negative() {
        let err = factorial(-1).unwrap_err();
        assert!(matches!(err, ConfdbError::InvalidArgument(_)));
        assert!(err.message().contains("Negative input"));
    }

    #[test]
    fn test_factorial_overflow() {
        assert!(matches!(factorial(21), Err(ConfdbError::InvalidArgument(_))));
    }

    proptest! {
        #[test]
        fn factorial_matches_product(n in 0i64..=20) {
            let expected: u64 = (1..=n as u64).product();
            prop_assert_eq!(factorial(n).unwrap(), expected);
        }

        #[test]
        fn factorial_rejects_all_negatives(n in i64::MIN..0) {
            prop_assert!(matches!(factorial(n), Err(ConfdbError::InvalidArgument(_))));
        }

        #[test]
        fn factorial_recurrence(n in 1i64..=20) {
            prop_assert_eq!(factorial(n).unwrap(), n as u64 * factorial(n - 1).unwrap());
        }
    }
}
