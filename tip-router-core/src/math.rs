//! Checked proportional arithmetic used by every reward router.
//!
//! All splits floor each share and hand the rounding remainder to the last
//! non-zero-weight bucket in iteration order, so the shares of a split always
//! sum to exactly the input amount.

use crate::error::TipRouterError;

/// Reduces a ratio so the denominator fits in 64 bits, keeping
/// `amount * numerator` inside `u128` for any `u64` amount.
fn scale_ratio(numerator: u128, denominator: u128) -> (u128, u128) {
    let bits = 128u32.saturating_sub(denominator.leading_zeros());
    let shift = bits.saturating_sub(64);
    (
        numerator.checked_shr(shift).unwrap_or(0),
        denominator.checked_shr(shift).unwrap_or(0),
    )
}

/// `floor(amount * numerator / denominator)`.
pub fn proportional_share(
    amount: u64,
    numerator: u128,
    denominator: u128,
) -> Result<u64, TipRouterError> {
    if denominator == 0 {
        return Err(TipRouterError::DenominatorIsZero);
    }
    if numerator == 0 || amount == 0 {
        return Ok(0);
    }

    let (numerator, denominator) = scale_ratio(numerator, denominator);
    let share = u128::from(amount)
        .checked_mul(numerator)
        .ok_or(TipRouterError::ArithmeticOverflow)?
        .checked_div(denominator)
        .ok_or(TipRouterError::DenominatorIsZero)?;

    u64::try_from(share).map_err(|_| TipRouterError::CastToU64Error)
}

/// Splits `amount` across `weights`. Zero-weight buckets receive nothing and
/// never receive the remainder.
pub fn split_with_remainder_to_last<const N: usize>(
    amount: u64,
    weights: &[u128; N],
) -> Result<[u64; N], TipRouterError> {
    let total = weights
        .iter()
        .try_fold(0u128, |acc, weight| acc.checked_add(*weight))
        .ok_or(TipRouterError::ArithmeticOverflow)?;
    if total == 0 {
        return Err(TipRouterError::DenominatorIsZero);
    }

    let mut shares = [0u64; N];
    let mut allocated: u64 = 0;
    let mut last = None;
    for (index, weight) in weights.iter().enumerate() {
        if *weight == 0 {
            continue;
        }
        let share = proportional_share(amount, *weight, total)?;
        shares[index] = share;
        allocated = allocated
            .checked_add(share)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        last = Some(index);
    }

    let remainder = amount
        .checked_sub(allocated)
        .ok_or(TipRouterError::ArithmeticUnderflowError)?;
    if let Some(index) = last {
        shares[index] = shares[index]
            .checked_add(remainder)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
    }

    Ok(shares)
}

/// Full 192-bit product of `a * b` as `(high, low)` 128-bit halves.
fn wide_mul(a: u128, b: u64) -> (u128, u128) {
    let b = u128::from(b);
    let a_lo = a & u128::from(u64::MAX);
    let a_hi = a.checked_shr(64).unwrap_or(0);
    // Each partial product is below 2^128.
    let p_lo = a_lo.wrapping_mul(b);
    let p_hi = a_hi.wrapping_mul(b);
    let (low, carry) = p_lo.overflowing_add(p_hi.wrapping_shl(64));
    let high = p_hi.checked_shr(64).unwrap_or(0).wrapping_add(u128::from(carry));
    (high, low)
}

/// Exact `part / whole > numerator / denominator` without overflow.
pub fn exceeds_fraction(part: u128, whole: u128, numerator: u64, denominator: u64) -> bool {
    wide_mul(part, denominator) > wide_mul(whole, numerator)
}
