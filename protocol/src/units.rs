//! # Unit Alignment & Fee Arithmetic
//!
//! The shared integer math of the protocol: transfer-unit alignment for the
//! value ledger and the deposit-inclusive fee formula used by the swap
//! engine's redemption path.
//!
//! ## The deposit-inclusive fee
//!
//! The engine charges `fee = floor(D * n / (d + n))` on a gross pegged
//! deposit `D`, where `n` is the fee numerator and `d` the fixed
//! denominator. Quoting works against the *net* side: a caller who wants
//! exactly `X` vouchers out computes `fee' = floor(X * n / d)` and deposits
//! `D = X + fee'`.
//!
//! These two rounding points coincide exactly. Write `X * n = q * d + r`
//! with `r < d`. Then `fee' = q` and
//! `D * n = X * n + q * n = q * (d + n) + r`, so
//! `fee = q + floor(r / (d + n)) = q` because `r < d <= d + n`.
//! The depositor nets exactly `X` and the fee receiver is credited exactly
//! `q` — zero rounding discrepancy, not merely "at most one unit".
//!
//! All intermediate products widen to `u128` so that `u64::MAX * n` cannot
//! overflow.

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Returns `true` if `amount` is a whole multiple of `unit`.
///
/// A `unit` of zero aligns nothing — misconfigured ledgers fail closed.
pub fn is_aligned(amount: u64, unit: u64) -> bool {
    unit != 0 && amount % unit == 0
}

/// Rounds `amount` down to the nearest multiple of `unit`.
pub fn floor_to_unit(amount: u64, unit: u64) -> u64 {
    debug_assert!(unit > 0, "unit must be positive");
    amount - amount % unit
}

/// Rounds `amount` up to the nearest multiple of `unit`.
///
/// Returns `None` if the rounded value would overflow `u64`.
pub fn ceil_to_unit(amount: u64, unit: u64) -> Option<u64> {
    debug_assert!(unit > 0, "unit must be positive");
    let rem = amount % unit;
    if rem == 0 {
        Some(amount)
    } else {
        amount.checked_add(unit - rem)
    }
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Fee withheld from a gross deposit: `floor(gross * n / (d + n))`.
///
/// The remainder `gross - fee` is the net amount released to the depositor.
/// With `numerator = 0` this is always zero — the zero-fee branch is a
/// designed outcome, not an error.
pub fn fee_on_gross(gross: u64, numerator: u64, denominator: u64) -> u64 {
    debug_assert!(denominator > 0, "fee denominator must be positive");
    if numerator == 0 {
        return 0;
    }
    let divisor = denominator as u128 + numerator as u128;
    (gross as u128 * numerator as u128 / divisor) as u64
}

/// Caller-side fee quote against a desired net output:
/// `floor(net * n / d)`.
pub fn fee_on_net(net: u64, numerator: u64, denominator: u64) -> u64 {
    debug_assert!(denominator > 0, "fee denominator must be positive");
    (net as u128 * numerator as u128 / denominator as u128) as u64
}

/// Gross deposit required to net exactly `net`:
/// `net + fee_on_net(net)`.
///
/// Returns `None` if the surcharged amount would overflow `u64`.
pub fn quote_gross(net: u64, numerator: u64, denominator: u64) -> Option<u64> {
    net.checked_add(fee_on_net(net, numerator, denominator))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FEE_DENOMINATOR, MAX_FEE_NUMERATOR};

    const UNIT: u64 = 10_000_000_000;

    #[test]
    fn alignment_basics() {
        assert!(is_aligned(0, UNIT));
        assert!(is_aligned(UNIT, UNIT));
        assert!(is_aligned(3 * UNIT, UNIT));
        assert!(!is_aligned(UNIT + 1, UNIT));
        assert!(!is_aligned(UNIT - 1, UNIT));
    }

    #[test]
    fn zero_unit_aligns_nothing() {
        assert!(!is_aligned(0, 0));
        assert!(!is_aligned(42, 0));
    }

    #[test]
    fn floor_and_ceil() {
        assert_eq!(floor_to_unit(32_000_000_000, UNIT), 30_000_000_000);
        assert_eq!(ceil_to_unit(32_000_000_000, UNIT), Some(40_000_000_000));
        assert_eq!(ceil_to_unit(30_000_000_000, UNIT), Some(30_000_000_000));
        assert_eq!(floor_to_unit(0, UNIT), 0);
        assert_eq!(ceil_to_unit(0, UNIT), Some(0));
    }

    #[test]
    fn ceil_overflow_returns_none() {
        assert_eq!(ceil_to_unit(u64::MAX - 1, UNIT), None);
    }

    #[test]
    fn zero_fee_numerator_charges_nothing() {
        assert_eq!(fee_on_gross(1_000_000, 0, FEE_DENOMINATOR), 0);
        assert_eq!(fee_on_net(1_000_000, 0, FEE_DENOMINATOR), 0);
    }

    #[test]
    fn quoting_worked_example() {
        // numerator 10, denominator 1000, desired net 30_000_000_000:
        // quote is 300_000_000, gross is 30_300_000_000, and the gross-side
        // fee recovers exactly the quote.
        let net = 30_000_000_000u64;
        let fee = fee_on_net(net, 10, 1_000);
        assert_eq!(fee, 300_000_000);
        let gross = quote_gross(net, 10, 1_000).unwrap();
        assert_eq!(gross, 30_300_000_000);
        assert_eq!(fee_on_gross(gross, 10, 1_000), fee);
        assert_eq!(gross - fee_on_gross(gross, 10, 1_000), net);
    }

    #[test]
    fn fee_is_bounded_by_gross() {
        for numerator in 0..=MAX_FEE_NUMERATOR {
            for gross in [0u64, 1, 999, 1_000, 1_001, u64::MAX] {
                let fee = fee_on_gross(gross, numerator, FEE_DENOMINATOR);
                assert!(fee <= gross, "fee {fee} exceeds gross {gross}");
            }
        }
    }

    #[test]
    fn quoting_round_trip_is_exact() {
        // For every numerator up to the cap and a sweep of net amounts,
        // depositing the quoted gross nets exactly the desired amount and
        // the withheld fee equals the quote — discrepancy zero.
        for numerator in 0..=MAX_FEE_NUMERATOR {
            for net in (0..2_000_000u64)
                .step_by(977)
                .chain([30_000_000_000, u64::MAX / 2])
            {
                let quoted = fee_on_net(net, numerator, FEE_DENOMINATOR);
                let gross = match quote_gross(net, numerator, FEE_DENOMINATOR) {
                    Some(g) => g,
                    None => continue,
                };
                let withheld = fee_on_gross(gross, numerator, FEE_DENOMINATOR);
                assert_eq!(withheld, quoted, "net {net}, numerator {numerator}");
                assert_eq!(gross - withheld, net, "net {net}, numerator {numerator}");
            }
        }
    }

    #[test]
    fn large_gross_does_not_overflow() {
        // u64::MAX * 30 overflows u64; the u128 widening must absorb it.
        let fee = fee_on_gross(u64::MAX, MAX_FEE_NUMERATOR, FEE_DENOMINATOR);
        assert!(fee < u64::MAX);
        assert!(fee > 0);
    }
}
