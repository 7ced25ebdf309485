//! # Protocol Configuration & Constants
//!
//! Every magic number in VEX lives here. These values define the economic
//! behavior of a deployment — the fee precision is burned into every quote
//! ever issued, so changing it after launch is somewhere between "difficult"
//! and "career-ending".

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Fee precision denominator. A `fee_numerator` of 10 against this
/// denominator means a 1.0% fee quoted on the net output.
///
/// Immutable for the lifetime of an engine: quotes computed off-chain with
/// one denominator must settle against the same denominator.
pub const FEE_DENOMINATOR: u64 = 1_000;

/// Hard ceiling on the redemption fee numerator. 30 against a denominator
/// of 1,000 caps the fee at 3.0% of net output. Governance can move the
/// fee anywhere below this, never above it.
pub const MAX_FEE_NUMERATOR: u64 = 30;

// ---------------------------------------------------------------------------
// Voucher Granularity
// ---------------------------------------------------------------------------

/// Default transfer-unit granularity of the value ledger, in smallest
/// units. Non-exempt accounts can only move whole multiples of this.
///
/// This is a per-deployment configuration value, not a protocol invariant —
/// the ledger constructor takes an explicit unit and this is merely the
/// default used by reference deployments and tests.
pub const DEFAULT_VOUCHER_UNIT: u64 = 10_000_000_000;

/// Display decimals for the voucher asset. Rendering only; the protocol
/// never divides.
pub const VOUCHER_DECIMALS: u8 = 6;

/// Display decimals for pegged assets deployed by the engine.
pub const PEGGED_DECIMALS: u8 = 6;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Crate-level protocol version string, assembled at compile time.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_cap_is_below_denominator() {
        // A fee numerator at or above the denominator would mean a fee of
        // 50%+ of the gross deposit. If this assert fires, stop shipping.
        assert!(MAX_FEE_NUMERATOR < FEE_DENOMINATOR);
    }

    #[test]
    fn fee_denominator_is_positive() {
        assert!(FEE_DENOMINATOR > 0);
    }

    #[test]
    fn default_unit_is_positive() {
        assert!(DEFAULT_VOUCHER_UNIT > 0);
    }
}
