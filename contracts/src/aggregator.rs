//! # Exchange Aggregator
//!
//! Delivers an exact voucher amount to a recipient by blending two funding
//! sources in one atomic operation:
//!
//! 1. a **pre-existing** voucher balance the caller already holds and has
//!    approved the aggregator to pull, and
//! 2. a **swap-sourced** portion freshly produced by pushing pegged
//!    balance through the swap engine's deposit-and-redeem path.
//!
//! Because the engine releases redeemed vouchers through an ordinary
//! (granularity-checked) transfer, the swap-sourced portion is only
//! available in whole transfer-unit multiples. The funding plan therefore
//! rounds the shortfall *up* to the unit and covers the difference by
//! using less of the pre-existing balance. The aggregator's own account is
//! expected to be on the value ledger's exemption list so the final
//! delivery leg can be any sub-unit amount.

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use vex_protocol::config::FEE_DENOMINATOR;
use vex_protocol::ledger::Address;
use vex_protocol::units;
use vex_protocol::{
    EventLog, PeggedError, PeggedHandle, SettlementEvent, StateCheckpoint, VoucherError,
    VoucherHandle,
};

use crate::swap_engine::EngineHandle;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while planning or executing an exchange.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// The requested target amount is zero.
    #[error("target amount must be positive")]
    ZeroTarget,

    /// No swap-sourced amount can bridge the gap between the pre-existing
    /// balance and the target: the shortfall rounded up to the transfer
    /// unit already overshoots the target.
    #[error(
        "unreachable target: no multiple of the transfer unit {unit} lands between \
         the shortfall and target {target} (pre-existing {pre_existing})"
    )]
    UnreachableTarget {
        /// The requested delivery amount.
        target: u64,
        /// The value ledger's transfer unit.
        unit: u64,
        /// The pre-existing balance offered by the caller.
        pre_existing: u64,
    },

    /// The declared pegged total does not cover the gross pull the
    /// engine's current fee requires.
    #[error("quote mismatch: declared pegged total {declared}, required {required}")]
    QuoteMismatch {
        /// The ceiling the caller declared.
        declared: u64,
        /// The exact gross pull the current fee requires.
        required: u64,
    },

    /// The funding amount list length fits neither accepted shape.
    #[error(
        "funding arity mismatch: {assets} assets with {amounts} amounts \
         (expected equal lengths, or one fewer amount)"
    )]
    FundingArityMismatch {
        /// Number of funding assets supplied.
        assets: usize,
        /// Number of funding amounts supplied.
        amounts: usize,
    },

    /// Explicit funding amounts do not sum to the required gross pull.
    #[error("funding sum mismatch: required gross {required}, amounts sum to {sum}")]
    FundingSumMismatch {
        /// The gross pull the current fee requires.
        required: u64,
        /// What the explicit amounts actually add up to.
        sum: u64,
    },

    /// A funding asset is not the engine's pegged ledger.
    #[error("unsupported funding asset at index {index}")]
    UnsupportedFundingAsset {
        /// Position of the offending asset in the funding list.
        index: usize,
    },

    /// An intermediate amount exceeded the representable range.
    #[error("amount exceeds the representable range")]
    AmountOverflow,

    /// A value-ledger operation failed.
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// A pegged-ledger operation failed.
    #[error(transparent)]
    Pegged(#[from] PeggedError),
}

// ---------------------------------------------------------------------------
// Funding Plan
// ---------------------------------------------------------------------------

/// The granularity-optimal split of a delivery between the two sources.
///
/// Returned to the caller and serializable, so front ends can show a user
/// exactly how a delivery will be funded before asking for approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FundingPlan {
    /// The exact amount delivered to the recipient.
    pub target: u64,
    /// Portion produced through the swap path. Always a whole multiple of
    /// the transfer unit.
    pub swap_sourced: u64,
    /// Portion pulled from the caller's pre-existing voucher balance.
    pub pre_existing_used: u64,
}

impl FundingPlan {
    /// Computes the split for delivering `target` given `pre_existing`
    /// available vouchers and the ledger's transfer `unit`.
    ///
    /// The swap-sourced portion is the shortfall rounded up to the unit;
    /// the remainder comes from the pre-existing balance. When even the
    /// smallest sufficient unit multiple overshoots the target, no valid
    /// split exists and the computation fails.
    pub fn compute(target: u64, pre_existing: u64, unit: u64) -> Result<Self, AggregatorError> {
        if target == 0 {
            return Err(AggregatorError::ZeroTarget);
        }
        let shortfall = target.saturating_sub(pre_existing);
        let swap_sourced =
            units::ceil_to_unit(shortfall, unit).ok_or(AggregatorError::AmountOverflow)?;
        if swap_sourced > target {
            return Err(AggregatorError::UnreachableTarget {
                target,
                unit,
                pre_existing,
            });
        }
        Ok(Self {
            target,
            swap_sourced,
            pre_existing_used: target - swap_sourced,
        })
    }
}

/// Normalizes the funding list into one explicit amount per asset, against
/// the gross pull the plan requires.
///
/// Two shapes are accepted: one amount per asset (which must sum to
/// `required`), or one fewer amount than assets, in which case the final
/// asset covers whatever remains of `required`.
fn resolve_funding_amounts(
    asset_count: usize,
    amounts: &[u64],
    required: u64,
) -> Result<Vec<u64>, AggregatorError> {
    let mut sum: u64 = 0;
    for &amount in amounts {
        sum = sum
            .checked_add(amount)
            .ok_or(AggregatorError::AmountOverflow)?;
    }

    if amounts.len() == asset_count {
        if sum != required {
            return Err(AggregatorError::FundingSumMismatch { required, sum });
        }
        Ok(amounts.to_vec())
    } else if amounts.len() + 1 == asset_count {
        let remainder = required
            .checked_sub(sum)
            .ok_or(AggregatorError::FundingSumMismatch { required, sum })?;
        let mut resolved = amounts.to_vec();
        resolved.push(remainder);
        Ok(resolved)
    } else {
        Err(AggregatorError::FundingArityMismatch {
            assets: asset_count,
            amounts: amounts.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Multi-source funding orchestrator bound to one swap engine.
pub struct ExchangeAggregator {
    /// The aggregator's custody account on both ledgers.
    address: Address,
    /// The engine whose swap path produces the swap-sourced portion.
    engine: EngineHandle,
    /// Observable settlement record.
    events: RwLock<EventLog>,
}

impl ExchangeAggregator {
    /// Binds an aggregator to an engine.
    ///
    /// The aggregator's account should be granted a granularity exemption
    /// on the value ledger at deployment; without it the final delivery
    /// leg fails for any sub-unit target.
    pub fn new(address: &str, engine: EngineHandle) -> Self {
        Self {
            address: address.to_string(),
            engine,
            events: RwLock::new(EventLog::new()),
        }
    }

    /// The aggregator's custody account.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The bound swap engine.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// The recorded settlement events, oldest first.
    pub fn events(&self) -> Vec<SettlementEvent> {
        self.events.read().events()
    }

    /// Delivers exactly `target_amount` vouchers to `recipient`, funding
    /// the delivery from the caller's pegged balance (pulled through the
    /// listed funding assets) and up to `pre_existing_amount` of the
    /// caller's existing vouchers.
    ///
    /// `total_amount` is a ceiling on the pegged pull, not the pull
    /// itself: the aggregator pulls exactly the gross the engine's current
    /// fee requires to net the planned swap-sourced portion, and a surplus
    /// declaration is simply never consumed. The caller must have approved
    /// the aggregator for every pegged tranche and for the pre-existing
    /// voucher portion the plan consumes. `correlation_id` is an opaque
    /// tag carried into the settlement record for off-chain
    /// reconciliation.
    ///
    /// # Errors
    ///
    /// Fails without touching any balance when the plan is infeasible, the
    /// declared total falls short of the required gross pull, or the
    /// funding list is malformed. Execution failures (missing allowance,
    /// insufficient balance, hook rejection) restore the pre-call state of
    /// both ledgers before propagating.
    #[allow(clippy::too_many_arguments)]
    pub fn exchange(
        &self,
        caller: &str,
        funding_assets: &[PeggedHandle],
        funding_amounts: &[u64],
        total_amount: u64,
        target_amount: u64,
        pre_existing_amount: u64,
        recipient: &str,
        correlation_id: &str,
    ) -> Result<FundingPlan, AggregatorError> {
        let voucher = self.engine.voucher();
        let pegged = self.engine.pegged();

        let plan = FundingPlan::compute(target_amount, pre_existing_amount, voucher.unit())?;

        // The gross pull is dictated by the plan and the current fee; the
        // declared total only has to cover it.
        let required =
            units::quote_gross(plan.swap_sourced, self.engine.fee_numerator(), FEE_DENOMINATOR)
                .ok_or(AggregatorError::AmountOverflow)?;
        if required > total_amount {
            return Err(AggregatorError::QuoteMismatch {
                declared: total_amount,
                required,
            });
        }

        let amounts = resolve_funding_amounts(funding_assets.len(), funding_amounts, required)?;
        for (index, asset) in funding_assets.iter().enumerate() {
            if asset.id() != pegged.id() {
                return Err(AggregatorError::UnsupportedFundingAsset { index });
            }
        }

        let checkpoint = StateCheckpoint::capture(&voucher, &pegged);
        let engine_watermark = self.engine.event_watermark();
        match self.execute(
            caller,
            funding_assets,
            &amounts,
            required,
            &plan,
            recipient,
            correlation_id,
            &voucher,
            &pegged,
        ) {
            Ok(()) => {
                self.events.write().record(SettlementEvent::Exchanged {
                    caller: caller.to_string(),
                    recipient: recipient.to_string(),
                    target: plan.target,
                    swap_sourced: plan.swap_sourced,
                    pre_existing_used: plan.pre_existing_used,
                    correlation_id: correlation_id.to_string(),
                });
                tracing::info!(
                    target: "vex::aggregator",
                    caller,
                    recipient,
                    target = plan.target,
                    swap_sourced = plan.swap_sourced,
                    pre_existing_used = plan.pre_existing_used,
                    correlation_id,
                    "exchange settled"
                );
                Ok(plan)
            }
            Err(e) => {
                checkpoint.restore();
                // A redemption that settled before a later step failed has
                // been unwound; drop its events with it.
                self.engine.truncate_events(engine_watermark);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        caller: &str,
        funding_assets: &[PeggedHandle],
        amounts: &[u64],
        gross_pull: u64,
        plan: &FundingPlan,
        recipient: &str,
        correlation_id: &str,
        voucher: &VoucherHandle,
        pegged: &PeggedHandle,
    ) -> Result<(), AggregatorError> {
        // Pull each pegged tranche into aggregator custody.
        for (asset, &amount) in funding_assets.iter().zip(amounts) {
            if amount > 0 {
                asset.transfer_from(&self.address, caller, &self.address, amount)?;
            }
        }

        // Push the pooled gross through the engine's redemption path; the
        // engine releases `swap_sourced` vouchers to us.
        if gross_pull > 0 {
            pegged.transfer_and_call(
                &self.address,
                &self.engine.address(),
                gross_pull,
                &self.engine,
                correlation_id.as_bytes(),
            )?;
        }

        // Pull the planned pre-existing portion from the caller.
        if plan.pre_existing_used > 0 {
            voucher.transfer_from(&self.address, caller, &self.address, plan.pre_existing_used)?;
        }

        // Deliver the exact target in one transfer. Relies on the
        // aggregator's granularity exemption for sub-unit targets.
        voucher.transfer(&self.address, recipient, plan.target)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u64 = 10_000_000_000;

    #[test]
    fn plan_all_swap_when_no_pre_existing() {
        let plan = FundingPlan::compute(3 * UNIT, 0, UNIT).unwrap();
        assert_eq!(plan.swap_sourced, 3 * UNIT);
        assert_eq!(plan.pre_existing_used, 0);
    }

    #[test]
    fn plan_uses_pre_existing_for_aligned_remainder() {
        let plan = FundingPlan::compute(3 * UNIT, UNIT, UNIT).unwrap();
        assert_eq!(plan.swap_sourced, 2 * UNIT);
        assert_eq!(plan.pre_existing_used, UNIT);
    }

    #[test]
    fn plan_rounds_shortfall_up_and_uses_remainder() {
        // Shortfall of 3.0e10 exactly; the 0.2e10 extra target beyond the
        // unit multiple comes from the pre-existing balance.
        let plan = FundingPlan::compute(32_000_000_000, 2_000_000_000, UNIT).unwrap();
        assert_eq!(plan.swap_sourced, 3 * UNIT);
        assert_eq!(plan.pre_existing_used, 2_000_000_000);
    }

    #[test]
    fn plan_ignores_pre_existing_when_rounding_covers_it() {
        // Rounding the shortfall up to the unit already reaches the whole
        // target, so none of the pre-existing balance is consumed.
        let plan = FundingPlan::compute(3 * UNIT, 2_000_000_000, UNIT).unwrap();
        assert_eq!(plan.swap_sourced, 3 * UNIT);
        assert_eq!(plan.pre_existing_used, 0);
    }

    #[test]
    fn plan_partial_pre_existing_consumption() {
        // Only as much pre-existing balance as the target needs beyond the
        // rounded swap portion is used.
        let plan = FundingPlan::compute(51_000_000_000, 22_000_000_000, UNIT).unwrap();
        assert_eq!(plan.swap_sourced, 3 * UNIT);
        assert_eq!(plan.pre_existing_used, 21_000_000_000);
    }

    #[test]
    fn plan_with_misaligned_pre_existing_remainder() {
        let plan = FundingPlan::compute(52_000_000_000, 21_000_000_000, UNIT).unwrap();
        assert_eq!(plan.swap_sourced, 4 * UNIT);
        assert_eq!(plan.pre_existing_used, 12_000_000_000);
    }

    #[test]
    fn plan_fully_pre_funded_needs_no_swap() {
        let plan = FundingPlan::compute(2 * UNIT, 5 * UNIT, UNIT).unwrap();
        assert_eq!(plan.swap_sourced, 0);
        assert_eq!(plan.pre_existing_used, 2 * UNIT);
    }

    #[test]
    fn plan_rejects_zero_target() {
        assert!(matches!(
            FundingPlan::compute(0, 0, UNIT).unwrap_err(),
            AggregatorError::ZeroTarget
        ));
    }

    #[test]
    fn plan_rejects_unreachable_target() {
        // Nothing pre-existing and a sub-unit-offset target: the rounded
        // shortfall overshoots.
        let err = FundingPlan::compute(32_000_000_000, 0, UNIT).unwrap_err();
        assert!(matches!(
            err,
            AggregatorError::UnreachableTarget { target, unit, pre_existing }
                if target == 32_000_000_000 && unit == UNIT && pre_existing == 0
        ));
    }

    #[test]
    fn plan_invariants_hold_across_a_grid() {
        for target in (1..200u64).map(|t| t * 500_000_000) {
            for pre_existing in (0..20u64).map(|p| p * 1_500_000_000) {
                if let Ok(plan) = FundingPlan::compute(target, pre_existing, UNIT) {
                    assert_eq!(plan.swap_sourced + plan.pre_existing_used, target);
                    assert_eq!(plan.swap_sourced % UNIT, 0);
                    assert!(plan.pre_existing_used <= pre_existing);
                }
            }
        }
    }

    #[test]
    fn funding_amounts_explicit_shape_must_sum() {
        assert_eq!(
            resolve_funding_amounts(2, &[30, 70], 100).unwrap(),
            vec![30, 70]
        );
        assert!(matches!(
            resolve_funding_amounts(2, &[30, 60], 100).unwrap_err(),
            AggregatorError::FundingSumMismatch { required: 100, sum: 90 }
        ));
    }

    #[test]
    fn funding_amounts_remainder_shape() {
        assert_eq!(
            resolve_funding_amounts(1, &[], 100).unwrap(),
            vec![100]
        );
        assert_eq!(
            resolve_funding_amounts(3, &[10, 20], 100).unwrap(),
            vec![10, 20, 70]
        );
        // Explicit amounts already exceeding the requirement leave no
        // valid remainder.
        assert!(matches!(
            resolve_funding_amounts(2, &[150], 100).unwrap_err(),
            AggregatorError::FundingSumMismatch { .. }
        ));
    }

    #[test]
    fn funding_amounts_arity_mismatch() {
        assert!(matches!(
            resolve_funding_amounts(1, &[10, 20, 30], 60).unwrap_err(),
            AggregatorError::FundingArityMismatch { assets: 1, amounts: 3 }
        ));
    }
}
