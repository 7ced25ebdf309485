//! # Swap Engine
//!
//! The conversion state machine between the two ledgers. The engine is the
//! pegged ledger's sole authorized minter and drives both directions of
//! the peg:
//!
//! - **Deposit** — a depositor moves vouchers into engine custody via the
//!   value ledger's transfer-with-callback primitive; the engine mints
//!   pegged balance 1:1 to the depositor. No fee on this direction.
//! - **Redemption** — a holder moves pegged balance into engine custody
//!   the same way; the engine withholds the deposit-inclusive fee, burns
//!   the net portion, releases net vouchers to the sender, and credits the
//!   fee (in pegged units, never burned) to the configured fee receiver.
//!
//! The redemption release is a plain voucher transfer out of engine
//! custody, and the engine's account is deliberately *not* on the value
//! ledger's exemption list — which is exactly what forces the swap path to
//! produce voucher value only in whole transfer-unit increments for
//! non-exempt redeemers.
//!
//! Both hooks validate the invoking ledger's identity against the handles
//! the engine was constructed with; a transfer announced by any other
//! ledger instance is rejected (hook spoofing protection).

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use vex_protocol::config::{FEE_DENOMINATOR, MAX_FEE_NUMERATOR, PEGGED_DECIMALS};
use vex_protocol::ledger::Address;
use vex_protocol::units;
use vex_protocol::{
    EventLog, HookError, LedgerId, PeggedError, PeggedHandle, PeggedSettlementHook,
    SettlementEvent, StateCheckpoint, VoucherError, VoucherHandle, VoucherSettlementHook,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller is not the engine owner.
    #[error("unauthorized: {caller} is not the engine owner")]
    NotOwner {
        /// The rejected caller.
        caller: String,
    },

    /// The requested fee numerator exceeds the hard cap.
    #[error("fee above maximum: attempted {attempted}, permitted at most {maximum}")]
    FeeAboveMaximum {
        /// The rejected numerator.
        attempted: u64,
        /// The configured ceiling.
        maximum: u64,
    },

    /// A settlement hook was invoked by a ledger the engine does not trust.
    #[error("unexpected ledger: hook invoked by {got}, engine is bound to {expected}")]
    UnexpectedLedger {
        /// The ledger the engine was constructed with.
        expected: LedgerId,
        /// The ledger that actually invoked the hook.
        got: LedgerId,
    },

    /// A value-ledger operation failed.
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// A pegged-ledger operation failed.
    #[error(transparent)]
    Pegged(#[from] PeggedError),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Engine state. All access goes through [`EngineHandle`].
struct SwapEngine {
    /// The engine's custody account on both ledgers.
    address: Address,
    /// Fee governance authority.
    owner: Address,
    /// The value ledger the engine is bound to. Immutable.
    voucher: VoucherHandle,
    /// The pegged ledger the engine mints and burns on. Immutable.
    pegged: PeggedHandle,
    /// Redemption fee numerator against [`FEE_DENOMINATOR`]. Starts at 0.
    fee_numerator: u64,
    /// Account credited with collected fees. Set at construction.
    fee_receiver: Address,
    /// Observable settlement record.
    events: EventLog,
}

/// Shared handle to a swap engine. Clones share state.
///
/// The handle implements both settlement-hook traits, so it is passed
/// directly as the hook target of the ledgers' transfer-with-callback
/// primitives.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<RwLock<SwapEngine>>,
}

impl EngineHandle {
    /// Binds an engine to an existing pegged ledger.
    ///
    /// The engine must be granted sole minter rights separately
    /// (`pegged.set_minter(engine_address)`); until that happens the
    /// deposit path fails with an unauthorized-mint rejection.
    pub fn attach(
        address: &str,
        owner: &str,
        voucher: VoucherHandle,
        pegged: PeggedHandle,
        fee_receiver: &str,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SwapEngine {
                address: address.to_string(),
                owner: owner.to_string(),
                voucher,
                pegged,
                fee_numerator: 0,
                fee_receiver: fee_receiver.to_string(),
                events: EventLog::new(),
            })),
        }
    }

    /// Deploys a captive pegged ledger and binds the engine to it, with
    /// the engine preset as the sole minter and the engine owner as the
    /// ledger owner.
    pub fn deploy_pegged(
        address: &str,
        owner: &str,
        voucher: VoucherHandle,
        name: &str,
        symbol: &str,
        fee_receiver: &str,
    ) -> Result<Self, EngineError> {
        let pegged = PeggedHandle::new(owner, name, symbol, PEGGED_DECIMALS);
        pegged.set_minter(address)?;
        Ok(Self::attach(address, owner, voucher, pegged, fee_receiver))
    }

    /// The engine's custody account.
    pub fn address(&self) -> Address {
        self.inner.read().address.clone()
    }

    /// The fee governance authority.
    pub fn owner(&self) -> Address {
        self.inner.read().owner.clone()
    }

    /// Current redemption fee numerator.
    pub fn fee_numerator(&self) -> u64 {
        self.inner.read().fee_numerator
    }

    /// The fixed fee precision denominator.
    pub fn fee_denominator(&self) -> u64 {
        FEE_DENOMINATOR
    }

    /// Account credited with collected fees.
    pub fn fee_receiver(&self) -> Address {
        self.inner.read().fee_receiver.clone()
    }

    /// Handle to the bound value ledger.
    pub fn voucher(&self) -> VoucherHandle {
        self.inner.read().voucher.clone()
    }

    /// Handle to the bound pegged ledger.
    pub fn pegged(&self) -> PeggedHandle {
        self.inner.read().pegged.clone()
    }

    /// The recorded settlement events, oldest first.
    pub fn events(&self) -> Vec<SettlementEvent> {
        self.inner.read().events.events()
    }

    /// Current event-log position, for rollback by a caller that unwinds
    /// an already-settled hook (see the aggregator's exchange).
    pub(crate) fn event_watermark(&self) -> usize {
        self.inner.read().events.len()
    }

    /// Discards events recorded after `watermark`.
    pub(crate) fn truncate_events(&self, watermark: usize) {
        self.inner.write().events.truncate(watermark);
    }

    /// Updates the redemption fee numerator. Owner-only.
    ///
    /// Fails if `numerator` exceeds [`MAX_FEE_NUMERATOR`], reporting both
    /// the attempted and the permitted value. Setting the current value
    /// again succeeds (the update is idempotent).
    pub fn set_fee(&self, caller: &str, numerator: u64) -> Result<(), EngineError> {
        let mut engine = self.inner.write();
        if caller != engine.owner {
            return Err(EngineError::NotOwner {
                caller: caller.to_string(),
            });
        }
        if numerator > MAX_FEE_NUMERATOR {
            return Err(EngineError::FeeAboveMaximum {
                attempted: numerator,
                maximum: MAX_FEE_NUMERATOR,
            });
        }
        let previous = engine.fee_numerator;
        engine.fee_numerator = numerator;
        engine.events.record(SettlementEvent::FeeUpdated {
            previous,
            current: numerator,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Settlement Hooks
// ---------------------------------------------------------------------------

impl VoucherSettlementHook for EngineHandle {
    /// Deposit settlement: `amount` vouchers are already in engine
    /// custody; mint exactly `amount` pegged units to the sender.
    fn on_voucher_received(
        &self,
        source: LedgerId,
        from: &str,
        amount: u64,
        _data: &[u8],
    ) -> Result<(), HookError> {
        let mut engine = self.inner.write();
        if source != engine.voucher.id() {
            let err = EngineError::UnexpectedLedger {
                expected: engine.voucher.id(),
                got: source,
            };
            return Err(HookError::new(err.to_string()));
        }

        let minter = engine.address.clone();
        engine
            .pegged
            .mint(&minter, from, amount)
            .map_err(|e| HookError::new(e.to_string()))?;

        engine.events.record(SettlementEvent::VoucherDeposited {
            from: from.to_string(),
            amount,
        });
        engine.events.record(SettlementEvent::PeggedMinted {
            to: from.to_string(),
            amount,
        });
        tracing::debug!(target: "vex::engine", from, amount, "deposit settled");
        Ok(())
    }
}

impl PeggedSettlementHook for EngineHandle {
    /// Redemption settlement: `gross` pegged units are already in engine
    /// custody. Withhold the deposit-inclusive fee, release the net
    /// voucher amount to the sender, burn the net pegged portion, and
    /// credit the fee to the fee receiver.
    ///
    /// The whole body applies completely or restores the ledger
    /// checkpoint; a failure then also causes the invoking ledger to undo
    /// the incoming transfer leg.
    fn on_pegged_received(
        &self,
        source: LedgerId,
        from: &str,
        gross: u64,
        _data: &[u8],
    ) -> Result<(), HookError> {
        let mut engine = self.inner.write();
        if source != engine.pegged.id() {
            let err = EngineError::UnexpectedLedger {
                expected: engine.pegged.id(),
                got: source,
            };
            return Err(HookError::new(err.to_string()));
        }

        let fee = units::fee_on_gross(gross, engine.fee_numerator, FEE_DENOMINATOR);
        let net = gross - fee;
        let address = engine.address.clone();
        let fee_receiver = engine.fee_receiver.clone();

        let checkpoint = StateCheckpoint::capture(&engine.voucher, &engine.pegged);

        // Release first: the voucher transfer carries the granularity and
        // balance checks, so it is the step most likely to fail.
        if let Err(e) = engine.voucher.transfer(&address, from, net) {
            checkpoint.restore();
            return Err(HookError::new(e.to_string()));
        }
        if let Err(e) = engine.pegged.burn(&address, net) {
            checkpoint.restore();
            return Err(HookError::new(e.to_string()));
        }
        if fee > 0 {
            if let Err(e) = engine.pegged.transfer(&address, &fee_receiver, fee) {
                checkpoint.restore();
                return Err(HookError::new(e.to_string()));
            }
        }

        engine.events.record(SettlementEvent::VoucherRedeemed {
            to: from.to_string(),
            gross,
            net,
            fee,
        });
        engine.events.record(SettlementEvent::PeggedBurned {
            from: address,
            amount: net,
        });
        if fee > 0 {
            engine.events.record(SettlementEvent::FeeCollected {
                receiver: fee_receiver,
                amount: fee,
            });
        }
        tracing::debug!(target: "vex::engine", from, gross, net, fee, "redemption settled");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
