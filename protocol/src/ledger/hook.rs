//! Settlement-hook traits.
//!
//! Both ledgers expose a transfer-with-callback primitive: the transfer is
//! applied, then the hook target is invoked atomically with it. A hook that
//! returns an error causes the ledger to undo the transfer leg before the
//! failure propagates to the original caller.
//!
//! Hook targets must treat every invocation as potentially hostile: the
//! `source` parameter carries the invoking ledger's identity and the target
//! is expected to compare it against the ledger handle it actually trusts.

use thiserror::Error;

use super::LedgerId;

/// A settlement hook's reason for rejecting an incoming transfer.
///
/// Carried as a message rather than a typed error because the ledger crate
/// cannot know the hook implementor's error taxonomy; the invoking ledger
/// surfaces it as a `SettlementRejected` error after undoing the transfer.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(String);

impl HookError {
    /// Wraps a rejection reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Target of the value ledger's transfer-with-callback primitive.
pub trait VoucherSettlementHook {
    /// Invoked after `amount` vouchers from `from` have been credited to
    /// the hook target's account on the ledger identified by `source`.
    ///
    /// Returning an error undoes the transfer.
    fn on_voucher_received(
        &self,
        source: LedgerId,
        from: &str,
        amount: u64,
        data: &[u8],
    ) -> Result<(), HookError>;
}

/// Target of the pegged ledger's transfer-with-callback primitive.
pub trait PeggedSettlementHook {
    /// Invoked after `amount` pegged units from `from` have been credited
    /// to the hook target's account on the ledger identified by `source`.
    ///
    /// Returning an error undoes the transfer.
    fn on_pegged_received(
        &self,
        source: LedgerId,
        from: &str,
        amount: u64,
        data: &[u8],
    ) -> Result<(), HookError>;
}
