//! Checkpoint/rollback for multi-step settlements.
//!
//! The ledgers are in-memory state, which makes snapshot-and-restore the
//! natural revert mechanism: capture clones of both ledgers before a
//! multi-step operation, write them back if any step fails. Callers that
//! also record events remember the event-log watermark separately and
//! truncate it alongside the restore.

use super::pegged::{PeggedHandle, PeggedLedger};
use super::voucher::{VoucherHandle, VoucherLedger};

/// A captured snapshot of both asset ledgers.
///
/// `restore` consumes the checkpoint — a snapshot is written back at most
/// once, and a successful operation simply drops it.
pub struct StateCheckpoint {
    voucher: VoucherHandle,
    pegged: PeggedHandle,
    voucher_state: VoucherLedger,
    pegged_state: PeggedLedger,
}

impl StateCheckpoint {
    /// Clones the current state of both ledgers.
    pub fn capture(voucher: &VoucherHandle, pegged: &PeggedHandle) -> Self {
        Self {
            voucher: voucher.clone(),
            pegged: pegged.clone(),
            voucher_state: voucher.snapshot(),
            pegged_state: pegged.snapshot(),
        }
    }

    /// Writes the captured state back, discarding every change made since
    /// the capture.
    pub fn restore(self) {
        self.voucher.restore(self.voucher_state);
        self.pegged.restore(self.pegged_state);
    }
}
