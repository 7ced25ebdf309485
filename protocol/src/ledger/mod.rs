//! # Ledger Module — The Two Asset Ledgers
//!
//! Where value lives in VEX. Two ledgers, two temperaments:
//!
//! ```text
//! voucher.rs    — Value ledger: unit-granularity restriction, exemption
//!                 list, transfer-with-callback settlement primitive
//! pegged.rs     — Pegged ledger: set-once minter, owner-gated metadata,
//!                 burnable, freely transferable
//! hook.rs       — Settlement-hook traits and ledger identity
//! checkpoint.rs — Snapshot/restore for all-or-nothing multi-step calls
//! ```
//!
//! ## Design Principles
//!
//! 1. **Explicit callers.** There is no ambient transaction origin: every
//!    privileged operation takes the caller as a parameter and checks it
//!    against an explicit access-control field.
//! 2. **Locks never outlive an operation.** Handles wrap ledger state in
//!    `Arc<RwLock<…>>` and each public operation takes the lock only for
//!    its own mutation. A settlement hook always runs with the invoking
//!    ledger unlocked, so nested calls cannot deadlock — and cannot be
//!    trusted either, which is why hooks validate the invoking ledger's
//!    [`LedgerId`] instead of call order.
//! 3. **Transfer-then-hook is atomic.** If the hook rejects, the transfer
//!    leg is undone before the error propagates.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod checkpoint;
pub mod hook;
pub mod pegged;
pub mod voucher;

/// An account identity on either ledger. Plain strings: the host
/// environment that assigns real addresses is out of scope, and tests
/// read better with `"alice"` than with hex blobs.
pub type Address = String;

/// Unique identity of a ledger instance.
///
/// Settlement hooks receive the invoking ledger's `LedgerId` and compare it
/// against the handle they were configured with — the capability check that
/// replaces trust in call origin.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerId(Uuid);

impl LedgerId {
    /// Mints a fresh ledger identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LedgerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerId({})", self.0)
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
