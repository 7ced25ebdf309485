//! # Value Ledger (Voucher)
//!
//! The restricted-transfer balance representing the redeemable unit of
//! value. Three things set it apart from a plain token ledger:
//!
//! 1. **Unit granularity.** Transfers where both endpoints are non-exempt
//!    must move whole multiples of the ledger's `unit`. An exemption on
//!    either side lifts the restriction. The unit is an explicit
//!    per-deployment configuration value, not a protocol constant.
//! 2. **Transfer-with-callback.** [`transfer_voucher_and_call`] applies a
//!    transfer and invokes the target's settlement hook atomically with it;
//!    a rejecting hook undoes the transfer.
//! 3. **Owner-gated supply.** Only the ledger owner mints vouchers (the
//!    issuance pipeline behind that is out of scope here).
//!
//! [`transfer_voucher_and_call`]: VoucherHandle::transfer_voucher_and_call

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hook::VoucherSettlementHook;
use super::{Address, LedgerId};
use crate::units;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during value-ledger operations.
#[derive(Debug, Error)]
pub enum VoucherError {
    /// The caller is not the ledger owner.
    #[error("unauthorized: {caller} is not the voucher ledger owner")]
    NotOwner {
        /// The rejected caller.
        caller: String,
    },

    /// A transfer between two non-exempt accounts is not a whole multiple
    /// of the ledger's transfer unit.
    #[error("misaligned amount: {amount} is not a multiple of the transfer unit {unit}")]
    MisalignedAmount {
        /// The offending amount.
        amount: u64,
        /// The ledger's configured transfer unit.
        unit: u64,
    },

    /// The debited account does not hold enough vouchers.
    #[error("insufficient voucher balance: {account} has {available}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        account: String,
        /// Its current balance.
        available: u64,
        /// The amount requested.
        requested: u64,
    },

    /// The spender's allowance does not cover the requested pull.
    #[error(
        "insufficient voucher allowance: {spender} may spend {allowance} of {owner}'s balance, requested {requested}"
    )]
    InsufficientAllowance {
        /// The balance owner.
        owner: String,
        /// The spender whose allowance fell short.
        spender: String,
        /// The current allowance.
        allowance: u64,
        /// The amount requested.
        requested: u64,
    },

    /// A credit would overflow `u64`.
    #[error("voucher balance overflow crediting {amount} to {account}")]
    BalanceOverflow {
        /// The account being credited.
        account: String,
        /// The amount that caused the overflow.
        amount: u64,
    },

    /// A mint would overflow the total supply.
    #[error("voucher supply overflow: minting {amount} would exceed u64::MAX")]
    SupplyOverflow {
        /// The amount that was attempted.
        amount: u64,
    },

    /// The settlement hook rejected an incoming transfer; the transfer leg
    /// has been undone.
    #[error("settlement rejected: {0}")]
    SettlementRejected(String),
}

// ---------------------------------------------------------------------------
// Ledger State
// ---------------------------------------------------------------------------

/// In-memory state of the value ledger.
///
/// All mutation goes through [`VoucherHandle`]; the state struct itself is
/// plain data so it can be cloned into a checkpoint and written back on
/// rollback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoucherLedger {
    id: LedgerId,
    owner: Address,
    unit: u64,
    total_supply: u64,
    balances: HashMap<Address, u64>,
    /// `owner -> spender -> amount`. Nested rather than tuple-keyed so the
    /// state serializes as plain JSON objects.
    allowances: HashMap<Address, HashMap<Address, u64>>,
    unit_exemptions: HashSet<Address>,
}

impl VoucherLedger {
    fn new(owner: &str, unit: u64) -> Self {
        Self {
            id: LedgerId::new(),
            owner: owner.to_string(),
            unit,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            unit_exemptions: HashSet::new(),
        }
    }

    fn balance_of(&self, account: &str) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn is_exempt(&self, account: &str) -> bool {
        self.unit_exemptions.contains(account)
    }

    fn require_owner(&self, caller: &str) -> Result<(), VoucherError> {
        if caller != self.owner {
            return Err(VoucherError::NotOwner {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    /// Granularity rule: aligned, or at least one exempt endpoint.
    fn check_alignment(&self, from: &str, to: &str, amount: u64) -> Result<(), VoucherError> {
        if units::is_aligned(amount, self.unit) || self.is_exempt(from) || self.is_exempt(to) {
            Ok(())
        } else {
            Err(VoucherError::MisalignedAmount {
                amount,
                unit: self.unit,
            })
        }
    }

    /// Raw balance movement with no granularity check. Either both
    /// balances change or neither does.
    fn move_balance(&mut self, from: &str, to: &str, amount: u64) -> Result<(), VoucherError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(VoucherError::InsufficientBalance {
                account: from.to_string(),
                available: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self.balance_of(to);
        let credited = to_balance
            .checked_add(amount)
            .ok_or(VoucherError::BalanceOverflow {
                account: to.to_string(),
                amount,
            })?;
        self.balances.insert(from.to_string(), from_balance - amount);
        self.balances.insert(to.to_string(), credited);
        Ok(())
    }

    fn transfer(&mut self, from: &str, to: &str, amount: u64) -> Result<(), VoucherError> {
        self.check_alignment(from, to, amount)?;
        self.move_balance(from, to, amount)
    }

    fn spend_allowance(
        &mut self,
        owner: &str,
        spender: &str,
        amount: u64,
    ) -> Result<(), VoucherError> {
        let allowance = self
            .allowances
            .get(owner)
            .and_then(|per_spender| per_spender.get(spender))
            .copied()
            .unwrap_or(0);
        if allowance < amount {
            return Err(VoucherError::InsufficientAllowance {
                owner: owner.to_string(),
                spender: spender.to_string(),
                allowance,
                requested: amount,
            });
        }
        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), allowance - amount);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Shared handle to a value-ledger instance.
///
/// Cloning the handle clones the reference, not the ledger. Every operation
/// takes the internal lock only for its own duration — in particular, the
/// settlement hook in [`transfer_voucher_and_call`] runs with the ledger
/// unlocked.
///
/// [`transfer_voucher_and_call`]: VoucherHandle::transfer_voucher_and_call
#[derive(Clone)]
pub struct VoucherHandle {
    inner: Arc<RwLock<VoucherLedger>>,
    id: LedgerId,
}

impl VoucherHandle {
    /// Creates a fresh value ledger with the given owner and transfer unit.
    pub fn new(owner: &str, unit: u64) -> Self {
        let state = VoucherLedger::new(owner, unit);
        let id = state.id;
        Self {
            inner: Arc::new(RwLock::new(state)),
            id,
        }
    }

    /// This ledger instance's identity.
    pub fn id(&self) -> LedgerId {
        self.id
    }

    /// The configured transfer-unit granularity.
    pub fn unit(&self) -> u64 {
        self.inner.read().unit
    }

    /// Balance of `account` in smallest units.
    pub fn balance_of(&self, account: &str) -> u64 {
        self.inner.read().balance_of(account)
    }

    /// Total voucher supply across all accounts.
    pub fn total_voucher_supply(&self) -> u64 {
        self.inner.read().total_supply
    }

    /// Returns `true` if `account` bypasses the granularity restriction.
    pub fn is_unit_exempt(&self, account: &str) -> bool {
        self.inner.read().is_exempt(account)
    }

    /// Adds `account` to the unit-exemption list. Owner-only.
    pub fn add_unit_exemption(&self, caller: &str, account: &str) -> Result<(), VoucherError> {
        let mut ledger = self.inner.write();
        ledger.require_owner(caller)?;
        ledger.unit_exemptions.insert(account.to_string());
        Ok(())
    }

    /// Mints `amount` vouchers to `to`. Owner-only.
    pub fn mint(&self, caller: &str, to: &str, amount: u64) -> Result<(), VoucherError> {
        let mut ledger = self.inner.write();
        ledger.require_owner(caller)?;
        let supply = ledger
            .total_supply
            .checked_add(amount)
            .ok_or(VoucherError::SupplyOverflow { amount })?;
        let credited = ledger
            .balance_of(to)
            .checked_add(amount)
            .ok_or(VoucherError::BalanceOverflow {
                account: to.to_string(),
                amount,
            })?;
        ledger.total_supply = supply;
        ledger.balances.insert(to.to_string(), credited);
        Ok(())
    }

    /// Direct transfer, subject to the granularity rule.
    pub fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<(), VoucherError> {
        self.inner.write().transfer(from, to, amount)
    }

    /// Authorizes `spender` to pull up to `amount` from `owner`'s balance.
    pub fn approve_voucher(&self, owner: &str, spender: &str, amount: u64) {
        self.inner
            .write()
            .allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    /// Remaining allowance of `spender` over `owner`'s balance.
    pub fn allowance(&self, owner: &str, spender: &str) -> u64 {
        self.inner
            .read()
            .allowances
            .get(owner)
            .and_then(|per_spender| per_spender.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Allowance-checked pull: `caller` moves `amount` from `from` to `to`.
    ///
    /// The allowance is spent before the transfer is attempted; if the
    /// transfer itself fails the allowance deduction is rolled back too.
    pub fn transfer_from(
        &self,
        caller: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), VoucherError> {
        let mut ledger = self.inner.write();
        ledger.spend_allowance(from, caller, amount)?;
        if let Err(e) = ledger.transfer(from, to, amount) {
            // Restore the allowance: the pull did not happen.
            ledger
                .allowances
                .entry(from.to_string())
                .or_default()
                .entry(caller.to_string())
                .and_modify(|a| *a = a.saturating_add(amount))
                .or_insert(amount);
            return Err(e);
        }
        Ok(())
    }

    /// The transfer-with-callback settlement primitive.
    ///
    /// Moves `amount` from `from` to `to` (granularity rule applies), then
    /// invokes `hook.on_voucher_received` with this ledger's identity. If
    /// the hook rejects, the transfer leg is undone and the rejection is
    /// surfaced as [`VoucherError::SettlementRejected`].
    ///
    /// The ledger lock is released before the hook runs, so the hook may
    /// freely operate on this ledger (and others) without deadlocking.
    pub fn transfer_voucher_and_call(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        hook: &dyn VoucherSettlementHook,
        data: &[u8],
    ) -> Result<(), VoucherError> {
        self.inner.write().transfer(from, to, amount)?;
        if let Err(rejection) = hook.on_voucher_received(self.id, from, amount, data) {
            // The hook's own effects were rolled back on its side; undoing
            // the transfer leg restores the pre-call state.
            if self.inner.write().move_balance(to, from, amount).is_err() {
                tracing::error!(
                    target: "vex::ledger",
                    from, to, amount,
                    "could not undo voucher transfer leg after hook rejection"
                );
            }
            return Err(VoucherError::SettlementRejected(rejection.to_string()));
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> VoucherLedger {
        self.inner.read().clone()
    }

    pub(crate) fn restore(&self, state: VoucherLedger) {
        *self.inner.write() = state;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_VOUCHER_UNIT;
    use crate::ledger::hook::HookError;
    use parking_lot::Mutex;

    const UNIT: u64 = DEFAULT_VOUCHER_UNIT;

    fn ledger() -> VoucherHandle {
        VoucherHandle::new("owner", UNIT)
    }

    struct RecordingHook {
        seen: Mutex<Vec<(LedgerId, String, u64)>>,
    }

    impl RecordingHook {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl VoucherSettlementHook for RecordingHook {
        fn on_voucher_received(
            &self,
            source: LedgerId,
            from: &str,
            amount: u64,
            _data: &[u8],
        ) -> Result<(), HookError> {
            self.seen.lock().push((source, from.to_string(), amount));
            Ok(())
        }
    }

    struct RejectingHook;

    impl VoucherSettlementHook for RejectingHook {
        fn on_voucher_received(
            &self,
            _source: LedgerId,
            _from: &str,
            _amount: u64,
            _data: &[u8],
        ) -> Result<(), HookError> {
            Err(HookError::new("not today"))
        }
    }

    #[test]
    fn mint_is_owner_only() {
        let v = ledger();
        assert!(v.mint("mallory", "alice", UNIT).is_err());
        v.mint("owner", "alice", 10 * UNIT).unwrap();
        assert_eq!(v.balance_of("alice"), 10 * UNIT);
        assert_eq!(v.total_voucher_supply(), 10 * UNIT);
    }

    #[test]
    fn aligned_transfer_between_plain_accounts() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();
        v.transfer("alice", "bob", 3 * UNIT).unwrap();
        assert_eq!(v.balance_of("alice"), 7 * UNIT);
        assert_eq!(v.balance_of("bob"), 3 * UNIT);
    }

    #[test]
    fn misaligned_transfer_rejected() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();
        let result = v.transfer("alice", "bob", UNIT / 2);
        assert!(matches!(
            result.unwrap_err(),
            VoucherError::MisalignedAmount { .. }
        ));
        assert_eq!(v.balance_of("alice"), 10 * UNIT);
    }

    #[test]
    fn exempt_sender_moves_any_amount() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();
        v.add_unit_exemption("owner", "alice").unwrap();
        v.transfer("alice", "bob", UNIT / 2 + 7).unwrap();
        assert_eq!(v.balance_of("bob"), UNIT / 2 + 7);
    }

    #[test]
    fn exempt_recipient_lifts_restriction_too() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();
        v.add_unit_exemption("owner", "merchant").unwrap();
        v.transfer("alice", "merchant", 123).unwrap();
        assert_eq!(v.balance_of("merchant"), 123);
    }

    #[test]
    fn exemption_list_is_owner_only() {
        let v = ledger();
        assert!(v.add_unit_exemption("mallory", "mallory").is_err());
        assert!(!v.is_unit_exempt("mallory"));
    }

    #[test]
    fn insufficient_balance_reports_numbers() {
        let v = ledger();
        v.mint("owner", "alice", UNIT).unwrap();
        let err = v.transfer("alice", "bob", 2 * UNIT).unwrap_err();
        assert!(matches!(
            err,
            VoucherError::InsufficientBalance {
                available,
                requested,
                ..
            } if available == UNIT && requested == 2 * UNIT
        ));
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();

        let err = v.transfer_from("spender", "alice", "bob", UNIT).unwrap_err();
        assert!(matches!(err, VoucherError::InsufficientAllowance { .. }));

        v.approve_voucher("alice", "spender", 3 * UNIT);
        v.transfer_from("spender", "alice", "bob", 2 * UNIT).unwrap();
        assert_eq!(v.balance_of("bob"), 2 * UNIT);
        assert_eq!(v.allowance("alice", "spender"), UNIT);
    }

    #[test]
    fn transfer_from_restores_allowance_on_failed_transfer() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();
        v.approve_voucher("alice", "spender", 10 * UNIT);

        // Misaligned pull between non-exempt endpoints fails after the
        // allowance was provisionally spent.
        let err = v.transfer_from("spender", "alice", "bob", 5).unwrap_err();
        assert!(matches!(err, VoucherError::MisalignedAmount { .. }));
        assert_eq!(v.allowance("alice", "spender"), 10 * UNIT);
        assert_eq!(v.balance_of("alice"), 10 * UNIT);
    }

    #[test]
    fn transfer_and_call_invokes_hook_with_source_identity() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();
        let hook = RecordingHook::new();

        v.transfer_voucher_and_call("alice", "engine", 3 * UNIT, &hook, b"")
            .unwrap();

        assert_eq!(v.balance_of("engine"), 3 * UNIT);
        let seen = hook.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (v.id(), "alice".to_string(), 3 * UNIT));
    }

    #[test]
    fn rejected_hook_undoes_transfer() {
        let v = ledger();
        v.mint("owner", "alice", 10 * UNIT).unwrap();

        let err = v
            .transfer_voucher_and_call("alice", "engine", 3 * UNIT, &RejectingHook, b"")
            .unwrap_err();
        assert!(matches!(err, VoucherError::SettlementRejected(_)));
        assert_eq!(v.balance_of("alice"), 10 * UNIT);
        assert_eq!(v.balance_of("engine"), 0);
    }

    #[test]
    fn self_transfer_is_a_no_op() {
        let v = ledger();
        v.mint("owner", "alice", 2 * UNIT).unwrap();
        v.transfer("alice", "alice", UNIT).unwrap();
        assert_eq!(v.balance_of("alice"), 2 * UNIT);
    }

    #[test]
    fn ledger_state_serialization_roundtrip() -> anyhow::Result<()> {
        let v = ledger();
        v.mint("owner", "alice", 5 * UNIT)?;
        v.add_unit_exemption("owner", "broker")?;

        let state = v.snapshot();
        let json = serde_json::to_string(&state)?;
        let recovered: VoucherLedger = serde_json::from_str(&json)?;
        assert_eq!(recovered.balance_of("alice"), 5 * UNIT);
        assert!(recovered.is_exempt("broker"));
        Ok(())
    }
}
