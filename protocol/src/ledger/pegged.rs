//! # Pegged Ledger
//!
//! The freely transferable balance minted and burned 1:1 (minus fee)
//! against the value ledger. Unlike the voucher side there is no
//! granularity rule — pegged units move in any amount.
//!
//! Supply control is the interesting part: the ledger has **at most one
//! authorized minter**, modeled as an option that transitions from empty
//! to set exactly once. A second `set_minter` fails no matter who asks.
//! Burns are holder-initiated: an account burns only its own balance,
//! there is no admin burn.
//!
//! Display metadata (name/symbol) is owner-mutable; `decimals` is fixed at
//! construction and, like everywhere else in VEX, is rendering-only.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hook::PeggedSettlementHook;
use super::{Address, LedgerId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during pegged-ledger operations.
#[derive(Debug, Error)]
pub enum PeggedError {
    /// The caller is not the ledger owner.
    #[error("unauthorized: {caller} is not the pegged ledger owner")]
    NotOwner {
        /// The rejected caller.
        caller: String,
    },

    /// A minter has already been configured; the field is settable once.
    #[error("minter already set")]
    MinterAlreadySet,

    /// The caller is not the configured minter (or no minter is set).
    #[error("unauthorized mint: {caller} is not the configured minter")]
    NotMinter {
        /// The rejected caller.
        caller: String,
    },

    /// The debited account does not hold enough pegged units.
    #[error("insufficient pegged balance: {account} has {available}, requested {requested}")]
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
        "insufficient pegged allowance: {spender} may spend {allowance} of {owner}'s balance, requested {requested}"
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
    #[error("pegged balance overflow crediting {amount} to {account}")]
    BalanceOverflow {
        /// The account being credited.
        account: String,
        /// The amount that caused the overflow.
        amount: u64,
    },

    /// A mint would overflow the total supply.
    #[error("pegged supply overflow: minting {amount} would exceed u64::MAX")]
    SupplyOverflow {
        /// The amount that was attempted.
        amount: u64,
    },

    /// A burn exceeded the recorded total supply. Every balance is part of
    /// the supply, so this cannot happen through the public operations; it
    /// exists so the supply arithmetic stays checked like every other
    /// monetary operation.
    #[error("pegged supply underflow: burning {amount} exceeds the recorded supply")]
    SupplyUnderflow {
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

/// In-memory state of the pegged ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeggedLedger {
    id: LedgerId,
    owner: Address,
    name: String,
    symbol: String,
    decimals: u8,
    /// Settable once: `None -> Some(minter)` is the only permitted write.
    minter: Option<Address>,
    total_supply: u64,
    balances: HashMap<Address, u64>,
    allowances: HashMap<Address, HashMap<Address, u64>>,
}

impl PeggedLedger {
    fn balance_of(&self, account: &str) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn require_owner(&self, caller: &str) -> Result<(), PeggedError> {
        if caller != self.owner {
            return Err(PeggedError::NotOwner {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    fn move_balance(&mut self, from: &str, to: &str, amount: u64) -> Result<(), PeggedError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(PeggedError::InsufficientBalance {
                account: from.to_string(),
                available: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(PeggedError::BalanceOverflow {
                account: to.to_string(),
                amount,
            })?;
        self.balances.insert(from.to_string(), from_balance - amount);
        self.balances.insert(to.to_string(), credited);
        Ok(())
    }

    fn spend_allowance(
        &mut self,
        owner: &str,
        spender: &str,
        amount: u64,
    ) -> Result<(), PeggedError> {
        let allowance = self
            .allowances
            .get(owner)
            .and_then(|per_spender| per_spender.get(spender))
            .copied()
            .unwrap_or(0);
        if allowance < amount {
            return Err(PeggedError::InsufficientAllowance {
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

/// Shared handle to a pegged-ledger instance. Clones share state.
#[derive(Clone)]
pub struct PeggedHandle {
    inner: Arc<RwLock<PeggedLedger>>,
    id: LedgerId,
}

impl PeggedHandle {
    /// Creates a fresh pegged ledger with no minter configured.
    pub fn new(owner: &str, name: &str, symbol: &str, decimals: u8) -> Self {
        let state = PeggedLedger {
            id: LedgerId::new(),
            owner: owner.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            minter: None,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        };
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

    /// Display name.
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> String {
        self.inner.read().symbol.clone()
    }

    /// Display decimals. Rendering only.
    pub fn decimals(&self) -> u8 {
        self.inner.read().decimals
    }

    /// The configured minter, if one has been set.
    pub fn minter(&self) -> Option<Address> {
        self.inner.read().minter.clone()
    }

    /// Balance of `account`.
    pub fn balance_of(&self, account: &str) -> u64 {
        self.inner.read().balance_of(account)
    }

    /// Total pegged supply.
    pub fn total_supply(&self) -> u64 {
        self.inner.read().total_supply
    }

    /// Configures the sole authorized minter. Succeeds exactly once.
    pub fn set_minter(&self, minter: &str) -> Result<(), PeggedError> {
        let mut ledger = self.inner.write();
        if ledger.minter.is_some() {
            return Err(PeggedError::MinterAlreadySet);
        }
        ledger.minter = Some(minter.to_string());
        Ok(())
    }

    /// Updates display name and symbol. Owner-only.
    pub fn set_metadata(&self, caller: &str, name: &str, symbol: &str) -> Result<(), PeggedError> {
        let mut ledger = self.inner.write();
        ledger.require_owner(caller)?;
        ledger.name = name.to_string();
        ledger.symbol = symbol.to_string();
        Ok(())
    }

    /// Mints `amount` to `to`. The caller must be the configured minter.
    pub fn mint(&self, caller: &str, to: &str, amount: u64) -> Result<(), PeggedError> {
        let mut ledger = self.inner.write();
        if ledger.minter.as_deref() != Some(caller) {
            return Err(PeggedError::NotMinter {
                caller: caller.to_string(),
            });
        }
        let supply = ledger
            .total_supply
            .checked_add(amount)
            .ok_or(PeggedError::SupplyOverflow { amount })?;
        let credited = ledger
            .balance_of(to)
            .checked_add(amount)
            .ok_or(PeggedError::BalanceOverflow {
                account: to.to_string(),
                amount,
            })?;
        ledger.total_supply = supply;
        ledger.balances.insert(to.to_string(), credited);
        Ok(())
    }

    /// Burns `amount` from the caller's own balance.
    pub fn burn(&self, caller: &str, amount: u64) -> Result<(), PeggedError> {
        let mut ledger = self.inner.write();
        let balance = ledger.balance_of(caller);
        if balance < amount {
            return Err(PeggedError::InsufficientBalance {
                account: caller.to_string(),
                available: balance,
                requested: amount,
            });
        }
        let supply = ledger
            .total_supply
            .checked_sub(amount)
            .ok_or(PeggedError::SupplyUnderflow { amount })?;
        ledger.balances.insert(caller.to_string(), balance - amount);
        ledger.total_supply = supply;
        Ok(())
    }

    /// Direct transfer. No granularity rule on this side.
    pub fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<(), PeggedError> {
        self.inner.write().move_balance(from, to, amount)
    }

    /// Authorizes `spender` to pull up to `amount` from `owner`'s balance.
    pub fn approve(&self, owner: &str, spender: &str, amount: u64) {
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
    pub fn transfer_from(
        &self,
        caller: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), PeggedError> {
        let mut ledger = self.inner.write();
        ledger.spend_allowance(from, caller, amount)?;
        if let Err(e) = ledger.move_balance(from, to, amount) {
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

    /// The transfer-with-callback settlement primitive, pegged side.
    ///
    /// Applies the transfer, then invokes `hook.on_pegged_received` with
    /// this ledger's identity; a rejecting hook undoes the transfer. The
    /// lock is released before the hook runs.
    pub fn transfer_and_call(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        hook: &dyn PeggedSettlementHook,
        data: &[u8],
    ) -> Result<(), PeggedError> {
        self.inner.write().move_balance(from, to, amount)?;
        if let Err(rejection) = hook.on_pegged_received(self.id, from, amount, data) {
            if self.inner.write().move_balance(to, from, amount).is_err() {
                tracing::error!(
                    target: "vex::ledger",
                    from, to, amount,
                    "could not undo pegged transfer leg after hook rejection"
                );
            }
            return Err(PeggedError::SettlementRejected(rejection.to_string()));
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> PeggedLedger {
        self.inner.read().clone()
    }

    pub(crate) fn restore(&self, state: PeggedLedger) {
        *self.inner.write() = state;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
