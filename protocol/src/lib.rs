// Copyright (c) 2026 VEX Contributors. MIT License.
// See LICENSE for details.

//! # VEX Protocol — Core Library
//!
//! VEX is a two-asset value-exchange protocol: a restricted-transfer
//! "voucher" balance converts, 1:1 minus an optional fee, into a freely
//! transferable pegged balance and back. There is no price discovery
//! anywhere in this crate — the rate is pegged before fees, full stop.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! settlement system:
//!
//! - **ledger** — The two asset ledgers (voucher and pegged), their
//!   transfer-with-callback primitive, and checkpoint/rollback support.
//! - **units** — Alignment and deposit-inclusive fee arithmetic. All the
//!   integer math that can lose money lives here, tested to death.
//! - **events** — The observable settlement record: every mint, burn,
//!   fee collection, and exchange leaves a timestamped trace.
//! - **config** — Protocol constants. If you're hardcoding a number
//!   somewhere else, you're doing it wrong.
//!
//! ## Design Philosophy
//!
//! 1. All amounts are `u64` in smallest-unit denomination. No floats,
//!    no decimals in arithmetic — `decimals` is display metadata only.
//! 2. Every balance mutation is overflow-checked. Wrapping arithmetic
//!    and money do not mix.
//! 3. Settlement hooks never trust call order: every hook invocation
//!    carries the invoking ledger's identity and the target validates it.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod events;
pub mod ledger;
pub mod units;

pub use events::{EventLog, SettlementEvent};
pub use ledger::checkpoint::StateCheckpoint;
pub use ledger::hook::{HookError, PeggedSettlementHook, VoucherSettlementHook};
pub use ledger::pegged::{PeggedError, PeggedHandle};
pub use ledger::voucher::{VoucherError, VoucherHandle};
pub use ledger::{Address, LedgerId};
