//! # VEX Core Components
//!
//! The two components that carry all the non-trivial arithmetic and
//! invariant-preservation logic of the protocol:
//!
//! - **Swap Engine** — the sole authorized minter/burner counterpart
//!   driving 1:1 conversions between the value ledger and the pegged
//!   ledger, and the owner of the fee configuration.
//! - **Exchange Aggregator** — orchestrates multi-source funding through
//!   the engine and blends in a recipient-designated pre-existing voucher
//!   balance to deliver an exact target amount to a third party in one
//!   atomic operation.
//!
//! ## Design Principles
//!
//! 1. Every settlement hook validates the invoking ledger's identity —
//!    call order is never trusted.
//! 2. Every multi-step operation either applies completely or restores
//!    the captured ledger checkpoint. There is no partial success.
//! 3. All monetary operations are overflow-checked; fee products widen to
//!    `u128` inside `vex_protocol::units`.
//! 4. Every state change that moves value is recorded in a settlement
//!    event log for off-chain auditing.

pub mod aggregator;
pub mod swap_engine;

pub use aggregator::{AggregatorError, ExchangeAggregator, FundingPlan};
pub use swap_engine::{EngineHandle, EngineError};
