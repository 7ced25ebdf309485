//! # Settlement Events
//!
//! Every state change that moves value leaves an observable record: minted,
//! burned, fee-collected, and exchanged amounts, for off-chain auditing and
//! reconciliation. Events are timestamped, kept in an append-only log, and
//! mirrored to `tracing` so an operator can follow a settlement live.
//!
//! The log supports truncation back to a watermark — when a multi-step
//! settlement reverts, its events are rolled back with it so the record
//! never describes a state change that didn't survive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An observable settlement-layer state change.
///
/// Serialized with an internal `type` tag so downstream consumers can
/// route on the event kind without probing field names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// Voucher balance arrived in engine custody via the deposit path.
    VoucherDeposited {
        /// The depositor credited with pegged balance.
        from: String,
        /// Amount deposited, in smallest voucher units.
        amount: u64,
    },

    /// Pegged balance minted 1:1 against a voucher deposit.
    PeggedMinted {
        /// The account credited.
        to: String,
        /// Amount minted.
        amount: u64,
    },

    /// Pegged balance redeemed for vouchers.
    VoucherRedeemed {
        /// The redeemer, credited with `net` vouchers.
        to: String,
        /// Gross pegged amount surrendered.
        gross: u64,
        /// Net voucher amount released.
        net: u64,
        /// Fee withheld in pegged units.
        fee: u64,
    },

    /// Pegged balance burned during redemption (the net portion only —
    /// the fee portion is transferred, never burned).
    PeggedBurned {
        /// The custody account the burn was taken from.
        from: String,
        /// Amount burned.
        amount: u64,
    },

    /// Redemption fee credited to the fee receiver.
    FeeCollected {
        /// The configured fee receiver.
        receiver: String,
        /// Fee amount in pegged units.
        amount: u64,
    },

    /// The redemption fee numerator changed.
    FeeUpdated {
        /// Numerator before the update.
        previous: u64,
        /// Numerator after the update.
        current: u64,
    },

    /// A multi-source exchange delivered vouchers to a third party.
    Exchanged {
        /// The funding caller.
        caller: String,
        /// The final voucher recipient.
        recipient: String,
        /// Total voucher amount delivered.
        target: u64,
        /// Portion freshly obtained through the swap engine.
        swap_sourced: u64,
        /// Portion drawn from the caller's pre-existing voucher balance.
        pre_existing_used: u64,
        /// Opaque reconciliation tag, carried through unmodified.
        correlation_id: String,
    },
}

/// A timestamped entry in the settlement log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventEntry {
    /// When the event was recorded.
    pub at: DateTime<Utc>,
    /// The event itself.
    pub event: SettlementEvent,
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Append-only settlement record with rollback-to-watermark support.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<EventEntry>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and mirrors it to `tracing`.
    pub fn record(&mut self, event: SettlementEvent) {
        tracing::info!(target: "vex::settlement", event = ?event, "settlement event");
        self.entries.push(EventEntry {
            at: Utc::now(),
            event,
        });
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the recorded entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EventEntry> {
        self.entries.iter()
    }

    /// Returns the recorded events without timestamps, oldest first.
    pub fn events(&self) -> Vec<SettlementEvent> {
        self.entries.iter().map(|e| e.event.clone()).collect()
    }

    /// Discards every entry recorded after the given watermark.
    ///
    /// Used when a multi-step settlement reverts: the caller remembers
    /// `len()` at entry and truncates back to it on failure.
    pub fn truncate(&mut self, watermark: usize) {
        self.entries.truncate(watermark);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_in_order() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.record(SettlementEvent::PeggedMinted {
            to: "alice".into(),
            amount: 100,
        });
        log.record(SettlementEvent::PeggedBurned {
            from: "engine".into(),
            amount: 40,
        });

        assert_eq!(log.len(), 2);
        let events = log.events();
        assert!(matches!(events[0], SettlementEvent::PeggedMinted { .. }));
        assert!(matches!(events[1], SettlementEvent::PeggedBurned { .. }));
    }

    #[test]
    fn truncate_rolls_back_to_watermark() {
        let mut log = EventLog::new();
        log.record(SettlementEvent::FeeUpdated {
            previous: 0,
            current: 10,
        });
        let watermark = log.len();

        log.record(SettlementEvent::FeeCollected {
            receiver: "treasury".into(),
            amount: 5,
        });
        log.record(SettlementEvent::PeggedBurned {
            from: "engine".into(),
            amount: 1,
        });
        assert_eq!(log.len(), 3);

        log.truncate(watermark);
        assert_eq!(log.len(), 1);
        assert!(matches!(
            log.events()[0],
            SettlementEvent::FeeUpdated { .. }
        ));
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = SettlementEvent::Exchanged {
            caller: "alice".into(),
            recipient: "bob".into(),
            target: 30_000_000_000,
            swap_sourced: 20_000_000_000,
            pre_existing_used: 10_000_000_000,
            correlation_id: "order-42".into(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let recovered: SettlementEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, recovered);
    }
}
