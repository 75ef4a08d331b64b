//! Ticket ledger types.
//!
//! The ledger is the single bookkeeping record for a user's tickets. It is
//! mutated only through the reserve/commit/release/grant operations of the
//! store layer, each of which is a single atomic row update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user's ticket ledger (one row per user).
///
/// Invariants maintained by the store layer:
///
/// - `balance >= 0` and `reserved >= 0` at all times
/// - `reserved <= balance` after every successful reservation
/// - `total_used` only ever grows, and only via commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLedger {
    /// The owning user.
    pub user_id: UserId,

    /// Total tickets owned.
    pub balance: i64,

    /// Tickets currently held against in-flight generations.
    pub reserved: i64,

    /// Lifetime tickets consumed (audit trail only).
    pub total_used: i64,

    /// When the ledger was created.
    pub created_at: DateTime<Utc>,

    /// When the ledger was last updated.
    pub updated_at: DateTime<Utc>,
}

impl TicketLedger {
    /// Create a new ledger with zero balance.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: 0,
            reserved: 0,
            total_used: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Tickets available for new reservations.
    #[must_use]
    pub const fn available(&self) -> i64 {
        self.balance - self.reserved
    }

    /// Check whether a reservation of `amount` tickets would fit.
    #[must_use]
    pub const fn has_headroom(&self, amount: i64) -> bool {
        self.available() >= amount
    }

    /// Snapshot the balance figures for API responses.
    #[must_use]
    pub const fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            balance: self.balance,
            reserved: self.reserved,
            available: self.available(),
        }
    }
}

/// A point-in-time view of a ledger's balance figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Total tickets owned.
    pub balance: i64,
    /// Tickets held by in-flight generations.
    pub reserved: i64,
    /// Tickets available for new reservations (`balance - reserved`).
    pub available: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ledger_is_empty() {
        let ledger = TicketLedger::new(UserId::generate());
        assert_eq!(ledger.balance, 0);
        assert_eq!(ledger.reserved, 0);
        assert_eq!(ledger.total_used, 0);
        assert_eq!(ledger.available(), 0);
    }

    #[test]
    fn available_subtracts_reserved() {
        let mut ledger = TicketLedger::new(UserId::generate());
        ledger.balance = 10;
        ledger.reserved = 4;

        assert_eq!(ledger.available(), 6);
        assert!(ledger.has_headroom(6));
        assert!(!ledger.has_headroom(7));
    }

    #[test]
    fn snapshot_reports_all_figures() {
        let mut ledger = TicketLedger::new(UserId::generate());
        ledger.balance = 12;
        ledger.reserved = 5;

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.balance, 12);
        assert_eq!(snapshot.reserved, 5);
        assert_eq!(snapshot.available, 7);
    }
}
