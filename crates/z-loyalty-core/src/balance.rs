//! Balance types for z-loyalty.
//!
//! Each user owns exactly one balance row. Settlement credits it, the
//! withdrawal path debits it; both sides must go through the store's atomic
//! update operations so concurrent credit and debit never lose updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's spendable and spent loyalty points, in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Currently spendable points.
    pub current_cents: i64,

    /// Cumulative points withdrawn over the account lifetime.
    pub withdrawn_cents: i64,
}

impl Balance {
    /// Check whether the balance covers a requested debit.
    #[must_use]
    pub const fn can_cover(self, amount_cents: i64) -> bool {
        self.current_cents >= amount_cents
    }
}

/// One entry in a user's withdrawal history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// The order the points were spent against.
    pub order_number: String,

    /// Debited amount in cents.
    pub sum_cents: i64,

    /// When the withdrawal was applied.
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_covers_exact_amount() {
        let balance = Balance {
            current_cents: 500,
            withdrawn_cents: 0,
        };
        assert!(balance.can_cover(500));
        assert!(balance.can_cover(0));
        assert!(!balance.can_cover(501));
    }

    #[test]
    fn default_balance_is_empty() {
        let balance = Balance::default();
        assert_eq!(balance.current_cents, 0);
        assert_eq!(balance.withdrawn_cents, 0);
    }
}
