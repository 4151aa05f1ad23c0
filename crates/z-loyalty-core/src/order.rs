//! Order types for z-loyalty.
//!
//! An order is submitted by a user with an external order number and works
//! its way through the reconciliation lifecycle until the accrual service
//! delivers a terminal verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::UserId;

/// A loyalty order awaiting or holding an accrual verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Internal database id.
    pub id: i64,

    /// The user who submitted the order.
    pub user_id: UserId,

    /// External order number (globally unique digit string).
    pub number: String,

    /// Current reconciliation status.
    pub status: OrderStatus,

    /// Awarded points in cents. `Some` only once the order is `Processed`.
    pub accrual_cents: Option<i64>,

    /// When the order was submitted.
    pub uploaded_at: DateTime<Utc>,
}

/// Reconciliation status of an order.
///
/// `Processed` and `Invalid` are terminal: once reached, the order is never
/// settled again and its accrual never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Just submitted, not yet seen by the accrual service.
    New,

    /// Known to the accrual service, verdict pending.
    Processing,

    /// Accrual awarded; the order is terminal.
    Processed,

    /// Rejected by the accrual service; terminal, no accrual.
    Invalid,
}

impl OrderStatus {
    /// Whether this status ends the reconciliation lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }

    /// Canonical string form, as persisted in the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "PROCESSED" => Ok(Self::Processed),
            "INVALID" => Ok(Self::Invalid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized order status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// Validate an order number: non-empty digit string passing the Luhn check.
#[must_use]
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum = number.bytes().rev().enumerate().fold(0u32, |sum, (i, b)| {
        let mut digit = u32::from(b - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum + digit
    });

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Processed.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Processed,
            OrderStatus::Invalid,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("REGISTERED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn luhn_accepts_valid_numbers() {
        assert!(luhn_valid("79927398713"));
        assert!(luhn_valid("12345678903"));
        assert!(luhn_valid("4561261212345467"));
    }

    #[test]
    fn luhn_rejects_invalid_numbers() {
        assert!(!luhn_valid("79927398710"));
        assert!(!luhn_valid("12345"));
        assert!(!luhn_valid(""));
        assert!(!luhn_valid("1234abcd"));
        assert!(!luhn_valid("4561 2612"));
    }
}
