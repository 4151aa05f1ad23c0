//! Wire types for the accrual service and their classification.

use std::time::Duration;

use serde::Deserialize;

use z_loyalty_core::OrderStatus;

/// Outcome of one accrual lookup, folded into order and balance state by the
/// settlement logic. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The order is registered but the service has not decided yet.
    Pending,

    /// Final verdict: a terminal status and the awarded points in cents.
    Decided {
        /// `Processed` or `Invalid`.
        status: OrderStatus,
        /// Awarded points in cents; zero for `Invalid`.
        accrual_cents: i64,
    },

    /// The service has no record of the order. Not an error.
    Unknown,

    /// The service asked for a slowdown. The caller should pause the whole
    /// reconciliation pool rather than retry this one lookup.
    RateLimited {
        /// Parsed `Retry-After` duration, when the service sent one.
        retry_after: Option<Duration>,
    },
}

/// Response body of `GET /api/orders/<number>`.
#[derive(Debug, Deserialize)]
pub(crate) struct AccrualReply {
    #[allow(dead_code)]
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Option<f64>,
}

/// Status vocabulary of the accrual service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualReply {
    /// Map the service's vocabulary onto the local taxonomy.
    pub(crate) fn into_verdict(self) -> Verdict {
        match self.status {
            AccrualStatus::Registered | AccrualStatus::Processing => Verdict::Pending,
            AccrualStatus::Invalid => Verdict::Decided {
                status: OrderStatus::Invalid,
                accrual_cents: 0,
            },
            AccrualStatus::Processed => Verdict::Decided {
                status: OrderStatus::Processed,
                accrual_cents: points_to_cents(self.accrual.unwrap_or(0.0)),
            },
        }
    }
}

/// Convert the service's decimal point amount to integer cents.
pub(crate) fn points_to_cents(points: f64) -> i64 {
    (points * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_convert_to_cents() {
        assert_eq!(points_to_cents(5.5), 550);
        assert_eq!(points_to_cents(0.0), 0);
        assert_eq!(points_to_cents(729.98), 72_998);
        assert_eq!(points_to_cents(0.004), 0);
    }

    #[test]
    fn processed_reply_becomes_decided() {
        let reply: AccrualReply =
            serde_json::from_str(r#"{"order":"12345","status":"PROCESSED","accrual":5.5}"#)
                .unwrap();
        assert_eq!(
            reply.into_verdict(),
            Verdict::Decided {
                status: OrderStatus::Processed,
                accrual_cents: 550,
            }
        );
    }

    #[test]
    fn processed_reply_without_accrual_awards_nothing() {
        let reply: AccrualReply =
            serde_json::from_str(r#"{"order":"12345","status":"PROCESSED"}"#).unwrap();
        assert_eq!(
            reply.into_verdict(),
            Verdict::Decided {
                status: OrderStatus::Processed,
                accrual_cents: 0,
            }
        );
    }

    #[test]
    fn invalid_reply_becomes_terminal_with_zero_accrual() {
        let reply: AccrualReply =
            serde_json::from_str(r#"{"order":"12345","status":"INVALID"}"#).unwrap();
        assert_eq!(
            reply.into_verdict(),
            Verdict::Decided {
                status: OrderStatus::Invalid,
                accrual_cents: 0,
            }
        );
    }

    #[test]
    fn undecided_replies_stay_pending() {
        for status in ["REGISTERED", "PROCESSING"] {
            let body = format!(r#"{{"order":"12345","status":"{status}"}}"#);
            let reply: AccrualReply = serde_json::from_str(&body).unwrap();
            assert_eq!(reply.into_verdict(), Verdict::Pending);
        }
    }
}
