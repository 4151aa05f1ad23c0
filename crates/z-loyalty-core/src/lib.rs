//! Core types for the z-loyalty points ledger.
//!
//! This crate provides the foundational types used throughout the z-loyalty
//! platform:
//!
//! - **Identifiers**: `UserId`
//! - **Orders**: `Order`, `OrderStatus`, order-number validation
//! - **Balances**: `Balance`, `Withdrawal`
//!
//! # Points Unit
//!
//! **1 point = 1 minor currency unit (1 cent)**
//!
//! The external accrual service reports point awards as decimal numbers
//! (e.g. `5.5`); they are converted to integer cents at the wire boundary
//! and stored as `i64` everywhere else to avoid floating point precision
//! issues.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod ids;
pub mod order;

pub use balance::{Balance, Withdrawal};
pub use ids::UserId;
pub use order::{luhn_valid, Order, OrderStatus, UnknownStatus};
