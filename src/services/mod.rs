//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and vendor calls.

pub mod advance_service;
pub mod ledger_service;
pub mod notification_service;
pub mod payments_service;
pub mod pocket_service;
pub mod profile_service;
pub mod recipient_service;
pub mod risk;
pub mod statement_service;
pub mod webhook_service;

#[cfg(test)]
mod integration_tests;
