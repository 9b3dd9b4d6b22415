//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies of the endpoints that touch them.

pub mod advance;
pub mod notification;
pub mod payout_method;
pub mod pocket;
/// Profile, access token and balance models
pub mod profile;
pub mod recipient;
/// Ledger entry model
pub mod transaction;
/// Inbound payment processor events
pub mod webhook;
