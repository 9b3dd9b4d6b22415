//! Route handlers, one module per resource.
//!
//! Handlers only extract input, call a service and shape the response;
//! validation and money movement live in `services`.

pub mod advances;
pub mod ai;
pub mod emails;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod pockets;
pub mod profiles;
pub mod recipients;
pub mod transactions;
pub mod webhooks;
