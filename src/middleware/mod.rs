//! Request middleware.
//!
//! Only bearer authentication lives here; request tracing comes from
//! `tower-http` in the router.

pub mod auth;
