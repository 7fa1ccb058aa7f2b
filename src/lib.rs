//! Global Trade Hub: B2B marketplace backend
//!
//! This is the root crate that ties the workspace together for cross-crate tests.
//! For actual functionality, use the individual crates directly:
//!
//! - `trade-core`: Domain types, configuration, database pool, user directory
//! - `auth`: Password hashing, token pairs, super admin, RBAC, audit logging
//! - `rfq-engine`: RFQ and quote lifecycle, order hand-off
//! - `api-server`: REST API server

pub use api_server as api;
pub use auth as security;
pub use rfq_engine as rfq;
pub use trade_core as core;
