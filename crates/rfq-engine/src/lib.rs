//! RFQ Negotiation Engine
//!
//! Requests for quotation, supplier quotes, their status machines and the
//! hand-off of accepted quotes to order creation.

pub mod error;
pub mod lifecycle;
pub mod materializer;
pub mod service;
pub mod store;
pub mod validation;

pub use error::{RfqError, RfqResult};
pub use materializer::{
    MaterializedOrder, MemoryOrderMaterializer, OrderMaterializer, OrderTx, PgOrderMaterializer,
};
pub use service::{ResponseDecision, RfqService};
pub use store::{MemoryRfqStore, PgRfqStore, RfqStore};
