//! Trade Hub Core Library
//!
//! Shared domain types, configuration, database access and the account
//! directory used by the authentication and RFQ crates.

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod types;

pub use directory::{MemoryUserDirectory, NewUser, PgUserDirectory, UserDirectory};
pub use error::{CoreError, Result};
pub use types::{
    Actor, NewRfq, NewRfqResponse, Pagination, ResponseRevision, ResponseStatus, Rfq,
    RfqResponse, RfqStatus, RfqView, Role, User, SUPER_ADMIN_ID,
};
