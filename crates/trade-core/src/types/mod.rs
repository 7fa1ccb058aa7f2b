//! Domain types shared across the trade hub.

pub mod pagination;
pub mod rfq;
pub mod user;

pub use pagination::Pagination;
pub use rfq::{
    NewRfq, NewRfqResponse, ResponseRevision, ResponseStatus, Rfq, RfqResponse, RfqStatus,
    RfqView,
};
pub use user::{Actor, Role, User, SUPER_ADMIN_ID};
