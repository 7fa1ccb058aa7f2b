//! HTTP request handlers.

pub mod admin;
pub mod auth;
pub mod health;
pub mod rfqs;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use trade_core::{Pagination, Rfq, RfqView};
use utoipa::{IntoParams, ToSchema};

/// Pagination query parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page size, 1..=100 (default 20).
    pub limit: Option<i64>,
    /// Rows to skip (default 0).
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

/// A page of results.
#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: Pagination) -> Self {
        Self {
            items,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

/// Resolve expiry for a batch of RFQs against one clock reading.
pub fn rfq_views(rfqs: Vec<Rfq>) -> Vec<RfqView> {
    let now = Utc::now();
    rfqs.into_iter().map(|rfq| RfqView::at(rfq, now)).collect()
}
