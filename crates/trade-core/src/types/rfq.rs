//! Requests for quotation and the supplier quotes placed against them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::CoreError;

/// RFQ status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RfqStatus {
    Draft,
    Submitted,
    Active,
    Closed,
    Cancelled,
}

impl RfqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfqStatus::Draft => "draft",
            RfqStatus::Submitted => "submitted",
            RfqStatus::Active => "active",
            RfqStatus::Closed => "closed",
            RfqStatus::Cancelled => "cancelled",
        }
    }

    /// Closed and cancelled RFQs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RfqStatus::Closed | RfqStatus::Cancelled)
    }

    /// Whether suppliers may quote against an RFQ in this status.
    pub fn accepts_responses(&self) -> bool {
        matches!(self, RfqStatus::Submitted | RfqStatus::Active)
    }
}

impl fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RfqStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(RfqStatus::Draft),
            "submitted" => Ok(RfqStatus::Submitted),
            "active" => Ok(RfqStatus::Active),
            "closed" => Ok(RfqStatus::Closed),
            "cancelled" => Ok(RfqStatus::Cancelled),
            other => Err(CoreError::Validation(format!("invalid RFQ status '{}'", other))),
        }
    }
}

/// Status of a supplier quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Rejected,
    Countered,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Rejected => "rejected",
            ResponseStatus::Countered => "countered",
        }
    }

    /// Pending and countered quotes are still under negotiation.
    pub fn is_open(&self) -> bool {
        matches!(self, ResponseStatus::Pending | ResponseStatus::Countered)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResponseStatus::Pending),
            "accepted" => Ok(ResponseStatus::Accepted),
            "rejected" => Ok(ResponseStatus::Rejected),
            "countered" => Ok(ResponseStatus::Countered),
            other => Err(CoreError::Validation(format!(
                "invalid response status '{}'",
                other
            ))),
        }
    }
}

/// A buyer's sourcing request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rfq {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    /// Target supplier; `None` means any supplier may quote.
    pub supplier_id: Option<Uuid>,
    pub quantity: i32,
    pub unit: String,
    pub specifications: Option<String>,
    pub requirements: Option<String>,
    pub delivery_location: Option<String>,
    pub preferred_delivery_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "50000.00")]
    pub budget: Option<Decimal>,
    pub currency: String,
    pub status: RfqStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rfq {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Status as readers should see it: an RFQ past its expiry is inactive
    /// whatever the stored status says.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status.accepts_responses() && !self.is_expired_at(now)
    }

    /// Whether the given supplier may see and quote against this RFQ.
    pub fn is_visible_to_supplier(&self, supplier_id: Uuid) -> bool {
        match self.supplier_id {
            Some(target) => target == supplier_id,
            None => true,
        }
    }
}

/// An RFQ as returned to API readers, with its expiry resolved against the
/// clock at serialization time.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RfqView {
    #[serde(flatten)]
    pub rfq: Rfq,
    /// Past `expiresAt`. An expired RFQ takes no quotes, decisions or status
    /// changes whatever its stored status.
    pub is_expired: bool,
}

impl RfqView {
    pub fn at(rfq: Rfq, now: DateTime<Utc>) -> Self {
        let is_expired = rfq.is_expired_at(now);
        Self { rfq, is_expired }
    }
}

impl From<Rfq> for RfqView {
    fn from(rfq: Rfq) -> Self {
        Self::at(rfq, Utc::now())
    }
}

/// Input for creating an RFQ.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRfq {
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub quantity: i32,
    pub unit: String,
    pub specifications: Option<String>,
    pub requirements: Option<String>,
    pub delivery_location: Option<String>,
    pub preferred_delivery_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub budget: Option<Decimal>,
    pub currency: String,
}

/// A supplier's quote against one RFQ.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RfqResponse {
    pub id: Uuid,
    pub rfq_id: Uuid,
    pub supplier_id: Uuid,
    #[schema(value_type = String, example = "185.00")]
    pub unit_price: Decimal,
    /// Always `unit_price * moq`.
    #[schema(value_type = String, example = "27750.00")]
    pub total_price: Decimal,
    pub currency: String,
    pub moq: i32,
    /// Estimated delivery in days.
    pub estimated_delivery: i32,
    pub payment_terms: Option<String>,
    pub specifications: Option<String>,
    pub message: Option<String>,
    pub status: ResponseStatus,
    pub submitted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RfqResponse {
    /// `unit_price * moq`, or `None` when the product does not fit a `Decimal`.
    pub fn compute_total(unit_price: Decimal, moq: i32) -> Option<Decimal> {
        unit_price.checked_mul(Decimal::from(moq))
    }

    /// Recompute the derived total from price and MOQ. Stored totals are
    /// never trusted on read.
    pub fn refresh_total(mut self) -> Self {
        if let Some(total) = Self::compute_total(self.unit_price, self.moq) {
            self.total_price = total;
        }
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Input for submitting a quote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRfqResponse {
    pub rfq_id: Uuid,
    #[schema(value_type = String, example = "185.00")]
    pub unit_price: Decimal,
    /// Defaults to the RFQ currency when omitted.
    pub currency: Option<String>,
    pub moq: i32,
    pub estimated_delivery: i32,
    pub payment_terms: Option<String>,
    pub specifications: Option<String>,
    pub message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Supplier-side edit of an open quote. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRevision {
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Decimal>,
    pub moq: Option<i32>,
    pub estimated_delivery: Option<i32>,
    pub payment_terms: Option<String>,
    pub specifications: Option<String>,
    pub message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
