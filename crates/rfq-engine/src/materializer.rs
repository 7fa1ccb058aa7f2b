//! Hand-off from an accepted quote to an order.
//!
//! The engine never owns order data; it only asks a materializer to create
//! one and keeps the returned ID. The store calls the materializer from
//! inside the unit of work that flips the quote to `accepted`, so the order
//! and the acceptance commit together or not at all.

use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use trade_core::db::is_unique_violation;
use trade_core::{Rfq, RfqResponse};
use uuid::Uuid;

use crate::error::{RfqError, RfqResult};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// The unit of work an order is written in.
pub enum OrderTx<'a> {
    /// Open transaction holding the quote's status change.
    Postgres(&'a mut PgConnection),
    /// In-memory store; the caller holds its write lock for the duration.
    Memory,
}

#[async_trait]
pub trait OrderMaterializer: Send + Sync {
    /// Create an order for an accepted quote and return its ID. Errors roll
    /// back the acceptance.
    async fn materialize_order(
        &self,
        tx: OrderTx<'_>,
        rfq: &Rfq,
        response: &RfqResponse,
    ) -> RfqResult<Uuid>;
}

/// `ORD-<year>-<6 digits>`.
pub fn generate_order_number() -> String {
    let suffix: u32 = rand::rng().random_range(0..1_000_000);
    format!("ORD-{}-{:06}", Utc::now().year(), suffix)
}

/// Writes orders into the `orders` table, inside the acceptance transaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgOrderMaterializer;

impl PgOrderMaterializer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderMaterializer for PgOrderMaterializer {
    async fn materialize_order(
        &self,
        tx: OrderTx<'_>,
        rfq: &Rfq,
        response: &RfqResponse,
    ) -> RfqResult<Uuid> {
        let OrderTx::Postgres(conn) = tx else {
            return Err(RfqError::Internal(
                "postgres order materializer needs a postgres transaction".to_string(),
            ));
        };
        let estimated_delivery = Utc::now() + Duration::days(i64::from(response.estimated_delivery));

        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let order_number = generate_order_number();

            // a failed statement would abort the surrounding transaction, so
            // number collisions are skipped rather than raised
            let inserted: Option<(Uuid,)> = sqlx::query_as(
                r#"
                INSERT INTO orders (id, order_number, rfq_id, rfq_response_id, buyer_id, supplier_id,
                                    product_id, quantity, unit_price, total_amount, currency,
                                    status, payment_status, shipping_address, estimated_delivery)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', 'pending', $12, $13)
                ON CONFLICT (order_number) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&order_number)
            .bind(rfq.id)
            .bind(response.id)
            .bind(rfq.buyer_id)
            .bind(response.supplier_id)
            .bind(rfq.product_id)
            .bind(response.moq)
            .bind(response.unit_price)
            .bind(response.total_price)
            .bind(&response.currency)
            .bind(&rfq.delivery_location)
            .bind(estimated_delivery)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RfqError::Conflict("an order already exists for this response".to_string())
                } else {
                    RfqError::Database(e)
                }
            })?;

            match inserted {
                Some((order_id,)) => {
                    tracing::info!(
                        order_id = %order_id,
                        order_number = %order_number,
                        rfq_response_id = %response.id,
                        "Order materialized"
                    );
                    return Ok(order_id);
                }
                None => tracing::warn!(attempt, "Order number collision, retrying"),
            }
        }

        Err(RfqError::Internal(
            "could not allocate a unique order number".to_string(),
        ))
    }
}

/// An order captured by [`MemoryOrderMaterializer`].
#[derive(Debug, Clone)]
pub struct MaterializedOrder {
    pub id: Uuid,
    pub order_number: String,
    pub rfq_id: Uuid,
    pub rfq_response_id: Uuid,
    pub buyer_id: Uuid,
    pub supplier_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
}

/// Records orders in memory. Can be switched to fail for exercising the
/// rollback path.
#[derive(Default)]
pub struct MemoryOrderMaterializer {
    orders: RwLock<Vec<MaterializedOrder>>,
    fail: AtomicBool,
}

impl MemoryOrderMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn orders(&self) -> Vec<MaterializedOrder> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl OrderMaterializer for MemoryOrderMaterializer {
    async fn materialize_order(
        &self,
        _tx: OrderTx<'_>,
        rfq: &Rfq,
        response: &RfqResponse,
    ) -> RfqResult<Uuid> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RfqError::Internal("order service unavailable".to_string()));
        }

        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.rfq_response_id == response.id) {
            return Err(RfqError::Conflict(
                "an order already exists for this response".to_string(),
            ));
        }

        let order = MaterializedOrder {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            rfq_id: rfq.id,
            rfq_response_id: response.id,
            buyer_id: rfq.buyer_id,
            supplier_id: response.supplier_id,
            quantity: response.moq,
            unit_price: response.unit_price,
            total_amount: response.total_price,
            currency: response.currency.clone(),
        };
        let id = order.id;
        orders.push(order);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], Utc::now().year().to_string());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }
}
