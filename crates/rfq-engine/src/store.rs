//! Persistence for RFQs and quotes.
//!
//! Status changes are compare-and-swap on a `version` column: the caller
//! passes the version it read and the write only lands if nobody else got
//! there first. A lost race surfaces as `Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use trade_core::db::is_unique_violation;
use trade_core::{Pagination, ResponseStatus, Rfq, RfqResponse, RfqStatus};
use uuid::Uuid;

use crate::error::{RfqError, RfqResult};
use crate::materializer::{OrderMaterializer, OrderTx};

fn duplicate_open_response() -> RfqError {
    RfqError::Conflict("supplier already has an open response to this RFQ".to_string())
}

#[async_trait]
pub trait RfqStore: Send + Sync {
    async fn insert_rfq(&self, rfq: &Rfq) -> RfqResult<()>;

    async fn get_rfq(&self, id: Uuid) -> RfqResult<Option<Rfq>>;

    async fn list_rfqs_by_buyer(&self, buyer_id: Uuid, page: Pagination) -> RfqResult<Vec<Rfq>>;

    async fn list_all_rfqs(&self, page: Pagination) -> RfqResult<Vec<Rfq>>;

    /// RFQs open for quoting at `now`. With a supplier, targeted RFQs for
    /// other suppliers are left out.
    async fn list_open_rfqs(
        &self,
        supplier_id: Option<Uuid>,
        now: DateTime<Utc>,
        page: Pagination,
    ) -> RfqResult<Vec<Rfq>>;

    /// Set the status if the row is still at `expected_version`.
    async fn update_rfq_status(
        &self,
        id: Uuid,
        expected_version: i32,
        status: RfqStatus,
    ) -> RfqResult<Rfq>;

    /// Hard delete an RFQ and its responses. False when nothing was deleted.
    async fn delete_rfq(&self, id: Uuid) -> RfqResult<bool>;

    /// Insert a quote while the parent RFQ is still at `rfq_version`.
    async fn insert_response(&self, response: &RfqResponse, rfq_version: i32) -> RfqResult<()>;

    async fn get_response(&self, id: Uuid) -> RfqResult<Option<RfqResponse>>;

    /// Responses to an RFQ, optionally only those of one supplier.
    async fn list_responses(
        &self,
        rfq_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> RfqResult<Vec<RfqResponse>>;

    /// Overwrite a quote's mutable fields. `response.version` is the version
    /// the caller read; the parent RFQ must still be at `rfq_version`.
    async fn update_response(
        &self,
        response: &RfqResponse,
        rfq_version: i32,
    ) -> RfqResult<RfqResponse>;

    /// Write an accepted quote and have `materializer` create its order in
    /// the same unit of work. On any error, or if the future is dropped
    /// part way, neither the status change nor the order is kept.
    async fn accept_response(
        &self,
        response: &RfqResponse,
        rfq: &Rfq,
        materializer: &dyn OrderMaterializer,
    ) -> RfqResult<(RfqResponse, Uuid)>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// PostgreSQL-backed store.
pub struct PgRfqStore {
    pool: PgPool,
}

impl PgRfqStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RFQ_COLUMNS: &str = "id, buyer_id, product_id, product_name, product_image, supplier_id, \
    quantity, unit, specifications, requirements, delivery_location, preferred_delivery_date, \
    budget, currency, status, submitted_at, expires_at, version, created_at, updated_at";

const RESPONSE_COLUMNS: &str = "id, rfq_id, supplier_id, unit_price, total_price, currency, moq, \
    estimated_delivery, payment_terms, specifications, message, status, submitted_at, \
    expires_at, version, created_at, updated_at";

/// Database row for RFQs.
#[derive(Debug, sqlx::FromRow)]
struct RfqRow {
    id: Uuid,
    buyer_id: Uuid,
    product_id: Option<Uuid>,
    product_name: Option<String>,
    product_image: Option<String>,
    supplier_id: Option<Uuid>,
    quantity: i32,
    unit: String,
    specifications: Option<String>,
    requirements: Option<String>,
    delivery_location: Option<String>,
    preferred_delivery_date: Option<NaiveDate>,
    budget: Option<Decimal>,
    currency: String,
    status: String,
    submitted_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RfqRow {
    fn into_rfq(self) -> RfqResult<Rfq> {
        Ok(Rfq {
            id: self.id,
            buyer_id: self.buyer_id,
            product_id: self.product_id,
            product_name: self.product_name,
            product_image: self.product_image,
            supplier_id: self.supplier_id,
            quantity: self.quantity,
            unit: self.unit,
            specifications: self.specifications,
            requirements: self.requirements,
            delivery_location: self.delivery_location,
            preferred_delivery_date: self.preferred_delivery_date,
            budget: self.budget,
            currency: self.currency,
            status: self.status.parse()?,
            submitted_at: self.submitted_at,
            expires_at: self.expires_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for quotes.
#[derive(Debug, sqlx::FromRow)]
struct ResponseRow {
    id: Uuid,
    rfq_id: Uuid,
    supplier_id: Uuid,
    unit_price: Decimal,
    total_price: Decimal,
    currency: String,
    moq: i32,
    estimated_delivery: i32,
    payment_terms: Option<String>,
    specifications: Option<String>,
    message: Option<String>,
    status: String,
    submitted_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResponseRow {
    fn into_response(self) -> RfqResult<RfqResponse> {
        let response = RfqResponse {
            id: self.id,
            rfq_id: self.rfq_id,
            supplier_id: self.supplier_id,
            unit_price: self.unit_price,
            total_price: self.total_price,
            currency: self.currency,
            moq: self.moq,
            estimated_delivery: self.estimated_delivery,
            payment_terms: self.payment_terms,
            specifications: self.specifications,
            message: self.message,
            status: self.status.parse()?,
            submitted_at: self.submitted_at,
            expires_at: self.expires_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(response.refresh_total())
    }
}

fn rfqs_from_rows(rows: Vec<RfqRow>) -> RfqResult<Vec<Rfq>> {
    rows.into_iter().map(RfqRow::into_rfq).collect()
}

/// Lock the parent RFQ for the rest of the transaction and confirm it has not
/// moved since the caller read it.
async fn lock_rfq_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    rfq_id: Uuid,
    expected_version: i32,
) -> RfqResult<()> {
    let locked: Option<(i32,)> = sqlx::query_as("SELECT version FROM rfqs WHERE id = $1 FOR SHARE")
        .bind(rfq_id)
        .fetch_optional(&mut **tx)
        .await?;

    match locked {
        None => Err(RfqError::rfq_not_found()),
        Some((version,)) if version != expected_version => Err(RfqError::concurrent_update()),
        Some(_) => Ok(()),
    }
}

/// Compare-and-swap a quote's mutable fields inside `tx`.
async fn write_response(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    response: &RfqResponse,
) -> RfqResult<RfqResponse> {
    let sql = format!(
        r#"
        UPDATE rfq_responses
        SET unit_price = $3, total_price = $4, moq = $5, estimated_delivery = $6,
            payment_terms = $7, specifications = $8, message = $9, status = $10,
            expires_at = $11, version = version + 1, updated_at = NOW()
        WHERE id = $1 AND version = $2
        RETURNING {}
        "#,
        RESPONSE_COLUMNS
    );
    let row: Option<ResponseRow> = sqlx::query_as(&sql)
        .bind(response.id)
        .bind(response.version)
        .bind(response.unit_price)
        .bind(response.total_price)
        .bind(response.moq)
        .bind(response.estimated_delivery)
        .bind(&response.payment_terms)
        .bind(&response.specifications)
        .bind(&response.message)
        .bind(response.status.as_str())
        .bind(response.expires_at)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_open_response()
            } else {
                RfqError::Database(e)
            }
        })?;

    match row {
        Some(row) => row.into_response(),
        None => Err(RfqError::concurrent_update()),
    }
}

#[async_trait]
impl RfqStore for PgRfqStore {
    async fn insert_rfq(&self, rfq: &Rfq) -> RfqResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rfqs (id, buyer_id, product_id, product_name, product_image, supplier_id,
                              quantity, unit, specifications, requirements, delivery_location,
                              preferred_delivery_date, budget, currency, status, submitted_at,
                              expires_at, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(rfq.id)
        .bind(rfq.buyer_id)
        .bind(rfq.product_id)
        .bind(&rfq.product_name)
        .bind(&rfq.product_image)
        .bind(rfq.supplier_id)
        .bind(rfq.quantity)
        .bind(&rfq.unit)
        .bind(&rfq.specifications)
        .bind(&rfq.requirements)
        .bind(&rfq.delivery_location)
        .bind(rfq.preferred_delivery_date)
        .bind(rfq.budget)
        .bind(&rfq.currency)
        .bind(rfq.status.as_str())
        .bind(rfq.submitted_at)
        .bind(rfq.expires_at)
        .bind(rfq.version)
        .bind(rfq.created_at)
        .bind(rfq.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_rfq(&self, id: Uuid) -> RfqResult<Option<Rfq>> {
        let sql = format!("SELECT {} FROM rfqs WHERE id = $1", RFQ_COLUMNS);
        let row: Option<RfqRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RfqRow::into_rfq).transpose()
    }

    async fn list_rfqs_by_buyer(&self, buyer_id: Uuid, page: Pagination) -> RfqResult<Vec<Rfq>> {
        let sql = format!(
            "SELECT {} FROM rfqs WHERE buyer_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            RFQ_COLUMNS
        );
        let rows: Vec<RfqRow> = sqlx::query_as(&sql)
            .bind(buyer_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        rfqs_from_rows(rows)
    }

    async fn list_all_rfqs(&self, page: Pagination) -> RfqResult<Vec<Rfq>> {
        let sql = format!(
            "SELECT {} FROM rfqs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            RFQ_COLUMNS
        );
        let rows: Vec<RfqRow> = sqlx::query_as(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        rfqs_from_rows(rows)
    }

    async fn list_open_rfqs(
        &self,
        supplier_id: Option<Uuid>,
        now: DateTime<Utc>,
        page: Pagination,
    ) -> RfqResult<Vec<Rfq>> {
        let sql = format!(
            r#"
            SELECT {} FROM rfqs
            WHERE status IN ('submitted', 'active')
              AND (expires_at IS NULL OR expires_at > $1)
              AND ($2::uuid IS NULL OR supplier_id IS NULL OR supplier_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            RFQ_COLUMNS
        );
        let rows: Vec<RfqRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(supplier_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        rfqs_from_rows(rows)
    }

    async fn update_rfq_status(
        &self,
        id: Uuid,
        expected_version: i32,
        status: RfqStatus,
    ) -> RfqResult<Rfq> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE rfqs SET status = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 RETURNING {}",
            RFQ_COLUMNS
        );
        let row: Option<RfqRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(expected_version)
            .bind(status.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            // dropping the transaction rolls it back
            return Err(RfqError::concurrent_update());
        };

        tx.commit().await?;
        row.into_rfq()
    }

    async fn delete_rfq(&self, id: Uuid) -> RfqResult<bool> {
        // responses go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM rfqs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_response(&self, response: &RfqResponse, rfq_version: i32) -> RfqResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_rfq_version(&mut tx, response.rfq_id, rfq_version).await?;

        sqlx::query(
            r#"
            INSERT INTO rfq_responses (id, rfq_id, supplier_id, unit_price, total_price, currency,
                                       moq, estimated_delivery, payment_terms, specifications,
                                       message, status, submitted_at, expires_at, version,
                                       created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(response.id)
        .bind(response.rfq_id)
        .bind(response.supplier_id)
        .bind(response.unit_price)
        .bind(response.total_price)
        .bind(&response.currency)
        .bind(response.moq)
        .bind(response.estimated_delivery)
        .bind(&response.payment_terms)
        .bind(&response.specifications)
        .bind(&response.message)
        .bind(response.status.as_str())
        .bind(response.submitted_at)
        .bind(response.expires_at)
        .bind(response.version)
        .bind(response.created_at)
        .bind(response.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_open_response()
            } else {
                RfqError::Database(e)
            }
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> RfqResult<Option<RfqResponse>> {
        let sql = format!("SELECT {} FROM rfq_responses WHERE id = $1", RESPONSE_COLUMNS);
        let row: Option<ResponseRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ResponseRow::into_response).transpose()
    }

    async fn list_responses(
        &self,
        rfq_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> RfqResult<Vec<RfqResponse>> {
        let sql = format!(
            "SELECT {} FROM rfq_responses \
             WHERE rfq_id = $1 AND ($2::uuid IS NULL OR supplier_id = $2) \
             ORDER BY created_at DESC",
            RESPONSE_COLUMNS
        );
        let rows: Vec<ResponseRow> = sqlx::query_as(&sql)
            .bind(rfq_id)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ResponseRow::into_response).collect()
    }

    async fn update_response(
        &self,
        response: &RfqResponse,
        rfq_version: i32,
    ) -> RfqResult<RfqResponse> {
        let mut tx = self.pool.begin().await?;
        lock_rfq_version(&mut tx, response.rfq_id, rfq_version).await?;
        let saved = write_response(&mut tx, response).await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn accept_response(
        &self,
        response: &RfqResponse,
        rfq: &Rfq,
        materializer: &dyn OrderMaterializer,
    ) -> RfqResult<(RfqResponse, Uuid)> {
        let mut tx = self.pool.begin().await?;
        lock_rfq_version(&mut tx, rfq.id, rfq.version).await?;
        let accepted = write_response(&mut tx, response).await?;

        let order_id = materializer
            .materialize_order(OrderTx::Postgres(&mut *tx), rfq, &accepted)
            .await?;

        tx.commit().await?;
        Ok((accepted, order_id))
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
struct MemoryState {
    rfqs: HashMap<Uuid, Rfq>,
    responses: HashMap<Uuid, RfqResponse>,
}

/// In-memory store with the same version semantics as the SQL backend.
#[derive(Default)]
pub struct MemoryRfqStore {
    state: RwLock<MemoryState>,
}

impl MemoryRfqStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: overwrite a stored RFQ as-is.
    pub async fn put_rfq(&self, rfq: Rfq) {
        self.state.write().await.rfqs.insert(rfq.id, rfq);
    }

    /// Test hook: overwrite a stored response as-is.
    pub async fn put_response(&self, response: RfqResponse) {
        self.state
            .write()
            .await
            .responses
            .insert(response.id, response);
    }
}

fn newest_first(mut rfqs: Vec<Rfq>, page: Pagination) -> Vec<Rfq> {
    rfqs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    page.slice(&rfqs)
}

fn check_rfq_version(state: &MemoryState, rfq_id: Uuid, expected: i32) -> RfqResult<()> {
    match state.rfqs.get(&rfq_id) {
        None => Err(RfqError::rfq_not_found()),
        Some(rfq) if rfq.version != expected => Err(RfqError::concurrent_update()),
        Some(_) => Ok(()),
    }
}

fn has_other_open_response(state: &MemoryState, response: &RfqResponse) -> bool {
    response.status.is_open()
        && state.responses.values().any(|r| {
            r.id != response.id
                && r.rfq_id == response.rfq_id
                && r.supplier_id == response.supplier_id
                && r.status.is_open()
        })
}

#[async_trait]
impl RfqStore for MemoryRfqStore {
    async fn insert_rfq(&self, rfq: &Rfq) -> RfqResult<()> {
        self.state.write().await.rfqs.insert(rfq.id, rfq.clone());
        Ok(())
    }

    async fn get_rfq(&self, id: Uuid) -> RfqResult<Option<Rfq>> {
        Ok(self.state.read().await.rfqs.get(&id).cloned())
    }

    async fn list_rfqs_by_buyer(&self, buyer_id: Uuid, page: Pagination) -> RfqResult<Vec<Rfq>> {
        let state = self.state.read().await;
        let rfqs = state
            .rfqs
            .values()
            .filter(|r| r.buyer_id == buyer_id)
            .cloned()
            .collect();
        Ok(newest_first(rfqs, page))
    }

    async fn list_all_rfqs(&self, page: Pagination) -> RfqResult<Vec<Rfq>> {
        let state = self.state.read().await;
        Ok(newest_first(state.rfqs.values().cloned().collect(), page))
    }

    async fn list_open_rfqs(
        &self,
        supplier_id: Option<Uuid>,
        now: DateTime<Utc>,
        page: Pagination,
    ) -> RfqResult<Vec<Rfq>> {
        let state = self.state.read().await;
        let rfqs = state
            .rfqs
            .values()
            .filter(|r| r.is_open_at(now))
            .filter(|r| supplier_id.is_none_or(|s| r.is_visible_to_supplier(s)))
            .cloned()
            .collect();
        Ok(newest_first(rfqs, page))
    }

    async fn update_rfq_status(
        &self,
        id: Uuid,
        expected_version: i32,
        status: RfqStatus,
    ) -> RfqResult<Rfq> {
        let mut state = self.state.write().await;
        let rfq = state.rfqs.get_mut(&id).ok_or_else(RfqError::rfq_not_found)?;
        if rfq.version != expected_version {
            return Err(RfqError::concurrent_update());
        }

        rfq.status = status;
        rfq.version += 1;
        rfq.updated_at = Utc::now();
        Ok(rfq.clone())
    }

    async fn delete_rfq(&self, id: Uuid) -> RfqResult<bool> {
        let mut state = self.state.write().await;
        let removed = state.rfqs.remove(&id).is_some();
        if removed {
            state.responses.retain(|_, r| r.rfq_id != id);
        }
        Ok(removed)
    }

    async fn insert_response(&self, response: &RfqResponse, rfq_version: i32) -> RfqResult<()> {
        let mut state = self.state.write().await;
        check_rfq_version(&state, response.rfq_id, rfq_version)?;
        if has_other_open_response(&state, response) {
            return Err(duplicate_open_response());
        }

        state.responses.insert(response.id, response.clone());
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> RfqResult<Option<RfqResponse>> {
        Ok(self
            .state
            .read()
            .await
            .responses
            .get(&id)
            .cloned()
            .map(RfqResponse::refresh_total))
    }

    async fn list_responses(
        &self,
        rfq_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> RfqResult<Vec<RfqResponse>> {
        let state = self.state.read().await;
        let mut responses: Vec<RfqResponse> = state
            .responses
            .values()
            .filter(|r| r.rfq_id == rfq_id)
            .filter(|r| supplier_id.is_none_or(|s| r.supplier_id == s))
            .cloned()
            .map(RfqResponse::refresh_total)
            .collect();
        responses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(responses)
    }

    async fn update_response(
        &self,
        response: &RfqResponse,
        rfq_version: i32,
    ) -> RfqResult<RfqResponse> {
        let mut state = self.state.write().await;
        check_rfq_version(&state, response.rfq_id, rfq_version)?;
        if has_other_open_response(&state, response) {
            return Err(duplicate_open_response());
        }

        let stored = state
            .responses
            .get_mut(&response.id)
            .ok_or_else(RfqError::response_not_found)?;
        if stored.version != response.version {
            return Err(RfqError::concurrent_update());
        }

        *stored = RfqResponse {
            version: stored.version + 1,
            updated_at: Utc::now(),
            ..response.clone()
        }
        .refresh_total();
        Ok(stored.clone())
    }

    async fn accept_response(
        &self,
        response: &RfqResponse,
        rfq: &Rfq,
        materializer: &dyn OrderMaterializer,
    ) -> RfqResult<(RfqResponse, Uuid)> {
        let mut state = self.state.write().await;
        check_rfq_version(&state, rfq.id, rfq.version)?;

        let stored = state
            .responses
            .get(&response.id)
            .ok_or_else(RfqError::response_not_found)?;
        if stored.version != response.version {
            return Err(RfqError::concurrent_update());
        }
        let accepted = RfqResponse {
            version: stored.version + 1,
            updated_at: Utc::now(),
            ..response.clone()
        }
        .refresh_total();

        // nothing is written until the order exists
        let order_id = materializer
            .materialize_order(OrderTx::Memory, rfq, &accepted)
            .await?;
        state.responses.insert(accepted.id, accepted.clone());
        Ok((accepted, order_id))
    }
}
