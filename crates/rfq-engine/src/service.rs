//! RFQ lifecycle manager.
//!
//! Every operation takes the acting identity. Role gating goes through the
//! shared allow-list; ownership and visibility are checked here against the
//! loaded records.

use auth::{authorize, AuditAction, AuditLogger, Operation};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use trade_core::{
    Actor, NewRfq, NewRfqResponse, Pagination, ResponseRevision, ResponseStatus, Rfq,
    RfqResponse, RfqStatus, Role, UserDirectory,
};
use uuid::Uuid;

use crate::error::{RfqError, RfqResult};
use crate::lifecycle::{check_response_decision, check_revisable, check_rfq_open, check_rfq_transition};
use crate::materializer::OrderMaterializer;
use crate::store::RfqStore;
use crate::validation::{quote_total, validate_new_response, validate_new_rfq, validate_revision};

/// Outcome of a buyer decision on a quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDecision {
    pub response: RfqResponse,
    /// Set when the decision was an acceptance.
    pub order_id: Option<Uuid>,
}

pub struct RfqService {
    store: Arc<dyn RfqStore>,
    directory: Arc<dyn UserDirectory>,
    materializer: Arc<dyn OrderMaterializer>,
    audit: Option<Arc<AuditLogger>>,
    expiry: Duration,
}

impl RfqService {
    pub fn new(
        store: Arc<dyn RfqStore>,
        directory: Arc<dyn UserDirectory>,
        materializer: Arc<dyn OrderMaterializer>,
        expiry_days: i64,
    ) -> Self {
        Self {
            store,
            directory,
            materializer,
            audit: None,
            expiry: Duration::days(expiry_days),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    fn audit_rfq(&self, actor: &Actor, action: AuditAction, rfq_id: Uuid, details: serde_json::Value) {
        if let Some(ref audit) = self.audit {
            audit.log_rfq(actor.user_id, action, rfq_id, details);
        }
    }

    fn audit_response(
        &self,
        actor: &Actor,
        action: AuditAction,
        response_id: Uuid,
        details: serde_json::Value,
    ) {
        if let Some(ref audit) = self.audit {
            audit.log_response(actor.user_id, action, response_id, details);
        }
    }

    async fn load_rfq(&self, id: Uuid) -> RfqResult<Rfq> {
        self.store
            .get_rfq(id)
            .await?
            .ok_or_else(RfqError::rfq_not_found)
    }

    async fn load_response(&self, id: Uuid) -> RfqResult<RfqResponse> {
        self.store
            .get_response(id)
            .await?
            .ok_or_else(RfqError::response_not_found)
    }

    /// Whether the actor may see the RFQ at all. Invisible RFQs are reported
    /// as not found.
    fn can_view(actor: &Actor, rfq: &Rfq) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Buyer => rfq.buyer_id == actor.user_id,
            Role::Supplier => rfq.is_visible_to_supplier(actor.user_id),
            Role::MarketVisitor => false,
        }
    }

    fn is_owner_or_admin(actor: &Actor, rfq: &Rfq) -> bool {
        actor.is_admin() || rfq.buyer_id == actor.user_id
    }

    // ---------------------------------------------------------------------
    // RFQs
    // ---------------------------------------------------------------------

    /// Create an RFQ. It goes straight to `active` with the default window.
    pub async fn create_rfq(&self, actor: &Actor, input: NewRfq) -> RfqResult<Rfq> {
        authorize(actor.role, Operation::CreateRfq)?;
        let input = validate_new_rfq(input)?;

        if let Some(target) = input.supplier_id {
            let supplier = match self.directory.get_by_id(target).await {
                Ok(user) => user,
                Err(trade_core::CoreError::NotFound(_)) => {
                    return Err(RfqError::Validation("target supplier does not exist".into()))
                }
                Err(e) => return Err(e.into()),
            };
            if supplier.role != Role::Supplier {
                return Err(RfqError::Validation("target supplier does not exist".into()));
            }
        }

        let now = Utc::now();
        let rfq = Rfq {
            id: Uuid::new_v4(),
            buyer_id: actor.user_id,
            product_id: input.product_id,
            product_name: input.product_name,
            product_image: input.product_image,
            supplier_id: input.supplier_id,
            quantity: input.quantity,
            unit: input.unit,
            specifications: input.specifications,
            requirements: input.requirements,
            delivery_location: input.delivery_location,
            preferred_delivery_date: input.preferred_delivery_date,
            budget: input.budget,
            currency: input.currency,
            status: RfqStatus::Active,
            submitted_at: Some(now),
            expires_at: Some(now + self.expiry),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_rfq(&rfq).await?;

        tracing::info!(rfq_id = %rfq.id, buyer_id = %actor.user_id, "RFQ created");
        self.audit_rfq(
            actor,
            AuditAction::RfqCreated,
            rfq.id,
            serde_json::json!({ "quantity": rfq.quantity, "currency": rfq.currency }),
        );

        Ok(rfq)
    }

    pub async fn list_mine(&self, actor: &Actor, page: Pagination) -> RfqResult<Vec<Rfq>> {
        authorize(actor.role, Operation::ListOwnRfqs)?;
        self.store.list_rfqs_by_buyer(actor.user_id, page).await
    }

    pub async fn list_all(&self, actor: &Actor, page: Pagination) -> RfqResult<Vec<Rfq>> {
        authorize(actor.role, Operation::AdminListRfqs)?;
        self.store.list_all_rfqs(page).await
    }

    pub async fn get_by_id(&self, actor: &Actor, id: Uuid) -> RfqResult<Rfq> {
        authorize(actor.role, Operation::ViewRfq)?;
        let rfq = self.load_rfq(id).await?;
        if !Self::can_view(actor, &rfq) {
            return Err(RfqError::rfq_not_found());
        }
        Ok(rfq)
    }

    /// Supplier inbox: open, unexpired RFQs addressed to anyone or to the
    /// caller. Admins see every open RFQ.
    pub async fn list_open_for_supplier(&self, actor: &Actor, page: Pagination) -> RfqResult<Vec<Rfq>> {
        authorize(actor.role, Operation::ListOpenRfqs)?;
        let supplier = if actor.is_admin() {
            None
        } else {
            Some(actor.user_id)
        };
        self.store.list_open_rfqs(supplier, Utc::now(), page).await
    }

    /// Close or cancel an RFQ. Owner or admin only.
    pub async fn update_status(&self, actor: &Actor, id: Uuid, target: RfqStatus) -> RfqResult<Rfq> {
        authorize(actor.role, Operation::UpdateRfqStatus)?;
        let rfq = self.load_rfq(id).await?;

        if !Self::is_owner_or_admin(actor, &rfq) {
            return Err(RfqError::Forbidden(
                "only the owning buyer or an admin may change this RFQ".into(),
            ));
        }
        check_rfq_transition(rfq.status, target, rfq.is_expired())?;

        let updated = self
            .store
            .update_rfq_status(rfq.id, rfq.version, target)
            .await?;

        tracing::info!(
            rfq_id = %id,
            from = %rfq.status,
            to = %target,
            actor_id = %actor.user_id,
            "RFQ status changed"
        );
        self.audit_rfq(
            actor,
            AuditAction::RfqStatusChanged,
            id,
            serde_json::json!({ "from": rfq.status, "to": target }),
        );

        Ok(updated)
    }

    /// Hard delete, admin only. Responses go with the RFQ.
    pub async fn delete_rfq(&self, actor: &Actor, id: Uuid) -> RfqResult<()> {
        authorize(actor.role, Operation::AdminDeleteRfq)?;
        if !self.store.delete_rfq(id).await? {
            return Err(RfqError::rfq_not_found());
        }

        tracing::warn!(rfq_id = %id, actor_id = %actor.user_id, "RFQ deleted");
        self.audit_rfq(actor, AuditAction::RfqDeleted, id, serde_json::Value::Null);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Responses
    // ---------------------------------------------------------------------

    /// Submit a quote against an open RFQ.
    pub async fn create_response(&self, actor: &Actor, input: NewRfqResponse) -> RfqResult<RfqResponse> {
        authorize(actor.role, Operation::CreateResponse)?;
        let input = validate_new_response(input)?;

        let rfq = self.load_rfq(input.rfq_id).await?;
        if !rfq.is_visible_to_supplier(actor.user_id) {
            return Err(RfqError::rfq_not_found());
        }
        check_rfq_open(rfq.status, rfq.is_expired())?;

        let now = Utc::now();
        let response = RfqResponse {
            id: Uuid::new_v4(),
            rfq_id: rfq.id,
            supplier_id: actor.user_id,
            unit_price: input.unit_price,
            total_price: quote_total(input.unit_price, input.moq)?,
            currency: input.currency.unwrap_or_else(|| rfq.currency.clone()),
            moq: input.moq,
            estimated_delivery: input.estimated_delivery,
            payment_terms: input.payment_terms,
            specifications: input.specifications,
            message: input.message,
            status: ResponseStatus::Pending,
            submitted_at: now,
            expires_at: input.expires_at,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_response(&response, rfq.version).await?;

        tracing::info!(
            rfq_id = %rfq.id,
            response_id = %response.id,
            supplier_id = %actor.user_id,
            "RFQ response submitted"
        );
        self.audit_response(
            actor,
            AuditAction::ResponseSubmitted,
            response.id,
            serde_json::json!({ "rfqId": rfq.id, "totalPrice": response.total_price }),
        );

        Ok(response)
    }

    /// Responses to an RFQ. The owning buyer and admins see all of them, a
    /// supplier only their own.
    pub async fn list_responses(&self, actor: &Actor, rfq_id: Uuid) -> RfqResult<Vec<RfqResponse>> {
        authorize(actor.role, Operation::ListResponses)?;
        let rfq = self.load_rfq(rfq_id).await?;

        if Self::is_owner_or_admin(actor, &rfq) {
            return self.store.list_responses(rfq.id, None).await;
        }
        if actor.role == Role::Supplier && rfq.is_visible_to_supplier(actor.user_id) {
            return self.store.list_responses(rfq.id, Some(actor.user_id)).await;
        }

        Err(RfqError::rfq_not_found())
    }

    /// Supplier edit of a pending or countered quote. The quote returns to
    /// `pending` and its total is recomputed.
    pub async fn revise_response(
        &self,
        actor: &Actor,
        response_id: Uuid,
        revision: ResponseRevision,
    ) -> RfqResult<RfqResponse> {
        authorize(actor.role, Operation::ReviseResponse)?;
        let revision = validate_revision(revision)?;

        let current = self.load_response(response_id).await?;
        if current.supplier_id != actor.user_id {
            return Err(RfqError::response_not_found());
        }
        check_revisable(current.status)?;

        let rfq = self.load_rfq(current.rfq_id).await?;
        check_rfq_open(rfq.status, rfq.is_expired())?;

        let previous_status = current.status;
        let mut revised = current;
        if let Some(price) = revision.unit_price {
            revised.unit_price = price;
        }
        if let Some(moq) = revision.moq {
            revised.moq = moq;
        }
        if let Some(days) = revision.estimated_delivery {
            revised.estimated_delivery = days;
        }
        if revision.payment_terms.is_some() {
            revised.payment_terms = revision.payment_terms;
        }
        if revision.specifications.is_some() {
            revised.specifications = revision.specifications;
        }
        if revision.message.is_some() {
            revised.message = revision.message;
        }
        if revision.expires_at.is_some() {
            revised.expires_at = revision.expires_at;
        }
        revised.status = ResponseStatus::Pending;
        revised.total_price = quote_total(revised.unit_price, revised.moq)?;

        let saved = self.store.update_response(&revised, rfq.version).await?;

        tracing::info!(response_id = %saved.id, from = %previous_status, "RFQ response revised");
        self.audit_response(
            actor,
            AuditAction::ResponseRevised,
            saved.id,
            serde_json::json!({ "totalPrice": saved.total_price }),
        );

        Ok(saved)
    }

    /// Buyer/admin decision on a pending quote. Acceptance and its order are
    /// written together; if the order cannot be created the quote stays
    /// `pending`. Sibling quotes are left alone.
    pub async fn update_response_status(
        &self,
        actor: &Actor,
        response_id: Uuid,
        target: ResponseStatus,
    ) -> RfqResult<ResponseDecision> {
        authorize(actor.role, Operation::DecideResponse)?;

        let current = self.load_response(response_id).await?;
        let rfq = self.load_rfq(current.rfq_id).await?;

        if !Self::is_owner_or_admin(actor, &rfq) {
            return Err(RfqError::Forbidden(
                "only the RFQ's buyer or an admin may decide on its responses".into(),
            ));
        }
        check_response_decision(current.status, target)?;
        check_rfq_open(rfq.status, rfq.is_expired())?;

        let now = Utc::now();
        if target == ResponseStatus::Accepted && current.is_expired_at(now) {
            return Err(RfqError::InvalidState("response has expired".into()));
        }

        let mut decided = current;
        decided.status = target;

        let (decided, order_id) = if target == ResponseStatus::Accepted {
            let (accepted, order_id) = self
                .store
                .accept_response(&decided, &rfq, self.materializer.as_ref())
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        response_id = %decided.id,
                        error = %e,
                        "Acceptance rolled back, no order created"
                    );
                })?;
            (accepted, Some(order_id))
        } else {
            (self.store.update_response(&decided, rfq.version).await?, None)
        };

        tracing::info!(
            response_id = %decided.id,
            rfq_id = %rfq.id,
            status = %target,
            order_id = ?order_id,
            "RFQ response decided"
        );
        self.audit_response(
            actor,
            AuditAction::ResponseDecided,
            decided.id,
            serde_json::json!({ "status": target, "orderId": order_id }),
        );
        if let Some(order_id) = order_id {
            self.audit_response(
                actor,
                AuditAction::OrderMaterialized,
                decided.id,
                serde_json::json!({ "orderId": order_id }),
            );
        }

        Ok(ResponseDecision {
            response: decided,
            order_id,
        })
    }
}
