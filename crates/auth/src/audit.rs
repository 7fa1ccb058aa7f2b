//! Audit trail for account and negotiation events.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Types of auditable actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Accounts
    UserRegistered,
    Login,
    LoginFailed,
    TokenRefresh,

    // RFQs
    RfqCreated,
    RfqStatusChanged,
    RfqDeleted,

    // Quotes
    ResponseSubmitted,
    ResponseRevised,
    ResponseDecided,
    OrderMaterialized,

    // Other
    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::UserRegistered => "user_registered",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::TokenRefresh => "token_refresh",
            AuditAction::RfqCreated => "rfq_created",
            AuditAction::RfqStatusChanged => "rfq_status_changed",
            AuditAction::RfqDeleted => "rfq_deleted",
            AuditAction::ResponseSubmitted => "response_submitted",
            AuditAction::ResponseRevised => "response_revised",
            AuditAction::ResponseDecided => "response_decided",
            AuditAction::OrderMaterialized => "order_materialized",
            AuditAction::Custom(s) => s,
        }
    }

    pub fn parse(action: &str) -> Self {
        match action {
            "user_registered" => AuditAction::UserRegistered,
            "login" => AuditAction::Login,
            "login_failed" => AuditAction::LoginFailed,
            "token_refresh" => AuditAction::TokenRefresh,
            "rfq_created" => AuditAction::RfqCreated,
            "rfq_status_changed" => AuditAction::RfqStatusChanged,
            "rfq_deleted" => AuditAction::RfqDeleted,
            "response_submitted" => AuditAction::ResponseSubmitted,
            "response_revised" => AuditAction::ResponseRevised,
            "response_decided" => AuditAction::ResponseDecided,
            "order_materialized" => AuditAction::OrderMaterialized,
            other => AuditAction::Custom(other.to_string()),
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    /// Acting user, if known.
    pub user_id: Option<String>,
    pub action: AuditAction,
    /// Affected resource, e.g. `rfq/<id>`.
    pub resource: String,
    pub details: serde_json::Value,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn builder(action: AuditAction, resource: impl Into<String>) -> AuditEventBuilder {
        AuditEventBuilder {
            action,
            resource: resource.into(),
            user_id: None,
            details: serde_json::Value::Null,
            success: true,
            error: None,
        }
    }
}

/// Builder for audit events.
pub struct AuditEventBuilder {
    action: AuditAction,
    resource: String,
    user_id: Option<String>,
    details: serde_json::Value,
    success: bool,
    error: Option<String>,
}

impl AuditEventBuilder {
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: 0, // Set by storage
            timestamp: Utc::now(),
            user_id: self.user_id,
            action: self.action,
            resource: self.resource,
            details: self.details,
            success: self.success,
            error: self.error,
        }
    }
}

/// Storage backend for audit logs.
#[async_trait::async_trait]
pub trait AuditStorage: Send + Sync {
    async fn store(&self, event: &AuditEvent) -> Result<i64>;

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>>;
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub action: Option<AuditAction>,
    pub resource_prefix: Option<String>,
    pub limit: Option<u32>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn resource(mut self, prefix: impl Into<String>) -> Self {
        self.resource_prefix = Some(prefix.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref user) = self.user_id {
            if event.user_id.as_ref() != Some(user) {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &event.action != action {
                return false;
            }
        }
        if let Some(ref prefix) = self.resource_prefix {
            if !event.resource.starts_with(prefix) {
                return false;
            }
        }
        true
    }
}

/// In-memory audit storage for tests and database-less runs.
pub struct MemoryAuditStorage {
    events: Arc<tokio::sync::RwLock<Vec<AuditEvent>>>,
    next_id: Arc<std::sync::atomic::AtomicI64>,
}

impl MemoryAuditStorage {
    pub fn new() -> Self {
        Self {
            events: Arc::new(tokio::sync::RwLock::new(Vec::new())),
            next_id: Arc::new(std::sync::atomic::AtomicI64::new(1)),
        }
    }
}

impl Default for MemoryAuditStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuditStorage for MemoryAuditStorage {
    async fn store(&self, event: &AuditEvent) -> Result<i64> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut stored = event.clone();
        stored.id = id;

        self.events.write().await.push(stored);
        Ok(id)
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let events = self.events.read().await;
        let limit = filter.limit.unwrap_or(100) as usize;

        // newest first, like the SQL backend
        Ok(events
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Audit logger service.
pub struct AuditLogger {
    storage: Arc<dyn AuditStorage>,
    /// Async channel for non-blocking logging.
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditLogger {
    /// Create a new audit logger. Must be called inside a Tokio runtime.
    pub fn new(storage: Arc<dyn AuditStorage>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(10000);

        let storage_clone = storage.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = storage_clone.store(&event).await {
                    tracing::error!(error = %e, action = event.action.as_str(), "Failed to store audit event");
                }
            }
        });

        Self { storage, tx }
    }

    /// Log an audit event (non-blocking).
    pub fn log(&self, event: AuditEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::warn!("Audit log channel full, event dropped");
        }
    }

    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        self.storage.query(filter).await
    }

    /// Log a login attempt. Failed attempts are keyed by the submitted email.
    pub fn log_login(&self, subject: &str, success: bool) {
        let mut builder = AuditEvent::builder(
            if success {
                AuditAction::Login
            } else {
                AuditAction::LoginFailed
            },
            format!("user/{}", subject),
        )
        .user(subject);

        if !success {
            builder = builder.failure("invalid credentials");
        }

        self.log(builder.build());
    }

    /// Log an RFQ-scoped action.
    pub fn log_rfq(
        &self,
        user_id: Uuid,
        action: AuditAction,
        rfq_id: Uuid,
        details: serde_json::Value,
    ) {
        let event = AuditEvent::builder(action, format!("rfq/{}", rfq_id))
            .user(user_id.to_string())
            .details(details)
            .build();

        self.log(event);
    }

    /// Log a quote-scoped action.
    pub fn log_response(
        &self,
        user_id: Uuid,
        action: AuditAction,
        response_id: Uuid,
        details: serde_json::Value,
    ) {
        let event = AuditEvent::builder(action, format!("rfq_response/{}", response_id))
            .user(user_id.to_string())
            .details(details)
            .build();

        self.log(event);
    }
}
