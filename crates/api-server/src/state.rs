//! Application state shared across handlers.

use auth::{
    AuditLogger, CredentialService, JwtAuth, MemoryAuditStorage, PostgresAuditStorage,
};
use rfq_engine::{
    MemoryOrderMaterializer, MemoryRfqStore, PgOrderMaterializer, PgRfqStore, RfqService,
};
use sqlx::PgPool;
use std::sync::Arc;
use trade_core::config::AppConfig;
use trade_core::{MemoryUserDirectory, PgUserDirectory, UserDirectory};

/// Shared application state.
pub struct AppState {
    /// Database connection pool. Absent when running on in-memory backends.
    pub pool: Option<PgPool>,
    /// Registration, login and token refresh.
    pub credentials: Arc<CredentialService>,
    /// RFQ lifecycle operations.
    pub rfqs: Arc<RfqService>,
    /// Token verifier used by the auth middleware.
    pub jwt: Arc<JwtAuth>,
}

impl AppState {
    /// Create state backed by PostgreSQL. Must be called inside a Tokio runtime.
    pub fn new(config: &AppConfig, pool: PgPool) -> anyhow::Result<Self> {
        let directory: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool.clone()));
        let audit = Arc::new(AuditLogger::new(Arc::new(PostgresAuditStorage::new(
            pool.clone(),
        ))));

        let credentials =
            CredentialService::from_config(config, directory.clone())?.with_audit(audit.clone());
        let rfqs = RfqService::new(
            Arc::new(PgRfqStore::new(pool.clone())),
            directory,
            Arc::new(PgOrderMaterializer::new()),
            config.rfq.default_expiry_days,
        )
        .with_audit(audit);

        Ok(Self::assemble(Some(pool), credentials, rfqs))
    }

    /// Create state on in-memory backends. Nothing survives a restart.
    pub fn in_memory(config: &AppConfig) -> anyhow::Result<Self> {
        let directory: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
        let audit = Arc::new(AuditLogger::new(Arc::new(MemoryAuditStorage::new())));

        let credentials =
            CredentialService::from_config(config, directory.clone())?.with_audit(audit.clone());
        let rfqs = RfqService::new(
            Arc::new(MemoryRfqStore::new()),
            directory,
            Arc::new(MemoryOrderMaterializer::new()),
            config.rfq.default_expiry_days,
        )
        .with_audit(audit);

        Ok(Self::assemble(None, credentials, rfqs))
    }

    fn assemble(
        pool: Option<PgPool>,
        credentials: CredentialService,
        rfqs: RfqService,
    ) -> Self {
        let jwt = credentials.jwt();
        Self {
            pool,
            credentials: Arc::new(credentials),
            rfqs: Arc::new(rfqs),
            jwt,
        }
    }
}
