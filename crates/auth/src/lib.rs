//! Authentication and Security
//!
//! Password hashing, signed token pairs, the configuration-injected super
//! admin, the per-operation role allow-list and audit logging.

pub mod audit;
pub mod audit_storage_pg;
pub mod error;
pub mod jwt;
pub mod password;
pub mod rbac;
pub mod service;
pub mod super_admin;

pub use audit::{AuditAction, AuditEvent, AuditFilter, AuditLogger, AuditStorage, MemoryAuditStorage};
pub use audit_storage_pg::PostgresAuditStorage;
pub use error::{AuthError, AuthResult};
pub use jwt::{Claims, JwtAuth, JwtConfig, TokenPair, TokenType};
pub use password::CredentialHasher;
pub use rbac::{authorize, Operation};
pub use service::{AuthSession, CredentialService, Registration};
pub use super_admin::SuperAdmin;
