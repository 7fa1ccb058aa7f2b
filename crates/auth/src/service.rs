//! Credential & token service: registration, login, refresh and identity
//! resolution, including the directory-less super admin.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trade_core::config::AppConfig;
use trade_core::types::user::normalize_email;
use trade_core::{NewUser, Role, User, UserDirectory};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditLogger};
use crate::error::{AuthError, AuthResult};
use crate::jwt::{Claims, JwtAuth, JwtConfig, TokenPair};
use crate::password::{validate_password, CredentialHasher};
use crate::super_admin::SuperAdmin;

/// Registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// An authenticated user with a fresh token pair.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

pub struct CredentialService {
    directory: Arc<dyn UserDirectory>,
    hasher: CredentialHasher,
    jwt: Arc<JwtAuth>,
    super_admin: Option<SuperAdmin>,
    audit: Option<Arc<AuditLogger>>,
}

impl CredentialService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: CredentialHasher,
        jwt: Arc<JwtAuth>,
        super_admin: Option<SuperAdmin>,
    ) -> Self {
        Self {
            directory,
            hasher,
            jwt,
            super_admin,
            audit: None,
        }
    }

    /// Build the service from application configuration.
    pub fn from_config(config: &AppConfig, directory: Arc<dyn UserDirectory>) -> AuthResult<Self> {
        let hasher = CredentialHasher::new(&config.password)?;
        let jwt = Arc::new(JwtAuth::new(JwtConfig::from(&config.jwt)));
        let super_admin = SuperAdmin::from_settings(&config.super_admin);

        if super_admin.is_some() {
            tracing::info!("Super admin login enabled");
        }

        Ok(Self::new(directory, hasher, jwt, super_admin))
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Shared token validator, also used by the request guard.
    pub fn jwt(&self) -> Arc<JwtAuth> {
        self.jwt.clone()
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.log(event);
        }
    }

    /// Create an account and sign it in.
    pub async fn register(&self, input: Registration) -> AuthResult<AuthSession> {
        let email = normalize_email(&input.email);
        validate_email(&email)?;
        validate_password(&input.password)?;

        let full_name = input.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(AuthError::Validation("full name is required".into()));
        }
        if input.role == Role::Admin {
            return Err(AuthError::Validation(
                "admin accounts cannot be self-registered".into(),
            ));
        }
        if let Some(ref admin) = self.super_admin {
            if admin.user().email == email {
                return Err(AuthError::Conflict("email already registered".into()));
            }
        }

        let password_hash = self.hash_password(input.password).await?;

        let user = self
            .directory
            .create(NewUser {
                email,
                password_hash,
                full_name,
                role: input.role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        self.audit(
            AuditEvent::builder(AuditAction::UserRegistered, format!("user/{}", user.id))
                .user(user.id.to_string())
                .details(serde_json::json!({ "role": user.role }))
                .build(),
        );

        let tokens = self.issue_tokens(&user)?;
        Ok(AuthSession { user, tokens })
    }

    /// Authenticate with email and password. The super admin pair is checked
    /// first and never touches the directory.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        if let Some(ref admin) = self.super_admin {
            if admin.matches(email, password) {
                let user = admin.user();
                tracing::info!("Super admin logged in");
                if let Some(ref audit) = self.audit {
                    audit.log_login(&user.id.to_string(), true);
                }
                let tokens = self.issue_tokens(&user)?;
                return Ok(AuthSession { user, tokens });
            }
        }

        let user = match self.directory.get_by_email(email).await {
            Ok(user) => user,
            Err(trade_core::CoreError::NotFound(_)) => {
                self.verify_dummy(password.to_string()).await;
                self.login_failed(email);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?
        {
            self.login_failed(email);
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        if let Some(ref audit) = self.audit {
            audit.log_login(&user.id.to_string(), true);
        }

        let tokens = self.issue_tokens(&user)?;
        Ok(AuthSession { user, tokens })
    }

    fn login_failed(&self, email: &str) {
        tracing::debug!("Login rejected");
        if let Some(ref audit) = self.audit {
            audit.log_login(&normalize_email(email), false);
        }
    }

    /// Sign an access + refresh pair for a user.
    pub fn issue_tokens(&self, user: &User) -> AuthResult<TokenPair> {
        self.jwt.issue_pair(user.id, user.role)
    }

    /// Exchange a refresh token for a fresh pair. The subject is re-resolved so
    /// tokens of vanished users stop working.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let claims = self.jwt.validate_refresh(refresh_token)?;

        let user = match self.get_user_by_id(claims.uid).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => return Err(AuthError::InvalidToken),
            Err(e) => return Err(e),
        };

        self.audit(
            AuditEvent::builder(AuditAction::TokenRefresh, format!("user/{}", user.id))
                .user(user.id.to_string())
                .build(),
        );

        let tokens = self.issue_tokens(&user)?;
        Ok(AuthSession { user, tokens })
    }

    /// Resolve an identity. The sentinel ID maps to the super admin without a
    /// directory lookup.
    pub async fn get_user_by_id(&self, id: Uuid) -> AuthResult<User> {
        if SuperAdmin::is_sentinel(id) {
            return self
                .super_admin
                .as_ref()
                .map(SuperAdmin::user)
                .ok_or_else(|| AuthError::NotFound("user not found".into()));
        }

        Ok(self.directory.get_by_id(id).await?)
    }

    pub fn verify_access(&self, token: &str) -> AuthResult<Claims> {
        self.jwt.validate_access(token)
    }

    async fn hash_password(&self, password: String) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: String, hash: String) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {}", e)))
    }

    async fn verify_dummy(&self, password: String) {
        let hasher = self.hasher.clone();
        let _ = tokio::task::spawn_blocking(move || hasher.verify_dummy(&password)).await;
    }
}

/// Shape check only; deliverability is not our concern.
fn validate_email(email: &str) -> AuthResult<()> {
    let invalid = || AuthError::Validation("invalid email address".into());

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trade_core::{MemoryUserDirectory, SUPER_ADMIN_ID};

    fn service_with(directory: Arc<MemoryUserDirectory>) -> CredentialService {
        CredentialService::from_config(&AppConfig::test_config(), directory).unwrap()
    }

    fn service() -> CredentialService {
        service_with(Arc::new(MemoryUserDirectory::new()))
    }

    fn registration(email: &str, role: Role) -> Registration {
        Registration {
            email: email.to_string(),
            password: "s3cure-password".to_string(),
            full_name: "Jordan Doe".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let svc = service();
        let session = svc
            .register(registration("Buyer@Example.com", Role::Buyer))
            .await
            .unwrap();

        assert_eq!(session.user.email, "buyer@example.com");
        assert_eq!(session.user.role, Role::Buyer);
        assert_ne!(session.user.password_hash, "s3cure-password");

        let login = svc.login("buyer@example.com", "s3cure-password").await.unwrap();
        assert_eq!(login.user.id, session.user.id);

        let claims = svc.verify_access(&login.tokens.access_token).unwrap();
        assert_eq!(claims.uid, session.user.id);
        assert_eq!(claims.role, Role::Buyer);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let svc = service();

        let mut short = registration("a@example.com", Role::Buyer);
        short.password = "1234567".to_string();
        assert!(matches!(svc.register(short).await, Err(AuthError::Validation(_))));

        for bad in ["no-at-sign", "@example.com", "a@nodot", "a b@example.com", "a@@example.com"] {
            assert!(
                matches!(
                    svc.register(registration(bad, Role::Buyer)).await,
                    Err(AuthError::Validation(_))
                ),
                "{}",
                bad
            );
        }

        let mut nameless = registration("c@example.com", Role::Buyer);
        nameless.full_name = "   ".to_string();
        assert!(svc.register(nameless).await.is_err());

        assert!(matches!(
            svc.register(registration("d@example.com", Role::Admin)).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let svc = service();
        svc.register(registration("dup@example.com", Role::Supplier))
            .await
            .unwrap();

        assert!(matches!(
            svc.register(registration("DUP@example.com", Role::Buyer)).await,
            Err(AuthError::Conflict(_))
        ));
        assert!(matches!(
            svc.register(registration("root@trade-hub.test", Role::Buyer)).await,
            Err(AuthError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_indistinguishable() {
        let svc = service();
        svc.register(registration("s@example.com", Role::Supplier))
            .await
            .unwrap();

        let wrong_password = svc.login("s@example.com", "not-the-password").await.unwrap_err();
        let unknown_user = svc.login("ghost@example.com", "s3cure-password").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_super_admin_login_with_empty_directory() {
        let directory = Arc::new(MemoryUserDirectory::new());
        let svc = service_with(directory.clone());

        let session = svc
            .login("root@trade-hub.test", "root-password-123")
            .await
            .unwrap();

        assert_eq!(session.user.id, SUPER_ADMIN_ID);
        assert_eq!(session.user.role, Role::Admin);
        let claims = svc.verify_access(&session.tokens.access_token).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert!(directory.is_empty().await);
    }

    #[tokio::test]
    async fn test_super_admin_wrong_password_falls_through() {
        let svc = service();
        assert!(matches!(
            svc.login("root@trade-hub.test", "guess").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_refresh() {
        let svc = service();
        let session = svc
            .register(registration("r@example.com", Role::Buyer))
            .await
            .unwrap();

        let refreshed = svc.refresh(&session.tokens.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.id, session.user.id);

        // access tokens are not refresh tokens
        assert!(matches!(
            svc.refresh(&session.tokens.access_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_super_admin_without_directory() {
        let svc = service();
        let session = svc
            .login("root@trade-hub.test", "root-password-123")
            .await
            .unwrap();

        let refreshed = svc.refresh(&session.tokens.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.id, SUPER_ADMIN_ID);
        assert_eq!(refreshed.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_subject_rejected() {
        let svc = service();
        let stray = svc.jwt().issue_pair(Uuid::new_v4(), Role::Buyer).unwrap();
        assert!(matches!(
            svc.refresh(&stray.refresh_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let svc = service();
        let admin = svc.get_user_by_id(SUPER_ADMIN_ID).await.unwrap();
        assert_eq!(admin.role, Role::Admin);

        assert!(matches!(
            svc.get_user_by_id(Uuid::new_v4()).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sentinel_unresolvable_when_bypass_disabled() {
        let mut config = AppConfig::test_config();
        config.super_admin = Default::default();
        let svc =
            CredentialService::from_config(&config, Arc::new(MemoryUserDirectory::new())).unwrap();

        assert!(svc.get_user_by_id(SUPER_ADMIN_ID).await.is_err());
        assert!(svc.login("root@trade-hub.test", "root-password-123").await.is_err());
    }
}
