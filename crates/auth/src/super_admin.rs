//! Configuration-derived administrator that lives outside the directory.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use trade_core::config::SuperAdminSettings;
use trade_core::types::user::normalize_email;
use trade_core::{Role, User, SUPER_ADMIN_ID};
use uuid::Uuid;

/// The sentinel admin identity. Keeps SHA-256 digests of its credential so
/// comparisons are over fixed-length values and the password is not held.
pub struct SuperAdmin {
    email: String,
    email_digest: [u8; 32],
    password_digest: [u8; 32],
    full_name: String,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for SuperAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl SuperAdmin {
    /// `None` when the bypass is not configured.
    pub fn from_settings(settings: &SuperAdminSettings) -> Option<Self> {
        match (&settings.email, &settings.password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                let email = normalize_email(email);
                Some(Self {
                    email_digest: digest(&email),
                    password_digest: digest(password),
                    email,
                    full_name: settings.full_name.clone(),
                    created_at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Constant-time check of both halves of the credential pair. Inputs are
    /// digested first so timing does not depend on their length, and both
    /// comparisons always run.
    pub fn matches(&self, email: &str, password: &str) -> bool {
        let email_ok = digest(&normalize_email(email))
            .as_slice()
            .ct_eq(self.email_digest.as_slice());
        let password_ok = digest(password)
            .as_slice()
            .ct_eq(self.password_digest.as_slice());
        bool::from(email_ok & password_ok)
    }

    pub fn is_sentinel(id: Uuid) -> bool {
        id == SUPER_ADMIN_ID
    }

    /// The synthetic user record. Carries no password hash.
    pub fn user(&self) -> User {
        User {
            id: SUPER_ADMIN_ID,
            email: self.email.clone(),
            password_hash: String::new(),
            full_name: self.full_name.clone(),
            role: Role::Admin,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SuperAdminSettings {
        SuperAdminSettings {
            email: Some("Root@Trade-Hub.test".to_string()),
            password: Some("root-password-123".to_string()),
            full_name: "Master Administrator".to_string(),
        }
    }

    #[test]
    fn test_disabled_without_credentials() {
        assert!(SuperAdmin::from_settings(&SuperAdminSettings::default()).is_none());

        let mut half = settings();
        half.password = None;
        assert!(SuperAdmin::from_settings(&half).is_none());
    }

    #[test]
    fn test_matches() {
        let admin = SuperAdmin::from_settings(&settings()).unwrap();

        assert!(admin.matches("root@trade-hub.test", "root-password-123"));
        assert!(admin.matches(" ROOT@trade-hub.test ", "root-password-123"));
        assert!(!admin.matches("root@trade-hub.test", "root-password-124"));
        assert!(!admin.matches("root@trade-hub.test", "root-password-123 "));
        assert!(!admin.matches("other@trade-hub.test", "root-password-123"));
        assert!(!admin.matches("", ""));
        assert!(!admin.matches("root@trade-hub.test", "root"));
        assert!(!admin.matches("root@trade-hub.test", &"root-password-123".repeat(8)));
    }

    #[test]
    fn test_credential_kept_as_digests() {
        let admin = SuperAdmin::from_settings(&settings()).unwrap();
        assert_eq!(admin.password_digest, digest("root-password-123"));
        assert_eq!(admin.email_digest, digest("root@trade-hub.test"));
        assert_ne!(admin.password_digest, admin.email_digest);
    }

    #[test]
    fn test_synthetic_user() {
        let admin = SuperAdmin::from_settings(&settings()).unwrap();
        let user = admin.user();

        assert_eq!(user.id, SUPER_ADMIN_ID);
        assert_eq!(user.role, Role::Admin);
        assert!(user.password_hash.is_empty());
        assert!(SuperAdmin::is_sentinel(user.id));
        assert!(!SuperAdmin::is_sentinel(Uuid::new_v4()));
    }

    #[test]
    fn test_debug_redacts_password() {
        let admin = SuperAdmin::from_settings(&settings()).unwrap();
        let printed = format!("{:?}", admin);
        assert!(!printed.contains("root-password-123"));
    }
}
