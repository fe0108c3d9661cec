//! Email/password identities.
//!
//! Credentials live in the store's `accounts` table as a salted BLAKE3
//! derive-key hash.  The signed-in identity is published on a `watch`
//! channel; [`AppState::on_identity_changed`](crate::state::AppState::on_identity_changed)
//! is the intended consumer.

use eservice_shared::constants::{
    default_avatar_url, KDF_CONTEXT_PASSWORD, MIN_PASSWORD_LEN, PASSWORD_SALT_LEN,
};
use eservice_shared::types::Role;
use eservice_shared::validation::{require_text, validate_skills};
use eservice_store::{store_timestamp, Account, Profile, StoreError};
use subtle::ConstantTimeEq;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, ClientError};
use crate::state::{with_db, SharedDb};

/// Registration form.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    /// Required for technicians, must be absent or empty for customers.
    pub skills: Option<Vec<String>>,
}

pub struct Auth {
    db: SharedDb,
    current: watch::Sender<Option<Uuid>>,
}

impl Auth {
    pub fn new(db: SharedDb) -> Self {
        let (current, _rx) = watch::channel(None);
        Self { db, current }
    }

    /// Register a new identity with its profile and sign it in.
    pub async fn sign_up(&self, form: SignUp) -> Result<Uuid, ClientError> {
        let email = normalize_email(&form.email)?;
        if form.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword.into());
        }
        require_text("full name", &form.full_name)?;
        let skills = form.skills.unwrap_or_default();
        validate_skills(form.role, &skills)?;

        let id = Uuid::new_v4();
        let salt: [u8; PASSWORD_SALT_LEN] = rand::random();
        let now = store_timestamp();

        let account = Account {
            user_id: id,
            email: email.clone(),
            password_hash: hex::encode(hash_password(&salt, &form.password)),
            salt: hex::encode(salt),
            created_at: now,
        };
        let profile = Profile {
            id,
            full_name: form.full_name.trim().to_string(),
            email,
            role: form.role,
            avatar_url: default_avatar_url(&id),
            skills: (form.role == Role::Technician).then_some(skills),
            created_at: now,
        };

        with_db(&self.db, move |db| db.register_account(&account, &profile))
            .await
            .map_err(|e| match e {
                ClientError::Store(StoreError::Conflict(_)) => AuthError::EmailInUse.into(),
                other => other,
            })?;

        info!(user = %id, role = %form.role, "signed up");
        self.current.send_replace(Some(id));
        Ok(id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Uuid, ClientError> {
        let email = normalize_email(email)?;

        let lookup = email.clone();
        let account = with_db(&self.db, move |db| db.find_account_by_email(&lookup))
            .await
            .map_err(|e| match e {
                ClientError::Store(StoreError::NotFound) => AuthError::InvalidCredential.into(),
                other => other,
            })?;

        if !verify_password(&account, password) {
            warn!(email = %email, "sign-in rejected");
            return Err(AuthError::InvalidCredential.into());
        }

        info!(user = %account.user_id, "signed in");
        self.current.send_replace(Some(account.user_id));
        Ok(account.user_id)
    }

    pub fn sign_out(&self) {
        if let Some(id) = self.current.send_replace(None) {
            info!(user = %id, "signed out");
        }
    }

    pub fn current(&self) -> Option<Uuid> {
        *self.current.borrow()
    }

    /// Follow the signed-in identity.  The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Uuid>> {
        self.current.subscribe()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@').ok_or(AuthError::InvalidEmail)?;
    let domain_ok = domain
        .split('.')
        .all(|label| !label.is_empty())
        && domain.contains('.');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

fn hash_password(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_PASSWORD);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    *hasher.finalize().as_bytes()
}

fn verify_password(account: &Account, password: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(&account.salt), hex::decode(&account.password_hash))
    else {
        warn!(user = %account.user_id, "stored credential is not valid hex");
        return false;
    };
    let actual = hash_password(&salt, password);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::shared_temp_db;
    use eservice_shared::error::ValidationError;
    use std::sync::Arc;

    fn form(email: &str, role: Role) -> SignUp {
        SignUp {
            email: email.to_string(),
            password: "secret1".to_string(),
            full_name: "Dana Doe".to_string(),
            role,
            skills: (role == Role::Technician).then(|| vec!["HVAC".to_string()]),
        }
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Dana@Example.COM ").unwrap(), "dana@example.com");
        assert_eq!(normalize_email("no-at-sign"), Err(AuthError::InvalidEmail));
        assert_eq!(normalize_email("@example.com"), Err(AuthError::InvalidEmail));
        assert_eq!(normalize_email("dana@localhost"), Err(AuthError::InvalidEmail));
        assert_eq!(normalize_email("dana@example..com"), Err(AuthError::InvalidEmail));
    }

    #[test]
    fn hash_depends_on_salt() {
        assert_ne!(hash_password(b"a", "pw"), hash_password(b"b", "pw"));
        assert_eq!(hash_password(b"a", "pw"), hash_password(b"a", "pw"));
    }

    #[tokio::test]
    async fn sign_up_creates_profile_and_signs_in() {
        let (_dir, db) = shared_temp_db();
        let auth = Auth::new(Arc::clone(&db));
        let mut rx = auth.subscribe();

        let id = auth.sign_up(form("Tech@Example.com", Role::Technician)).await.unwrap();
        assert_eq!(auth.current(), Some(id));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(id));

        let profile = crate::state::lock_db(&db).unwrap().get_profile(id).unwrap();
        assert_eq!(profile.email, "tech@example.com");
        assert_eq!(profile.role, Role::Technician);
        assert_eq!(profile.skills, Some(vec!["HVAC".to_string()]));
        assert_eq!(profile.avatar_url, default_avatar_url(&id));
    }

    #[tokio::test]
    async fn sign_up_rejections() {
        let (_dir, db) = shared_temp_db();
        let auth = Auth::new(db);

        let mut weak = form("a@example.com", Role::Customer);
        weak.password = "12345".into();
        assert!(matches!(
            auth.sign_up(weak).await,
            Err(ClientError::Auth(AuthError::WeakPassword))
        ));

        let mut skilled_customer = form("b@example.com", Role::Customer);
        skilled_customer.skills = Some(vec!["Plumbing".into()]);
        assert!(matches!(
            auth.sign_up(skilled_customer).await,
            Err(ClientError::Validation(ValidationError::UnexpectedSkills))
        ));

        let mut unskilled = form("c@example.com", Role::Technician);
        unskilled.skills = None;
        assert!(matches!(
            auth.sign_up(unskilled).await,
            Err(ClientError::Validation(ValidationError::MissingSkills))
        ));

        auth.sign_up(form("d@example.com", Role::Customer)).await.unwrap();
        assert!(matches!(
            auth.sign_up(form("D@EXAMPLE.com", Role::Customer)).await,
            Err(ClientError::Auth(AuthError::EmailInUse))
        ));
    }

    #[tokio::test]
    async fn sign_in_and_out() {
        let (_dir, db) = shared_temp_db();
        let auth = Auth::new(db);
        let id = auth.sign_up(form("e@example.com", Role::Customer)).await.unwrap();
        auth.sign_out();
        assert_eq!(auth.current(), None);

        assert!(matches!(
            auth.sign_in("e@example.com", "wrong-password").await,
            Err(ClientError::Auth(AuthError::InvalidCredential))
        ));
        assert!(matches!(
            auth.sign_in("nobody@example.com", "secret1").await,
            Err(ClientError::Auth(AuthError::InvalidCredential))
        ));
        assert_eq!(auth.current(), None);

        assert_eq!(auth.sign_in(" E@example.com", "secret1").await.unwrap(), id);
        assert_eq!(auth.current(), Some(id));
    }
}
