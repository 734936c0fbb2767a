//! Identity provider (email/password accounts for admins)
//!
//! Only superAdmin and storeAdmin sign in through the provider. Staff never
//! have provider credentials.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::util::new_id;

/// Signed-in provider user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    pub uid: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<ProviderUser>;

    async fn sign_out(&self) -> AppResult<()>;

    /// Current auth state
    fn current(&self) -> Option<ProviderUser>;

    /// Auth-state stream; yields on every sign-in/sign-out
    fn watch(&self) -> watch::Receiver<Option<ProviderUser>>;

    // ========== Admin operations (provisioning) ==========

    async fn create_user(&self, email: &str, password: &str) -> AppResult<ProviderUser>;

    async fn set_password(&self, email: &str, password: &str) -> AppResult<()>;

    async fn user_exists(&self, email: &str) -> AppResult<bool>;
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Random one-time password for freshly provisioned admins
pub fn temporary_password() -> String {
    use rand::Rng;
    use rand::distributions::Alphanumeric;
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

struct UserRecord {
    uid: String,
    password_hash: String,
}

/// Process-local provider
pub struct MemoryIdentityProvider {
    users: DashMap<String, UserRecord>,
    session: watch::Sender<Option<ProviderUser>>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            users: DashMap::new(),
            session,
        }
    }

    /// Register a user under a fixed uid
    pub fn insert_user(&self, uid: &str, email: &str, password: &str) -> AppResult<ProviderUser> {
        let password_hash = hash_password(password)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;
        self.users.insert(
            email.to_lowercase(),
            UserRecord {
                uid: uid.to_string(),
                password_hash,
            },
        );
        Ok(ProviderUser {
            uid: uid.to_string(),
            email: email.to_lowercase(),
        })
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<ProviderUser> {
        let email = email.to_lowercase();
        let user = {
            let record = self
                .users
                .get(&email)
                .ok_or_else(AppError::invalid_credentials)?;
            if !verify_password(password, &record.password_hash) {
                return Err(AppError::invalid_credentials());
            }
            ProviderUser {
                uid: record.uid.clone(),
                email,
            }
        };
        self.session.send_replace(Some(user.clone()));
        tracing::info!(uid = %user.uid, "Provider sign-in");
        Ok(user)
    }

    async fn sign_out(&self) -> AppResult<()> {
        if self.session.send_replace(None).is_some() {
            tracing::info!("Provider sign-out");
        }
        Ok(())
    }

    fn current(&self) -> Option<ProviderUser> {
        self.session.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<ProviderUser>> {
        self.session.subscribe()
    }

    async fn create_user(&self, email: &str, password: &str) -> AppResult<ProviderUser> {
        if self.users.contains_key(&email.to_lowercase()) {
            return Err(AppError::new(ErrorCode::EmailExists).with_detail("email", email));
        }
        self.insert_user(&new_id(), email, password)
    }

    async fn set_password(&self, email: &str, password: &str) -> AppResult<()> {
        let password_hash = hash_password(password)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;
        let mut record = self
            .users
            .get_mut(&email.to_lowercase())
            .ok_or_else(|| AppError::new(ErrorCode::AccountNotFound).with_detail("email", email))?;
        record.password_hash = password_hash;
        Ok(())
    }

    async fn user_exists(&self, email: &str) -> AppResult<bool> {
        Ok(self.users.contains_key(&email.to_lowercase()))
    }
}
