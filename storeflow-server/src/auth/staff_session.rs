//! Local staff sessions
//!
//! Staff accounts have no provider credential. A successful staff login
//! persists a signed token in local session storage; the session resolver
//! treats a valid token like a provider session. The last selected store is
//! kept in the same storage so admins without a bound store land back where
//! they were.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, Role};

pub const STAFF_SESSION_KEY: &str = "staffSession";
pub const SELECTED_STORE_KEY: &str = "selectedStoreId";

const STAFF_SESSION_TTL_DAYS: i64 = 30;

/// Key/value persistence for client-side session data
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
}

#[derive(Default)]
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON file backed storage (`<dir>/session.json`)
pub struct FileSessionStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileSessionStorage {
    pub fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::internal(format!("Failed to create {}: {e}", dir.display())))?;
        let path = dir.join("session.json");
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Corrupt session file, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> AppResult<()> {
        let text = serde_json::to_string_pretty(entries)
            .map_err(|e| AppError::internal(e.to_string()))?;
        std::fs::write(&self.path, text)
            .map_err(|e| AppError::internal(format!("Failed to write session file: {e}")))
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StaffClaims {
    /// Account document id
    sub: String,
    store_id: String,
    username: String,
    role: Role,
    exp: usize,
    iat: usize,
}

/// Decoded staff session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffSession {
    pub account_id: String,
    pub tenant_id: String,
    pub username: String,
    pub role_hint: Role,
}

pub struct StaffSessionStore {
    storage: Arc<dyn SessionStorage>,
    secret: String,
}

impl StaffSessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, secret: impl Into<String>) -> Self {
        Self {
            storage,
            secret: secret.into(),
        }
    }

    /// Persist a session for a staff account
    pub fn save(&self, account: &Account) -> AppResult<StaffSession> {
        let tenant_id = account
            .store_id
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotSelected))?;
        let now = chrono::Utc::now();
        let claims = StaffClaims {
            sub: account.id.clone(),
            store_id: tenant_id.clone(),
            username: account.username.clone(),
            role: account.role,
            exp: (now + chrono::Duration::days(STAFF_SESSION_TTL_DAYS)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("Failed to sign staff session: {e}")))?;
        self.storage.set(STAFF_SESSION_KEY, &token)?;

        Ok(StaffSession {
            account_id: claims.sub,
            tenant_id,
            username: claims.username,
            role_hint: claims.role,
        })
    }

    /// Load the persisted session. An unreadable, expired or tampered token
    /// is removed and treated as absent.
    pub fn load(&self) -> Option<StaffSession> {
        let token = self.storage.get(STAFF_SESSION_KEY)?;
        let decoded = jsonwebtoken::decode::<StaffClaims>(
            &token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        );
        match decoded {
            Ok(data) => Some(StaffSession {
                account_id: data.claims.sub,
                tenant_id: data.claims.store_id,
                username: data.claims.username,
                role_hint: data.claims.role,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding invalid staff session");
                if let Err(e) = self.clear() {
                    tracing::warn!(error = %e, "Failed to clear staff session");
                }
                None
            }
        }
    }

    pub fn clear(&self) -> AppResult<()> {
        self.storage.remove(STAFF_SESSION_KEY)
    }

    pub fn last_tenant(&self) -> Option<String> {
        self.storage
            .get(SELECTED_STORE_KEY)
            .filter(|s| !s.is_empty())
    }

    pub fn set_last_tenant(&self, tenant_id: &str) -> AppResult<()> {
        self.storage.set(SELECTED_STORE_KEY, tenant_id)
    }

    pub fn clear_last_tenant(&self) -> AppResult<()> {
        self.storage.remove(SELECTED_STORE_KEY)
    }
}
