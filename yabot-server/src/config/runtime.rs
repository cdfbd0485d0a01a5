//! Runtime configuration shared across request handlers.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Admin access configuration: the argon2 hash of the admin secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Verify a presented secret against the stored hash.
    pub fn verify_secret(&self, presented: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Reloadable configuration sections, each behind its own lock so a
/// SIGHUP reload swaps them independently.
#[derive(Clone)]
pub struct SharedConfig {
    pub admin: Arc<RwLock<AdminConfig>>,
    pub notifier_gateway: Arc<RwLock<Option<String>>>,
}
