use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::ClientError,
    transport::{ApiRequest, StoreTransport},
};

/// Key under which the login flow stores the credential blob.
pub const CREDENTIALS_KEY: &str = "credentials";

/// Store credentials, immutable for the lifetime of a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    Basic {
        base_url: String,
        username: String,
        password: String,
    },
    /// Public API variant authenticated with a consumer key pair.
    ConsumerKey {
        base_url: String,
        consumer_key: String,
        consumer_secret: String,
    },
}

impl Credentials {
    pub fn basic(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Basic {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            Self::Basic { base_url, .. } | Self::ConsumerKey { base_url, .. } => base_url,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ClientError> {
        serde_json::from_str(raw)
            .map_err(|err| ClientError::Credentials(format!("stored credentials are invalid: {err}")))
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic {
                base_url, username, ..
            } => f
                .debug_struct("Basic")
                .field("base_url", base_url)
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::ConsumerKey { base_url, .. } => f
                .debug_struct("ConsumerKey")
                .field("base_url", base_url)
                .field("consumer_key", &"<redacted>")
                .field("consumer_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Platform secure key-value storage (keychain, keystore, encrypted file).
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySecureStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn load_credentials(&self) -> Result<Credentials, ClientError>;
}

/// Reads the JSON credential blob written by sign-in.
pub struct StoredCredentialProvider {
    store: Arc<dyn SecureStore>,
}

impl StoredCredentialProvider {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialProvider for StoredCredentialProvider {
    async fn load_credentials(&self) -> Result<Credentials, ClientError> {
        let raw = self
            .store
            .get_item(CREDENTIALS_KEY)
            .await
            .map_err(|err| ClientError::Credentials(format!("secure store read failed: {err}")))?
            .ok_or_else(|| ClientError::Credentials("not signed in".to_string()))?;
        Credentials::from_json(&raw)
    }
}

#[async_trait]
impl CredentialProvider for Credentials {
    async fn load_credentials(&self) -> Result<Credentials, ClientError> {
        Ok(self.clone())
    }
}

/// Verifies `credentials` with an authenticated probe request and, when the
/// store accepts them, persists them for later sessions.
///
/// `transport` must already be bound to `credentials`.
pub async fn sign_in(
    transport: &dyn StoreTransport,
    store: &dyn SecureStore,
    credentials: &Credentials,
    probe_path: &str,
) -> Result<(), ClientError> {
    let response = transport.send(ApiRequest::get(probe_path)).await?;
    if !response.is_success() {
        let error = shared::error::ApiError::from_body(&response.body);
        warn!(
            status = response.status,
            base_url = credentials.base_url(),
            "sign-in rejected by store"
        );
        return Err(ClientError::ApiClient {
            status: response.status,
            error,
        });
    }

    let raw = serde_json::to_string(credentials)?;
    store
        .set_item(CREDENTIALS_KEY, &raw)
        .await
        .map_err(|err| ClientError::Credentials(format!("secure store write failed: {err}")))?;
    info!(base_url = credentials.base_url(), "signed in");
    Ok(())
}

#[cfg(test)]
#[path = "tests/credentials_tests.rs"]
mod tests;
