use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::Storage;
use tokio::sync::Mutex;

/// Slot holding at most one opaque session token. The core never inspects
/// token contents; it only attaches them to outgoing requests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn set(&self, token: &str) -> Result<()>;
    async fn get(&self) -> Result<Option<String>>;
    async fn clear(&self) -> Result<()>;
}

/// Process-local credential slot. Constructed fresh per test; also the
/// fallback when no durable storage is configured.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn set(&self, token: &str) -> Result<()> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn get(&self) -> Result<Option<String>> {
        Ok(self.token.lock().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.lock().await = None;
        Ok(())
    }
}

/// Sqlite-persisted credential slot; the token survives process restarts.
pub struct DurableCredentialStore {
    store: Storage,
}

impl DurableCredentialStore {
    pub async fn initialize(database_url: &str) -> Result<Arc<Self>> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize credential storage at '{database_url}'"))?;
        Ok(Arc::new(Self { store }))
    }
}

#[async_trait]
impl CredentialStore for DurableCredentialStore {
    async fn set(&self, token: &str) -> Result<()> {
        self.store.set_session_token(token).await
    }

    async fn get(&self) -> Result<Option<String>> {
        self.store.session_token().await
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear_session_token().await
    }
}
