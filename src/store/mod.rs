pub mod error;
pub mod gateway;
pub mod memory;

pub use error::StoreError;
pub use gateway::GatewayStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::common::Identity;

/// A schemaless store document: its id within the collection plus a JSON
/// object of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.fields.clone())
            .map_err(|err| StoreError::read(format!("malformed document `{}`: {err}", self.id)))
    }
}

/// Credential handed to the auth endpoint during the fire-once startup
/// sign-in.
#[derive(Debug, Clone)]
pub enum AuthCredential {
    Anonymous,
    Token(String),
}

/// Builds the logical paths of the deployment namespace.
#[derive(Debug, Clone)]
pub struct StorePaths {
    app_id: String,
}

impl StorePaths {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }

    pub fn messages(&self) -> String {
        format!("apps/{}/messages", self.app_id)
    }

    pub fn user(&self, user_id: &str) -> String {
        format!("apps/{}/users/{user_id}", self.app_id)
    }

    pub fn typing(&self, user_id: &str) -> String {
        format!("apps/{}/typing/{user_id}", self.app_id)
    }
}

/// Runs its cleanup exactly once, when the owning subscription is dropped.
pub struct SubscriptionGuard(Option<Box<dyn FnOnce() + Send>>);

impl SubscriptionGuard {
    pub fn new(cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup();
        }
    }
}

/// Live view of a whole collection. The store re-delivers the full document
/// list on every change, starting with the state at registration time.
/// Dropping the subscription cancels it.
pub struct CollectionSubscription {
    receiver: mpsc::UnboundedReceiver<Vec<Document>>,
    _guard: SubscriptionGuard,
}

impl CollectionSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<Vec<Document>>, guard: SubscriptionGuard) -> Self {
        Self {
            receiver,
            _guard: guard,
        }
    }

    /// `None` once the push channel is gone.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        self.receiver.recv().await
    }
}

/// Live view of a single document, `None` while it does not exist.
pub struct DocumentSubscription {
    receiver: mpsc::UnboundedReceiver<Option<Document>>,
    _guard: SubscriptionGuard,
}

impl DocumentSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Option<Document>>,
        guard: SubscriptionGuard,
    ) -> Self {
        Self {
            receiver,
            _guard: guard,
        }
    }

    pub async fn next(&mut self) -> Option<Option<Document>> {
        self.receiver.recv().await
    }
}

/// The hosted realtime document store, reduced to the three capabilities the
/// client needs: auth, one-shot document access, and push subscriptions.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    async fn sign_in(&self, credential: AuthCredential) -> Result<Identity, StoreError>;

    /// `path` is `collection/id`; returns `None` for a missing document.
    async fn get_document(&self, path: &str) -> Result<Option<Document>, StoreError>;

    /// Creates or overwrites the document; with `merge` the given fields are
    /// folded into whatever already exists.
    async fn set_document(&self, path: &str, fields: Value, merge: bool) -> Result<(), StoreError>;

    /// Appends a document with a store-assigned id and returns that id.
    async fn add_document(&self, collection: &str, fields: Value) -> Result<String, StoreError>;

    /// One-shot snapshot of a collection, no filtering or pagination.
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn subscribe_collection(
        &self,
        collection: &str,
    ) -> Result<CollectionSubscription, StoreError>;

    async fn subscribe_document(&self, path: &str) -> Result<DocumentSubscription, StoreError>;
}

/// Splits `collection/id`, where the collection part may itself contain
/// slashes.
pub(crate) fn split_document_path(path: &str) -> Result<(&str, &str), StoreError> {
    match path.rsplit_once('/') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() => Ok((collection, id)),
        _ => Err(StoreError::read(format!("invalid document path `{path}`"))),
    }
}
