use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::common::Identity;

use super::{
    AuthCredential, CollectionSubscription, Document, DocumentSubscription, RealtimeStore,
    StoreError, SubscriptionGuard, split_document_path,
};

/// In-process store used by tests and `--sandbox` runs. It mimics the hosted
/// collaborator's push model: every mutation re-delivers the full state of
/// the affected targets to all registered watchers, and a fresh subscription
/// receives the current state immediately.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    next_watcher: Arc<AtomicU64>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Value>>,
    collection_watchers: Vec<CollectionWatcher>,
    document_watchers: Vec<DocumentWatcher>,
}

struct CollectionWatcher {
    id: u64,
    collection: String,
    sender: mpsc::UnboundedSender<Vec<Document>>,
}

struct DocumentWatcher {
    id: u64,
    path: String,
    sender: mpsc::UnboundedSender<Option<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(inner: &mut Inner, collection: &str, document_path: &str) {
        let collection_snapshot = Self::snapshot_collection(&inner.collections, collection);
        inner.collection_watchers.retain(|watcher| {
            watcher.collection != collection
                || watcher.sender.send(collection_snapshot.clone()).is_ok()
        });

        let document_snapshot = Self::snapshot_document(&inner.collections, document_path);
        inner.document_watchers.retain(|watcher| {
            watcher.path != document_path
                || watcher.sender.send(document_snapshot.clone()).is_ok()
        });
    }

    fn snapshot_collection(
        collections: &HashMap<String, BTreeMap<String, Value>>,
        collection: &str,
    ) -> Vec<Document> {
        collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn snapshot_document(
        collections: &HashMap<String, BTreeMap<String, Value>>,
        path: &str,
    ) -> Option<Document> {
        let (collection, id) = path.rsplit_once('/')?;
        collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            })
    }

    fn require_object(fields: &Value) -> Result<&serde_json::Map<String, Value>, StoreError> {
        fields
            .as_object()
            .ok_or_else(|| StoreError::write("document fields must be a JSON object"))
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn sign_in(&self, credential: AuthCredential) -> Result<Identity, StoreError> {
        match credential {
            AuthCredential::Anonymous => {
                let user_id = Uuid::new_v4().to_string();
                Ok(Identity {
                    session: user_id.clone(),
                    user_id,
                })
            }
            // The sandbox treats the token it minted as the identity itself,
            // so a persisted session resolves to the same user id.
            AuthCredential::Token(token) => {
                if token.trim().is_empty() {
                    return Err(StoreError::auth("empty auth token"));
                }
                Ok(Identity {
                    user_id: token.clone(),
                    session: token,
                })
            }
        }
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        split_document_path(path)?;
        let inner = self.lock();
        Ok(Self::snapshot_document(&inner.collections, path))
    }

    async fn set_document(&self, path: &str, fields: Value, merge: bool) -> Result<(), StoreError> {
        let (collection, id) = split_document_path(path)?;
        let incoming = Self::require_object(&fields)?.clone();

        let mut inner = self.lock();
        let documents = inner.collections.entry(collection.to_string()).or_default();
        match documents.get_mut(id) {
            Some(Value::Object(existing)) if merge => {
                existing.extend(incoming);
            }
            _ => {
                documents.insert(id.to_string(), Value::Object(incoming));
            }
        }

        let collection = collection.to_string();
        Self::notify(&mut inner, &collection, path);
        Ok(())
    }

    async fn add_document(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        Self::require_object(&fields)?;
        let id = Uuid::new_v4().to_string();

        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);

        let path = format!("{collection}/{id}");
        Self::notify(&mut inner, collection, &path);
        Ok(id)
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock();
        Ok(Self::snapshot_collection(&inner.collections, collection))
    }

    async fn subscribe_collection(
        &self,
        collection: &str,
    ) -> Result<CollectionSubscription, StoreError> {
        let id = self.next_watcher.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut inner = self.lock();
        let initial = Self::snapshot_collection(&inner.collections, collection);
        sender
            .send(initial)
            .map_err(|_| StoreError::subscription("watcher channel closed at registration"))?;
        inner.collection_watchers.push(CollectionWatcher {
            id,
            collection: collection.to_string(),
            sender,
        });
        drop(inner);

        let store = Arc::clone(&self.inner);
        let guard = SubscriptionGuard::new(move || {
            let mut inner = store.lock().unwrap_or_else(PoisonError::into_inner);
            inner.collection_watchers.retain(|watcher| watcher.id != id);
        });
        Ok(CollectionSubscription::new(receiver, guard))
    }

    async fn subscribe_document(&self, path: &str) -> Result<DocumentSubscription, StoreError> {
        split_document_path(path)?;
        let id = self.next_watcher.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut inner = self.lock();
        let initial = Self::snapshot_document(&inner.collections, path);
        sender
            .send(initial)
            .map_err(|_| StoreError::subscription("watcher channel closed at registration"))?;
        inner.document_watchers.push(DocumentWatcher {
            id,
            path: path.to_string(),
            sender,
        });
        drop(inner);

        let store = Arc::clone(&self.inner);
        let guard = SubscriptionGuard::new(move || {
            let mut inner = store.lock().unwrap_or_else(PoisonError::into_inner);
            inner.document_watchers.retain(|watcher| watcher.id != id);
        });
        Ok(DocumentSubscription::new(receiver, guard))
    }
}
