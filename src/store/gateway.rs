use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::common::Identity;

use super::{
    AuthCredential, CollectionSubscription, Document, DocumentSubscription, RealtimeStore,
    StoreError, SubscriptionGuard,
};

/// Remote binding for the hosted store. Sign-in is a plain HTTP exchange
/// against the gateway's auth endpoint; all document traffic and
/// subscriptions ride a single WebSocket connection carrying tagged JSON
/// frames. The connection is established lazily on first use; a dropped
/// channel fails the in-flight operations and closes every live
/// subscription, and nothing is retried on its own.
pub struct GatewayStore {
    ws_url: String,
    http: reqwest::Client,
    session: Mutex<Option<String>>,
    connection: tokio::sync::Mutex<Option<Connection>>,
    next_request: AtomicU64,
    next_subscription: AtomicU64,
}

#[derive(Clone)]
struct Connection {
    outbound: mpsc::UnboundedSender<ClientFrame>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Result<ResultPayload, String>>>>>,
    sinks: Arc<Mutex<HashMap<u64, SnapshotSink>>>,
}

enum SnapshotSink {
    Collection(mpsc::UnboundedSender<Vec<Document>>),
    Document(mpsc::UnboundedSender<Option<Document>>),
}

#[derive(Debug)]
struct ResultPayload {
    documents: Vec<Document>,
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Get { request_id: u64, path: String },
    #[serde(rename_all = "camelCase")]
    Set {
        request_id: u64,
        path: String,
        fields: Value,
        merge: bool,
    },
    #[serde(rename_all = "camelCase")]
    Add {
        request_id: u64,
        collection: String,
        fields: Value,
    },
    #[serde(rename_all = "camelCase")]
    List { request_id: u64, collection: String },
    #[serde(rename_all = "camelCase")]
    Subscribe {
        subscription_id: u64,
        target: String,
        kind: TargetKind,
    },
    #[serde(rename_all = "camelCase")]
    Unsubscribe { subscription_id: u64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum TargetKind {
    Collection,
    Document,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Result {
        request_id: u64,
        #[serde(default)]
        documents: Vec<WireDocument>,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Error { request_id: u64, message: String },
    /// Full state of a subscribed target; zero or one document for a
    /// document target.
    #[serde(rename_all = "camelCase")]
    Snapshot {
        subscription_id: u64,
        documents: Vec<WireDocument>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireDocument {
    id: String,
    fields: Value,
}

impl From<WireDocument> for Document {
    fn from(wire: WireDocument) -> Self {
        Self {
            id: wire.id,
            fields: wire.fields,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest {
    credential: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user_id: String,
    session: String,
}

impl GatewayStore {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            http: reqwest::Client::new(),
            session: Mutex::new(None),
            connection: tokio::sync::Mutex::new(None),
            next_request: AtomicU64::new(1),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// `wss://host/path` -> `https://host/path/auth`.
    fn auth_url(&self) -> Result<String, StoreError> {
        let base = if let Some(rest) = self.ws_url.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = self.ws_url.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            return Err(StoreError::auth(format!(
                "gateway url `{}` must be ws:// or wss://",
                self.ws_url
            )));
        };
        Ok(format!("{}/auth", base.trim_end_matches('/')))
    }

    async fn ensure_connected(&self) -> Result<Connection, String> {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            if !connection.outbound.is_closed() {
                return Ok(connection.clone());
            }
        }

        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let url = match session {
            Some(session) => format!("{}?session={session}", self.ws_url),
            None => self.ws_url.clone(),
        };

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|err| format!("gateway connect failed: {err}"))?;
        log::info!("Connected to store gateway at {}", self.ws_url);

        let (mut sink, mut stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Result<ResultPayload, String>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let sinks: Arc<Mutex<HashMap<u64, SnapshotSink>>> = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        log::warn!("Failed to encode gateway frame: {err}");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_sinks = Arc::clone(&sinks);
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(err) => {
                        log::warn!("Gateway stream error: {err}");
                        break;
                    }
                };
                match message {
                    WsMessage::Text(text) => {
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(frame) => {
                                dispatch_frame(frame, &reader_pending, &reader_sinks);
                            }
                            Err(err) => log::warn!("Unparseable gateway frame: {err}"),
                        }
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }

            // Connection gone: fail in-flight requests, end every
            // subscription stream.
            let mut pending = reader_pending.lock().unwrap_or_else(PoisonError::into_inner);
            for (_, waiter) in pending.drain() {
                let _ = waiter.send(Err("gateway connection closed".to_string()));
            }
            drop(pending);
            reader_sinks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            log::warn!("Store gateway connection closed");
        });

        let connection = Connection {
            outbound,
            pending,
            sinks,
        };
        *slot = Some(connection.clone());
        Ok(connection)
    }

    async fn request(
        &self,
        make_frame: impl FnOnce(u64) -> ClientFrame,
    ) -> Result<ResultPayload, String> {
        let connection = self.ensure_connected().await?;
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (waiter, response) = oneshot::channel();
        connection
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, waiter);

        if connection.outbound.send(make_frame(request_id)).is_err() {
            connection
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            return Err("gateway connection closed".to_string());
        }

        match response.await {
            Ok(result) => result,
            Err(_) => Err("gateway connection closed".to_string()),
        }
    }

    async fn subscribe(
        &self,
        target: &str,
        kind: TargetKind,
        snapshot_sink: SnapshotSink,
    ) -> Result<SubscriptionGuard, StoreError> {
        let connection = self
            .ensure_connected()
            .await
            .map_err(StoreError::subscription)?;
        let subscription_id = self.next_subscription.fetch_add(1, Ordering::Relaxed);

        connection
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscription_id, snapshot_sink);

        connection
            .outbound
            .send(ClientFrame::Subscribe {
                subscription_id,
                target: target.to_string(),
                kind,
            })
            .map_err(|_| StoreError::subscription("gateway connection closed"))?;

        let sinks = Arc::clone(&connection.sinks);
        let outbound = connection.outbound.clone();
        let guard = SubscriptionGuard::new(move || {
            sinks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&subscription_id);
            let _ = outbound.send(ClientFrame::Unsubscribe { subscription_id });
        });
        Ok(guard)
    }
}

fn dispatch_frame(
    frame: ServerFrame,
    pending: &Arc<Mutex<HashMap<u64, oneshot::Sender<Result<ResultPayload, String>>>>>,
    sinks: &Arc<Mutex<HashMap<u64, SnapshotSink>>>,
) {
    match frame {
        ServerFrame::Result {
            request_id,
            documents,
            id,
        } => {
            let waiter = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            if let Some(waiter) = waiter {
                let payload = ResultPayload {
                    documents: documents.into_iter().map(Document::from).collect(),
                    id,
                };
                let _ = waiter.send(Ok(payload));
            }
        }
        ServerFrame::Error {
            request_id,
            message,
        } => {
            let waiter = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            if let Some(waiter) = waiter {
                let _ = waiter.send(Err(message));
            }
        }
        ServerFrame::Snapshot {
            subscription_id,
            documents,
        } => {
            let mut sinks = sinks.lock().unwrap_or_else(PoisonError::into_inner);
            let delivered = match sinks.get(&subscription_id) {
                Some(SnapshotSink::Collection(sender)) => sender
                    .send(documents.into_iter().map(Document::from).collect())
                    .is_ok(),
                Some(SnapshotSink::Document(sender)) => sender
                    .send(documents.into_iter().next().map(Document::from))
                    .is_ok(),
                None => true,
            };
            if !delivered {
                sinks.remove(&subscription_id);
            }
        }
    }
}

#[async_trait]
impl RealtimeStore for GatewayStore {
    async fn sign_in(&self, credential: AuthCredential) -> Result<Identity, StoreError> {
        let body = match credential {
            AuthCredential::Anonymous => AuthRequest {
                credential: "anonymous",
                token: None,
            },
            AuthCredential::Token(token) => AuthRequest {
                credential: "token",
                token: Some(token),
            },
        };

        let response = self
            .http
            .post(self.auth_url()?)
            .json(&body)
            .send()
            .await
            .map_err(|err| StoreError::auth(format!("auth request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(StoreError::auth(format!(
                "gateway rejected sign-in: {}",
                response.status()
            )));
        }
        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|err| StoreError::auth(format!("malformed auth response: {err}")))?;

        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(auth.session.clone());
        Ok(Identity {
            user_id: auth.user_id,
            session: auth.session,
        })
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let path = path.to_string();
        let payload = self
            .request(|request_id| ClientFrame::Get { request_id, path })
            .await
            .map_err(StoreError::read)?;
        Ok(payload.documents.into_iter().next())
    }

    async fn set_document(&self, path: &str, fields: Value, merge: bool) -> Result<(), StoreError> {
        let path = path.to_string();
        self.request(|request_id| ClientFrame::Set {
            request_id,
            path,
            fields,
            merge,
        })
        .await
        .map_err(StoreError::write)?;
        Ok(())
    }

    async fn add_document(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        let collection = collection.to_string();
        let payload = self
            .request(|request_id| ClientFrame::Add {
                request_id,
                collection,
                fields,
            })
            .await
            .map_err(StoreError::write)?;
        payload
            .id
            .ok_or_else(|| StoreError::write("gateway returned no id for added document"))
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collection = collection.to_string();
        let payload = self
            .request(|request_id| ClientFrame::List {
                request_id,
                collection,
            })
            .await
            .map_err(StoreError::read)?;
        Ok(payload.documents)
    }

    async fn subscribe_collection(
        &self,
        collection: &str,
    ) -> Result<CollectionSubscription, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let guard = self
            .subscribe(collection, TargetKind::Collection, SnapshotSink::Collection(sender))
            .await?;
        Ok(CollectionSubscription::new(receiver, guard))
    }

    async fn subscribe_document(&self, path: &str) -> Result<DocumentSubscription, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let guard = self
            .subscribe(path, TargetKind::Document, SnapshotSink::Document(sender))
            .await?;
        Ok(DocumentSubscription::new(receiver, guard))
    }
}
