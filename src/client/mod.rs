pub mod conversation;
pub mod roster;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::{ChatMessage, ClientCommand, ClientEvent, Identity, TypingSignal, UserProfile};
use crate::store::{AuthCredential, Document, RealtimeStore, StorePaths};

use session::SessionFile;

/// Everything the client task needs besides the store and its channels.
pub struct ClientSettings {
    pub paths: StorePaths,
    pub data_dir: PathBuf,
    /// Deployment-supplied token; wins over a saved session.
    pub auth_token: Option<String>,
}

/// A delivery from a live subscription, tagged with the selection generation
/// it was registered for. The loop discards stale generations, which is what
/// keeps a rapid correspondent switch from leaking the previous conversation
/// into the new one.
#[derive(Debug)]
enum SyncUpdate {
    Messages {
        generation: u64,
        documents: Vec<Document>,
    },
    Typing {
        generation: u64,
        document: Option<Document>,
    },
}

/// The background chat task: resolves identity once at startup, then serves
/// UI commands and subscription deliveries from a single select loop. All
/// store failures are logged and swallowed; the UI simply keeps its
/// last-known state.
pub struct ChatClient {
    store: Arc<dyn RealtimeStore>,
    settings: ClientSettings,
    command_receiver: mpsc::Receiver<ClientCommand>,
    event_sender: mpsc::Sender<ClientEvent>,
    sync_sender: mpsc::Sender<SyncUpdate>,
    sync_receiver: mpsc::Receiver<SyncUpdate>,
    identity: Option<Identity>,
    nickname: Option<String>,
    correspondent: Option<String>,
    generation: u64,
    subscription_tasks: Vec<JoinHandle<()>>,
}

impl ChatClient {
    pub fn new(
        store: Arc<dyn RealtimeStore>,
        settings: ClientSettings,
        command_receiver: mpsc::Receiver<ClientCommand>,
        event_sender: mpsc::Sender<ClientEvent>,
    ) -> Self {
        let (sync_sender, sync_receiver) = mpsc::channel(64);
        Self {
            store,
            settings,
            command_receiver,
            event_sender,
            sync_sender,
            sync_receiver,
            identity: None,
            nickname: None,
            correspondent: None,
            generation: 0,
            subscription_tasks: Vec::new(),
        }
    }

    pub async fn run(mut self) {
        self.start_up().await;

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                update = self.sync_receiver.recv() => {
                    if let Some(update) = update {
                        self.handle_sync_update(update).await;
                    }
                }
            }
        }

        self.teardown_subscriptions();
        log::info!("Chat client stopped");
    }

    /// Fire-once sign-in, then profile resolution. A failure here leaves the
    /// client unauthenticated for the rest of its life.
    async fn start_up(&mut self) {
        let session = SessionFile::new(&self.settings.data_dir);
        let credential = if let Some(token) = self.settings.auth_token.clone() {
            AuthCredential::Token(token)
        } else if let Some(saved) = session.load() {
            log::info!("Resuming saved session for {}", saved.user_id);
            AuthCredential::Token(saved.session)
        } else {
            AuthCredential::Anonymous
        };

        let identity = match self.store.sign_in(credential).await {
            Ok(identity) => identity,
            Err(err) => {
                log::error!("Sign-in failed: {err}");
                self.emit(ClientEvent::AuthFailed {
                    reason: err.to_string(),
                })
                .await;
                return;
            }
        };

        session.save(&identity);
        log::info!("Signed in as {}", identity.user_id);
        self.emit(ClientEvent::IdentityReady {
            user_id: identity.user_id.clone(),
        })
        .await;
        self.identity = Some(identity);

        self.load_profile().await;
    }

    async fn load_profile(&mut self) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        match self
            .store
            .get_document(&self.settings.paths.user(&user_id))
            .await
        {
            Ok(Some(document)) => match document.decode::<UserProfile>() {
                Ok(profile) => {
                    self.nickname = Some(profile.nickname.clone());
                    self.emit(ClientEvent::ProfileLoaded {
                        nickname: profile.nickname,
                    })
                    .await;
                    self.refresh_roster().await;
                }
                Err(err) => {
                    log::warn!("Unreadable own profile: {err}");
                    self.emit(ClientEvent::NicknameRequired).await;
                }
            },
            Ok(None) => self.emit(ClientEvent::NicknameRequired).await,
            Err(err) => {
                log::warn!("Profile load failed: {err}");
                self.emit(ClientEvent::NicknameRequired).await;
            }
        }
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        if self.identity.is_none() {
            log::warn!("Ignoring {command:?} while unauthenticated");
            return;
        }
        match command {
            ClientCommand::SetNickname(nickname) => self.set_nickname(nickname).await,
            ClientCommand::SelectCorrespondent(target) => self.select_correspondent(target).await,
            ClientCommand::SubmitMessage(text) => self.submit_message(text).await,
            ClientCommand::SetTyping(is_typing) => self.set_typing(is_typing).await,
            ClientCommand::RefreshRoster => self.refresh_roster().await,
        }
    }

    async fn set_nickname(&mut self, nickname: String) {
        let nickname = nickname.trim().to_string();
        if nickname.is_empty() {
            return;
        }
        let Some(user_id) = self.user_id() else {
            return;
        };

        if let Err(err) = self
            .store
            .set_document(
                &self.settings.paths.user(&user_id),
                json!({ "nickname": nickname }),
                false,
            )
            .await
        {
            log::warn!("Failed to save nickname: {err}");
            return;
        }

        self.nickname = Some(nickname.clone());
        self.emit(ClientEvent::NicknameSaved { nickname }).await;
        self.refresh_roster().await;
    }

    async fn select_correspondent(&mut self, target: Option<String>) {
        if self.nickname.is_none() {
            log::warn!("Selection ignored before onboarding completes");
            return;
        }

        // Teardown is unconditional and precedes any re-registration;
        // anything still in flight for the old pair is now a stale
        // generation.
        self.clear_conversation().await;
        let Some(target) = target else {
            return;
        };
        self.correspondent = Some(target.clone());

        let generation = self.generation;
        match self
            .store
            .subscribe_collection(&self.settings.paths.messages())
            .await
        {
            Ok(mut subscription) => {
                let sender = self.sync_sender.clone();
                self.subscription_tasks.push(tokio::spawn(async move {
                    while let Some(documents) = subscription.next().await {
                        let update = SyncUpdate::Messages {
                            generation,
                            documents,
                        };
                        if sender.send(update).await.is_err() {
                            break;
                        }
                    }
                }));
            }
            Err(err) => log::warn!("Message subscription failed: {err}"),
        }

        match self
            .store
            .subscribe_document(&self.settings.paths.typing(&target))
            .await
        {
            Ok(mut subscription) => {
                let sender = self.sync_sender.clone();
                self.subscription_tasks.push(tokio::spawn(async move {
                    while let Some(document) = subscription.next().await {
                        let update = SyncUpdate::Typing {
                            generation,
                            document,
                        };
                        if sender.send(update).await.is_err() {
                            break;
                        }
                    }
                }));
            }
            Err(err) => log::warn!("Typing subscription failed: {err}"),
        }
    }

    async fn clear_conversation(&mut self) {
        self.generation += 1;
        self.teardown_subscriptions();
        if self.correspondent.take().is_some() {
            self.emit(ClientEvent::ConversationCleared).await;
        }
    }

    fn teardown_subscriptions(&mut self) {
        for task in self.subscription_tasks.drain(..) {
            task.abort();
        }
    }

    async fn submit_message(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let Some(user_id) = self.user_id() else {
            return;
        };
        let Some(target) = self.correspondent.clone() else {
            log::warn!("No correspondent selected; dropping message");
            return;
        };

        self.set_typing(false).await;

        let fields = json!({
            "senderId": user_id,
            "receiverId": target,
            "text": text,
            "timestamp": Utc::now().timestamp_millis(),
        });
        match self
            .store
            .add_document(&self.settings.paths.messages(), fields)
            .await
        {
            Ok(id) => log::debug!("Message {id} sent"),
            Err(err) => log::warn!("Failed to send message: {err}"),
        }
    }

    async fn set_typing(&mut self, is_typing: bool) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        if self.correspondent.is_none() {
            return;
        }

        let fields = json!({ "userId": user_id, "isTyping": is_typing });
        if let Err(err) = self
            .store
            .set_document(&self.settings.paths.typing(&user_id), fields, true)
            .await
        {
            log::warn!("Failed to update typing signal: {err}");
        }
    }

    async fn refresh_roster(&mut self) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        match roster::build(self.store.as_ref(), &self.settings.paths, &user_id).await {
            Ok(entries) => self.emit(ClientEvent::RosterUpdated(entries)).await,
            Err(err) => log::warn!("Roster rebuild failed: {err}"),
        }
    }

    async fn handle_sync_update(&mut self, update: SyncUpdate) {
        match update {
            SyncUpdate::Messages {
                generation,
                documents,
            } => {
                if generation != self.generation {
                    return;
                }
                let (Some(user_id), Some(target)) = (self.user_id(), self.correspondent.clone())
                else {
                    return;
                };

                let mut all = Vec::with_capacity(documents.len());
                for document in documents {
                    match document.decode::<ChatMessage>() {
                        Ok(mut message) => {
                            message.id = document.id;
                            all.push(message);
                        }
                        Err(err) => log::debug!("Skipping unreadable message document: {err}"),
                    }
                }
                let view = conversation::conversation_view(&all, &user_id, &target);
                self.emit(ClientEvent::ConversationUpdated {
                    correspondent: target.clone(),
                    messages: view,
                })
                .await;

                // The correspondent's display name is re-resolved on every
                // message delta, not only on selection, matching the
                // system this replaces.
                let nickname =
                    roster::resolve_nickname(self.store.as_ref(), &self.settings.paths, &target)
                        .await;
                self.emit(ClientEvent::CorrespondentResolved {
                    user_id: target,
                    nickname,
                })
                .await;
            }
            SyncUpdate::Typing {
                generation,
                document,
            } => {
                if generation != self.generation {
                    return;
                }
                let Some(user_id) = self.user_id() else {
                    return;
                };

                let signal = document.and_then(|document| {
                    match document.decode::<TypingSignal>() {
                        Ok(signal) => Some(signal),
                        Err(err) => {
                            log::debug!("Unreadable typing document: {err}");
                            None
                        }
                    }
                });
                let indicator = conversation::typing_indicator(signal.as_ref(), &user_id);
                self.emit(ClientEvent::TypingChanged(indicator)).await;
            }
        }
    }

    fn user_id(&self) -> Option<String> {
        self.identity
            .as_ref()
            .map(|identity| identity.user_id.clone())
    }

    async fn emit(&self, event: ClientEvent) {
        if self.event_sender.send(event).await.is_err() {
            log::debug!("UI event channel closed");
        }
    }
}
