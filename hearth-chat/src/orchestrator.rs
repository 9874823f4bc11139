//! The generation orchestrator.
//!
//! Turns a user message into a cancellable, incrementally updated assistant
//! reply. The model runtime is a single shared resource, so at most one
//! generation is active across all conversations: every send preempts the
//! previous generation, and a preempted task can no longer write to any
//! message once a newer handle has replaced its own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use hearth_common::HearthError;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ChatConfig;
use crate::history;
use crate::metrics::MetricsCollector;
use crate::registry::{ModelCapabilities, ModelRegistry};
use crate::runtime::{ModelRuntime, RuntimeWorker};
use crate::storage::{ConversationStore, FileConversationStore};
use crate::types::{
    Attachment, ChatError, Conversation, ConversationId, FinishReason, GenerationId,
    GenerationMetrics, GenerationRequest, Message, MessageId, DEFAULT_TITLE,
};

const EVENT_CAPACITY: usize = 256;

/// Something the user should be told about a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Images were removed because the loaded model cannot read them.
    AttachmentsDropped { count: usize, model: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::AttachmentsDropped { count, model } => write!(
                f,
                "{} doesn't support images; {} attachment(s) were not sent",
                model, count
            ),
        }
    }
}

/// Outcome of a successful [`GenerationOrchestrator::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub user_message_id: MessageId,
    pub assistant_message_id: MessageId,
    pub generation_id: GenerationId,
    pub notices: Vec<Notice>,
}

/// The generation currently owning the model runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActiveGeneration {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub generation_id: GenerationId,
}

/// Changes observable by a UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    GenerationStarted(ActiveGeneration),
    MessageUpdated {
        conversation_id: ConversationId,
        message_id: MessageId,
        content: String,
    },
    GenerationFinished {
        generation: ActiveGeneration,
        reason: FinishReason,
        metrics: GenerationMetrics,
    },
    Notice(String),
    ConversationsChanged,
}

struct GenerationHandle {
    target: ActiveGeneration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct ChatState {
    conversations: HashMap<ConversationId, Conversation>,
    active: Option<GenerationHandle>,
    /// Why each preempted generation lost the runtime, until it finalizes.
    preempted: HashMap<GenerationId, FinishReason>,
    is_generating: bool,
    last_error: Option<String>,
    selected: Option<ConversationId>,
}

impl ChatState {
    fn conversation_mut(&mut self, id: &ConversationId) -> Result<&mut Conversation, ChatError> {
        self.conversations
            .get_mut(id)
            .ok_or(ChatError::ConversationNotFound(*id))
    }

    fn owns_runtime(&self, target: &ActiveGeneration) -> bool {
        self.active
            .as_ref()
            .is_some_and(|handle| handle.target.generation_id == target.generation_id)
    }
}

struct Inner {
    config: ChatConfig,
    registry: ModelRegistry,
    worker: RuntimeWorker,
    store: Arc<dyn ConversationStore>,
    state: RwLock<ChatState>,
    persist_lock: Mutex<()>,
    events: broadcast::Sender<ChatEvent>,
}

impl Inner {
    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Save the latest in-memory state of a conversation. Saves and deletes
    /// are serialized on `persist_lock`, so a deleted conversation is never
    /// written back and an older snapshot never replaces a newer one.
    async fn persist(&self, id: &ConversationId) {
        let _guard = self.persist_lock.lock().await;
        let Some(conversation) = self.state.read().await.conversations.get(id).cloned() else {
            debug!("Conversation {} is gone, not persisting", id);
            return;
        };
        if let Err(e) = self.store.save(&conversation).await {
            warn!("Failed to persist conversation {}: {}", id, e);
        }
    }

    /// Cancel the active generation, if any. Caller holds the state lock.
    fn preempt_locked(
        &self,
        state: &mut ChatState,
        reason: FinishReason,
    ) -> Option<ActiveGeneration> {
        let handle = state.active.take()?;
        state.is_generating = false;
        state.preempted.insert(handle.target.generation_id, reason);
        handle.cancel.cancel();
        self.worker.cancel_current();
        info!(
            "Preempted generation {} in conversation {}",
            handle.target.generation_id, handle.target.conversation_id
        );
        Some(handle.target)
    }
}

/// Owns conversations and the single in-flight generation.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    inner: Arc<Inner>,
}

impl GenerationOrchestrator {
    /// Create an orchestrator and spawn its runtime worker. Must be called
    /// inside a Tokio runtime.
    pub fn new(
        config: ChatConfig,
        registry: ModelRegistry,
        runtime: Arc<dyn ModelRuntime>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        let worker = RuntimeWorker::spawn(runtime, &config.worker);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                worker,
                store,
                state: RwLock::new(ChatState::default()),
                persist_lock: Mutex::new(()),
                events,
            }),
        }
    }

    /// Like [`GenerationOrchestrator::new`], storing conversations under
    /// `config.storage.conversations_dir`.
    pub fn with_file_store(
        config: ChatConfig,
        registry: ModelRegistry,
        runtime: Arc<dyn ModelRuntime>,
    ) -> Self {
        let store = Arc::new(FileConversationStore::new(
            config.storage.conversations_dir.clone(),
        ));
        Self::new(config, registry, runtime, store)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.events.subscribe()
    }

    /// Load every stored conversation. Unreadable entries are skipped.
    pub async fn restore(&self) -> usize {
        let conversations = match self.inner.store.load_all().await {
            Ok(conversations) => conversations,
            Err(e) => {
                warn!("Failed to restore conversations: {}", e);
                return 0;
            }
        };

        let count = conversations.len();
        {
            let mut state = self.inner.state.write().await;
            for conversation in conversations {
                state.conversations.insert(conversation.id, conversation);
            }
        }
        info!("Restored {} conversations", count);
        self.inner.emit(ChatEvent::ConversationsChanged);
        count
    }

    /// Load a model from the registry through the runtime worker.
    pub async fn load_model(&self, model_id: &str) -> Result<(), ChatError> {
        let model = self.inner.registry.resolve(model_id)?.clone();
        {
            let mut state = self.inner.state.write().await;
            self.inner.preempt_locked(&mut state, FinishReason::Cancelled);
        }

        match self.inner.worker.load(&model).await {
            Ok(()) => {
                info!("Model {} ready", model.display_name);
                Ok(())
            }
            Err(e) => {
                self.report(&e).await;
                Err(e.into())
            }
        }
    }

    /// Capabilities of the model the runtime currently holds.
    pub fn current_model(&self) -> Result<ModelCapabilities, ChatError> {
        let id = self
            .inner
            .worker
            .loaded_model()
            .ok_or(ChatError::ModelNotLoaded)?;
        self.inner.registry.resolve(&id).cloned()
    }

    pub async fn create_conversation(&self, title: Option<&str>) -> ConversationId {
        let title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_TITLE);
        let conversation = Conversation::new(title, self.inner.worker.loaded_model());
        let id = conversation.id;

        {
            let mut state = self.inner.state.write().await;
            state.conversations.insert(id, conversation);
            state.selected.get_or_insert(id);
        }
        debug!("Created conversation {}", id);
        self.inner.persist(&id).await;
        self.inner.emit(ChatEvent::ConversationsChanged);
        id
    }

    /// Delete a conversation, cancelling its generation first if it has one.
    pub async fn delete_conversation(&self, id: &ConversationId) -> Result<(), ChatError> {
        {
            let mut state = self.inner.state.write().await;
            if !state.conversations.contains_key(id) {
                return Err(ChatError::ConversationNotFound(*id));
            }
            let targets_deleted = state
                .active
                .as_ref()
                .is_some_and(|handle| handle.target.conversation_id == *id);
            if targets_deleted {
                self.inner.preempt_locked(&mut state, FinishReason::Cancelled);
            }
            state.conversations.remove(id);
            if state.selected == Some(*id) {
                state.selected = None;
            }
        }

        {
            let _guard = self.inner.persist_lock.lock().await;
            if let Err(e) = self.inner.store.delete(id).await {
                warn!("Failed to delete stored conversation {}: {}", id, e);
            }
        }
        info!("Deleted conversation {}", id);
        self.inner.emit(ChatEvent::ConversationsChanged);
        Ok(())
    }

    pub async fn rename_conversation(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), ChatError> {
        {
            let mut state = self.inner.state.write().await;
            let conversation = state.conversation_mut(id)?;
            conversation.title = match title.trim() {
                "" => DEFAULT_TITLE.to_string(),
                title => title.to_string(),
            };
        }
        self.inner.persist(id).await;
        self.inner.emit(ChatEvent::ConversationsChanged);
        Ok(())
    }

    /// Switch the selected conversation. A running generation keeps going in
    /// the background, bound to its own conversation.
    pub async fn select_conversation(&self, id: &ConversationId) -> Result<(), ChatError> {
        let mut state = self.inner.state.write().await;
        if !state.conversations.contains_key(id) {
            return Err(ChatError::ConversationNotFound(*id));
        }
        state.selected = Some(*id);
        Ok(())
    }

    pub async fn selected_conversation(&self) -> Option<ConversationId> {
        self.inner.state.read().await.selected
    }

    /// All conversations, most recently updated first.
    pub async fn conversations(&self) -> Vec<Conversation> {
        let state = self.inner.state.read().await;
        let mut conversations: Vec<_> = state.conversations.values().cloned().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    pub async fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.inner.state.read().await.conversations.get(id).cloned()
    }

    pub async fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, ChatError> {
        self.inner
            .state
            .read()
            .await
            .conversations
            .get(id)
            .map(|conversation| conversation.messages.clone())
            .ok_or(ChatError::ConversationNotFound(*id))
    }

    pub async fn is_generating(&self) -> bool {
        self.inner.state.read().await.is_generating
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.state.read().await.last_error.clone()
    }

    pub async fn active_generation(&self) -> Option<ActiveGeneration> {
        self.inner
            .state
            .read()
            .await
            .active
            .as_ref()
            .map(|handle| handle.target)
    }

    /// Surface an error to the user through `last_error` and a notice.
    async fn report(&self, err: &impl HearthError) {
        warn!(
            "{} [{}/{}]",
            err,
            err.category().as_str(),
            err.error_code()
        );
        let message = err.user_friendly_message();
        self.inner.state.write().await.last_error = Some(message.clone());
        self.inner.emit(ChatEvent::Notice(message));
    }

    /// Append a user message and start generating the reply.
    ///
    /// Any active generation, in any conversation, is cancelled first. The
    /// call returns once the generation task is scheduled.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SendReceipt, ChatError> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.conversation(conversation_id).await.is_none() {
            return Err(ChatError::ConversationNotFound(*conversation_id));
        }

        let model = match self.current_model() {
            Ok(model) => model,
            Err(e) => {
                debug!("Cannot send to conversation {}", conversation_id);
                self.report(&e).await;
                return Err(e);
            }
        };

        let mut notices = Vec::new();
        let attachments = if model.supports_images {
            attachments
        } else {
            let (dropped, kept): (Vec<_>, Vec<_>) =
                attachments.into_iter().partition(Attachment::is_image);
            if !dropped.is_empty() {
                if text.trim().is_empty() && kept.is_empty() {
                    let e = ChatError::AttachmentUnsupported {
                        model: model.display_name.clone(),
                        dropped: dropped.len(),
                    };
                    self.report(&e).await;
                    return Err(e);
                }
                notices.push(Notice::AttachmentsDropped {
                    count: dropped.len(),
                    model: model.display_name.clone(),
                });
            }
            kept
        };

        let user_message = Message::user(text).with_attachments(attachments);
        let user_message_id = user_message.id;
        {
            let mut state = self.inner.state.write().await;
            self.inner.preempt_locked(&mut state, FinishReason::Superseded);
            let conversation = state.conversation_mut(conversation_id)?;
            conversation.append(user_message);
            if conversation.model_id.is_none() {
                conversation.model_id = Some(model.id.clone());
            }
            state.last_error = notices.first().map(ToString::to_string);
        }
        self.inner.persist(conversation_id).await;
        for notice in &notices {
            warn!("Conversation {}: {}", conversation_id, notice);
            self.inner.emit(ChatEvent::Notice(notice.to_string()));
        }
        self.inner.emit(ChatEvent::ConversationsChanged);

        let target = {
            let mut state = self.inner.state.write().await;
            // Another send may have started while the user message was saved.
            self.inner.preempt_locked(&mut state, FinishReason::Superseded);

            let conversation = state.conversation_mut(conversation_id)?;
            let history = conversation.messages.clone();
            let message_id = conversation.append(Message::assistant_placeholder());
            let target = ActiveGeneration {
                conversation_id: *conversation_id,
                message_id,
                generation_id: GenerationId::new(),
            };

            let cancel = CancellationToken::new();
            let task = tokio::spawn(run_generation(
                self.inner.clone(),
                target,
                cancel.clone(),
                history,
                model,
            ));
            state.active = Some(GenerationHandle {
                target,
                cancel,
                task: Some(task),
            });
            state.is_generating = true;
            target
        };

        info!(
            "Started generation {} for conversation {}",
            target.generation_id, target.conversation_id
        );
        self.inner.emit(ChatEvent::GenerationStarted(target));

        Ok(SendReceipt {
            user_message_id,
            assistant_message_id: target.message_id,
            generation_id: target.generation_id,
            notices,
        })
    }

    /// Cancel the active generation, if any.
    ///
    /// This only signals: the generation task observes cancellation at its
    /// next checkpoint and finalizes the message itself.
    pub async fn cancel_generation(&self) -> bool {
        let mut state = self.inner.state.write().await;
        self.inner.preempt_locked(&mut state, FinishReason::Cancelled).is_some()
    }

    /// Cancel the active generation and wait for its task to finish.
    pub async fn shutdown(&self) {
        let task = {
            let mut state = self.inner.state.write().await;
            let task = state
                .active
                .as_mut()
                .and_then(|handle| handle.task.take());
            self.inner.preempt_locked(&mut state, FinishReason::Cancelled);
            task
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Generation task failed during shutdown: {}", e);
            }
        }
        info!("Orchestrator shut down");
    }
}

/// Body of the spawned generation task.
async fn run_generation(
    inner: Arc<Inner>,
    target: ActiveGeneration,
    cancel: CancellationToken,
    history: Vec<Message>,
    model: ModelCapabilities,
) {
    let mut collector = MetricsCollector::start();
    let mut full_response = String::new();
    let mut previous_len = 0usize;

    let history_config = inner.config.history.clone();
    let turns = tokio::task::spawn_blocking(move || {
        history::build_turns(&history, &model, &history_config)
    })
    .await;

    let reason = match turns {
        Err(e) => {
            error!("Failed to build prompt for {}: {}", target.generation_id, e);
            FinishReason::Failed(e.to_string())
        }
        Ok(turns) => {
            let generation = &inner.config.generation;
            let mut request = GenerationRequest::new(inner.config.system_prompt.clone(), turns)
                .with_max_tokens(generation.max_tokens)
                .with_temperature(generation.temperature)
                .with_top_p(generation.top_p);
            request.generation_id = target.generation_id;

            match inner.worker.submit(request, cancel.clone()) {
                Err(e) => {
                    error!("Failed to submit generation {}: {}", target.generation_id, e);
                    FinishReason::Failed(e.to_string())
                }
                Ok(mut chunks) => loop {
                    let item = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break stale_reason(&inner, &target).await,
                        item = chunks.recv() => item,
                    };

                    let chunk = match item {
                        Some(Ok(chunk)) => chunk,
                        Some(Err(e)) => {
                            error!("Generation {} failed: {}", target.generation_id, e);
                            break FinishReason::Failed(e.to_string());
                        }
                        None => break FinishReason::Failed("stream closed".to_string()),
                    };

                    collector.record_tokens(chunk.token_count);

                    let Some(new_text) = chunk.text.get(previous_len..).filter(|t| !t.is_empty())
                    else {
                        if let Some(reason) = chunk.finish_reason {
                            break reason;
                        }
                        continue;
                    };

                    let written = {
                        let mut state = inner.state.write().await;
                        if !state.owns_runtime(&target) || cancel.is_cancelled() {
                            None
                        } else if let Some(message) = state
                            .conversations
                            .get_mut(&target.conversation_id)
                            .and_then(|c| c.message_mut(&target.message_id))
                        {
                            full_response.push_str(new_text);
                            message.content.clone_from(&full_response);
                            Some(full_response.clone())
                        } else {
                            None
                        }
                    };

                    let Some(content) = written else {
                        debug!("Generation {} is stale, stopping", target.generation_id);
                        break stale_reason(&inner, &target).await;
                    };
                    previous_len = chunk.text.len();
                    inner.emit(ChatEvent::MessageUpdated {
                        conversation_id: target.conversation_id,
                        message_id: target.message_id,
                        content,
                    });

                    if chunk.is_complete {
                        break chunk.finish_reason.unwrap_or(FinishReason::Completed);
                    }
                },
            }
        }
    };

    finalize(&inner, target, reason, full_response, collector).await;
}

/// Why a generation lost the runtime.
async fn stale_reason(inner: &Inner, target: &ActiveGeneration) -> FinishReason {
    inner
        .state
        .read()
        .await
        .preempted
        .get(&target.generation_id)
        .cloned()
        .unwrap_or(FinishReason::Cancelled)
}

async fn finalize(
    inner: &Inner,
    target: ActiveGeneration,
    reason: FinishReason,
    full_response: String,
    collector: MetricsCollector,
) {
    let metrics = collector.finish();
    let content = if full_response.is_empty() && !reason.is_cancelled() {
        inner.config.fallback_message.clone()
    } else {
        full_response
    };

    {
        let mut state = inner.state.write().await;
        state.preempted.remove(&target.generation_id);
        let owned = state.owns_runtime(&target);
        if owned {
            state.active = None;
            state.is_generating = false;
            if let FinishReason::Failed(detail) = &reason {
                state.last_error = Some(format!("Generation failed: {}", detail));
            }
        }

        if let Some(message) = state
            .conversations
            .get_mut(&target.conversation_id)
            .and_then(|conversation| conversation.message_mut(&target.message_id))
        {
            message.content.clone_from(&content);
            message.metrics = Some(metrics.clone());
        }
    }

    info!(
        "Generation {} finished: {:?}, {} tokens",
        target.generation_id,
        reason,
        collector.token_count()
    );
    inner.emit(ChatEvent::MessageUpdated {
        conversation_id: target.conversation_id,
        message_id: target.message_id,
        content,
    });
    inner.persist(&target.conversation_id).await;
    inner.emit(ChatEvent::GenerationFinished {
        generation: target,
        reason,
        metrics,
    });
}
