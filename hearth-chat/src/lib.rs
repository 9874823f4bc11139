//! # Hearth Chat
//!
//! The generation-orchestration core of an on-device chat assistant.
//!
//! A [`GenerationOrchestrator`] turns a user message into a streaming,
//! cancellable assistant reply. It drives a single [`ModelRuntime`] through
//! one [`RuntimeWorker`], so at most one generation runs at a time, and a
//! new message always preempts the previous generation.
//!
//! ```rust,no_run
//! use hearth_chat::{
//!     ChatConfig, GenerationOrchestrator, MemoryConversationStore, ModelRegistry, Script,
//!     ScriptedRuntime,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), hearth_chat::ChatError> {
//! let runtime = Arc::new(ScriptedRuntime::new(Script::tokens(["Hi", " there"])));
//! let chat = GenerationOrchestrator::new(
//!     ChatConfig::default(),
//!     ModelRegistry::builtin(),
//!     runtime,
//!     Arc::new(MemoryConversationStore::new()),
//! );
//! chat.load_model("llama-3.2-1b").await?;
//! let conversation = chat.create_conversation(None).await;
//! chat.send_message(&conversation, "Hello", Vec::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod history;
pub mod latch;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod runtime;
pub mod stopper;
pub mod storage;
pub mod types;

pub use config::ChatConfig;
pub use latch::FinishOnce;
pub use metrics::MetricsCollector;
pub use orchestrator::{ActiveGeneration, ChatEvent, GenerationOrchestrator, Notice, SendReceipt};
pub use registry::{ModelCapabilities, ModelClass, ModelRegistry};
pub use runtime::{ModelRuntime, RuntimeWorker, Script, ScriptedRuntime};
pub use storage::{ConversationStore, FileConversationStore, MemoryConversationStore};
pub use types::*;
