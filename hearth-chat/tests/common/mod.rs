//! Shared helpers for the integration tests.

#![allow(dead_code)]

use hearth_chat::{
    ChatConfig, ChatEvent, ConversationStore, FinishReason, GenerationId, GenerationMetrics,
    GenerationOrchestrator, MemoryConversationStore, ModelRegistry, Script, ScriptedRuntime,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const TEXT_MODEL: &str = "llama-3.2-1b";
pub const VISION_MODEL: &str = "qwen2-vl-2b";
pub const WAIT: Duration = Duration::from_secs(10);

pub struct Harness {
    pub chat: GenerationOrchestrator,
    pub runtime: Arc<ScriptedRuntime>,
    pub events: broadcast::Receiver<ChatEvent>,
}

pub async fn harness(script: Script, model: &str) -> Harness {
    harness_with_store(script, Some(model), Arc::new(MemoryConversationStore::new())).await
}

pub async fn harness_with_store(
    script: Script,
    model: Option<&str>,
    store: Arc<dyn ConversationStore>,
) -> Harness {
    let runtime = Arc::new(ScriptedRuntime::new(script));
    let chat = GenerationOrchestrator::new(
        ChatConfig::default(),
        ModelRegistry::builtin(),
        runtime.clone(),
        store,
    );
    let events = chat.subscribe();
    if let Some(model) = model {
        chat.load_model(model).await.unwrap();
    }
    Harness {
        chat,
        runtime,
        events,
    }
}

/// Wait for the finish event of every id in `ids`.
pub async fn wait_all_finished(
    events: &mut broadcast::Receiver<ChatEvent>,
    ids: &[GenerationId],
) -> HashMap<GenerationId, (FinishReason, GenerationMetrics)> {
    let mut finished = HashMap::new();
    tokio::time::timeout(WAIT, async {
        while finished.len() < ids.len() {
            match events.recv().await {
                Ok(ChatEvent::GenerationFinished {
                    generation,
                    reason,
                    metrics,
                }) if ids.contains(&generation.generation_id) => {
                    finished.insert(generation.generation_id, (reason, metrics));
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await
    .expect("timed out waiting for generations to finish");
    finished
}

pub async fn wait_finished(
    events: &mut broadcast::Receiver<ChatEvent>,
    id: GenerationId,
) -> (FinishReason, GenerationMetrics) {
    wait_all_finished(events, &[id])
        .await
        .remove(&id)
        .expect("generation never finished")
}

/// Wait until the message's streamed content equals `expected`.
pub async fn wait_for_content(
    events: &mut broadcast::Receiver<ChatEvent>,
    message_id: hearth_chat::MessageId,
    expected: &str,
) {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(ChatEvent::MessageUpdated {
                    message_id: id,
                    content,
                    ..
                }) if id == message_id && content == expected => return,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                _ => {}
            }
        }
    })
    .await
    .expect("timed out waiting for message content");
}

/// A small PNG image.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
