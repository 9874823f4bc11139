//! Scripted chat example
//!
//! Runs the full orchestration path against the scripted runtime: a reply
//! streams into the conversation, then a second message preempts a slow
//! reply. Configuration is read from an optional file given as the first
//! argument, plus `HEARTH_*` environment variables.
//!
//! ```sh
//! RUST_LOG=hearth_chat=debug cargo run --example scripted_chat
//! ```

use hearth_chat::{
    ChatConfig, ChatEvent, GenerationOrchestrator, MemoryConversationStore, ModelRegistry, Script,
    ScriptedRuntime,
};
use hearth_common::{init_tracing, Pretty};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ChatConfig::load(config_path.as_deref())?;

    let runtime = Arc::new(ScriptedRuntime::new(
        Script::tokens([
            "Local", " models", " keep", " your", " data", " on", " this", " device", ".",
        ])
        .with_step_delay(Duration::from_millis(40)),
    ));
    runtime.push_script(Script::numbered(200).with_step_delay(Duration::from_millis(40)));

    let chat = GenerationOrchestrator::new(
        config,
        ModelRegistry::builtin(),
        runtime,
        Arc::new(MemoryConversationStore::new()),
    );
    let mut events = chat.subscribe();

    chat.load_model("llama-3.2-1b").await?;
    let conversation = chat.create_conversation(None).await;

    // A slow reply that gets preempted after a few tokens.
    let slow = chat
        .send_message(&conversation, "Count to two hundred", Vec::new())
        .await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let fast = chat
        .send_message(&conversation, "Why run models locally?", Vec::new())
        .await?;

    let mut printed = 0;
    while let Ok(event) = events.recv().await {
        match event {
            ChatEvent::MessageUpdated {
                message_id,
                content,
                ..
            } if message_id == fast.assistant_message_id => {
                if let Some(delta) = content.get(printed..) {
                    print!("{}", delta);
                    io::stdout().flush()?;
                    printed = content.len();
                }
            }
            ChatEvent::GenerationFinished {
                generation,
                reason,
                metrics,
            } => {
                info!(
                    "Generation {} finished with {:?}: {}",
                    generation.generation_id,
                    reason,
                    Pretty(&metrics)
                );
                if generation.generation_id == fast.generation_id {
                    println!();
                    break;
                }
            }
            ChatEvent::Notice(notice) => println!("notice: {}", notice),
            _ => {}
        }
    }

    let messages = chat.messages(&conversation).await?;
    info!(
        "Conversation '{}' holds {} messages; preempted reply kept {:?}",
        chat.conversation(&conversation)
            .await
            .map(|c| c.title)
            .unwrap_or_default(),
        messages.len(),
        messages
            .iter()
            .find(|m| m.id == slow.assistant_message_id)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    );

    chat.shutdown().await;
    Ok(())
}
