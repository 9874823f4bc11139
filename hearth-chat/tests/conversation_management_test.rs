//! Conversation lifecycle: create, rename, select, delete, ordering.

mod common;

use common::*;
use hearth_chat::{ChatError, ConversationId, FinishReason, Script, DEFAULT_TITLE};
use std::time::Duration;

#[tokio::test]
async fn test_create_binds_loaded_model_and_selects_first() {
    let h = harness(Script::tokens(["ok"]), TEXT_MODEL).await;

    let first = h.chat.create_conversation(None).await;
    let second = h.chat.create_conversation(Some("  Recipes  ")).await;

    let conversation = h.chat.conversation(&first).await.unwrap();
    assert_eq!(conversation.title, DEFAULT_TITLE);
    assert_eq!(conversation.model_id.as_deref(), Some(TEXT_MODEL));
    assert_eq!(h.chat.conversation(&second).await.unwrap().title, "Recipes");
    assert_eq!(h.chat.selected_conversation().await, Some(first));
}

#[tokio::test]
async fn test_first_message_titles_conversation() {
    let mut h = harness(Script::tokens(["ok"]), TEXT_MODEL).await;
    let id = h.chat.create_conversation(None).await;

    let receipt = h
        .chat
        .send_message(
            &id,
            "Plan a three day hiking trip through the Dolomites in late June",
            Vec::new(),
        )
        .await
        .unwrap();
    wait_finished(&mut h.events, receipt.generation_id).await;

    let title = h.chat.conversation(&id).await.unwrap().title;
    assert_eq!(title, "Plan a three day hiking trip through the");
    assert_eq!(title.chars().count(), hearth_chat::AUTO_TITLE_MAX_CHARS);
}

#[tokio::test]
async fn test_rename_conversation() {
    let h = harness(Script::tokens(["ok"]), TEXT_MODEL).await;
    let id = h.chat.create_conversation(None).await;

    h.chat.rename_conversation(&id, "Taxes 2026").await.unwrap();
    assert_eq!(h.chat.conversation(&id).await.unwrap().title, "Taxes 2026");

    h.chat.rename_conversation(&id, "   ").await.unwrap();
    assert_eq!(h.chat.conversation(&id).await.unwrap().title, DEFAULT_TITLE);

    let missing = ConversationId::new();
    assert!(matches!(
        h.chat.rename_conversation(&missing, "x").await,
        Err(ChatError::ConversationNotFound(_))
    ));
}

#[tokio::test]
async fn test_conversations_listed_newest_first() {
    let mut h = harness(Script::tokens(["ok"]), TEXT_MODEL).await;
    let older = h.chat.create_conversation(Some("older")).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = h.chat.create_conversation(Some("newer")).await;

    let ids: Vec<_> = h.chat.conversations().await.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![newer, older]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let receipt = h
        .chat
        .send_message(&older, "bump", Vec::new())
        .await
        .unwrap();
    wait_finished(&mut h.events, receipt.generation_id).await;

    let ids: Vec<_> = h.chat.conversations().await.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![older, newer]);
}

#[tokio::test]
async fn test_switching_conversation_does_not_cancel_generation() {
    let mut h = harness(
        Script::numbered(10).with_step_delay(Duration::from_millis(5)),
        TEXT_MODEL,
    )
    .await;
    let busy = h.chat.create_conversation(None).await;
    let other = h.chat.create_conversation(None).await;

    let receipt = h
        .chat
        .send_message(&busy, "work", Vec::new())
        .await
        .unwrap();
    h.chat.select_conversation(&other).await.unwrap();
    assert_eq!(h.chat.selected_conversation().await, Some(other));
    assert!(h.chat.is_generating().await);

    let (reason, _) = wait_finished(&mut h.events, receipt.generation_id).await;
    assert_eq!(reason, FinishReason::Completed);
    let messages = h.chat.messages(&busy).await.unwrap();
    assert_eq!(messages[1].content, Script::numbered(10).text_after(10));
    assert!(h.chat.messages(&other).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_cancels_generation_targeting_it() {
    let mut h = harness(Script::numbered(50).hold_after(1), TEXT_MODEL).await;
    let doomed = h.chat.create_conversation(None).await;

    let receipt = h
        .chat
        .send_message(&doomed, "go", Vec::new())
        .await
        .unwrap();
    wait_for_content(&mut h.events, receipt.assistant_message_id, "t0 ").await;

    h.chat.delete_conversation(&doomed).await.unwrap();
    assert!(!h.chat.is_generating().await);
    assert!(h.chat.conversation(&doomed).await.is_none());
    assert_eq!(h.chat.selected_conversation().await, None);

    let (reason, _) = wait_finished(&mut h.events, receipt.generation_id).await;
    assert_eq!(reason, FinishReason::Cancelled);
    assert!(h.chat.conversation(&doomed).await.is_none());
}

#[tokio::test]
async fn test_delete_other_conversation_keeps_generation() {
    let mut h = harness(Script::numbered(50).hold_after(1), TEXT_MODEL).await;
    let busy = h.chat.create_conversation(None).await;
    let idle = h.chat.create_conversation(None).await;

    let receipt = h
        .chat
        .send_message(&busy, "go", Vec::new())
        .await
        .unwrap();
    wait_for_content(&mut h.events, receipt.assistant_message_id, "t0 ").await;

    h.chat.delete_conversation(&idle).await.unwrap();
    assert!(h.chat.is_generating().await);
    assert_eq!(
        h.chat.active_generation().await.unwrap().generation_id,
        receipt.generation_id
    );

    h.chat.shutdown().await;
    assert!(!h.chat.is_generating().await);
}

#[tokio::test]
async fn test_unknown_conversation_errors() {
    let h = harness(Script::tokens(["ok"]), TEXT_MODEL).await;
    let missing = ConversationId::new();

    assert!(matches!(
        h.chat.send_message(&missing, "hi", Vec::new()).await,
        Err(ChatError::ConversationNotFound(_))
    ));
    assert!(matches!(
        h.chat.delete_conversation(&missing).await,
        Err(ChatError::ConversationNotFound(_))
    ));
    assert!(matches!(
        h.chat.select_conversation(&missing).await,
        Err(ChatError::ConversationNotFound(_))
    ));
    assert!(h.chat.messages(&missing).await.is_err());
}
