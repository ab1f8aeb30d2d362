//! # Relay and Routing Tests
//!
//! Message relay to the owner, commands, ban handling and panel callbacks.

mod test_helpers;

use anyhow::Result;
use clone_relay_bot::bot::callbacks::callback_handler::route_callback;
use clone_relay_bot::bot::callbacks::callback_types::CallbackAction;
use clone_relay_bot::bot::command_handlers::Command;
use clone_relay_bot::bot::media_handlers::RelayOutcome;
use clone_relay_bot::bot::message_handler::{route_message, MessageRoute};
use clone_relay_bot::gateway::InboundContent;
use clone_relay_bot::store::ProvisioningStore;
use test_helpers::*;

async fn send(env: &TestEnv, user_id: i64, content: Option<InboundContent>) -> Result<MessageRoute> {
    route_message(
        &env.ctx(),
        &user(user_id),
        &env.dialogue(user_id),
        content.as_ref(),
    )
    .await
}

#[tokio::test]
async fn test_text_is_relayed_behind_header() -> Result<()> {
    let env = TestEnv::new();
    env.store.add_greeting("Thanks, we got it!");

    let route = send(&env, USER_ID, Some(text("When does batch 12 start?"))).await?;
    assert_eq!(route, MessageRoute::Relayed(RelayOutcome::Delivered));

    let owner = env.gateway.sent_to(OWNER_ID);
    assert_eq!(owner.len(), 2);
    let Sent::Html { html, .. } = &owner[0] else {
        panic!("expected header first, got {:?}", owner);
    };
    assert!(html.contains(&format!("<code>{}</code>", USER_ID)));
    assert!(html.contains("@asha_k"));
    assert!(matches!(
        &owner[1],
        Sent::Content { content: InboundContent::Text(body), .. } if body == "When does batch 12 start?"
    ));

    // Header and content both map back to the sender
    let mapped = env.store.mapped_messages();
    assert_eq!(mapped.len(), 2);
    assert!(mapped.iter().all(|(user_id, _)| *user_id == USER_ID));

    assert_eq!(
        env.gateway.last_text_to(USER_ID),
        Some("Thanks, we got it!".to_string())
    );
    assert!(env.store.has_user(USER_ID));
    Ok(())
}

#[tokio::test]
async fn test_default_greeting_without_configured_ones() -> Result<()> {
    let env = TestEnv::new();

    send(&env, USER_ID, Some(text("hello"))).await?;
    assert_eq!(
        env.gateway.last_text_to(USER_ID),
        Some(env.text("greeting-default"))
    );
    Ok(())
}

#[tokio::test]
async fn test_media_keeps_caption() -> Result<()> {
    let env = TestEnv::new();
    let document = InboundContent::Document {
        file_id: "doc-1".to_string(),
        caption: Some("fee receipt".to_string()),
    };

    send(&env, USER_ID, Some(document.clone())).await?;
    assert!(env
        .gateway
        .sent_to(OWNER_ID)
        .iter()
        .any(|sent| matches!(sent, Sent::Content { content, .. } if *content == document)));
    Ok(())
}

#[tokio::test]
async fn test_header_escapes_user_names() -> Result<()> {
    let env = TestEnv::new();
    let mut sender = user(USER_ID);
    sender.first_name = "<b>Boss</b>".to_string();
    sender.username = None;

    route_message(
        &env.ctx(),
        &sender,
        &env.dialogue(USER_ID),
        Some(&text("hi")),
    )
    .await?;

    let owner = env.gateway.sent_to(OWNER_ID);
    let Some(Sent::Html { html, .. }) = owner.first() else {
        panic!("expected header, got {:?}", owner);
    };
    assert!(html.contains("&lt;b&gt;Boss&lt;/b&gt;"));
    assert!(html.contains("@None"));
    Ok(())
}

#[tokio::test]
async fn test_delivery_failure_is_reported_to_user() -> Result<()> {
    let env = TestEnv::new();
    env.gateway.fail_owner_chat();

    let route = send(&env, USER_ID, Some(text("anyone there?"))).await?;
    assert_eq!(route, MessageRoute::Relayed(RelayOutcome::Failed));
    assert_eq!(
        env.gateway.last_text_to(USER_ID),
        Some(env.text("relay-failed"))
    );
    assert!(env.store.mapped_messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unsupported_kind_is_dropped() -> Result<()> {
    let env = TestEnv::new();

    let route = send(&env, USER_ID, None).await?;
    assert_eq!(route, MessageRoute::Unsupported);
    assert!(env.gateway.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_banned_user_is_silenced() -> Result<()> {
    let env = TestEnv::new();
    env.store.ban(USER_ID);

    assert_eq!(
        send(&env, USER_ID, Some(text("let me in"))).await?,
        MessageRoute::Ignored
    );
    assert_eq!(
        send(&env, USER_ID, Some(text("/help"))).await?,
        MessageRoute::Ignored
    );
    assert!(env.gateway.sent().is_empty());

    // /start still tells them why
    assert_eq!(
        send(&env, USER_ID, Some(text("/start"))).await?,
        MessageRoute::Command(Command::Start)
    );
    assert_eq!(env.gateway.texts_to(USER_ID), vec![env.text("banned")]);
    assert!(!env.store.has_user(USER_ID));
    Ok(())
}

#[tokio::test]
async fn test_banned_user_callbacks_are_ignored() -> Result<()> {
    let env = TestEnv::new();
    env.store.ban(USER_ID);

    let toast = route_callback(
        &env.ctx(),
        &user(USER_ID),
        &env.dialogue(USER_ID),
        CallbackAction::CloneBot,
    )
    .await?;
    assert_eq!(toast, None);
    assert!(env.gateway.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_start_registers_user_and_shows_panel() -> Result<()> {
    let env = TestEnv::new();

    let route = send(&env, USER_ID, Some(text("/start"))).await?;
    assert_eq!(route, MessageRoute::Command(Command::Start));
    assert!(env.store.has_user(USER_ID));

    let sent = env.gateway.sent_to(USER_ID);
    let Some(Sent::Text {
        keyboard: Some(keyboard),
        ..
    }) = sent.last()
    else {
        panic!("expected user panel, got {:?}", sent);
    };
    assert_eq!(
        callback_data(keyboard),
        vec!["user_send", "paid_batches", "clone_bot", "my_clone", "user_help"]
    );
    Ok(())
}

#[tokio::test]
async fn test_owner_chatter_is_not_relayed() -> Result<()> {
    let env = TestEnv::new();

    let route = send(&env, OWNER_ID, Some(text("note to self"))).await?;
    assert_eq!(route, MessageRoute::Ignored);
    assert!(env.gateway.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_paid_batches_listing() -> Result<()> {
    let env = TestEnv::new();

    route_callback(
        &env.ctx(),
        &user(USER_ID),
        &env.dialogue(USER_ID),
        CallbackAction::PaidBatches,
    )
    .await?;
    assert_eq!(
        env.gateway.last_text_to(USER_ID),
        Some(env.text("paid-batches-empty"))
    );

    env.store.set_paid_batches("Batch A - ₹499");
    route_callback(
        &env.ctx(),
        &user(USER_ID),
        &env.dialogue(USER_ID),
        CallbackAction::PaidBatches,
    )
    .await?;
    assert!(env
        .gateway
        .last_text_to(USER_ID)
        .is_some_and(|reply| reply.contains("Batch A - ₹499")));
    Ok(())
}

#[tokio::test]
async fn test_owner_review_ignores_ban_list() -> Result<()> {
    let env = TestEnv::new();
    env.store.ban(OWNER_ID);

    // Unknown payment, but the owner still gets an answer
    let toast = route_callback(
        &env.ctx(),
        &user(OWNER_ID),
        &env.dialogue(OWNER_ID),
        CallbackAction::Reject {
            payment_id: 7,
            user_id: USER_ID,
        },
    )
    .await?;
    assert_eq!(toast, None);
    assert!(env
        .gateway
        .last_text_to(OWNER_ID)
        .is_some_and(|reply| reply.contains("#7")));
    assert!(!env.store.is_awaiting_token(USER_ID).await?);
    Ok(())
}
