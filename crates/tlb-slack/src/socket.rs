//! Socket Mode listener.
//!
//! Maps Slack push and slash-command events to [`IncomingEvent`] and queues
//! them on the pipeline. Slack gets its acknowledgement when the callback
//! returns, which happens only after the event is queued.

use std::sync::Arc;

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use slack_morphism::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tlb_core::{
    domain::{ConversationId, MemberId},
    messaging::types::{CommandEvent, ConversationKind, IncomingEvent, MessageEvent},
};

#[derive(Clone)]
struct SocketState {
    events: mpsc::Sender<IncomingEvent>,
}

/// Connect to Socket Mode and serve events until the connection ends.
pub async fn run_socket_mode(
    client: Arc<SlackHyperClient>,
    app_token: &SecretString,
    events: mpsc::Sender<IncomingEvent>,
) -> Result<()> {
    let app_token = SlackApiToken::new(SlackApiTokenValue(app_token.expose_secret().clone()));

    let callbacks = SlackSocketModeListenerCallbacks::new()
        .with_push_events(handle_push_events)
        .with_command_events(handle_command_events);

    let listener_env = Arc::new(
        SlackClientEventsListenerEnvironment::new(client).with_user_state(SocketState { events }),
    );

    let listener = SlackClientSocketModeListener::new(
        &SlackClientSocketModeConfig::new(),
        listener_env,
        callbacks,
    );

    listener.listen_for(&app_token).await?;
    info!("slack socket mode connected");
    listener.serve().await;
    info!("slack socket mode stopped");
    Ok(())
}

async fn handle_push_events(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let events = {
        let guard = states.read().await;
        guard
            .get_user_state::<SocketState>()
            .ok_or("missing socket mode state")?
            .events
            .clone()
    };

    let incoming = push_event(&event.event);
    if events.send(incoming).await.is_err() {
        warn!("pipeline closed, dropping slack event");
    }
    Ok(())
}

async fn handle_command_events(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> std::result::Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    let events = {
        let guard = states.read().await;
        guard
            .get_user_state::<SocketState>()
            .ok_or("missing socket mode state")?
            .events
            .clone()
    };

    debug!(command = %event.command, "received slash command");
    let incoming = command_event(
        &event.user_id.to_string(),
        &event.command.to_string(),
        event.text.as_deref(),
    );
    if events.send(incoming).await.is_err() {
        warn!("pipeline closed, dropping slash command");
    }

    // Empty body: the command is acknowledged without an inline reply.
    Ok(SlackCommandEventResponse::new(SlackMessageContent::new()))
}

fn push_event(body: &SlackEventCallbackBody) -> IncomingEvent {
    match body {
        SlackEventCallbackBody::Message(msg) => message_event(MessageParts {
            user: msg.sender.user.as_ref().map(|u| u.to_string()),
            bot_id: msg.sender.bot_id.as_ref().map(|b| b.to_string()),
            subtype: msg.subtype.as_ref().map(|s| format!("{s:?}")),
            channel: msg.origin.channel.as_ref().map(|c| c.to_string()),
            channel_type: msg.origin.channel_type.as_ref().map(|t| t.to_string()),
            text: msg.content.as_ref().and_then(|c| c.text.clone()),
        }),
        SlackEventCallbackBody::AppMention(_) => IncomingEvent::Other {
            kind: "app_mention".to_string(),
        },
        _ => IncomingEvent::Other {
            kind: "event_callback".to_string(),
        },
    }
}

/// The fields of a Slack `message` event the bot looks at.
#[derive(Debug, Default)]
struct MessageParts {
    user: Option<String>,
    bot_id: Option<String>,
    subtype: Option<String>,
    channel: Option<String>,
    channel_type: Option<String>,
    text: Option<String>,
}

fn message_event(parts: MessageParts) -> IncomingEvent {
    let Some(channel) = parts.channel else {
        return IncomingEvent::Other {
            kind: "message_without_channel".to_string(),
        };
    };
    let conversation_kind = conversation_kind(parts.channel_type.as_deref(), &channel);

    // Bot posts carry a subtype and often no user; keep them as messages so
    // they are dropped for being from a bot.
    if let Some(bot_id) = parts.bot_id.filter(|b| !b.is_empty()) {
        return IncomingEvent::Message(MessageEvent {
            sender: MemberId::new(parts.user.unwrap_or_else(|| bot_id.clone())),
            conversation: ConversationId::new(channel),
            conversation_kind,
            bot_id: Some(bot_id),
            text: parts.text.unwrap_or_default(),
        });
    }

    if let Some(subtype) = parts.subtype {
        return IncomingEvent::Other {
            kind: format!("message:{subtype}"),
        };
    }
    let Some(user) = parts.user else {
        return IncomingEvent::Other {
            kind: "message_without_user".to_string(),
        };
    };

    IncomingEvent::Message(MessageEvent {
        sender: MemberId::new(user),
        conversation: ConversationId::new(channel),
        conversation_kind,
        bot_id: None,
        text: parts.text.unwrap_or_default(),
    })
}

fn conversation_kind(channel_type: Option<&str>, channel: &str) -> ConversationKind {
    match channel_type {
        Some("im") => ConversationKind::Direct,
        Some("mpim") => ConversationKind::Group,
        Some("channel") | Some("group") => ConversationKind::Channel,
        Some(_) => ConversationKind::Unknown,
        // Direct conversation ids start with `D`.
        None if channel.starts_with('D') => ConversationKind::Direct,
        None => ConversationKind::Unknown,
    }
}

fn command_event(user: &str, command: &str, text: Option<&str>) -> IncomingEvent {
    IncomingEvent::Command(CommandEvent {
        issuer: MemberId::new(user),
        name: command.to_string(),
        text: text.unwrap_or_default().to_string(),
    })
}
