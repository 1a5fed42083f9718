//! Slack adapter (slack-morphism).
//!
//! This crate implements the `tlb-core` MessagingPort over the Slack Web API
//! and feeds Socket Mode events into the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::*;
use tracing::{debug, info};

pub mod socket;

use tlb_core::{
    domain::{ConversationId, MemberId},
    errors::Error,
    messaging::{port::MessagingPort, types::Persona},
    Result,
};

#[derive(Clone)]
pub struct SlackMessenger {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
}

impl SlackMessenger {
    pub fn new(client: Arc<SlackHyperClient>, bot_token: &SecretString) -> Self {
        Self {
            client,
            token: SlackApiToken::new(SlackApiTokenValue(bot_token.expose_secret().clone())),
        }
    }

    /// Build a messenger with its own HTTPS client.
    pub fn connect(bot_token: &SecretString) -> Result<Self> {
        let connector = SlackClientHyperConnector::new()
            .map_err(|e| Error::Transport(format!("slack connector: {e}")))?;
        Ok(Self::new(Arc::new(SlackClient::new(connector)), bot_token))
    }

    pub fn client(&self) -> Arc<SlackHyperClient> {
        self.client.clone()
    }

    /// Check the bot token; returns the bot's own user id.
    pub async fn authenticate(&self) -> Result<MemberId> {
        let session = self.client.open_session(&self.token);
        let auth = session.auth_test().await.map_err(Self::map_err)?;
        info!(bot_user = %auth.user_id, "slack bot authenticated");
        Ok(MemberId::new(auth.user_id.to_string()))
    }

    fn map_err(e: SlackClientError) -> Error {
        Error::Transport(format!("slack error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for SlackMessenger {
    async fn post(
        &self,
        destination: &ConversationId,
        text: &str,
        persona: &Persona,
    ) -> Result<()> {
        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId::new(destination.0.clone()),
            SlackMessageContent::new().with_text(text.to_string()),
        )
        .with_username(persona.display_name.clone())
        .with_icon_emoji(persona.icon_emoji.clone());

        let session = self.client.open_session(&self.token);
        session
            .chat_post_message(&request)
            .await
            .map_err(Self::map_err)?;
        debug!(conversation = %destination, "posted slack message");
        Ok(())
    }

    async fn open_direct_conversation(&self, member: &MemberId) -> Result<ConversationId> {
        let request = SlackApiConversationsOpenRequest::new()
            .with_users(vec![SlackUserId::new(member.0.clone())]);

        let session = self.client.open_session(&self.token);
        let resp = session
            .conversations_open(&request)
            .await
            .map_err(Self::map_err)?;
        Ok(ConversationId::new(resp.channel.id.to_string()))
    }
}
