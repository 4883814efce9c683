//! Keeps the two summary messages up to date: edit in place, create if missing.

use std::future::Future;
use std::sync::Arc;

use playwatch_db::{Store, SummaryKind};
use poise::serenity_prelude::{
    self as serenity, ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage,
    MessageId, Timestamp,
};
use tracing::{error, info, warn};

use crate::error::SinkError;
use crate::summary::RenderedSummary;

/// The message operations the sink needs from a chat platform.
pub trait MessageApi: Send + Sync {
    fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        summary: &RenderedSummary,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Post a new message and return its id.
    fn create_message(
        &self,
        channel_id: u64,
        summary: &RenderedSummary,
    ) -> impl Future<Output = Result<u64, SinkError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated(u64),
    Created(u64),
}

/// One tracked message per [`SummaryKind`], referenced through the store.
pub struct MessageSink<A> {
    api: A,
    store: Store,
    channel_id: u64,
}

impl<A: MessageApi> MessageSink<A> {
    pub fn new(api: A, store: Store, channel_id: u64) -> Self {
        Self {
            api,
            store,
            channel_id,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Edit the message on record for `kind`, or create one.
    ///
    /// A stale reference (not found) is cleared and replaced by a new message.
    /// Permission errors abort without creating anything.
    pub async fn upsert(
        &self,
        kind: SummaryKind,
        summary: &RenderedSummary,
    ) -> Result<UpsertOutcome, SinkError> {
        if let Some(message_id) = self.store.message_ref(kind).await {
            match self
                .api
                .edit_message(self.channel_id, message_id, summary)
                .await
            {
                Ok(()) => {
                    info!(kind = kind.as_str(), message_id, "message updated");
                    return Ok(UpsertOutcome::Updated(message_id));
                }
                Err(SinkError::NotFound) => {
                    warn!(kind = kind.as_str(), message_id, "message not found, creating a new one");
                    self.store.clear_message_ref(kind).await?;
                }
                Err(SinkError::Forbidden) => {
                    error!(
                        kind = kind.as_str(),
                        channel_id = self.channel_id,
                        "bot is missing access, check its permissions in the channel"
                    );
                    return Err(SinkError::Forbidden);
                }
                Err(e) => {
                    warn!(kind = kind.as_str(), message_id, error = %e, "failed to update message");
                    return Err(e);
                }
            }
        }

        let message_id = match self.api.create_message(self.channel_id, summary).await {
            Ok(message_id) => message_id,
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "failed to create message");
                return Err(e);
            }
        };
        self.store.set_message_ref(kind, message_id).await?;
        info!(kind = kind.as_str(), message_id, "message created");
        Ok(UpsertOutcome::Created(message_id))
    }
}

/// [`MessageApi`] over Discord's HTTP API.
#[derive(Clone)]
pub struct DiscordApi {
    http: Arc<serenity::Http>,
}

impl DiscordApi {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(serenity::Http::new(token)),
        }
    }

    /// Name and id of the bot user, confirming the token works.
    pub async fn current_user(&self) -> Result<(String, u64), SinkError> {
        let user = self.http.get_current_user().await.map_err(classify)?;
        Ok((user.name.clone(), user.id.get()))
    }
}

impl MessageApi for DiscordApi {
    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        summary: &RenderedSummary,
    ) -> Result<(), SinkError> {
        let builder = EditMessage::new().content("").embed(to_embed(summary));
        ChannelId::new(channel_id)
            .edit_message(&*self.http, MessageId::new(message_id), builder)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_message(
        &self,
        channel_id: u64,
        summary: &RenderedSummary,
    ) -> Result<u64, SinkError> {
        let builder = CreateMessage::new().embed(to_embed(summary));
        let message = ChannelId::new(channel_id)
            .send_message(&*self.http, builder)
            .await
            .map_err(classify)?;
        Ok(message.id.get())
    }
}

fn to_embed(summary: &RenderedSummary) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(summary.title.as_str())
        .color(summary.color)
        .footer(CreateEmbedFooter::new(summary.footer.as_str()));
    if !summary.description.is_empty() {
        embed = embed.description(summary.description.as_str());
    }
    if let Ok(timestamp) = Timestamp::from_unix_timestamp(summary.timestamp.timestamp()) {
        embed = embed.timestamp(timestamp);
    }
    if let Some((names, times)) = &summary.columns {
        embed = embed
            .field("Name", names.as_str(), true)
            .field("Time", times.as_str(), true);
    }
    embed
}

fn classify(err: serenity::Error) -> SinkError {
    if let serenity::Error::Http(http_err) = &err {
        match http_err.status_code().map(|status| status.as_u16()) {
            Some(404) => return SinkError::NotFound,
            Some(403) => return SinkError::Forbidden,
            _ => {}
        }
    }
    SinkError::Api(err.to_string())
}
