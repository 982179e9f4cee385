//! Discord front end.

use crate::commands::{self, Command};
use crate::dispatcher::FaucetDispatcher;
use crate::error::FaucetError;
use crate::reply::{Reply, ReplyStyle};
use anyhow::Context as _;
use serenity::all::{
    Client, Context, CreateEmbed, CreateEmbedFooter, CreateMessage, EventHandler, GatewayIntents,
    Message, Ready,
};
use serenity::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Event handler answering faucet commands in the configured channels.
pub struct FaucetBot {
    dispatcher: Arc<FaucetDispatcher>,
    channels: Vec<u64>,
    style: ReplyStyle,
}

impl FaucetBot {
    pub fn new(
        dispatcher: Arc<FaucetDispatcher>,
        channels: impl IntoIterator<Item = u64>,
        style: ReplyStyle,
    ) -> Self {
        Self {
            dispatcher,
            channels: channels.into_iter().collect(),
            style,
        }
    }

    pub fn serves(&self, channel_id: u64) -> bool {
        self.channels.contains(&channel_id)
    }

    /// Reply to a message, or `None` if it is not a command.
    pub async fn respond(&self, requester: &str, content: &str) -> Option<Reply> {
        let command = commands::parse(content)?;

        let reply = match command {
            Command::FaucetSend { address } => {
                match self.dispatcher.request_funds(requester, address).await {
                    Ok(grant) => Reply::grant(&grant, &self.style),
                    Err(e) => self.error_reply(requester, &e),
                }
            }
            Command::Balance { address } => match self.dispatcher.balance_of(address).await {
                Ok(balance) => Reply::balance(&balance, &self.style),
                Err(e) => self.error_reply(requester, &e),
            },
        };

        Some(reply)
    }

    fn error_reply(&self, requester: &str, error: &FaucetError) -> Reply {
        match error {
            FaucetError::InvalidAddress(_) | FaucetError::RateLimited { .. } => {
                debug!(requester, "Request refused: {}", error)
            }
            _ => warn!(requester, code = error.code(), "Request failed: {}", error),
        }
        Reply::error(error, &self.style)
    }
}

pub fn to_embed(reply: &Reply) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(&reply.title).colour(reply.color);
    for field in &reply.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &reply.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    embed
}

#[async_trait]
impl EventHandler for FaucetBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Logged in as {}!", ready.user.tag());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || !self.serves(msg.channel_id.get()) {
            return;
        }

        let requester = msg.author.id.get().to_string();
        let Some(reply) = self.respond(&requester, &msg.content).await else {
            return;
        };

        let message = CreateMessage::new().embed(to_embed(&reply));
        if let Err(e) = msg.channel_id.send_message(&ctx.http, message).await {
            error!(channel = msg.channel_id.get(), "Failed to send reply: {}", e);
        }
    }
}

/// Connect to the gateway and serve until the process receives a shutdown
/// signal.
pub async fn run<F>(token: &str, bot: FaucetBot, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token, intents)
        .event_handler(bot)
        .await
        .context("Failed to create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown.await;
        info!("Disconnecting from Discord");
        shard_manager.shutdown_all().await;
    });

    client.start().await.context("Discord client error")?;
    Ok(())
}
