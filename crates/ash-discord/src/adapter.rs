//! Owns the serenity `Client` and keeps it connected for the life of the
//! process, rebuilding and reconnecting on any gateway drop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use crate::handler::{DiscordHandler, Inner};

const INITIAL_RETRY_SECS: u64 = 30;
const RECONNECT_DELAY_SECS: u64 = 5;

/// Drives the Discord gateway connection. Reconnects indefinitely; never
/// returns under normal operation.
pub struct DiscordAdapter {
    token: String,
    inner: Arc<Inner>,
}

impl DiscordAdapter {
    pub fn new(token: impl Into<String>, inner: Arc<Inner>) -> Self {
        Self {
            token: token.into(),
            inner,
        }
    }

    /// Connect and keep reconnecting whenever the gateway drops. Never
    /// returns.
    pub async fn run(self) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS;

        let mut client = loop {
            match self.build_client(intents).await {
                Ok(c) => break c,
                Err(e) => {
                    error!(error = %e, "discord: initial connect failed, retrying");
                    tokio::time::sleep(Duration::from_secs(INITIAL_RETRY_SECS)).await;
                }
            }
        };

        loop {
            info!("discord: gateway connecting");

            if let Err(e) = client.start().await {
                warn!(error = %e, "discord: gateway error, reconnecting");
            } else {
                info!("discord: gateway stopped cleanly, reconnecting");
            }
            self.inner.gateway_connected.store(false, Ordering::Relaxed);

            tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;

            client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!(error = %e, "discord: reconnect failed, retrying");
                        tokio::time::sleep(Duration::from_secs(INITIAL_RETRY_SECS)).await;
                    }
                }
            };
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler::new(Arc::clone(&self.inner));
        Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
    }
}
