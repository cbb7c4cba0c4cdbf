//! Serenity `EventHandler` wiring message ingestion, reactions, and
//! interactions to the classification/alerting/session pipeline (spec §4.6
//! through §4.13).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ash_alerts::{AlertContext, AlertDispatcher, ControlAction};
use ash_classifier::ClassifierPipeline;
use ash_commands::{AshCommand, AshCommandHandler, CommandOutcome};
use ash_core::{ChannelId, GuildId, MessageId, UserId};
use ash_policy::ChannelPolicy;
use ash_preferences::PreferencesStore;
use ash_sessions::SessionManager;
use serenity::all::{ComponentInteractionDataKind, Interaction, Reaction, ReactionType};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::{Context, EventHandler};
use tracing::{info, warn};

use crate::commands::{parse_command, register_commands};
use crate::controls::{is_crt, parse_custom_id};
use crate::ingress::UserIngress;
use crate::welcome_map::WelcomeMap;

const OPT_OUT_REACTION: char = '❌';

/// Everything a single classified message needs to carry through the
/// per-user ingress queue to the worker that processes it.
struct IngestJob {
    guild_id: GuildId,
    channel_id: ChannelId,
    message_id: MessageId,
    author: UserId,
    text: String,
    timestamp: i64,
}

/// Shared state behind the serenity handler, held as `Arc<Inner>` so spawned
/// per-user worker tasks can outlive any single `message()` callback.
pub struct Inner {
    pub policy: Arc<ChannelPolicy>,
    pub classifier: Arc<ClassifierPipeline>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub sessions: Arc<SessionManager>,
    pub preferences: PreferencesStore,
    pub commands: Arc<AshCommandHandler>,
    pub welcome_map: Arc<WelcomeMap>,
    ingress: UserIngress<IngestJob>,
    pub crt_role_id: serenity::model::id::RoleId,
    pub queue_size: usize,
    /// Flipped true on the serenity `ready` event, false by the adapter
    /// whenever the gateway connection drops; backs `/health/ready`'s
    /// "gateway connected" check (spec §4.14). Shared with the caller so
    /// `ash-gateway` can read it without reaching into `DiscordHandler`.
    pub gateway_connected: Arc<AtomicBool>,
}

impl Inner {
    /// `IngestJob` is private to this module, so `ash-gateway` builds
    /// everything else and hands it here rather than constructing `Inner`
    /// as a plain struct literal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: Arc<ChannelPolicy>,
        classifier: Arc<ClassifierPipeline>,
        dispatcher: Arc<AlertDispatcher>,
        sessions: Arc<SessionManager>,
        preferences: PreferencesStore,
        commands: Arc<AshCommandHandler>,
        welcome_map: Arc<WelcomeMap>,
        crt_role_id: serenity::model::id::RoleId,
        queue_size: usize,
        gateway_connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            policy,
            classifier,
            dispatcher,
            sessions,
            preferences,
            commands,
            welcome_map,
            ingress: UserIngress::new(queue_size),
            crt_role_id,
            queue_size,
            gateway_connected,
        }
    }
}

/// Discord event handler. Thin wrapper so `Arc<Inner>` can be cloned into
/// spawned tasks without cloning the handler itself.
pub struct DiscordHandler {
    pub inner: Arc<Inner>,
}

impl DiscordHandler {
    pub fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(name = %ready.user.name, "ash connected to discord");
        self.inner.gateway_connected.store(true, Ordering::Relaxed);
        register_commands(&ctx).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let now = chrono::Utc::now().timestamp();

        // DMs route straight into the active-session reply path (spec
        // §4.11); they are never classified or routed to a crisis channel.
        if msg.guild_id.is_none() {
            let user_id = UserId::from(msg.author.id.to_string());
            if let Some(reply) = self.inner.sessions.reply(&user_id, &msg.content, now).await {
                if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
                    warn!(error = %e, "failed to deliver session reply");
                }
            }
            return;
        }

        let guild_id = GuildId::from(msg.guild_id.unwrap().to_string());
        let channel_id = ChannelId::from(msg.channel_id.to_string());

        if !self.inner.policy.is_monitored(&channel_id) {
            return;
        }

        if msg.content.trim().is_empty() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let user_id = UserId::from(msg.author.id.to_string());

        let job = IngestJob {
            guild_id,
            channel_id,
            message_id: MessageId::from(msg.id.to_string()),
            author: user_id.clone(),
            text: msg.content.clone(),
            timestamp: now,
        };

        self.inner
            .ingress
            .push(user_id.clone(), job, move |queue| {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    loop {
                        let job = queue.pop().await;
                        process_job(&inner, job).await;
                    }
                });
            })
            .await;
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let ReactionType::Unicode(ref emoji) = reaction.emoji else {
            return;
        };
        if emoji.chars().next() != Some(OPT_OUT_REACTION) {
            return;
        }

        let message_id = MessageId::from(reaction.message_id.to_string());
        let Some(user_id) = self.inner.welcome_map.take(&message_id) else {
            return;
        };

        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self.inner.sessions.opt_out_via_reaction(&user_id, now).await {
            warn!(error = %e, %user_id, "failed to process opt-out reaction");
        }
        let _ = ctx;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Component(component) => {
                let ComponentInteractionDataKind::Button = component.data.kind else {
                    return;
                };
                let Some((action, alert_id)) = parse_custom_id(&component.data.custom_id) else {
                    return;
                };

                let member_roles: Vec<_> = component
                    .member
                    .as_ref()
                    .map(|m| m.roles.clone())
                    .unwrap_or_default();
                if !is_crt(&member_roles, self.inner.crt_role_id) {
                    respond_ephemeral(&ctx, &component, "Only crisis response team members can use this.").await;
                    return;
                }

                let alert_message_id = MessageId::from(alert_id);
                let text = match action {
                    ControlAction::Acknowledge => {
                        let won = self.inner.dispatcher.acknowledge(&alert_message_id).await;
                        if won { "Acknowledged." } else { "Already handled." }
                    }
                    ControlAction::TalkToAsh => {
                        let won = self.inner.dispatcher.talk_to_ash_clicked(&alert_message_id).await;
                        if won { "Marked as handled — staff is engaging directly." } else { "Already handled." }
                    }
                    ControlAction::History => "History lookup not available from this button yet.",
                };
                respond_ephemeral(&ctx, &component, text).await;
            }
            Interaction::Command(command) => {
                let Some(parsed) = parse_command(&command) else {
                    return;
                };
                let invoker = command.user.id.to_string();
                let roles: Vec<String> = command
                    .member
                    .as_ref()
                    .map(|m| m.roles.iter().map(|r| r.to_string()).collect())
                    .unwrap_or_default();
                let now = chrono::Utc::now().timestamp();

                let outcome = self.inner.commands.handle(parsed, &invoker, &roles, now).await;
                let text = match outcome {
                    CommandOutcome::Text(t) => t,
                    CommandOutcome::Denied => "You don't have permission to use this command.".to_string(),
                };

                if let Err(e) = command
                    .create_response(
                        &ctx.http,
                        serenity::builder::CreateInteractionResponse::Message(
                            serenity::builder::CreateInteractionResponseMessage::new()
                                .content(text)
                                .ephemeral(true),
                        ),
                    )
                    .await
                {
                    warn!(error = %e, "failed to respond to slash command");
                }
            }
            _ => {}
        }
    }
}

async fn respond_ephemeral(
    ctx: &Context,
    component: &serenity::model::application::ComponentInteraction,
    text: &str,
) {
    if let Err(e) = component
        .create_response(
            &ctx.http,
            serenity::builder::CreateInteractionResponse::Message(
                serenity::builder::CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await
    {
        warn!(error = %e, "failed to send ephemeral interaction response");
    }
}

/// Classify one ingested message and, if warranted, dispatch an alert and/or
/// persist history (spec §4.6 through §4.8). Runs sequentially per user,
/// in whatever worker task owns that user's ingress queue.
async fn process_job(inner: &Inner, job: IngestJob) {
    let outcome = inner
        .classifier
        .classify(
            &job.guild_id,
            &job.author,
            job.channel_id.as_ref(),
            &job.text,
            job.timestamp,
        )
        .await;

    let Some(target_channel) = outcome.route.target_channel else {
        return;
    };

    let opted_out = inner.preferences.is_opted_out(&job.author).await;

    let ctx = AlertContext {
        user_id: job.author.clone(),
        guild_id: Some(job.guild_id.clone()),
        original_message_id: Some(job.message_id.clone()),
        original_channel_id: job.channel_id.clone(),
        target_channel,
        ping_crt: outcome.route.ping_crt,
        text: job.text.clone(),
        nlp: outcome.result,
        opted_out,
    };

    inner.dispatcher.dispatch(ctx, job.timestamp).await;
}
