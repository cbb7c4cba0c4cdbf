use std::collections::VecDeque;
use std::sync::Arc;

use ash_core::types::Session;
use ash_core::{ChannelId, MessageId, Severity, UserId};
use ash_llm::{ChatMessage, ChatRole, LlmClient};
use ash_preferences::PreferencesStore;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::checkin::CheckInScheduler;
use crate::error::SessionError;
use crate::traits::{AlertAnnotator, SessionChannel};

/// Where a new session was started from, carried through so it can be
/// recorded on the `Session` and later used to annotate the source alert.
#[derive(Debug, Clone)]
pub struct SessionOrigin {
    pub alert_message_id: MessageId,
    pub alert_channel_id: ChannelId,
}

/// Outcome of [`SessionManager::start`]: the session plus the welcome
/// message id, which the caller registers for ❌-reaction opt-out
/// attribution.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub session: Session,
    /// `None` when an existing session was returned rather than a new one
    /// started — there is no new welcome message to register.
    pub welcome_message_id: Option<MessageId>,
}

fn system_prompt() -> &'static str {
    "You are Ash, a calm and caring companion checking in on someone who may be \
     struggling. Keep responses short, warm, and non-clinical. Never diagnose. \
     Encourage reaching out to a trusted person or crisis line if things feel \
     unmanageable."
}

/// One live DM conversation per user, backed entirely in-memory — a restart
/// drops active sessions, which is acceptable since the user can always be
/// re-contacted (unlike `PendingAlert`/`CheckIn`, nothing here needs to
/// survive a restart per spec §4.11).
pub struct SessionManager {
    sessions: DashMap<UserId, Session>,
    transcripts: DashMap<UserId, VecDeque<ChatMessage>>,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
    preferences: PreferencesStore,
    llm: LlmClient,
    channel: Arc<dyn SessionChannel>,
    alert_annotator: Arc<dyn AlertAnnotator>,
    check_in: Arc<CheckInScheduler>,
    idle_timeout_secs: i64,
    context_window_turns: usize,
    check_in_min_severity: Severity,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        preferences: PreferencesStore,
        llm: LlmClient,
        channel: Arc<dyn SessionChannel>,
        alert_annotator: Arc<dyn AlertAnnotator>,
        check_in: Arc<CheckInScheduler>,
        idle_timeout_minutes: u32,
        context_window_turns: usize,
        check_in_min_severity: Severity,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            transcripts: DashMap::new(),
            locks: DashMap::new(),
            preferences,
            llm,
            channel,
            alert_annotator,
            check_in,
            idle_timeout_secs: idle_timeout_minutes as i64 * 60,
            context_window_turns,
            check_in_min_severity,
        }
    }

    fn lock_for(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start (or return the existing) session for `user_id` (spec §4.11).
    pub async fn start(
        &self,
        user_id: &UserId,
        severity: Severity,
        origin: Option<SessionOrigin>,
        bypass_opt_out: bool,
        now: i64,
    ) -> Result<StartOutcome, SessionError> {
        if !bypass_opt_out && self.preferences.is_opted_out(user_id).await {
            return Err(SessionError::UserOptedOut);
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.sessions.get(user_id) {
            return Ok(StartOutcome {
                session: existing.clone(),
                welcome_message_id: None,
            });
        }

        let channel_id = self.channel.open_dm(user_id).await?;
        let welcome_message_id = self.channel.send_welcome(&channel_id, severity).await?;

        let session = Session {
            user_id: user_id.clone(),
            channel_id,
            started_at: now,
            last_activity_at: now,
            severity_at_start: severity,
            turn_count: 0,
            handed_off_to: None,
            ended_at: None,
            source_alert_id: origin.as_ref().map(|o| o.alert_message_id.clone()),
            source_alert_channel_id: origin.as_ref().map(|o| o.alert_channel_id.clone()),
        };

        self.sessions.insert(user_id.clone(), session.clone());
        self.transcripts.insert(user_id.clone(), VecDeque::new());
        metrics::counter!("sessions_total").increment(1);
        metrics::gauge!("sessions_active").increment(1.0);

        Ok(StartOutcome {
            session,
            welcome_message_id: Some(welcome_message_id),
        })
    }

    /// Handle an inbound DM reply while a session is active. Returns the
    /// assistant's reply text, or `None` if there is no active session or
    /// the session has been handed off (further messages stop reaching the
    /// LLM per spec §4.11).
    pub async fn reply(&self, user_id: &UserId, text: &str, now: i64) -> Option<String> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let channel_id = {
            let mut session = self.sessions.get_mut(user_id)?;
            if !session.is_active() {
                return None;
            }
            session.last_activity_at = now;
            session.turn_count += 1;
            session.channel_id.clone()
        };

        let mut transcript = self
            .transcripts
            .entry(user_id.clone())
            .or_insert_with(VecDeque::new);
        transcript.push_back(ChatMessage {
            role: ChatRole::User,
            content: text.to_string(),
        });
        trim_to_window(&mut *transcript, self.context_window_turns);

        let bounded: Vec<ChatMessage> = transcript.iter().cloned().collect();
        drop(transcript);

        let reply = self.llm.complete(system_prompt(), &bounded).await;

        if let Some(mut transcript) = self.transcripts.get_mut(user_id) {
            transcript.push_back(ChatMessage {
                role: ChatRole::Assistant,
                content: reply.clone(),
            });
            trim_to_window(&mut *transcript, self.context_window_turns);
        }

        if let Err(e) = self.channel.send_reply(&channel_id, &reply).await {
            warn!(error = %e, user = %user_id, "failed to deliver session reply");
        }

        Some(reply)
    }

    /// Transfer ownership of the session to a CRT member (spec §4.11).
    pub async fn handoff(&self, user_id: &UserId, crt_member: &UserId) -> Result<(), SessionError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let channel_id = {
            let mut session = self
                .sessions
                .get_mut(user_id)
                .ok_or(SessionError::ChannelUnavailable)?;
            session.handed_off_to = Some(crt_member.clone());
            session.channel_id.clone()
        };

        self.channel
            .send_handoff_notice(&channel_id, crt_member)
            .await
    }

    /// End the active session for `user_id`, scheduling a 24h follow-up if
    /// it started at `≥ check_in_min_severity` and the user hasn't opted out
    /// (spec §4.12).
    pub async fn end(&self, user_id: &UserId, now: i64) -> Option<Session> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let (_, mut session) = self.sessions.remove(user_id)?;
        self.transcripts.remove(user_id);
        session.ended_at = Some(now);
        metrics::gauge!("sessions_active").decrement(1.0);

        if session.severity_at_start >= self.check_in_min_severity
            && !self.preferences.is_opted_out(user_id).await
        {
            self.check_in
                .schedule(user_id, session.source_alert_id.clone(), now)
                .await;
        }

        Some(session)
    }

    /// Sweep idle sessions: anything silent for `idle_timeout_secs` ends.
    pub async fn sweep_idle(&self, now: i64) {
        let idle_users: Vec<UserId> = self
            .sessions
            .iter()
            .filter(|entry| now - entry.last_activity_at >= self.idle_timeout_secs)
            .map(|entry| entry.key().clone())
            .collect();

        for user_id in idle_users {
            self.end(&user_id, now).await;
        }
    }

    /// Opt-out via ❌ reaction on the welcome message (spec §4.11): records
    /// the preference, ends the session, acknowledges, and annotates the
    /// source alert if there was one.
    pub async fn opt_out_via_reaction(&self, user_id: &UserId, now: i64) -> Result<(), SessionError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        self.preferences.set_opt_out(user_id).await?;

        let Some((_, session)) = self.sessions.remove(user_id) else {
            return Ok(());
        };
        self.transcripts.remove(user_id);
        metrics::gauge!("sessions_active").decrement(1.0);

        self.channel.send_opt_out_ack(&session.channel_id).await?;

        if let (Some(alert_id), Some(alert_channel)) =
            (session.source_alert_id, session.source_alert_channel_id)
        {
            self.alert_annotator
                .annotate_user_opted_out(&alert_channel, &alert_id)
                .await;
        }

        Ok(())
    }

    pub fn active_session(&self, user_id: &UserId) -> Option<Session> {
        self.sessions.get(user_id).map(|s| s.clone())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

fn trim_to_window(transcript: &mut VecDeque<ChatMessage>, context_window_turns: usize) {
    let max_messages = context_window_turns * 2;
    while transcript.len() > max_messages {
        transcript.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_keeps_last_n_turns() {
        let mut t: VecDeque<ChatMessage> = VecDeque::new();
        for i in 0..30 {
            t.push_back(ChatMessage {
                role: ChatRole::User,
                content: i.to_string(),
            });
        }
        trim_to_window(&mut t, 10);
        assert_eq!(t.len(), 20);
        assert_eq!(t.front().unwrap().content, "10");
    }
}
