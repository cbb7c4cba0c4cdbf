use std::time::{Duration, Instant};

use ash_core::{MessageId, UserId};
use dashmap::DashMap;

/// Lifetime of a `(welcome_message_id -> user_id)` registration (spec §9
/// "Welcome-reaction coupling"): long enough to cover the realistic window
/// in which a user reacts to the welcome DM, short enough not to leak
/// forever for users who never react.
const TTL: Duration = Duration::from_secs(10 * 60);

/// Maps a welcome DM's message id to the user it was sent to, so a ❌
/// reaction on that message can be attributed to an opt-out without
/// scanning every open session (spec §9).
#[derive(Default)]
pub struct WelcomeMap {
    entries: DashMap<MessageId, (UserId, Instant)>,
}

impl WelcomeMap {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn register(&self, welcome_message_id: MessageId, user_id: UserId) {
        self.entries
            .insert(welcome_message_id, (user_id, Instant::now()));
    }

    /// Look up and remove the registration for `welcome_message_id`, if it
    /// exists and hasn't expired.
    pub fn take(&self, welcome_message_id: &MessageId) -> Option<UserId> {
        let (_, (user_id, registered_at)) = self.entries.remove(welcome_message_id)?;
        if registered_at.elapsed() < TTL {
            Some(user_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_entry_is_taken_once() {
        let map = WelcomeMap::new();
        let msg = MessageId::from("m1");
        map.register(msg.clone(), UserId::from("u1"));
        assert_eq!(map.take(&msg), Some(UserId::from("u1")));
        assert_eq!(map.take(&msg), None);
    }

    #[test]
    fn unregistered_entry_is_none() {
        let map = WelcomeMap::new();
        assert_eq!(map.take(&MessageId::from("missing")), None);
    }
}
