//! Centralized Redis key-naming so every crate builds keys the same way.
//!
//! Authoritative schema per spec §6:
//! - `ash:history:{guild_id}:{user_id}` — sorted set of [`StoredMessage`] JSON
//! - `ash:optout:{user_id}` — string JSON preference record
//! - `ash:pending:{alert_message_id}` — string JSON `PendingAlert`
//! - `ash:checkin:{user_id}:{scheduled_ts}` — string JSON `CheckIn`
//! - `ash:notes:{user_id}` — string JSON list of CRT notes

const PREFIX: &str = "ash";

pub fn history_key(guild_id: &str, user_id: &str) -> String {
    format!("{PREFIX}:history:{guild_id}:{user_id}")
}

pub fn optout_key(user_id: &str) -> String {
    format!("{PREFIX}:optout:{user_id}")
}

pub fn pending_alert_key(alert_message_id: &str) -> String {
    format!("{PREFIX}:pending:{alert_message_id}")
}

pub fn check_in_key(user_id: &str, scheduled_ts: i64) -> String {
    format!("{PREFIX}:checkin:{user_id}:{scheduled_ts}")
}

pub fn check_in_scan_prefix() -> String {
    format!("{PREFIX}:checkin:")
}

pub fn pending_alert_scan_prefix() -> String {
    format!("{PREFIX}:pending:")
}

pub fn notes_key(user_id: &str) -> String {
    format!("{PREFIX}:notes:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_key_scopes_by_guild_and_user() {
        assert_ne!(history_key("g1", "u1"), history_key("g2", "u1"));
        assert_ne!(history_key("g1", "u1"), history_key("g1", "u2"));
    }

    #[test]
    fn check_in_key_is_unique_per_schedule() {
        assert_ne!(check_in_key("u1", 100), check_in_key("u1", 200));
    }
}
