//! Interactive-control rendering and `custom_id` encoding for alert embeds
//! (spec §4.8 step 3). The control set is config-driven (`ash.toml`
//! `[alerts].controls`); this module only knows how to render whichever
//! actions the dispatcher hands it.

use ash_alerts::ControlAction;
use serenity::all::{ButtonStyle, RoleId};
use serenity::builder::{CreateActionRow, CreateButton};

/// `custom_id` prefix so `interaction_create` can route clicks back here
/// without ambiguity against any other component in the bot.
const PREFIX: &str = "ash";

pub fn custom_id(action: ControlAction, alert_message_id: &str) -> String {
    let tag = match action {
        ControlAction::Acknowledge => "ack",
        ControlAction::TalkToAsh => "talk",
        ControlAction::History => "history",
    };
    format!("{PREFIX}:{tag}:{alert_message_id}")
}

/// Parse a `custom_id` produced by [`custom_id`] back into its action and
/// the alert message id it targets. Returns `None` for anything not ours.
pub fn parse_custom_id(raw: &str) -> Option<(ControlAction, String)> {
    let mut parts = raw.splitn(3, ':');
    if parts.next()? != PREFIX {
        return None;
    }
    let tag = parts.next()?;
    let alert_id = parts.next()?;
    let action = match tag {
        "ack" => ControlAction::Acknowledge,
        "talk" => ControlAction::TalkToAsh,
        "history" => ControlAction::History,
        _ => return None,
    };
    Some((action, alert_id.to_string()))
}

pub fn build_action_row(controls: &[ControlAction], alert_message_id: &str) -> CreateActionRow {
    let buttons = controls
        .iter()
        .map(|action| {
            let (label, style) = match action {
                ControlAction::Acknowledge => ("Acknowledge", ButtonStyle::Success),
                ControlAction::TalkToAsh => ("Talk to Ash", ButtonStyle::Primary),
                ControlAction::History => ("History", ButtonStyle::Secondary),
            };
            CreateButton::new(custom_id(*action, alert_message_id))
                .label(label)
                .style(style)
        })
        .collect();
    CreateActionRow::Buttons(buttons)
}

/// `true` iff `member_roles` include the configured CRT role (spec §4.8
/// step 3 / §7 "Authorisation"). Non-CRT clicks are refused with an
/// ephemeral message at the call site, never a stack trace.
pub fn is_crt(member_roles: &[RoleId], crt_role_id: RoleId) -> bool {
    member_roles.contains(&crt_role_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_id_round_trips() {
        let id = custom_id(ControlAction::Acknowledge, "12345");
        let (action, alert_id) = parse_custom_id(&id).unwrap();
        assert_eq!(action, ControlAction::Acknowledge);
        assert_eq!(alert_id, "12345");
    }

    #[test]
    fn unrelated_custom_id_is_ignored() {
        assert!(parse_custom_id("some_other_component").is_none());
    }

    #[test]
    fn crt_gate_requires_configured_role() {
        let crt = RoleId::new(42);
        assert!(is_crt(&[RoleId::new(1), crt], crt));
        assert!(!is_crt(&[RoleId::new(1)], crt));
    }
}
