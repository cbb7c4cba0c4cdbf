//! Renders alert embeds and severity-shaped welcome DM content (spec §4.8
//! step 2, §4.11 step 3).

use ash_alerts::AlertEmbedSpec;
use ash_core::Severity;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};

fn severity_colour(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 0xE74C3C,
        Severity::High => 0xE67E22,
        Severity::Medium => 0xF1C40F,
        Severity::Low => 0x3498DB,
        Severity::Safe => 0x2ECC71,
    }
}

/// Purple accent used once an alert is edited to show auto-initiation
/// (spec §4.9 sweeper step).
const AUTO_INITIATED_COLOUR: u32 = 0x9B59B6;

pub fn build_alert_embed(spec: &AlertEmbedSpec) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("Crisis alert — {}", spec.severity))
        .description(&spec.truncated_text)
        .colour(severity_colour(spec.severity))
        .field("Crisis score", format!("{:.2}", spec.crisis_score), true)
        .field("Confidence", format!("{:.2}", spec.confidence), true);

    if !spec.categories.is_empty() {
        embed = embed.field("Categories", spec.categories.join(", "), false);
    }

    if spec.opted_out {
        embed = embed.field(
            "Note",
            "This user has previously opted out of direct Ash contact.",
            false,
        );
    }

    if let Some(ref original_id) = spec.original_message_id {
        embed = embed.field(
            "Original message",
            format!(
                "<#{}> — message `{}`",
                spec.original_channel_id, original_id
            ),
            false,
        );
    }

    embed.footer(CreateEmbedFooter::new(format!("user {}", spec.user_id)))
}

/// Edit an existing alert embed to the "auto-initiated" accent.
pub fn mark_auto_initiated(mut embed: CreateEmbed) -> CreateEmbed {
    embed = embed.colour(AUTO_INITIATED_COLOUR);
    embed.field(
        "Auto-initiated (no staff response)",
        "Ash started a direct check-in after the response window elapsed.",
        false,
    )
}

/// Edit an existing alert embed to note the user opted out before staff
/// responded (spec §4.11 opt-out-via-reaction).
pub fn mark_user_opted_out(embed: CreateEmbed) -> CreateEmbed {
    embed.field(
        "User prefers human support",
        "The user opted out of direct Ash contact before staff responded.",
        false,
    )
}

/// Welcome DM content, shaped by severity: urgent tone for CRITICAL/HIGH,
/// gentler for MEDIUM and below (spec §4.11 step 3).
pub fn welcome_message(severity: Severity) -> String {
    let body = match severity {
        Severity::Critical | Severity::High => {
            "Hey, it's Ash. Someone on the team flagged a message of yours because it sounded \
             like you might be going through something serious right now. I'm here if you want \
             to talk, right now, just the two of us."
        }
        _ => {
            "Hi, it's Ash. I noticed a recent message of yours and wanted to check in — no \
             pressure, just here if you'd like to talk."
        }
    };
    format!(
        "{body}\n\nReact with ❌ on this message at any time if you'd rather the team reach out \
         a different way — I'll let them know."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::{ChannelId, UserId};

    fn spec(severity: Severity) -> AlertEmbedSpec {
        AlertEmbedSpec {
            user_id: UserId::from("u1"),
            severity,
            truncated_text: "help me".to_string(),
            crisis_score: 0.8,
            categories: vec!["self_harm".to_string()],
            confidence: 0.9,
            opted_out: false,
            original_message_id: None,
            original_channel_id: ChannelId::from("c1"),
        }
    }

    #[test]
    fn welcome_message_is_more_urgent_for_high_severity() {
        let critical = welcome_message(Severity::Critical);
        let medium = welcome_message(Severity::Medium);
        assert_ne!(critical, medium);
        assert!(critical.contains("going through something serious"));
    }

    #[test]
    fn build_alert_embed_does_not_panic_on_empty_categories() {
        let mut s = spec(Severity::High);
        s.categories.clear();
        let _ = build_alert_embed(&s);
    }
}
