use ash_core::ChannelId;

/// Routing outcome for a classified message, per spec §4.6 step 5 /
/// testable property 7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// The alert channel to post to. `None` for `LOW`/`SAFE` — no alert.
    pub target_channel: Option<ChannelId>,
    /// Whether the CRT role should be pinged (`HIGH`/`CRITICAL` only).
    pub ping_crt: bool,
}

impl RouteDecision {
    pub fn no_alert() -> Self {
        Self {
            target_channel: None,
            ping_crt: false,
        }
    }
}
