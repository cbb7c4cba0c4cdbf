//! Point-in-time counters for `/ash stats` (spec §4.13), pulled from the
//! three managers that own in-memory state.

use std::sync::Arc;

use ash_alerts::AutoInitiateManager;
use ash_commands::{StatsSnapshot, StatsSource};
use ash_sessions::{CheckInScheduler, SessionManager};
use async_trait::async_trait;

pub struct GatewayStats {
    pub auto_initiate: Arc<AutoInitiateManager>,
    pub sessions: Arc<SessionManager>,
    pub check_in: Arc<CheckInScheduler>,
}

#[async_trait]
impl StatsSource for GatewayStats {
    async fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pending_alerts: self.auto_initiate.pending_count(),
            active_sessions: self.sessions.active_count(),
            pending_check_ins: self.check_in.pending_count(),
        }
    }
}
