pub mod config;
pub mod error;
pub mod health;
pub mod ids;
pub mod resilience;
pub mod severity;
pub mod types;

pub use error::{AshError, Result};
pub use health::{ComponentStatus, HealthSnapshot, HealthSource};
pub use ids::{ChannelId, GuildId, MessageId, UserId};
pub use resilience::{CircuitBreaker, CircuitState};
pub use severity::{Severity, SeverityThresholds};
