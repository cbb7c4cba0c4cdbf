pub mod handler;
pub mod notes;
pub mod types;

pub use handler::{AshCommandHandler, StatsSnapshot, StatsSource};
pub use types::{AshCommand, CommandOutcome};
