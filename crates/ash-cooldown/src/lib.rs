pub mod guard;

pub use guard::{CooldownGuard, CooldownWindows};
