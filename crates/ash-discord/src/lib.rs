pub mod adapter;
pub mod alert_channel;
pub mod bridges;
pub mod commands;
pub mod controls;
pub mod embed;
pub mod error;
pub mod handler;
pub mod ingress;
pub mod session_channel;
pub mod welcome_map;

pub use adapter::DiscordAdapter;
pub use alert_channel::DiscordAlertChannel;
pub use bridges::{AlertDispatcherAnnotator, SessionManagerInitiator};
pub use error::DiscordError;
pub use handler::{DiscordHandler, Inner};
pub use session_channel::DiscordSessionChannel;
pub use welcome_map::WelcomeMap;
