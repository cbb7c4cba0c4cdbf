pub mod client;
pub mod error;
pub mod wire;

pub use client::NlpClient;
pub use error::NlpError;
