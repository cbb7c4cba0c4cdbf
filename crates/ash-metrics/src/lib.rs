pub mod recorder;
pub mod server;

pub use recorder::install_recorder;
pub use server::{build_router, MetricsState};
