//! Process entrypoint: load config, init logging, wire the runtime, run
//! until shutdown (spec §2 "Bot Runtime").

mod health;
mod runtime;
mod stats;

use ash_core::config::AshConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config_path = std::env::var("ASH_CONFIG").ok();
    let config = match AshConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config validation failed: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level, &config.log.format);

    tracing::info!("ash starting up");

    if let Err(e) = runtime::run(config).await {
        tracing::error!(error = %e, code = e.code(), "fatal startup error");
        std::process::exit(1);
    }

    tracing::info!("ash shut down cleanly");
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }
}
