use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the level chosen by `debug`.
pub fn init(debug: bool) {
    let default_level = if debug { "listing_watch=debug,info" } else { "info" };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(debug))
        .try_init();
}
