/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`). Later calls are no-ops,
/// as is calling it when the host app already installed a subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}
