//! Logging and error reporting.

/// Install the global `tracing` subscriber.
///
/// Honors `RUST_LOG`; defaults to `ns_client=debug`. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ns_client=debug".into()),
        )
        .try_init();
}

/// Initialize Sentry only when `SENTRY_DSN_CLIENT` is configured.
///
/// Keep the returned guard alive for the lifetime of the application.
pub fn init_error_reporting() -> Option<sentry::ClientInitGuard> {
    std::env::var("SENTRY_DSN_CLIENT")
        .ok()
        .filter(|dsn| !dsn.is_empty())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    environment: Some(
                        std::env::var("APP_ENV")
                            .unwrap_or_else(|_| "development".to_string())
                            .into(),
                    ),
                    sample_rate: 1.0,
                    traces_sample_rate: 0.05,
                    send_default_pii: false,
                    ..Default::default()
                },
            ))
        })
}
