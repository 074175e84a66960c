use std::sync::Once;

static INIT: Once = Once::new();

/// Install a tracing subscriber once for the whole test binary so
/// `RUST_LOG=layertree=trace cargo test` shows resolver and merge steps.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "layertree=info".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
