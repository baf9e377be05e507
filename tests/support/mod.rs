pub mod socket_guard;

/// Installs a fmt subscriber once so failing tests print the library's
/// tracing output. Repeat calls are no-ops.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
