//! Log output for binaries and tests embedding the pipeline.

use tracing_subscriber::EnvFilter;

/// Environment variable read for the filter directives.
pub const ENV: &str = "POLYSCHEMA_LOG";

/// Install a stderr subscriber filtered by `POLYSCHEMA_LOG`, falling back
/// to `warn`. Returns false when a subscriber is already installed.
pub fn init() -> bool {
    init_with("warn")
}

/// Like [`init`] with an explicit fallback filter such as `polyschema=debug`.
pub fn init_with(default: &str) -> bool {
    let filter = EnvFilter::try_from_env(ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_existing_subscriber() {
        init_with("debug");
        assert!(!init());
    }
}
