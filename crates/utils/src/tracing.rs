//! Tracing subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing::{debug, error, info, trace, warn, Level};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing system
///
/// Honors `RUST_LOG`, defaulting to `info`. Output goes to stderr.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .compact()
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Install a test-friendly subscriber; safe to call from every test
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_test_writer().with_ansi(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_for_tests_is_idempotent() {
        init_for_tests();
        init_for_tests();
        warn!("still logging");
    }
}
