//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `LUMEN_LOG=lumen_gpu=debug`
pub const LOG_ENV: &str = "LUMEN_LOG";

/// Install a fmt subscriber filtered by `LUMEN_LOG` (default `info`).
///
/// Safe to call more than once; returns false when a global subscriber was
/// already installed.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_logging();
        assert!(!init_logging());
        tracing::debug!("logging initialized");
    }
}
