//! Tracing setup for the embedding add-in.

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used (the add-in
/// passes `"info"`). Returns false if a subscriber was already installed,
/// which happens when the host reloads the add-in inside the same process.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

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
    fn test_second_init_is_tolerated() {
        let _ = init_tracing("debug");
        assert!(!init_tracing("debug"));
    }
}
