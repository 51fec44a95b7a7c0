// Tracing setup
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise `level` (e.g. `info`, `play_sim=debug`).
pub fn init(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };
    // A subscriber may already be installed (tests); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
    Ok(())
}
