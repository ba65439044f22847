use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

/// Verbose mode logs this crate at debug and everything else at info;
/// `RUST_LOG` overrides the default when set.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,manga_page_translator=debug"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}
