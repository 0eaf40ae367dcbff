use anyhow::Result;
use tracing_subscriber::fmt;

/// Logs go to stderr so stdout stays clean for MCP frames and piped PNGs.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    Ok(())
}
