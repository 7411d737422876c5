use crate::Result;

/// Initialize tracing for the bot.
///
/// Default: info for our crates and the service binary.
/// Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,abot=info,abot_core=info,abot_telegram=info,{service_name}=info"
        ))
    });

    // A second call (tests, embedded hosts) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init();

    Ok(())
}
