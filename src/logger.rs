use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Resolves the log filter from an explicit directive (`PROTODRILL_LOG`
/// wins over `RUST_LOG`) or, absent one, from the verbose flag.
fn resolve_filter(configured: Option<String>, verbose: bool) -> EnvFilter {
    match configured {
        Some(value) => EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        None if verbose => EnvFilter::new("debug"),
        None => EnvFilter::new("info"),
    }
}

pub fn init_logging(verbose: bool) {
    let configured = std::env::var("PROTODRILL_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(resolve_filter(configured, verbose))
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}
