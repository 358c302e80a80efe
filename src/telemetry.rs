use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "simplefeed=info,tower_http=debug";

/// Initialize logging from `RUST_LOG`.
///
/// `SIMPLEFEED_LOG_FORMAT=json` switches to one JSON object per event.
/// Call once per process; a second call panics.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match std::env::var("SIMPLEFEED_LOG_FORMAT").as_deref() {
        Ok("json") => registry.with(fmt::layer().json().flatten_event(true)).init(),
        _ => registry.with(fmt::layer()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_installs_global_subscriber() {
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
    }
}
