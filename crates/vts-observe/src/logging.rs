use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `VTS_LOG` first, then `RUST_LOG`, then a default.
///
/// Log field contract for the sampler:
/// - Include `sample_index` on every fetch-related event.
/// - Include `path` and `attempt` on decode/caption failure events.
/// - Include `substitute` whenever a failed index is replaced.
pub fn init_tracing() {
    let filter = env_filter();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("VTS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
