use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Picks the active filter: a valid `RUST_LOG` is used on its own, otherwise
/// only this crate logs, at debug when `verbose` and not at all without it.
fn filters(verbose: bool, rust_log: Option<&str>) -> (Option<Targets>, Option<EnvFilter>) {
    if let Some(env_filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return (None, Some(env_filter));
    }

    let level_filter = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    };
    (
        Some(Targets::new().with_target("cbr_stats", level_filter)),
        None,
    )
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (app_filter, env_filter) = filters(verbose, rust_log.as_deref());

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(app_filter)
        .with(env_filter)
        .init();
}
