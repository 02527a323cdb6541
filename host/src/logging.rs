use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Targets the challenge controllers log under; each gets its own file so
/// one pipeline's chatter doesn't bury the other's.
pub const IDLE_TARGET: &str = "ichal";
pub const SERVICE_TARGET: &str = "schal";

/// Install rotating file logging under `<workspace>/log`. Returns the
/// appender guards; dropping them loses buffered lines.
pub fn init(log_dir: &Path, level: &str) -> Vec<WorkerGuard> {
    let appender = |prefix: &str| {
        Builder::new()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .filename_suffix("log")
            .max_log_files(7)
            .build(log_dir)
            .expect("initializing rolling file appender failed")
    };

    let (main_writer, main_guard) = tracing_appender::non_blocking(appender("log"));
    let (ichal_writer, ichal_guard) = tracing_appender::non_blocking(appender(IDLE_TARGET));
    let (schal_writer, schal_guard) = tracing_appender::non_blocking(appender(SERVICE_TARGET));

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(main_writer))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(ichal_writer)
                .with_filter(filter_fn(|meta| meta.target() == IDLE_TARGET)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(schal_writer)
                .with_filter(filter_fn(|meta| meta.target() == SERVICE_TARGET)),
        )
        .init();

    vec![main_guard, ichal_guard, schal_guard]
}
