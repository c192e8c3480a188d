//! provides logging helpers

use tracing::Subscriber;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Filter honouring `RUST_LOG`, `info` when unset.
pub fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// stderr layer shared by all binaries
pub fn get_fmt_layer<S>() -> impl Layer<S>
where S: Subscriber + for<'a> LookupSpan<'a> {
    layer().with_writer(std::io::stderr).with_target(true)
}
