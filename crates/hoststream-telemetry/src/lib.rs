#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the hoststream workspace.
//!
//! Layout: `init.rs` (subscriber installation and build metadata), `context.rs`
//! (process and stream spans), `metrics.rs` (Prometheus registry for stream dispatch).

pub mod context;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, record_plugin_mode, stream_span};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
