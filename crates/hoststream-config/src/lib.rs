#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Typed configuration for the stream runtime.
//!
//! Layout: `model.rs` (typed config sections and defaults), `validate.rs`
//! (validation and value parsing helpers), `loader.rs` (JSON files and environment
//! overrides).

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_BUFFER_SIZE, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_QUEUE_CAPACITY};
pub use model::{
    DEFAULT_LOG_LEVEL, DEFAULT_QUEUE_CAPACITY, HoststreamConfig, LogOutput, RuntimeConfig,
    StreamDefaults, TelemetryConfig,
};
pub use validate::MAX_INTERNAL_BUFFER_SIZE;
