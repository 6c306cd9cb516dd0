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

//! Serialized per-plugin dispatch context for host stream notifications.
//!
//! Host adapters push notifications through a [`HostNotifier`] from any thread;
//! a single worker task applies them to streams in arrival order, so sink handlers
//! never run concurrently for one plugin instance.
//!
//! Layout: `command.rs` (worker commands), `context.rs` (the worker as a stream
//! dispatch context), `registry.rs` (streams kept alive until teardown),
//! `worker.rs` (the dispatch task), `runtime.rs` (`PluginRuntime` and
//! `HostNotifier`), `bootstrap.rs` (telemetry wiring from configuration).

pub mod bootstrap;
mod command;
mod context;
pub mod error;
mod registry;
pub mod runtime;
mod worker;

pub use bootstrap::{init_telemetry, logging_config};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{HostNotifier, PluginRuntime};
