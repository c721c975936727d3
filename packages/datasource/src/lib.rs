//! # Montage Data Sources
//!
//! Declared remote-data bindings: gating, request dispatch, ordering, and
//! result/error injection into the owning scope.
//!
//! Each source moves `init -> loading -> (loaded | error)` and can re-enter
//! `loading` on manual reload. Overlapping loads are allowed and run
//! independently; the last write to the shared `data`/`error` fields wins.
//! Failures are isolated per source: one failing load never prevents the
//! rest of a reload batch from completing.

pub mod error;
pub mod handlers;
pub mod http_handler;
pub mod orchestrator;
pub mod status;

#[cfg(test)]
mod tests_http;

pub use error::{DataSourceError, LoadResult};
pub use handlers::{HandlerRegistry, RequestHandler};
pub use http_handler::{http_handler, HttpRequest, HttpResponse, Transport};
pub use orchestrator::{LoadOptions, Orchestrator};
pub use status::DataSourceStatus;
