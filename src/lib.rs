//! # React Refresh Plugin
//!
//! Fast Refresh support for a JavaScript bundler: the refresh runtime model
//! (component registry, hook signatures, boundary validation, debounced
//! updates) and the plugin that instruments modules with the wrapper code
//! calling into it.
//!
//! The plugin never parses JSX or TypeScript. It consumes source text that
//! an external compiler already annotated with `$RefreshReg$` /
//! `$RefreshSig$` calls and decides whether and how to wrap it.

pub mod plugin;
pub mod runtime;
pub mod utils;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use plugin::options::{JsxRuntime, PluginOptions};
pub use plugin::refresh_loader::RefreshLoader;
pub use runtime::boundary::{
    validate_refresh_boundary, validate_refresh_boundary_and_enqueue_update, BoundaryRejection,
};
pub use runtime::value::{ExportBinding, ExportsSnapshot, JsFunction, JsObject, JsValue};
pub use runtime::{RefreshRuntime, RefreshUpdate, RuntimeConfig};

// ---------------------------------------------------------------------------
// Build Mode
// ---------------------------------------------------------------------------

/// The build mode decides whether refresh instrumentation is emitted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Development: dev server with HMR, refresh wrappers injected.
    #[default]
    Dev,
    /// Production build: modules pass through untouched.
    Prod,
}

// ---------------------------------------------------------------------------
// RefreshError
// ---------------------------------------------------------------------------

/// Errors raised by the plugin and the refresh runtime model.
///
/// Boundary rejections are not errors; see [`BoundaryRejection`].
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Instrumented code ran before the preamble injected the runtime into
    /// the global hook. Fatal, never retried.
    #[error("{plugin} can't detect preamble. Something is wrong.")]
    PreambleNotDetected { plugin: String },

    #[error("Invalid plugin options: {0}")]
    InvalidOptions(String),

    #[error("Invalid filter pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Source map error: {0}")]
    SourceMap(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
