//! Bundler plugin for React Fast Refresh.
//!
//! - `options`: user-facing configuration and module filters
//! - `refresh_wrapper`: header/footer templates around instrumented modules
//! - `runtime_module`: source served for the virtual runtime module
//! - `refresh_loader`: resolve/load/transform decisions (+ Rolldown adapter)

pub mod options;
pub mod refresh_loader;
pub mod refresh_wrapper;
pub mod runtime_module;
