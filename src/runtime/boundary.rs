//! Refresh-boundary validation.
//!
//! A module is a refresh boundary when its new exports can replace the old
//! ones without a reload:
//!
//! 1. No export disappeared.
//! 2. No export, old or new, is defined by a getter.
//! 3. Every export is a likely component type, or is strictly equal to its
//!    previous value.
//! 4. The module exports something.
//!
//! Components are expected to change on every edit. Anything else changing
//! would leave consumers holding the stale value, so it forces a reload.

use thiserror::Error;
use tracing::{debug, warn};

use super::value::{ExportBinding, ExportsSnapshot, JsValue, ES_MODULE_FLAG};
use super::RefreshRuntime;

/// Where rejected updates point the developer.
pub const CONSISTENT_EXPORTS_HELP_URL: &str =
    "https://github.com/vitejs/vite-plugin-react/tree/main/packages/plugin-react#consistent-components-exports";

/// Why an update cannot be hot-swapped. Shown to the developer as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryRejection {
    #[error("Could not Fast Refresh (\"{name}\" export removed)")]
    ExportRemoved { name: String },

    #[error("Could not Fast Refresh (\"{name}\" new export)")]
    ExportAdded { name: String },

    #[error("Could not Fast Refresh (\"{name}\" export is defined by a getter). Learn more at {url}", url = CONSISTENT_EXPORTS_HELP_URL)]
    AccessorExport { name: String },

    #[error("Could not Fast Refresh (\"{name}\" export is incompatible). Learn more at {url}", url = CONSISTENT_EXPORTS_HELP_URL)]
    IncompatibleExport { name: String },

    #[error("Could not Fast Refresh (module has no exports). Learn more at {url}", url = CONSISTENT_EXPORTS_HELP_URL)]
    NoExports,
}

impl BoundaryRejection {
    /// Name of the offending export, if any.
    pub fn export_name(&self) -> Option<&str> {
        match self {
            BoundaryRejection::ExportRemoved { name }
            | BoundaryRejection::ExportAdded { name }
            | BoundaryRejection::AccessorExport { name }
            | BoundaryRejection::IncompatibleExport { name } => Some(name),
            BoundaryRejection::NoExports => None,
        }
    }
}

/// Validate without side effects.
pub fn validate_refresh_boundary(
    runtime: &RefreshRuntime,
    module_id: &str,
    prev_exports: &ExportsSnapshot,
    next_exports: &ExportsSnapshot,
) -> Result<(), BoundaryRejection> {
    let ignored = runtime
        .ignored_exports
        .as_ref()
        .map(|hook| hook(module_id))
        .unwrap_or_default();
    let prev = considered_exports(prev_exports, &ignored);
    let next = considered_exports(next_exports, &ignored);

    if let Some((name, _)) = prev.iter().find(|(name, _)| !next_exports.contains_key(name)) {
        return Err(BoundaryRejection::ExportRemoved {
            name: name.to_string(),
        });
    }

    if let Some((name, _)) = prev
        .iter()
        .chain(next.iter())
        .find(|(_, binding)| binding.is_accessor())
    {
        return Err(BoundaryRejection::AccessorExport {
            name: name.to_string(),
        });
    }

    if runtime.reject_added_exports {
        if let Some((name, _)) = next.iter().find(|(name, _)| !prev_exports.contains_key(name)) {
            return Err(BoundaryRejection::ExportAdded {
                name: name.to_string(),
            });
        }
    }

    if next.is_empty() {
        return Err(BoundaryRejection::NoExports);
    }

    let undefined = JsValue::Undefined;
    for (name, binding) in &next {
        let ExportBinding::Value(next_value) = binding else {
            continue;
        };
        if runtime.is_likely_component_type(next_value) {
            continue;
        }
        let prev_value = prev_exports.value(name).unwrap_or(&undefined);
        if !prev_value.strict_equals(next_value) {
            return Err(BoundaryRejection::IncompatibleExport {
                name: name.to_string(),
            });
        }
    }

    Ok(())
}

fn considered_exports<'a>(
    exports: &'a ExportsSnapshot,
    ignored: &[String],
) -> Vec<(&'a str, &'a ExportBinding)> {
    exports
        .iter()
        .filter(|(name, _)| *name != ES_MODULE_FLAG && !ignored.iter().any(|i| i.as_str() == *name))
        .collect()
}

/// Validate, and on success schedule the debounced refresh flush.
///
/// Returns `None` when the update is accepted, or the reason to show the
/// developer before the transport falls back to a full reload.
pub fn validate_refresh_boundary_and_enqueue_update(
    runtime: &mut RefreshRuntime,
    module_id: &str,
    prev_exports: &ExportsSnapshot,
    next_exports: &ExportsSnapshot,
) -> Option<String> {
    match validate_refresh_boundary(runtime, module_id, prev_exports, next_exports) {
        Ok(()) => {
            debug!(module_id, "refresh boundary accepted");
            runtime.enqueue_update();
            None
        }
        Err(rejection) => {
            warn!(module_id, reason = %rejection, "refresh boundary rejected");
            Some(rejection.to_string())
        }
    }
}
