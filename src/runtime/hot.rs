//! What the injected footer does, against a host HMR transport.
//!
//! The transport owns the previous exports snapshot and the reload
//! fallback. Instrumented code only finds the runtime through the global
//! hook the preamble installs; if the preamble never ran, that is a
//! configuration error raised on the spot.

use tracing::debug;

use super::boundary::validate_refresh_boundary_and_enqueue_update;
use super::value::ExportsSnapshot;
use super::RefreshRuntime;
use crate::plugin::refresh_wrapper::DEFAULT_PLUGIN_NAME;
use crate::RefreshError;

/// The `import.meta.hot` object of one module, as far as refresh needs it.
pub trait HotContext {
    /// Exports of the instance being replaced, if it was ever evaluated.
    fn previous_exports(&self) -> Option<&ExportsSnapshot>;

    /// Give up on hot-swapping this module and let the transport reload.
    fn invalidate(&mut self, reason: &str);
}

/// Globals the preamble installs on `window`.
#[derive(Debug, Default)]
pub struct HostGlobals {
    plugin_name: Option<String>,
    runtime: Option<RefreshRuntime>,
}

impl HostGlobals {
    /// A page where the preamble has not run.
    pub fn new() -> Self {
        Self::default()
    }

    /// A page where the preamble injected `runtime` into the global hook.
    pub fn with_preamble(runtime: RefreshRuntime) -> Self {
        Self {
            plugin_name: None,
            runtime: Some(runtime),
        }
    }

    /// Plugin name quoted by the missing-preamble error.
    pub fn with_plugin_name(mut self, name: impl Into<String>) -> Self {
        self.plugin_name = Some(name.into());
        self
    }

    pub fn inject_preamble(&mut self, runtime: RefreshRuntime) {
        self.runtime = Some(runtime);
    }

    pub fn has_preamble(&self) -> bool {
        self.runtime.is_some()
    }

    /// The injected runtime.
    pub fn refresh_runtime(&mut self) -> Result<&mut RefreshRuntime, RefreshError> {
        let plugin = self
            .plugin_name
            .clone()
            .unwrap_or_else(|| DEFAULT_PLUGIN_NAME.to_string());
        self.runtime
            .as_mut()
            .ok_or(RefreshError::PreambleNotDetected { plugin })
    }
}

/// Outcome of a hot update delivered to an instrumented module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotOutcome {
    /// Exports form a refresh boundary; a flush is scheduled.
    Accepted,
    /// The transport was asked to reload, with this reason.
    Invalidated(String),
    /// Nothing to compare against (no new exports or no previous instance).
    Skipped,
}

/// Footer of a module evaluated for the first time: register its components.
pub fn evaluate_module(
    globals: &mut HostGlobals,
    module_id: &str,
    exports: &ExportsSnapshot,
) -> Result<(), RefreshError> {
    let runtime = globals.refresh_runtime()?;
    runtime.register_exports_for_react_refresh(module_id, exports);
    Ok(())
}

/// Accept callback of a module that was re-evaluated with `next_exports`.
///
/// The new instance registers its components first, then the update is
/// validated against the transport's previous snapshot. A rejection is
/// passed to [`HotContext::invalidate`].
pub fn accept_hot_update<H>(
    globals: &mut HostGlobals,
    hot: &mut H,
    module_id: &str,
    next_exports: Option<&ExportsSnapshot>,
) -> Result<HotOutcome, RefreshError>
where
    H: HotContext + ?Sized,
{
    let runtime = globals.refresh_runtime()?;
    let Some(next_exports) = next_exports else {
        debug!(module_id, "hot update without exports");
        return Ok(HotOutcome::Skipped);
    };
    runtime.register_exports_for_react_refresh(module_id, next_exports);

    let Some(prev_exports) = hot.previous_exports() else {
        debug!(module_id, "no previous instance to validate against");
        return Ok(HotOutcome::Skipped);
    };
    match validate_refresh_boundary_and_enqueue_update(runtime, module_id, prev_exports, next_exports) {
        None => Ok(HotOutcome::Accepted),
        Some(reason) => {
            hot.invalidate(&reason);
            Ok(HotOutcome::Invalidated(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::JsFunction;

    #[derive(Default)]
    struct RecordingHot {
        previous: Option<ExportsSnapshot>,
        invalidations: Vec<String>,
    }

    impl HotContext for RecordingHot {
        fn previous_exports(&self) -> Option<&ExportsSnapshot> {
            self.previous.as_ref()
        }

        fn invalidate(&mut self, reason: &str) {
            self.invalidations.push(reason.to_string());
        }
    }

    #[test]
    fn missing_preamble_is_fatal() {
        let mut globals = HostGlobals::new();
        let err = evaluate_module(&mut globals, "/src/App.tsx", &ExportsSnapshot::new()).unwrap_err();
        assert!(matches!(err, RefreshError::PreambleNotDetected { .. }));
        assert_eq!(
            err.to_string(),
            format!("{DEFAULT_PLUGIN_NAME} can't detect preamble. Something is wrong.")
        );
    }

    #[test]
    fn missing_preamble_names_configured_plugin() {
        let mut globals = HostGlobals::new().with_plugin_name("@acme/react");
        let mut hot = RecordingHot::default();
        let err = accept_hot_update(&mut globals, &mut hot, "m", None).unwrap_err();
        assert!(err.to_string().starts_with("@acme/react can't detect preamble"));
    }

    #[test]
    fn first_evaluation_registers_components() {
        let mut globals = HostGlobals::with_preamble(RefreshRuntime::new());
        let exports = ExportsSnapshot::new().with("App", JsFunction::new("App"));
        evaluate_module(&mut globals, "/src/App.tsx", &exports).unwrap();
        let runtime = globals.refresh_runtime().unwrap();
        assert!(runtime.family_by_id("/src/App.tsx App").is_some());
    }

    #[test]
    fn rejected_update_invalidates_transport() {
        let mut globals = HostGlobals::with_preamble(RefreshRuntime::new());
        let mut hot = RecordingHot {
            previous: Some(ExportsSnapshot::new().with("LIMIT", 5)),
            ..Default::default()
        };
        let next = ExportsSnapshot::new().with("LIMIT", 6);
        let outcome = accept_hot_update(&mut globals, &mut hot, "m", Some(&next)).unwrap();
        assert!(matches!(outcome, HotOutcome::Invalidated(_)));
        assert_eq!(hot.invalidations.len(), 1);
    }

    #[test]
    fn update_without_exports_is_skipped() {
        let mut globals = HostGlobals::with_preamble(RefreshRuntime::new());
        let mut hot = RecordingHot::default();
        let outcome = accept_hot_update(&mut globals, &mut hot, "m", None).unwrap();
        assert_eq!(outcome, HotOutcome::Skipped);
        assert!(hot.invalidations.is_empty());
    }
}
