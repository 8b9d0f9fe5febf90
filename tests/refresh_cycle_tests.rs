//! End-to-end refresh cycles against the runtime model.
//!
//! A cycle is: first evaluation registers families, an edit re-evaluates the
//! module, the footer validates the boundary, and one debounced flush tells
//! the renderer which families keep state and which remount.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use react_refresh_plugin::runtime::hot::{
    accept_hot_update, evaluate_module, HostGlobals, HotContext, HotOutcome,
};
use react_refresh_plugin::runtime::signature::{signature_key, CustomHooksFn, HookCall};
use react_refresh_plugin::runtime::value::ClassBase;
use react_refresh_plugin::runtime::RefreshRenderer;
use react_refresh_plugin::{
    validate_refresh_boundary_and_enqueue_update, ExportsSnapshot, JsFunction, JsObject, JsValue,
    RefreshRuntime, RefreshUpdate, RuntimeConfig,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MODULE: &str = "/src/App.tsx";
const APP_FAMILY: &str = "/src/App.tsx App";

/// Renderer that records every flush it is handed.
#[derive(Clone, Default)]
struct RecordingRenderer {
    updates: Rc<RefCell<Vec<RefreshUpdate>>>,
}

impl RefreshRenderer for RecordingRenderer {
    fn schedule_refresh(&mut self, update: &RefreshUpdate) {
        self.updates.borrow_mut().push(update.clone());
    }
}

/// `import.meta.hot` of one module, remembering the last evaluated exports.
#[derive(Default)]
struct FakeHot {
    previous: Option<ExportsSnapshot>,
    invalidations: Vec<String>,
}

impl HotContext for FakeHot {
    fn previous_exports(&self) -> Option<&ExportsSnapshot> {
        self.previous.as_ref()
    }

    fn invalidate(&mut self, reason: &str) {
        self.invalidations.push(reason.to_string());
    }
}

fn state_hooks() -> String {
    signature_key(&[HookCall::new("useState", "[count, setCount](0)")])
}

fn state_and_effect_hooks() -> String {
    signature_key(&[
        HookCall::new("useState", "[count, setCount](0)"),
        HookCall::new("useEffect", ""),
    ])
}

/// Define `App` the way compiled output does: create, sign, register.
fn define_app(runtime: &mut RefreshRuntime, hooks: &str) -> JsValue {
    let mut sign = runtime.create_signature_function_for_transform();
    let app = sign.sign(runtime, JsFunction::new("App").into(), hooks, false, None);
    runtime.register_local(MODULE, app.clone(), "App");
    app
}

fn updated(families: &[&str]) -> RefreshUpdate {
    RefreshUpdate {
        updated_families: families.iter().map(|f| f.to_string()).collect(),
        ..Default::default()
    }
}

fn stale(families: &[&str]) -> RefreshUpdate {
    RefreshUpdate {
        stale_families: families.iter().map(|f| f.to_string()).collect(),
        ..Default::default()
    }
}

// ===========================================================================
// Family classification
// ===========================================================================

/// Same hook signature: the family keeps its state.
#[test]
fn unchanged_signature_updates_family() {
    let mut runtime = RefreshRuntime::new();
    define_app(&mut runtime, &state_hooks());
    let next = define_app(&mut runtime, &state_hooks());

    assert_eq!(runtime.pending_update_count(), 1);
    assert_eq!(runtime.perform_refresh(), updated(&[APP_FAMILY]));
    assert_eq!(runtime.pending_update_count(), 0);

    let family = runtime.family_by_id(APP_FAMILY).unwrap();
    assert!(family.current_value.strict_equals(&next));
    assert_eq!(family.signature.as_deref(), Some(state_hooks().as_str()));
}

/// Adding a hook changes the signature: the family remounts.
#[test]
fn changed_signature_marks_family_stale() {
    let mut runtime = RefreshRuntime::new();
    define_app(&mut runtime, &state_hooks());
    define_app(&mut runtime, &state_and_effect_hooks());
    assert_eq!(runtime.perform_refresh(), stale(&[APP_FAMILY]));
}

/// `// @refresh reset` forces a remount even with equal signatures.
#[test]
fn force_reset_marks_family_stale() {
    let mut runtime = RefreshRuntime::new();
    define_app(&mut runtime, &state_hooks());

    let mut sign = runtime.create_signature_function_for_transform();
    let next = sign.sign(&mut runtime, JsFunction::new("App").into(), &state_hooks(), true, None);
    runtime.register_local(MODULE, next, "App");

    assert_eq!(runtime.perform_refresh(), stale(&[APP_FAMILY]));
}

/// Class components never preserve state.
#[test]
fn class_components_are_always_stale() {
    let mut runtime = RefreshRuntime::new();
    let first = JsFunction::class("Clock", ClassBase::ReactComponent);
    let second = JsFunction::class("Clock", ClassBase::ReactComponent);
    runtime.register_local(MODULE, first.into(), "Clock");
    runtime.register_local(MODULE, second.into(), "Clock");
    assert_eq!(runtime.perform_refresh(), stale(&["/src/App.tsx Clock"]));
}

/// Unsigned components (no hooks) compare equal.
#[test]
fn unsigned_components_are_updated() {
    let mut runtime = RefreshRuntime::new();
    runtime.register_local(MODULE, JsFunction::new("Header").into(), "Header");
    runtime.register_local(MODULE, JsFunction::new("Header").into(), "Header");
    assert_eq!(runtime.perform_refresh(), updated(&["/src/App.tsx Header"]));
}

/// A component that gains hooks cannot keep its state.
#[test]
fn gaining_a_signature_is_stale() {
    let mut runtime = RefreshRuntime::new();
    runtime.register_local(MODULE, JsFunction::new("App").into(), "App");
    define_app(&mut runtime, &state_hooks());
    assert_eq!(runtime.perform_refresh(), stale(&[APP_FAMILY]));
}

/// `forwardRef` registers its render function as a nested family.
#[test]
fn forward_ref_registers_render_family() {
    let mut runtime = RefreshRuntime::new();
    let render = JsFunction::new("ButtonRender");
    let button = JsObject::forward_ref(render.clone());
    runtime.register_local(MODULE, button.into(), "Button");

    assert!(runtime.family_by_id("/src/App.tsx Button").is_some());
    let nested = runtime.family_by_type(&render.into()).unwrap();
    assert_eq!(nested.key, "/src/App.tsx Button$render");
}

// ===========================================================================
// Custom hooks
// ===========================================================================

fn define_with_custom_hook(runtime: &mut RefreshRuntime, hook_key: &str) -> JsValue {
    let mut sign_hook = runtime.create_signature_function_for_transform();
    let use_counter = sign_hook.sign(
        runtime,
        JsFunction::new("useCounter").into(),
        hook_key,
        false,
        None,
    );

    let hooks: CustomHooksFn =
        Arc::new(move || -> anyhow::Result<Vec<JsValue>> { Ok(vec![use_counter.clone()]) });
    let mut sign = runtime.create_signature_function_for_transform();
    let app = sign.sign(
        runtime,
        JsFunction::new("App").into(),
        "useCounter{}",
        false,
        Some(hooks),
    );
    sign.on_render(runtime);
    runtime.register_local(MODULE, app.clone(), "App");
    app
}

/// Editing a custom hook's own hooks changes every caller's signature.
#[test]
fn custom_hook_change_marks_caller_stale() {
    let mut runtime = RefreshRuntime::new();
    define_with_custom_hook(&mut runtime, &state_hooks());
    define_with_custom_hook(&mut runtime, &state_and_effect_hooks());
    assert_eq!(runtime.perform_refresh(), stale(&[APP_FAMILY]));
}

/// Unchanged custom hooks keep the caller's state.
#[test]
fn unchanged_custom_hook_keeps_caller_state() {
    let mut runtime = RefreshRuntime::new();
    define_with_custom_hook(&mut runtime, &state_hooks());
    define_with_custom_hook(&mut runtime, &state_hooks());
    assert_eq!(runtime.perform_refresh(), updated(&[APP_FAMILY]));
}

/// Hooks that cannot be resolved yet force a reset.
#[test]
fn unresolvable_custom_hooks_force_reset() {
    let mut runtime = RefreshRuntime::new();
    define_app(&mut runtime, "useCounter{}");

    let hooks: CustomHooksFn = Arc::new(|| -> anyhow::Result<Vec<JsValue>> {
        Err(anyhow::anyhow!("useCounter is not defined"))
    });
    let mut sign = runtime.create_signature_function_for_transform();
    let next = sign.sign(
        &mut runtime,
        JsFunction::new("App").into(),
        "useCounter{}",
        false,
        Some(hooks),
    );
    runtime.register_local(MODULE, next, "App");

    assert_eq!(runtime.perform_refresh(), stale(&[APP_FAMILY]));
}

/// Signatures are compared with the injected comparator.
#[test]
fn custom_comparator_decides_equality() {
    let ignore_effects = |prev: &str, next: &str| {
        let strip = |key: &str| {
            key.lines()
                .filter(|line| !line.starts_with("useEffect"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        strip(prev) == strip(next)
    };
    let mut runtime = RefreshRuntime::new().with_signature_comparator(ignore_effects);
    define_app(&mut runtime, &state_hooks());
    define_app(&mut runtime, &state_and_effect_hooks());
    assert_eq!(runtime.perform_refresh(), updated(&[APP_FAMILY]));
}

// ===========================================================================
// Debounced flush
// ===========================================================================

/// N accepted updates inside one window flush exactly once.
#[tokio::test(start_paused = true)]
async fn burst_of_accepts_flushes_once() {
    let renderer = RecordingRenderer::default();
    let mut runtime = RefreshRuntime::new();
    runtime.inject_into_global_hook(renderer.clone());

    let exports = ExportsSnapshot::new().with("App", define_app(&mut runtime, &state_hooks()));
    for _ in 0..5 {
        define_app(&mut runtime, &state_hooks());
        let message =
            validate_refresh_boundary_and_enqueue_update(&mut runtime, MODULE, &exports, &exports);
        assert_eq!(message, None);
        tokio::time::advance(Duration::from_millis(5)).await;
    }

    assert!(runtime.has_pending_flush());
    assert_eq!(runtime.poll_flush(tokio::time::Instant::now()), None);

    let update = runtime.wait_for_flush().await.unwrap();
    assert_eq!(update, updated(&[APP_FAMILY]));
    assert_eq!(runtime.flushes(), 1);
    assert_eq!(renderer.updates.borrow().len(), 1);
    assert!(!runtime.has_pending_flush());
    assert!(runtime.wait_for_flush().await.is_none());
}

/// Updates separated by more than the delay flush separately.
#[tokio::test(start_paused = true)]
async fn separated_updates_flush_separately() {
    let mut runtime = RefreshRuntime::with_config(RuntimeConfig {
        flush_delay: Duration::from_millis(30),
        ..Default::default()
    });

    runtime.enqueue_update();
    tokio::time::advance(Duration::from_millis(31)).await;
    assert!(runtime.poll_flush(tokio::time::Instant::now()).is_some());

    runtime.enqueue_update();
    tokio::time::advance(Duration::from_millis(31)).await;
    assert!(runtime.poll_flush(tokio::time::Instant::now()).is_some());

    assert_eq!(runtime.flushes(), 2);
}

/// An empty flush does not reach the renderer.
#[tokio::test(start_paused = true)]
async fn empty_flush_skips_renderer() {
    let renderer = RecordingRenderer::default();
    let mut runtime = RefreshRuntime::new();
    runtime.inject_into_global_hook(renderer.clone());

    runtime.enqueue_update();
    let update = runtime.wait_for_flush().await.unwrap();
    assert!(update.is_empty());
    assert_eq!(runtime.flushes(), 1);
    assert!(renderer.updates.borrow().is_empty());
}

// ===========================================================================
// Hot update flow
// ===========================================================================

/// First evaluation, accepted edit, one flush, then a rejected edit.
#[test]
fn hot_update_cycle() {
    let renderer = RecordingRenderer::default();
    let mut runtime = RefreshRuntime::new();
    runtime.inject_into_global_hook(renderer.clone());
    let mut globals = HostGlobals::with_preamble(runtime);
    let mut hot = FakeHot::default();

    // v1
    let v1 = {
        let runtime = globals.refresh_runtime().unwrap();
        let mut sign = runtime.create_signature_function_for_transform();
        let app = sign.sign(runtime, JsFunction::new("App").into(), &state_hooks(), false, None);
        ExportsSnapshot::new().with("App", app).with("LIMIT", 5)
    };
    evaluate_module(&mut globals, MODULE, &v1).unwrap();
    hot.previous = Some(v1.clone());

    // v2: same hooks, same constant
    let v2 = {
        let runtime = globals.refresh_runtime().unwrap();
        let mut sign = runtime.create_signature_function_for_transform();
        let app = sign.sign(runtime, JsFunction::new("App").into(), &state_hooks(), false, None);
        ExportsSnapshot::new().with("App", app).with("LIMIT", 5)
    };
    let outcome = accept_hot_update(&mut globals, &mut hot, MODULE, Some(&v2)).unwrap();
    assert_eq!(outcome, HotOutcome::Accepted);
    assert!(hot.invalidations.is_empty());

    let update = globals.refresh_runtime().unwrap().flush_now().unwrap();
    assert_eq!(update, updated(&[APP_FAMILY]));
    assert_eq!(renderer.updates.borrow().as_slice(), &[updated(&[APP_FAMILY])]);
    hot.previous = Some(v2.clone());

    // v3: the constant changed
    let v3 = ExportsSnapshot::new()
        .with("App", v2.value("App").unwrap().clone())
        .with("LIMIT", 6);
    let outcome = accept_hot_update(&mut globals, &mut hot, MODULE, Some(&v3)).unwrap();
    assert!(matches!(outcome, HotOutcome::Invalidated(ref reason) if reason.contains("\"LIMIT\"")));
    assert_eq!(hot.invalidations.len(), 1);
    assert!(!globals.refresh_runtime().unwrap().has_pending_flush());
}

/// Without a previous instance there is nothing to validate.
#[test]
fn first_hot_update_is_skipped() {
    let mut globals = HostGlobals::with_preamble(RefreshRuntime::new());
    let mut hot = FakeHot::default();
    let exports = ExportsSnapshot::new().with("App", JsFunction::new("App"));
    let outcome = accept_hot_update(&mut globals, &mut hot, MODULE, Some(&exports)).unwrap();
    assert_eq!(outcome, HotOutcome::Skipped);
    assert!(globals
        .refresh_runtime()
        .unwrap()
        .family_by_id(APP_FAMILY)
        .is_some());
}
