//! Component families keyed by identity.
//!
//! A family is the stable identity of a component across edits. Each
//! registration under an existing key supersedes the entry and queues the
//! (previous, next) pair for the next flush, which decides whether state
//! survives the swap.

use tracing::{debug, trace};

use super::value::{
    ClassBase, ExportBinding, ExportsSnapshot, FunctionKind, JsValue, ReactWrapper, ES_MODULE_FLAG,
};
use super::{RefreshRuntime, RefreshUpdate};

/// Identity key for a module-level binding: `<moduleId> <exportName>`.
pub fn component_identity(module_id: &str, name: &str) -> String {
    format!("{module_id} {name}")
}

/// Current registration of one family. Superseded, never edited.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub key: String,
    pub current_value: JsValue,
    pub signature: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct PendingUpdate {
    pub(crate) key: String,
    pub(crate) previous: JsValue,
    pub(crate) next: JsValue,
}

// ---------------------------------------------------------------------------
// Component-type heuristic
// ---------------------------------------------------------------------------

/// The shape a value presents to the component heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentCheck<'a> {
    /// A function; `name` is the display name when set, else the function name.
    Function { name: &'a str },
    /// A class with its base and whether it declares prototype members.
    Class {
        name: &'a str,
        base: ClassBase,
        prototype_members: bool,
    },
    /// A `forwardRef` or `memo` wrapper object.
    ReactWrapper,
    /// Primitives, plain objects and accessor bindings.
    NotCallable,
}

impl<'a> ComponentCheck<'a> {
    pub fn of(value: &'a JsValue) -> Self {
        match value {
            JsValue::Function(function) => {
                // `displayName` only stands in for an anonymous function.
                let name = if function.name().is_empty() {
                    function.display_name().unwrap_or("")
                } else {
                    function.name()
                };
                match function.kind() {
                    FunctionKind::Function => ComponentCheck::Function { name },
                    FunctionKind::Class {
                        base,
                        prototype_members,
                    } => ComponentCheck::Class {
                        name,
                        base,
                        prototype_members,
                    },
                }
            }
            JsValue::Object(object) if object.wrapper().is_some() => ComponentCheck::ReactWrapper,
            _ => ComponentCheck::NotCallable,
        }
    }

    pub fn of_binding(binding: &'a ExportBinding) -> Self {
        match binding {
            ExportBinding::Value(value) => Self::of(value),
            ExportBinding::Accessor => ComponentCheck::NotCallable,
        }
    }
}

/// Decides whether a value is likely a component type. Inherently heuristic.
pub trait ComponentTypePredicate {
    fn is_likely_component_type(&self, check: ComponentCheck<'_>) -> bool;
}

impl<F> ComponentTypePredicate for F
where
    F: Fn(ComponentCheck<'_>) -> bool,
{
    fn is_likely_component_type(&self, check: ComponentCheck<'_>) -> bool {
        self(check)
    }
}

/// Uppercase-named functions, React class components and React wrappers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComponentPredicate;

impl ComponentTypePredicate for DefaultComponentPredicate {
    fn is_likely_component_type(&self, check: ComponentCheck<'_>) -> bool {
        match check {
            ComponentCheck::Function { name } => starts_uppercase(name),
            ComponentCheck::Class {
                base: ClassBase::ReactComponent,
                ..
            } => true,
            // Classes with methods or a non-Object base are not function components.
            ComponentCheck::Class {
                prototype_members: true,
                ..
            }
            | ComponentCheck::Class {
                base: ClassBase::Other,
                ..
            } => false,
            ComponentCheck::Class { name, .. } => starts_uppercase(name),
            ComponentCheck::ReactWrapper => true,
            ComponentCheck::NotCallable => false,
        }
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Registry operations
// ---------------------------------------------------------------------------

impl RefreshRuntime {
    pub fn is_likely_component_type(&self, value: &JsValue) -> bool {
        self.predicate.is_likely_component_type(ComponentCheck::of(value))
    }

    /// Bind `value` to the family `key`.
    ///
    /// Non-function, non-wrapper values are ignored, as are values already
    /// registered under any key.
    pub fn register(&mut self, value: JsValue, key: &str) {
        let registrable = match &value {
            JsValue::Function(_) => true,
            JsValue::Object(object) => object.wrapper().is_some(),
            _ => false,
        };
        let Some(identity) = value.identity().filter(|_| registrable) else {
            trace!(key, kind = value.type_of(), "ignoring non-component registration");
            return;
        };
        if self.families_by_type.contains_key(&identity) {
            return;
        }

        let signature = self.full_signature_key(&value);
        let entry = RegistryEntry {
            key: key.to_string(),
            current_value: value.clone(),
            signature,
        };
        if let Some(previous) = self.families_by_id.insert(key.to_string(), entry) {
            debug!(key, "family re-registered, update pending");
            self.pending_updates.push(PendingUpdate {
                key: key.to_string(),
                previous: previous.current_value,
                next: value.clone(),
            });
        } else {
            debug!(key, "family registered");
        }
        self.families_by_type.insert(identity, key.to_string());

        // Inner types may never be registered on their own.
        if let JsValue::Object(object) = &value {
            match object.wrapper() {
                Some(ReactWrapper::ForwardRef { render }) => {
                    self.register(render.clone(), &format!("{key}$render"))
                }
                Some(ReactWrapper::Memo { inner }) => {
                    self.register(inner.clone(), &format!("{key}$type"))
                }
                None => {}
            }
        }
    }

    /// Register a binding local to a module, as `$RefreshReg$` does.
    pub fn register_local(&mut self, module_id: &str, value: JsValue, local_id: &str) {
        self.register(value, &component_identity(module_id, local_id));
    }

    /// Register every likely-component export of a freshly evaluated module.
    pub fn register_exports_for_react_refresh(&mut self, module_id: &str, exports: &ExportsSnapshot) {
        for (name, binding) in exports.iter() {
            if name == ES_MODULE_FLAG {
                continue;
            }
            let ExportBinding::Value(value) = binding else {
                continue;
            };
            if self.is_likely_component_type(value) {
                self.register(value.clone(), &component_identity(module_id, name));
            }
        }
    }

    pub fn family_by_id(&self, key: &str) -> Option<&RegistryEntry> {
        self.families_by_id.get(key)
    }

    pub fn family_by_type(&self, value: &JsValue) -> Option<&RegistryEntry> {
        let key = self.families_by_type.get(&value.identity()?)?;
        self.families_by_id.get(key)
    }

    pub fn family_count(&self) -> usize {
        self.families_by_id.len()
    }

    pub fn pending_update_count(&self) -> usize {
        self.pending_updates.len()
    }

    /// Consume pending updates and classify each family.
    pub fn perform_refresh(&mut self) -> RefreshUpdate {
        let mut update = RefreshUpdate::default();
        for PendingUpdate { key, previous, next } in std::mem::take(&mut self.pending_updates) {
            if self.can_preserve_state_between(&previous, &next) {
                update.updated_families.insert(key.clone());
            } else {
                update.stale_families.insert(key.clone());
            }
            let signature = self.full_signature_key(&next);
            if let Some(entry) = self.families_by_id.get_mut(&key) {
                if entry.current_value.strict_equals(&next) {
                    *entry = RegistryEntry {
                        key,
                        current_value: next,
                        signature,
                    };
                }
            }
        }
        update
    }

    fn can_preserve_state_between(&mut self, previous: &JsValue, next: &JsValue) -> bool {
        let is_react_class =
            |value: &JsValue| value.as_function().is_some_and(|f| f.is_react_class());
        if is_react_class(previous) || is_react_class(next) {
            return false;
        }
        self.have_equal_signatures(previous, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::runtime::signature::CustomHooksFn;
    use crate::runtime::value::{JsFunction, JsObject};

    #[test]
    fn uppercase_functions_are_components() {
        let runtime = RefreshRuntime::new();
        assert!(runtime.is_likely_component_type(&JsFunction::new("App").into()));
        assert!(!runtime.is_likely_component_type(&JsFunction::new("useThing").into()));
        assert!(!runtime.is_likely_component_type(&JsFunction::new("").into()));
    }

    #[test]
    fn display_name_only_names_anonymous_functions() {
        let runtime = RefreshRuntime::new();
        let anonymous = JsFunction::from_parts("", Some("Outer".into()), FunctionKind::Function);
        let named = JsFunction::from_parts("inner", Some("Outer".into()), FunctionKind::Function);
        assert!(runtime.is_likely_component_type(&anonymous.into()));
        assert!(!runtime.is_likely_component_type(&named.into()));
    }

    #[test]
    fn class_heuristics() {
        let runtime = RefreshRuntime::new();
        let react = JsFunction::class("lower", ClassBase::ReactComponent);
        let bare = JsFunction::class("Widget", ClassBase::Object);
        let derived = JsFunction::class("Widget", ClassBase::Other);
        let with_methods = JsFunction::from_parts(
            "Store",
            None,
            FunctionKind::Class {
                base: ClassBase::Object,
                prototype_members: true,
            },
        );
        assert!(runtime.is_likely_component_type(&react.into()));
        assert!(runtime.is_likely_component_type(&bare.into()));
        assert!(!runtime.is_likely_component_type(&derived.into()));
        assert!(!runtime.is_likely_component_type(&with_methods.into()));
    }

    #[test]
    fn primitives_and_plain_objects_are_not_components() {
        let runtime = RefreshRuntime::new();
        assert!(!runtime.is_likely_component_type(&JsValue::from(1)));
        assert!(!runtime.is_likely_component_type(&JsValue::from("App")));
        assert!(!runtime.is_likely_component_type(&JsObject::plain().into()));
        assert!(runtime.is_likely_component_type(&JsObject::memo(JsFunction::new("A")).into()));
    }

    #[test]
    fn register_ignores_primitives() {
        let mut runtime = RefreshRuntime::new();
        runtime.register(JsValue::from(5), "mod LIMIT");
        assert_eq!(runtime.family_count(), 0);
    }

    #[test]
    fn entry_signature_is_the_full_key() {
        let mut runtime = RefreshRuntime::new();
        let use_counter = JsValue::from(JsFunction::new("useCounter"));
        runtime.set_signature(&use_counter, "useState{n}", false, None);

        let define_app = |runtime: &mut RefreshRuntime| {
            let hook = use_counter.clone();
            let hooks: CustomHooksFn =
                Arc::new(move || -> anyhow::Result<Vec<JsValue>> { Ok(vec![hook.clone()]) });
            let app = JsValue::from(JsFunction::new("App"));
            runtime.set_signature(&app, "useCounter{}", false, Some(hooks));
            runtime.register(app, "mod App");
        };
        let full_key = "useCounter{}\n---\nuseState{n}";

        define_app(&mut runtime);
        let registered = runtime.family_by_id("mod App").unwrap();
        assert_eq!(registered.signature.as_deref(), Some(full_key));

        define_app(&mut runtime);
        runtime.perform_refresh();
        let refreshed = runtime.family_by_id("mod App").unwrap();
        assert_eq!(refreshed.signature.as_deref(), Some(full_key));
    }

    #[test]
    fn register_ignores_plain_objects() {
        let mut runtime = RefreshRuntime::new();
        let config = JsValue::from(JsObject::plain());
        runtime.register(config.clone(), "mod config");
        assert_eq!(runtime.family_count(), 0);
        assert!(runtime.family_by_type(&config).is_none());
    }

    #[test]
    fn register_is_idempotent_for_same_value() {
        let mut runtime = RefreshRuntime::new();
        let app = JsValue::from(JsFunction::new("App"));
        runtime.register(app.clone(), "mod App");
        runtime.register(app.clone(), "mod App");
        runtime.register(app, "mod Other");
        assert_eq!(runtime.family_count(), 1);
        assert_eq!(runtime.pending_update_count(), 0);
    }

    #[test]
    fn reregistration_replaces_entry_and_queues_update() {
        let mut runtime = RefreshRuntime::new();
        let v1 = JsValue::from(JsFunction::new("App"));
        let v2 = JsValue::from(JsFunction::new("App"));
        runtime.register(v1.clone(), "mod App");
        runtime.register(v2.clone(), "mod App");

        let entry = runtime.family_by_id("mod App").unwrap();
        assert!(entry.current_value.strict_equals(&v2));
        assert_eq!(runtime.pending_update_count(), 1);
        assert_eq!(runtime.family_by_type(&v1).unwrap().key, "mod App");
    }

    #[test]
    fn wrappers_register_inner_types() {
        let mut runtime = RefreshRuntime::new();
        let render = JsFunction::new("Input");
        runtime.register(JsObject::forward_ref(render.clone()).into(), "mod Input");
        assert!(runtime.family_by_id("mod Input$render").is_some());
        assert_eq!(
            runtime.family_by_type(&render.into()).unwrap().key,
            "mod Input$render"
        );
    }

    #[test]
    fn exports_registration_skips_non_components() {
        let mut runtime = RefreshRuntime::new();
        let exports = ExportsSnapshot::new()
            .with("App", JsFunction::new("App"))
            .with("helper", JsFunction::new("helper"))
            .with("LIMIT", 5)
            .with_accessor("Lazy")
            .with(ES_MODULE_FLAG, true);
        runtime.register_exports_for_react_refresh("/src/App.tsx", &exports);
        assert_eq!(runtime.family_count(), 1);
        assert!(runtime.family_by_id("/src/App.tsx App").is_some());
    }

    #[test]
    fn custom_predicate_is_used() {
        fn functions_only(check: ComponentCheck<'_>) -> bool {
            matches!(check, ComponentCheck::Function { .. })
        }
        let runtime = RefreshRuntime::new().with_predicate(functions_only);
        assert!(runtime.is_likely_component_type(&JsFunction::new("lower").into()));
        assert!(!runtime.is_likely_component_type(&JsObject::memo(JsFunction::new("A")).into()));
    }
}
