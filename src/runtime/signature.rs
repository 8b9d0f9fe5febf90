//! Hook signatures.
//!
//! The compiler front-end emits, for every component using hooks, a key
//! describing its hook calls in order (`useState{[count, setCount](0)}` one
//! per line). Generated code records that key through a
//! [`SignatureFunction`]. Two keys compare equal iff the hook-call shape is
//! unchanged, which is what lets an edit keep component state.

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::value::{JsValue, ValueId};
use super::RefreshRuntime;

/// Separator between a signature's own key and each custom hook's full key.
const CUSTOM_HOOK_SEPARATOR: &str = "\n---\n";

/// Lazily returns the custom hooks a component calls.
pub type CustomHooksFn = Arc<dyn Fn() -> anyhow::Result<Vec<JsValue>> + Send + Sync>;

/// One observed hook call: the hook name plus whatever key the call site
/// contributes (destructured bindings, initial-value source, custom-hook key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCall {
    pub name: String,
    pub key: String,
}

impl HookCall {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Fingerprint for an ordered sequence of hook calls.
pub fn signature_key(calls: &[HookCall]) -> String {
    calls
        .iter()
        .map(|call| format!("{}{{{}}}", call.name, call.key))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) struct Signature {
    pub(crate) own_key: String,
    pub(crate) force_reset: bool,
    full_key: Option<String>,
    custom_hooks: Option<CustomHooksFn>,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("own_key", &self.own_key)
            .field("force_reset", &self.force_reset)
            .field("full_key", &self.full_key)
            .field("custom_hooks", &self.custom_hooks.is_some())
            .finish()
    }
}

/// Compares full signature keys of a family's previous and next type.
pub trait SignatureComparator {
    fn signatures_equal(&self, previous: &str, next: &str) -> bool;
}

impl<F> SignatureComparator for F
where
    F: Fn(&str, &str) -> bool,
{
    fn signatures_equal(&self, previous: &str, next: &str) -> bool {
        self(previous, next)
    }
}

/// String equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactSignatures;

impl SignatureComparator for ExactSignatures {
    fn signatures_equal(&self, previous: &str, next: &str) -> bool {
        previous == next
    }
}

/// The `_s` function generated code creates once per component.
///
/// Called first with the type right after its definition (`sign`), then
/// without arguments at the top of every render (`on_render`), which is when
/// custom hooks are resolved.
#[derive(Debug, Default)]
pub struct SignatureFunction {
    saved_type: Option<JsValue>,
    has_custom_hooks: bool,
    did_collect_hooks: bool,
}

impl SignatureFunction {
    pub fn sign(
        &mut self,
        runtime: &mut RefreshRuntime,
        ty: JsValue,
        key: &str,
        force_reset: bool,
        custom_hooks: Option<CustomHooksFn>,
    ) -> JsValue {
        if self.saved_type.is_none() {
            self.saved_type = Some(ty.clone());
            self.has_custom_hooks = custom_hooks.is_some();
        }
        runtime.set_signature(&ty, key, force_reset, custom_hooks);
        ty
    }

    pub fn on_render(&mut self, runtime: &mut RefreshRuntime) {
        if self.did_collect_hooks || !self.has_custom_hooks {
            return;
        }
        self.did_collect_hooks = true;
        if let Some(ty) = &self.saved_type {
            runtime.collect_custom_hooks_for_signature(ty);
        }
    }
}

impl RefreshRuntime {
    pub fn create_signature_function_for_transform(&self) -> SignatureFunction {
        SignatureFunction::default()
    }

    /// Record the signature of `ty`. The first recorded signature wins.
    pub fn set_signature(
        &mut self,
        ty: &JsValue,
        key: &str,
        force_reset: bool,
        custom_hooks: Option<CustomHooksFn>,
    ) {
        let Some(identity) = ty.identity() else {
            return;
        };
        if let Entry::Vacant(slot) = self.signatures.entry(identity) {
            slot.insert(Signature {
                own_key: key.to_string(),
                force_reset,
                full_key: None,
                custom_hooks,
            });
        }
    }

    /// The own key recorded for `ty`, without custom hooks.
    pub fn signature_of(&self, ty: &JsValue) -> Option<&str> {
        let identity = ty.identity()?;
        self.signatures.get(&identity).map(|s| s.own_key.as_str())
    }

    pub fn collect_custom_hooks_for_signature(&mut self, ty: &JsValue) {
        if let Some(identity) = ty.identity() {
            self.compute_full_key(identity);
        }
    }

    pub(crate) fn full_signature_key(&mut self, ty: &JsValue) -> Option<String> {
        self.compute_full_key(ty.identity()?)
    }

    fn compute_full_key(&mut self, identity: ValueId) -> Option<String> {
        let signature = self.signatures.get_mut(&identity)?;
        if let Some(full_key) = &signature.full_key {
            return Some(full_key.clone());
        }
        let own_key = signature.own_key.clone();
        // A hook cycle resolves to the own key.
        signature.full_key = Some(own_key.clone());
        let Some(custom_hooks) = signature.custom_hooks.clone() else {
            return Some(own_key);
        };

        let mut full_key = own_key;
        let mut force_reset = false;
        match custom_hooks() {
            Ok(hooks) => {
                for hook in hooks {
                    let Some(hook_id) = hook.as_function().map(|f| f.id()) else {
                        force_reset = true;
                        break;
                    };
                    let Some(nested_key) = self.compute_full_key(hook_id) else {
                        continue;
                    };
                    if self.signatures.get(&hook_id).is_some_and(|s| s.force_reset) {
                        force_reset = true;
                    }
                    full_key.push_str(CUSTOM_HOOK_SEPARATOR);
                    full_key.push_str(&nested_key);
                }
            }
            Err(err) => {
                // Hooks referenced before initialization.
                debug!(%identity, error = %err, "custom hooks unavailable, forcing reset");
                force_reset = true;
            }
        }

        if let Some(signature) = self.signatures.get_mut(&identity) {
            signature.full_key = Some(full_key.clone());
            signature.force_reset |= force_reset;
        }
        Some(full_key)
    }

    pub(crate) fn have_equal_signatures(&mut self, previous: &JsValue, next: &JsValue) -> bool {
        let signed = |runtime: &Self, value: &JsValue| {
            value
                .identity()
                .filter(|identity| runtime.signatures.contains_key(identity))
        };
        match (signed(self, previous), signed(self, next)) {
            (None, None) => true,
            (Some(prev_id), Some(next_id)) => {
                let (Some(prev_key), Some(next_key)) =
                    (self.compute_full_key(prev_id), self.compute_full_key(next_id))
                else {
                    return false;
                };
                if !self.comparator.signatures_equal(&prev_key, &next_key) {
                    return false;
                }
                !self
                    .signatures
                    .get(&next_id)
                    .is_some_and(|signature| signature.force_reset)
            }
            _ => false,
        }
    }
}
