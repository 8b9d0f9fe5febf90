//! Value model for module exports seen by the refresh runtime.
//!
//! Functions and objects carry a process-unique [`ValueId`], so strict
//! equality (`===`) between them is an identity check. Primitives compare
//! by value, with `NaN` unequal to itself.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reserved export key set by CommonJS interop. Never treated as an export.
pub const ES_MODULE_FLAG: &str = "__esModule";

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a function or object value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u64);

impl ValueId {
    fn next() -> Self {
        Self(NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Functions and classes
// ---------------------------------------------------------------------------

/// What a class extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassBase {
    /// `React.Component` / `React.PureComponent` (prototype has `isReactComponent`).
    ReactComponent,
    /// No `extends` clause.
    Object,
    /// Anything else.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Class {
        base: ClassBase,
        /// Whether the prototype declares members besides `constructor`.
        prototype_members: bool,
    },
}

#[derive(Debug)]
struct FunctionData {
    id: ValueId,
    name: String,
    display_name: Option<String>,
    kind: FunctionKind,
}

/// A function or class value. Cloning shares identity.
#[derive(Debug, Clone)]
pub struct JsFunction(Arc<FunctionData>);

impl JsFunction {
    /// A plain function named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_parts(name, None, FunctionKind::Function)
    }

    /// A class with no members besides its constructor.
    pub fn class(name: impl Into<String>, base: ClassBase) -> Self {
        Self::from_parts(
            name,
            None,
            FunctionKind::Class {
                base,
                prototype_members: false,
            },
        )
    }

    pub fn from_parts(
        name: impl Into<String>,
        display_name: Option<String>,
        kind: FunctionKind,
    ) -> Self {
        Self(Arc::new(FunctionData {
            id: ValueId::next(),
            name: name.into(),
            display_name,
            kind,
        }))
    }

    pub fn id(&self) -> ValueId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.0.display_name.as_deref()
    }

    pub fn kind(&self) -> FunctionKind {
        self.0.kind
    }

    /// `type.prototype.isReactComponent` is set.
    pub fn is_react_class(&self) -> bool {
        matches!(
            self.0.kind,
            FunctionKind::Class {
                base: ClassBase::ReactComponent,
                ..
            }
        )
    }
}

impl PartialEq for JsFunction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for JsFunction {}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// React element-type wrappers that are objects rather than functions.
#[derive(Debug, Clone)]
pub enum ReactWrapper {
    /// `React.forwardRef(render)`
    ForwardRef { render: JsValue },
    /// `React.memo(type)`
    Memo { inner: JsValue },
}

#[derive(Debug)]
struct ObjectData {
    id: ValueId,
    wrapper: Option<ReactWrapper>,
}

/// An object value. Cloning shares identity.
#[derive(Debug, Clone)]
pub struct JsObject(Arc<ObjectData>);

impl JsObject {
    pub fn plain() -> Self {
        Self::with_wrapper(None)
    }

    pub fn forward_ref(render: impl Into<JsValue>) -> Self {
        Self::with_wrapper(Some(ReactWrapper::ForwardRef {
            render: render.into(),
        }))
    }

    pub fn memo(inner: impl Into<JsValue>) -> Self {
        Self::with_wrapper(Some(ReactWrapper::Memo {
            inner: inner.into(),
        }))
    }

    fn with_wrapper(wrapper: Option<ReactWrapper>) -> Self {
        Self(Arc::new(ObjectData {
            id: ValueId::next(),
            wrapper,
        }))
    }

    pub fn id(&self) -> ValueId {
        self.0.id
    }

    pub fn wrapper(&self) -> Option<&ReactWrapper> {
        self.0.wrapper.as_ref()
    }
}

impl PartialEq for JsObject {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for JsObject {}

// ---------------------------------------------------------------------------
// JsValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Function(JsFunction),
    Object(JsObject),
}

impl JsValue {
    /// `a === b`
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
            (JsValue::Bool(a), JsValue::Bool(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Function(a), JsValue::Function(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a == b,
            _ => false,
        }
    }

    /// Identity of reference values; `None` for primitives.
    pub fn identity(&self) -> Option<ValueId> {
        match self {
            JsValue::Function(f) => Some(f.id()),
            JsValue::Object(o) => Some(o.id()),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&JsFunction> {
        match self {
            JsValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            JsValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null | JsValue::Object(_) => "object",
            JsValue::Bool(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Function(_) => "function",
        }
    }
}

impl From<JsFunction> for JsValue {
    fn from(value: JsFunction) -> Self {
        JsValue::Function(value)
    }
}

impl From<JsObject> for JsValue {
    fn from(value: JsObject) -> Self {
        JsValue::Object(value)
    }
}

impl From<f64> for JsValue {
    fn from(value: f64) -> Self {
        JsValue::Number(value)
    }
}

impl From<i32> for JsValue {
    fn from(value: i32) -> Self {
        JsValue::Number(f64::from(value))
    }
}

impl From<bool> for JsValue {
    fn from(value: bool) -> Self {
        JsValue::Bool(value)
    }
}

impl From<&str> for JsValue {
    fn from(value: &str) -> Self {
        JsValue::String(Arc::from(value))
    }
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

/// How an export is defined on the module namespace object.
#[derive(Debug, Clone)]
pub enum ExportBinding {
    Value(JsValue),
    /// Defined through a getter. Never hot-swappable.
    Accessor,
}

impl ExportBinding {
    pub fn value(&self) -> Option<&JsValue> {
        match self {
            ExportBinding::Value(v) => Some(v),
            ExportBinding::Accessor => None,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, ExportBinding::Accessor)
    }
}

/// The exports of one module evaluation, in definition order.
#[derive(Debug, Clone, Default)]
pub struct ExportsSnapshot {
    entries: Vec<(String, ExportBinding)>,
}

impl ExportsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert) for a plain value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<JsValue>) -> Self {
        self.insert(name, ExportBinding::Value(value.into()));
        self
    }

    /// Builder form of [`insert`](Self::insert) for a getter-defined export.
    pub fn with_accessor(mut self, name: impl Into<String>) -> Self {
        self.insert(name, ExportBinding::Accessor);
        self
    }

    /// Define or redefine an export. Redefinition keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, binding: ExportBinding) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = binding,
            None => self.entries.push((name, binding)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExportBinding> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, binding)| binding)
    }

    /// Plain value of an export. `None` when absent or an accessor.
    pub fn value(&self, name: &str) -> Option<&JsValue> {
        self.get(name).and_then(ExportBinding::value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExportBinding)> {
        self.entries.iter().map(|(key, binding)| (key.as_str(), binding))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, JsValue)> for ExportsSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, JsValue)>>(iter: I) -> Self {
        let mut snapshot = ExportsSnapshot::new();
        for (name, value) in iter {
            snapshot.insert(name, ExportBinding::Value(value));
        }
        snapshot
    }
}
