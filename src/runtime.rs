//! Refresh runtime model.
//!
//! One [`RefreshRuntime`] holds everything the browser-side refresh runtime
//! keeps in module-level globals: component families keyed by identity,
//! hook signatures keyed by value, pending updates and the debounced flush.
//! It is passed by reference, so tests and independent hosts each get their
//! own instance.
//!
//! - `value`: exported value model
//! - `registry`: families and the component-type heuristic
//! - `signature`: hook-call fingerprints
//! - `boundary`: refresh-boundary validation
//! - `scheduler`: trailing-edge flush debounce
//! - `hot`: footer behaviour against a host HMR transport

pub mod boundary;
pub mod hot;
pub mod registry;
pub mod scheduler;
pub mod signature;
pub mod value;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use registry::{ComponentTypePredicate, DefaultComponentPredicate, PendingUpdate, RegistryEntry};
use scheduler::{UpdateDebouncer, DEFAULT_FLUSH_DELAY};
use signature::{ExactSignatures, Signature, SignatureComparator};
use value::ValueId;

/// Returns export names to skip for a module id.
pub type IgnoredExportsHook = Box<dyn Fn(&str) -> Vec<String>>;

/// Tunables for a runtime instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Trailing-edge debounce delay before pending updates are flushed.
    pub flush_delay: Duration,
    /// Reject updates that add an export not present before.
    pub reject_added_exports: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_delay: DEFAULT_FLUSH_DELAY,
            reject_added_exports: false,
        }
    }
}

/// Result of one flush: which families keep their state and which remount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshUpdate {
    /// Families whose new type can reuse existing state.
    pub updated_families: BTreeSet<String>,
    /// Families whose hook signature changed (or are classes) and must remount.
    pub stale_families: BTreeSet<String>,
}

impl RefreshUpdate {
    pub fn is_empty(&self) -> bool {
        self.updated_families.is_empty() && self.stale_families.is_empty()
    }
}

/// A renderer attached through [`RefreshRuntime::inject_into_global_hook`].
pub trait RefreshRenderer {
    /// Re-render mounted roots with the new family types.
    fn schedule_refresh(&mut self, update: &RefreshUpdate);
}

/// Process-wide refresh state, made explicit.
pub struct RefreshRuntime {
    pub(crate) families_by_id: HashMap<String, RegistryEntry>,
    pub(crate) families_by_type: HashMap<ValueId, String>,
    pub(crate) pending_updates: Vec<PendingUpdate>,
    pub(crate) signatures: HashMap<ValueId, Signature>,
    pub(crate) debouncer: UpdateDebouncer,
    pub(crate) predicate: Box<dyn ComponentTypePredicate>,
    pub(crate) comparator: Box<dyn SignatureComparator>,
    pub(crate) ignored_exports: Option<IgnoredExportsHook>,
    pub(crate) reject_added_exports: bool,
    renderers: Vec<Box<dyn RefreshRenderer>>,
    flushes: u64,
}

impl fmt::Debug for RefreshRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRuntime")
            .field("families", &self.families_by_id.len())
            .field("signatures", &self.signatures.len())
            .field("pending_updates", &self.pending_updates.len())
            .field("debouncer", &self.debouncer)
            .field("renderers", &self.renderers.len())
            .field("flushes", &self.flushes)
            .finish()
    }
}

impl Default for RefreshRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            families_by_id: HashMap::new(),
            families_by_type: HashMap::new(),
            pending_updates: Vec::new(),
            signatures: HashMap::new(),
            debouncer: UpdateDebouncer::new(config.flush_delay),
            predicate: Box::new(DefaultComponentPredicate),
            comparator: Box::new(ExactSignatures),
            ignored_exports: None,
            reject_added_exports: config.reject_added_exports,
            renderers: Vec::new(),
            flushes: 0,
        }
    }

    /// Replace the component-type heuristic.
    pub fn with_predicate(mut self, predicate: impl ComponentTypePredicate + 'static) -> Self {
        self.predicate = Box::new(predicate);
        self
    }

    /// Replace how two full signature keys are compared.
    pub fn with_signature_comparator(
        mut self,
        comparator: impl SignatureComparator + 'static,
    ) -> Self {
        self.comparator = Box::new(comparator);
        self
    }

    /// Exports returned by `hook` for a module id are skipped by validation.
    pub fn with_ignored_exports(mut self, hook: impl Fn(&str) -> Vec<String> + 'static) -> Self {
        self.ignored_exports = Some(Box::new(hook));
        self
    }

    /// Attach a renderer that receives every non-empty flush.
    pub fn inject_into_global_hook(&mut self, renderer: impl RefreshRenderer + 'static) {
        self.renderers.push(Box::new(renderer));
        debug!(renderers = self.renderers.len(), "renderer injected into refresh hook");
    }

    /// Number of debounced flushes that actually fired.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    // -----------------------------------------------------------------------
    // Debounced flush
    // -----------------------------------------------------------------------

    /// (Re)schedule the debounced flush. Only the last call in a burst fires.
    pub fn enqueue_update(&mut self) {
        let replaced = self.debouncer.schedule(Instant::now());
        debug!(replaced, delay_ms = self.debouncer.delay().as_millis() as u64, "refresh flush scheduled");
    }

    pub fn has_pending_flush(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Fire the flush if its deadline has passed at `now`.
    pub fn poll_flush(&mut self, now: Instant) -> Option<RefreshUpdate> {
        if self.debouncer.take_due(now) {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Fire a pending flush immediately, ignoring its deadline.
    pub fn flush_now(&mut self) -> Option<RefreshUpdate> {
        if self.debouncer.take() {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Sleep until the pending deadline and fire it. `None` if nothing is pending.
    pub async fn wait_for_flush(&mut self) -> Option<RefreshUpdate> {
        let deadline = self.debouncer.deadline()?;
        tokio::time::sleep_until(deadline).await;
        self.poll_flush(Instant::now())
    }

    fn flush(&mut self) -> RefreshUpdate {
        self.flushes += 1;
        let update = self.perform_refresh();
        if !update.is_empty() {
            info!(
                updated = update.updated_families.len(),
                stale = update.stale_families.len(),
                "performing fast refresh"
            );
            for renderer in &mut self.renderers {
                renderer.schedule_refresh(&update);
            }
        }
        update
    }
}
