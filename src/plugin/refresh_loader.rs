//! React Refresh loader: serves the runtime module and wraps components.
//!
//! Bundler-independent decisions live on [`RefreshLoader`] itself:
//! - `resolve_runtime_id`: claim the runtime public path
//! - `load_runtime`: serve the runtime module source
//! - `transform_module`: wrap instrumented modules in dev
//!
//! With the `rolldown` feature the same decisions back a Rolldown `Plugin`.
//!
//! **Invariants:**
//! - Never transforms in production or with refresh disabled
//! - Never transforms the runtime module or virtual modules
//! - Wraps each module at most once

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::plugin::options::{JsxTransformOptions, ModuleFilter, PluginOptions};
use crate::plugin::refresh_wrapper::{
    preamble_code, Instrumentation, WrappedModule, WrapperTemplate, RUNTIME_PUBLIC_PATH,
};
use crate::plugin::runtime_module::runtime_module_source;
use crate::utils;
use crate::RefreshError;

pub struct RefreshLoader {
    options: PluginOptions,
    filter: ModuleFilter,
    template: WrapperTemplate,
    /// Wrapped modules keyed by cleaned module id.
    instrumented: Arc<DashMap<String, Instrumentation>>,
}

impl fmt::Debug for RefreshLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshLoader")
            .field("options", &self.options)
            .field("instrumented", &self.instrumented.len())
            .finish()
    }
}

impl RefreshLoader {
    pub fn new(options: PluginOptions) -> Result<Self, RefreshError> {
        options.validate()?;
        let filter = options.compile_filter()?;
        let template = WrapperTemplate::new(
            options.plugin_name.clone(),
            runtime_import_path(options.react_refresh_host.as_deref()),
        );
        Ok(Self {
            options,
            filter,
            template,
            instrumented: Arc::new(DashMap::new()),
        })
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    /// Specifier wrapped modules import the runtime from.
    pub fn runtime_public_path(&self) -> &str {
        self.template.runtime_path()
    }

    pub fn jsx_transform_options(&self) -> JsxTransformOptions {
        self.options.jsx_transform_options()
    }

    pub fn resolve_runtime_id(&self, specifier: &str) -> Option<String> {
        (specifier == RUNTIME_PUBLIC_PATH).then(|| RUNTIME_PUBLIC_PATH.to_string())
    }

    pub fn load_runtime(&self, id: &str) -> Option<String> {
        (id == RUNTIME_PUBLIC_PATH).then(|| runtime_module_source(&self.options))
    }

    /// Whether `id` is a candidate for instrumentation at all.
    pub fn should_transform(&self, id: &str) -> bool {
        self.options.refresh_enabled()
            && !utils::is_virtual(id)
            && utils::clean_url(id) != RUNTIME_PUBLIC_PATH
            && self.filter.matches(id)
    }

    /// Wrap `code` when it registers components or defines class components.
    pub fn transform_module(
        &self,
        id: &str,
        code: &str,
        map: Option<&str>,
    ) -> Result<Option<WrappedModule>, RefreshError> {
        if !self.should_transform(id) {
            trace!(id, "skipping module");
            return Ok(None);
        }
        let module_id = utils::clean_url(id);
        let wrapped = self.template.wrap(module_id, code, map)?;
        if let Some(module) = &wrapped {
            debug!(id = module_id, instrumentation = ?module.instrumentation, "wrapped module");
            self.instrumented
                .insert(module_id.to_string(), module.instrumentation);
        }
        Ok(wrapped)
    }

    /// Inline preamble for the HTML entry, or `None` when refresh is off.
    pub fn preamble(&self) -> Option<String> {
        self.options
            .refresh_enabled()
            .then(|| preamble_code(&self.options.base))
    }

    /// Every module wrapped so far, sorted by id.
    pub fn instrumented_modules(&self) -> Vec<(String, Instrumentation)> {
        let mut modules: Vec<_> = self
            .instrumented
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        modules.sort_by(|a, b| a.0.cmp(&b.0));
        modules
    }
}

fn runtime_import_path(host: Option<&str>) -> String {
    match host {
        Some(host) => format!("{}{}", host.trim_end_matches('/'), RUNTIME_PUBLIC_PATH),
        None => RUNTIME_PUBLIC_PATH.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Rolldown Plugin Trait Implementation
// ---------------------------------------------------------------------------

#[cfg(feature = "rolldown")]
mod rolldown_adapter {
    use std::borrow::Cow;

    use arcstr::ArcStr;
    use rolldown_common::ResolvedExternal;
    use rolldown_plugin::{
        HookLoadArgs, HookLoadOutput, HookResolveIdArgs, HookResolveIdOutput, HookTransformArgs,
        HookTransformOutput, HookUsage, Plugin, SharedLoadPluginContext,
        SharedTransformPluginContext,
    };

    use super::RefreshLoader;

    impl Plugin for RefreshLoader {
        fn name(&self) -> Cow<'static, str> {
            Cow::Borrowed("react-refresh")
        }

        fn register_hook_usage(&self) -> HookUsage {
            let mut usage = HookUsage::ResolveId | HookUsage::Load;
            if self.options.refresh_enabled() {
                usage = usage | HookUsage::Transform;
            }
            usage
        }

        /// Claim the runtime public path.
        fn resolve_id(
            &self,
            _ctx: &rolldown_plugin::PluginContext,
            args: &HookResolveIdArgs<'_>,
        ) -> impl std::future::Future<Output = rolldown_plugin::HookResolveIdReturn> + Send {
            let resolved = self.resolve_runtime_id(args.specifier);

            async move {
                Ok(resolved.map(|id| HookResolveIdOutput {
                    id: ArcStr::from(id),
                    external: Some(ResolvedExternal::Bool(false)),
                    ..Default::default()
                }))
            }
        }

        /// Serve the runtime module.
        fn load(
            &self,
            _ctx: SharedLoadPluginContext,
            args: &HookLoadArgs<'_>,
        ) -> impl std::future::Future<Output = rolldown_plugin::HookLoadReturn> + Send {
            let source = self.load_runtime(args.id);

            async move {
                Ok(source.map(|code| HookLoadOutput {
                    code: ArcStr::from(code),
                    ..Default::default()
                }))
            }
        }

        /// Wrap instrumented modules in dev.
        fn transform(
            &self,
            _ctx: SharedTransformPluginContext,
            args: &HookTransformArgs<'_>,
        ) -> impl std::future::Future<Output = rolldown_plugin::HookTransformReturn> + Send {
            let wrapped = self.transform_module(args.id, &args.code[..], None);

            async move {
                let Some(module) = wrapped? else {
                    return Ok(None);
                };
                Ok(Some(HookTransformOutput {
                    code: Some(module.code),
                    ..Default::default()
                }))
            }
        }
    }
}
