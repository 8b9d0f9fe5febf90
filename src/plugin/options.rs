//! Plugin configuration.
//!
//! Options arrive as JSON from the host (camelCase keys, as a JavaScript
//! config would spell them). Unknown keys are rejected so typos surface
//! immediately instead of silently disabling refresh.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::runtime::RuntimeConfig;
use crate::{BuildMode, RefreshError};

/// Default module filter: JavaScript and TypeScript sources, with or without JSX.
pub const DEFAULT_INCLUDE: &str = r"\.[cm]?[jt]sx?$";

/// Dependencies are never instrumented by default.
pub const DEFAULT_EXCLUDE: &str = r"/node_modules/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    /// `react/jsx-runtime` imports injected by the compiler.
    #[default]
    Automatic,
    /// `React.createElement` calls; `React` must be in scope.
    Classic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PluginOptions {
    /// Regex patterns a module id must match to be transformed.
    pub include: Vec<String>,
    /// Regex patterns that exclude a module id even when included.
    pub exclude: Vec<String>,
    pub jsx_runtime: JsxRuntime,
    /// Package providing `jsx-runtime` / `jsx-dev-runtime`.
    pub jsx_import_source: String,
    /// Origin of the app that owns the refresh runtime (module federation).
    pub react_refresh_host: Option<String>,
    /// Public base path of the dev server.
    pub base: String,
    pub mode: BuildMode,
    /// Turn refresh instrumentation off while keeping JSX wiring.
    pub fast_refresh: bool,
    pub refresh_debounce_ms: u64,
    pub reject_added_exports: bool,
    /// Name quoted in the missing-preamble error.
    pub plugin_name: String,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            include: vec![DEFAULT_INCLUDE.to_string()],
            exclude: vec![DEFAULT_EXCLUDE.to_string()],
            jsx_runtime: JsxRuntime::Automatic,
            jsx_import_source: "react".to_string(),
            react_refresh_host: None,
            base: "/".to_string(),
            mode: BuildMode::Dev,
            fast_refresh: true,
            refresh_debounce_ms: 16,
            reject_added_exports: false,
            plugin_name: crate::plugin::refresh_wrapper::DEFAULT_PLUGIN_NAME.to_string(),
        }
    }
}

impl PluginOptions {
    pub fn from_json_str(json: &str) -> Result<Self, RefreshError> {
        let options: PluginOptions =
            serde_json::from_str(json).map_err(|e| RefreshError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), RefreshError> {
        if !self.base.starts_with('/') && !self.base.starts_with("http") {
            return Err(RefreshError::InvalidOptions(format!(
                "base must be an absolute path or URL, got '{}'",
                self.base
            )));
        }
        if self.jsx_import_source.trim().is_empty() {
            return Err(RefreshError::InvalidOptions(
                "jsxImportSource must be a non-empty string".into(),
            ));
        }
        if self.plugin_name.trim().is_empty() {
            return Err(RefreshError::InvalidOptions(
                "pluginName must be a non-empty string".into(),
            ));
        }
        Ok(())
    }

    /// Refresh wrappers are only emitted for the dev server.
    pub fn refresh_enabled(&self) -> bool {
        self.fast_refresh && self.mode == BuildMode::Dev
    }

    pub fn compile_filter(&self) -> Result<ModuleFilter, RefreshError> {
        Ok(ModuleFilter {
            include: compile_patterns(&self.include)?,
            exclude: compile_patterns(&self.exclude)?,
        })
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            flush_delay: Duration::from_millis(self.refresh_debounce_ms),
            reject_added_exports: self.reject_added_exports,
        }
    }

    /// What the external JSX compiler must be told.
    pub fn jsx_transform_options(&self) -> JsxTransformOptions {
        JsxTransformOptions {
            runtime: self.jsx_runtime,
            import_source: self.jsx_import_source.clone(),
            development: self.mode == BuildMode::Dev,
            refresh: self.refresh_enabled(),
        }
    }

    /// Entries the dev server should pre-bundle so JSX output resolves.
    pub fn dependencies_to_optimize(&self) -> Vec<String> {
        let source = &self.jsx_import_source;
        let mut deps = vec!["react".to_string(), "react-dom".to_string()];
        if self.jsx_runtime == JsxRuntime::Automatic {
            deps.push(format!("{source}/jsx-dev-runtime"));
            deps.push(format!("{source}/jsx-runtime"));
        }
        deps.dedup();
        deps
    }
}

/// JSX settings handed to the compiler front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsxTransformOptions {
    pub runtime: JsxRuntime,
    pub import_source: String,
    pub development: bool,
    /// Emit `$RefreshReg$` / `$RefreshSig$` calls.
    pub refresh: bool,
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, RefreshError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| RefreshError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Compiled include/exclude filter over cleaned module ids.
#[derive(Debug, Clone)]
pub struct ModuleFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ModuleFilter {
    pub fn matches(&self, id: &str) -> bool {
        let id = crate::utils::clean_url(id);
        self.include.iter().any(|re| re.is_match(id)) && !self.exclude.iter().any(|re| re.is_match(id))
    }
}
