//! Refresh wrapper templates.
//!
//! A module is instrumented when the compiler emitted `$RefreshReg$` calls
//! for it, or when it defines class components. The header points the
//! compiler's `$RefreshReg$` / `$RefreshSig$` calls at the runtime while the
//! module evaluates; the footer restores them, registers the exports and
//! accepts hot updates that pass boundary validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::utils::{count_lines, js_string_literal, shift_source_map};
use crate::RefreshError;

/// Public path the runtime module is served from.
pub const RUNTIME_PUBLIC_PATH: &str = "/@react-refresh";

/// Plugin name quoted in the missing-preamble error.
pub const DEFAULT_PLUGIN_NAME: &str = "react-refresh-plugin";

/// First line of every wrapper header. Guards against double wrapping.
pub const WRAPPER_MARKER: &str = "/* react-refresh-wrapper */";

static REFRESH_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$RefreshReg\$\(").expect("refresh registration pattern"));

static REACT_COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"extends\s+(?:React\.)?(?:Pure)?Component\b").expect("class component pattern")
});

/// Why a module gets a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrumentation {
    /// The compiler emitted `$RefreshReg$` calls.
    Registrations,
    /// No registrations, but a class extends `Component` / `PureComponent`.
    ClassComponents,
}

/// Decide whether `code` needs a refresh wrapper at all.
pub fn detect_instrumentation(code: &str) -> Option<Instrumentation> {
    if REFRESH_CONTENT_RE.is_match(code) {
        Some(Instrumentation::Registrations)
    } else if REACT_COMPONENT_RE.is_match(code) {
        Some(Instrumentation::ClassComponents)
    } else {
        None
    }
}

/// An instrumented module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedModule {
    pub code: String,
    /// Input map shifted past the header, if one was given.
    pub map: Option<String>,
    pub instrumentation: Instrumentation,
}

/// Header/footer generator bound to one plugin name and runtime path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperTemplate {
    plugin_name: String,
    runtime_path: String,
}

impl Default for WrapperTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PLUGIN_NAME, RUNTIME_PUBLIC_PATH)
    }
}

impl WrapperTemplate {
    pub fn new(plugin_name: impl Into<String>, runtime_path: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            runtime_path: runtime_path.into(),
        }
    }

    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    pub fn header(&self, id: &str, instrumentation: Instrumentation) -> String {
        let mut header = String::new();
        header.push_str(WRAPPER_MARKER);
        header.push('\n');
        header.push_str(&format!(
            "import RefreshRuntime from {};\n",
            js_string_literal(&self.runtime_path)
        ));
        header.push_str(
            "const inWebWorker = typeof WorkerGlobalScope !== 'undefined' && self instanceof WorkerGlobalScope;\n",
        );

        if instrumentation == Instrumentation::Registrations {
            let preamble_error = RefreshError::PreambleNotDetected {
                plugin: self.plugin_name.clone(),
            }
            .to_string();
            header.push_str("let prevRefreshReg;\nlet prevRefreshSig;\n");
            header.push_str("if (import.meta.hot && !inWebWorker) {\n");
            header.push_str("  if (!window.$RefreshReg$) {\n");
            header.push_str(&format!(
                "    throw new Error({});\n",
                js_string_literal(&preamble_error)
            ));
            header.push_str("  }\n");
            header.push_str("  prevRefreshReg = window.$RefreshReg$;\n");
            header.push_str("  prevRefreshSig = window.$RefreshSig$;\n");
            header.push_str(&format!(
                "  window.$RefreshReg$ = RefreshRuntime.getRefreshReg({});\n",
                js_string_literal(id)
            ));
            header.push_str(
                "  window.$RefreshSig$ = RefreshRuntime.createSignatureFunctionForTransform;\n",
            );
            header.push_str("}\n");
        }
        header
    }

    pub fn footer(&self, id: &str, instrumentation: Instrumentation) -> String {
        let id = js_string_literal(id);
        let mut footer = String::new();
        footer.push_str("\nif (import.meta.hot && !inWebWorker) {\n");
        if instrumentation == Instrumentation::Registrations {
            footer.push_str("  window.$RefreshReg$ = prevRefreshReg;\n");
            footer.push_str("  window.$RefreshSig$ = prevRefreshSig;\n");
        }
        footer.push_str("  RefreshRuntime.__hmr_import(import.meta.url).then((currentExports) => {\n");
        footer.push_str(&format!(
            "    RefreshRuntime.registerExportsForReactRefresh({id}, currentExports);\n"
        ));
        footer.push_str("    import.meta.hot.accept((nextExports) => {\n");
        footer.push_str("      if (!nextExports) return;\n");
        footer.push_str(&format!(
            "      const invalidateMessage = RefreshRuntime.validateRefreshBoundaryAndEnqueueUpdate({id}, currentExports, nextExports);\n"
        ));
        footer.push_str("      if (invalidateMessage) import.meta.hot.invalidate(invalidateMessage);\n");
        footer.push_str("    });\n");
        footer.push_str("  });\n");
        footer.push_str("}\n");
        footer
    }

    /// Wrap `code` if it needs instrumentation and is not wrapped already.
    pub fn wrap(
        &self,
        id: &str,
        code: &str,
        map: Option<&str>,
    ) -> Result<Option<WrappedModule>, RefreshError> {
        if code.contains(WRAPPER_MARKER) {
            return Ok(None);
        }
        let Some(instrumentation) = detect_instrumentation(code) else {
            return Ok(None);
        };

        let header = self.header(id, instrumentation);
        let footer = self.footer(id, instrumentation);
        let map = map
            .map(|map| shift_source_map(map, count_lines(&header)))
            .transpose()?;

        let mut wrapped = String::with_capacity(header.len() + code.len() + footer.len() + 1);
        wrapped.push_str(&header);
        wrapped.push_str(code);
        if !code.ends_with('\n') {
            wrapped.push('\n');
        }
        wrapped.push_str(&footer);

        Ok(Some(WrappedModule {
            code: wrapped,
            map,
            instrumentation,
        }))
    }
}

/// Wrap with the default runtime path.
pub fn add_refresh_wrapper(
    code: &str,
    map: Option<&str>,
    plugin_name: &str,
    id: &str,
) -> Result<Option<WrappedModule>, RefreshError> {
    WrapperTemplate::new(plugin_name, RUNTIME_PUBLIC_PATH).wrap(id, code, map)
}

/// Inline script for the HTML entry: installs the runtime into the global
/// hook and no-op registration functions before any module runs.
pub fn preamble_code(base: &str) -> String {
    let specifier = format!("{}{}", base.trim_end_matches('/'), RUNTIME_PUBLIC_PATH);
    format!(
        "import {{ injectIntoGlobalHook }} from {};\n\
         injectIntoGlobalHook(window);\n\
         window.$RefreshReg$ = () => {{}};\n\
         window.$RefreshSig$ = () => (type) => type;\n",
        js_string_literal(&specifier)
    )
}
