//! Source of the module served at `/@react-refresh`.
//!
//! It re-exports `react-refresh/runtime` and adds the helpers the wrapper
//! footer calls. Boundary messages must stay identical to
//! [`BoundaryRejection`](crate::runtime::boundary::BoundaryRejection).

use crate::plugin::options::PluginOptions;
use crate::runtime::boundary::CONSISTENT_EXPORTS_HELP_URL;
use crate::utils::js_string_literal;

const RUNTIME_TEMPLATE: &str = r#"import RefreshRuntime from "react-refresh/runtime";

const HELP_URL = __HELP_URL__;
const FLUSH_DELAY = __FLUSH_DELAY__;
const REJECT_ADDED_EXPORTS = __REJECT_ADDED_EXPORTS__;

export const injectIntoGlobalHook = (globalObject) => RefreshRuntime.injectIntoGlobalHook(globalObject);
export const register = (type, id) => RefreshRuntime.register(type, id);
export const createSignatureFunctionForTransform = () => RefreshRuntime.createSignatureFunctionForTransform();
export const isLikelyComponentType = (type) => RefreshRuntime.isLikelyComponentType(type);
export const getFamilyByType = (type) => RefreshRuntime.getFamilyByType(type);

export function getRefreshReg(moduleId) {
  return (type, id) => register(type, moduleId + " " + id);
}

function isAccessor(moduleExports, key) {
  const desc = Object.getOwnPropertyDescriptor(moduleExports, key);
  return Boolean(desc && desc.get);
}

export function registerExportsForReactRefresh(moduleId, moduleExports) {
  for (const key in moduleExports) {
    if (key === "__esModule") continue;
    if (isAccessor(moduleExports, key)) continue;
    const exportValue = moduleExports[key];
    if (isLikelyComponentType(exportValue)) {
      register(exportValue, moduleId + " " + key);
    }
  }
}

export function __hmr_import(module) {
  return import(/* @vite-ignore */ module);
}

function debounce(fn, delay) {
  let handle;
  return () => {
    clearTimeout(handle);
    handle = setTimeout(fn, delay);
  };
}

const enqueueUpdate = debounce(() => RefreshRuntime.performReactRefresh(), FLUSH_DELAY);

function exportKeys(moduleExports, ignoredExports) {
  return Object.keys(moduleExports).filter(
    (key) => key !== "__esModule" && !ignoredExports.includes(key),
  );
}

export function validateRefreshBoundaryAndEnqueueUpdate(moduleId, prevExports, nextExports) {
  const ignoredExports = window.__getReactRefreshIgnoredExports?.({ id: moduleId }) ?? [];
  const prevKeys = exportKeys(prevExports, ignoredExports);
  const nextKeys = exportKeys(nextExports, ignoredExports);

  for (const key of prevKeys) {
    if (!(key in nextExports)) {
      return `Could not Fast Refresh ("${key}" export removed)`;
    }
  }
  for (const [moduleExports, keys] of [[prevExports, prevKeys], [nextExports, nextKeys]]) {
    for (const key of keys) {
      if (isAccessor(moduleExports, key)) {
        return `Could not Fast Refresh ("${key}" export is defined by a getter). Learn more at ${HELP_URL}`;
      }
    }
  }
  if (REJECT_ADDED_EXPORTS) {
    for (const key of nextKeys) {
      if (!(key in prevExports)) {
        return `Could not Fast Refresh ("${key}" new export)`;
      }
    }
  }
  if (nextKeys.length === 0) {
    return `Could not Fast Refresh (module has no exports). Learn more at ${HELP_URL}`;
  }
  for (const key of nextKeys) {
    if (isLikelyComponentType(nextExports[key])) continue;
    if (prevExports[key] !== nextExports[key]) {
      return `Could not Fast Refresh ("${key}" export is incompatible). Learn more at ${HELP_URL}`;
    }
  }
  enqueueUpdate();
}

export default {
  injectIntoGlobalHook,
  register,
  createSignatureFunctionForTransform,
  isLikelyComponentType,
  getFamilyByType,
  getRefreshReg,
  registerExportsForReactRefresh,
  validateRefreshBoundaryAndEnqueueUpdate,
  __hmr_import,
};
"#;

/// Runtime module source for the given options.
pub fn runtime_module_source(options: &PluginOptions) -> String {
    RUNTIME_TEMPLATE
        .replace("__HELP_URL__", &js_string_literal(CONSISTENT_EXPORTS_HELP_URL))
        .replace("__FLUSH_DELAY__", &options.refresh_debounce_ms.to_string())
        .replace(
            "__REJECT_ADDED_EXPORTS__",
            if options.reject_added_exports { "true" } else { "false" },
        )
}
