//! Utility functions for the plugin.
//!
//! - Module id cleaning and classification
//! - JS string literal encoding (injection-safe)
//! - Source map line shifting

use crate::RefreshError;

// ---------------------------------------------------------------------------
// Module IDs
// ---------------------------------------------------------------------------

/// Prefix bundlers use for virtual modules that must never hit the filesystem.
pub const VIRTUAL_PREFIX: char = '\0';

/// Strip the query string and hash from a module id.
pub fn clean_url(id: &str) -> &str {
    let end = id.find(['?', '#']).unwrap_or(id.len());
    &id[..end]
}

/// Check if a module ID is a virtual module.
pub fn is_virtual(id: &str) -> bool {
    id.starts_with(VIRTUAL_PREFIX)
}

/// Check if a module ID points into a dependency.
pub fn is_node_modules(id: &str) -> bool {
    clean_url(id).contains("/node_modules/")
}

// ---------------------------------------------------------------------------
// JS String Literals
// ---------------------------------------------------------------------------

/// Encode `s` as a double-quoted JS string literal (`JSON.stringify` semantics).
pub fn js_string_literal(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

// ---------------------------------------------------------------------------
// Source Maps
// ---------------------------------------------------------------------------

/// Number of line breaks in `s`.
pub fn count_lines(s: &str) -> usize {
    s.bytes().filter(|b| *b == b'\n').count()
}

/// Shift every mapping of a JSON source map down by `lines` generated lines.
///
/// Maps without a `mappings` string are returned unchanged.
pub fn shift_source_map(map: &str, lines: usize) -> Result<String, RefreshError> {
    let mut parsed: serde_json::Value = serde_json::from_str(map)?;
    if lines == 0 {
        return Ok(map.to_string());
    }
    if let Some(serde_json::Value::String(mappings)) = parsed.get_mut("mappings") {
        mappings.insert_str(0, &";".repeat(lines));
    }
    Ok(serde_json::to_string(&parsed)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
