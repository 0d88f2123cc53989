//! Macro placeholder rendering.
//!
//! A renderer turns a piece of template text plus a set of macro bindings into
//! output text, and reports which macro names the text referenced. Macro values
//! are themselves rendered through the same contract when they reference other
//! macros, so the renderer must be a pure in-memory function of its inputs.

mod delimited;

pub use delimited::{DelimitedRenderer, DelimiterError};

use std::collections::{BTreeMap, BTreeSet};

/// Result of rendering one piece of template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Rendered text
    pub output: String,

    /// Every macro name the text referenced, bound or not
    pub known: BTreeSet<String>,

    /// Referenced names that had no binding
    pub missing: BTreeSet<String>,
}

impl Rendered {
    /// Whether any referenced macro was left without a value
    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Capability required from a template engine.
pub trait MacroRenderer {
    /// Names referenced by `template`, regardless of bindings.
    fn known_references(&self, template: &str) -> BTreeSet<String>;

    /// Render `template` against `bindings`.
    ///
    /// A reference with no binding is left in the output as written.
    fn render(&self, template: &str, bindings: &BTreeMap<String, String>) -> Rendered;
}
