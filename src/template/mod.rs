//! Templates: discovery, loading and macro usage
//!
//! Rendering itself lives in the `ellire-template` crate; this module finds
//! template files under the deploy path and works out which macros they need.

mod exclude;
mod finder;

pub use ellire_template::{DelimitedRenderer, DelimiterError, MacroRenderer, Rendered};
pub use exclude::{split_dir_list, ExcludeRules};
pub use finder::TemplateFinder;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::macros::core::{MACRO_CLOSING_STRING, MACRO_OPENING_STRING};
use crate::macros::MacroMap;

const DEFAULT_DELIMITER: &str = "@";

/// Template discovery errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {} could not be read: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("template search failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid template exclude pattern: {0}")]
    Glob(#[from] globset::Error),
}

/// Renderer using the delimiters configured in `macros`
pub fn renderer_for(macros: &MacroMap) -> Result<DelimitedRenderer, DelimiterError> {
    let opening = macros
        .get(MACRO_OPENING_STRING)
        .map(String::as_str)
        .unwrap_or(DEFAULT_DELIMITER);
    let closing = macros
        .get(MACRO_CLOSING_STRING)
        .map(String::as_str)
        .unwrap_or(DEFAULT_DELIMITER);
    DelimitedRenderer::new(opening, closing)
}

/// Read a template's text
pub fn load_template(path: &Path) -> Result<String, TemplateError> {
    fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Every macro name referenced across the given templates
pub fn find_needed_macros(
    root: &Path,
    templates: &[PathBuf],
    renderer: &dyn MacroRenderer,
) -> Result<BTreeSet<String>, TemplateError> {
    let mut needed = BTreeSet::new();
    for template in templates {
        let text = load_template(&root.join(template))?;
        needed.extend(renderer.known_references(&text));
    }
    Ok(needed)
}
