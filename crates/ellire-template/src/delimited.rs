//! Delimiter-based placeholder renderer
//!
//! Placeholders look like `<open> name <close>`, e.g. `@port@` with the default
//! `@`/`@` delimiters. Whitespace inside the delimiters is ignored and names
//! follow identifier rules.

use std::collections::{BTreeMap, BTreeSet};

use regex_lite::{Captures, Regex};

use crate::{MacroRenderer, Rendered};

/// Errors building a renderer
#[derive(Debug, thiserror::Error)]
pub enum DelimiterError {
    #[error("{0} macro delimiter must not be empty")]
    Empty(&'static str),

    #[error("invalid delimiter pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

/// Renders `<open>name<close>` placeholders.
#[derive(Debug, Clone)]
pub struct DelimitedRenderer {
    opening: String,
    closing: String,
    pattern: Regex,
}

impl DelimitedRenderer {
    /// Build a renderer for the given delimiters.
    pub fn new(opening: &str, closing: &str) -> Result<Self, DelimiterError> {
        if opening.is_empty() {
            return Err(DelimiterError::Empty("opening"));
        }
        if closing.is_empty() {
            return Err(DelimiterError::Empty("closing"));
        }

        let pattern = Regex::new(&format!(
            r"{}[ \t]*([A-Za-z_][A-Za-z0-9_]*)[ \t]*{}",
            regex_lite::escape(opening),
            regex_lite::escape(closing)
        ))?;

        Ok(Self {
            opening: opening.to_string(),
            closing: closing.to_string(),
            pattern,
        })
    }

    /// Opening delimiter
    pub fn opening(&self) -> &str {
        &self.opening
    }

    /// Closing delimiter
    pub fn closing(&self) -> &str {
        &self.closing
    }

    /// Placeholder text for `name` using this renderer's delimiters
    pub fn placeholder(&self, name: &str) -> String {
        format!("{}{}{}", self.opening, name, self.closing)
    }
}

impl MacroRenderer for DelimitedRenderer {
    fn known_references(&self, template: &str) -> BTreeSet<String> {
        self.pattern
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    fn render(&self, template: &str, bindings: &BTreeMap<String, String>) -> Rendered {
        let mut known = BTreeSet::new();
        let mut missing = BTreeSet::new();

        let output = self
            .pattern
            .replace_all(template, |caps: &Captures<'_>| {
                let name = &caps[1];
                known.insert(name.to_string());
                match bindings.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        missing.insert(name.to_string());
                        caps[0].to_string()
                    }
                }
            })
            .into_owned();

        Rendered {
            output,
            known,
            missing,
        }
    }
}
