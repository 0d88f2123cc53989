//! Environment and command-line override application
//!
//! Environment variables follow the pattern `ELLIRE_<MACRO_NAME>`: the macro
//! name upper-cased with every run of non-alphanumeric characters replaced by
//! `_`. Overrides (`name=value` pairs) are applied after the environment and
//! win over it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::debug;

use super::layer::ConfigLayer;
use super::merge::LayeredMacros;

/// Prefix of every macro environment variable
pub const ENV_PREFIX: &str = "ELLIRE_";

/// Macro name → environment variable name, for every variable that was used
pub type EnvUsage = BTreeMap<String, String>;

/// Read access to environment variables
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

fn separator_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("[^A-Za-z0-9]+").expect("static pattern is valid"))
}

/// Environment variable consulted for a macro
pub fn env_var_name(macro_name: &str) -> String {
    format!(
        "{}{}",
        ENV_PREFIX,
        separator_runs()
            .replace_all(macro_name, "_")
            .to_ascii_uppercase()
    )
}

/// Override parsing errors
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("the macro '{0}' is not in the name=value format")]
    Malformed(String),
}

/// Caller-supplied macro values (typically `-m name=value` flags)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroOverrides(BTreeMap<String, String>);

impl MacroOverrides {
    /// Parse `name=value` pairs, splitting at the first `=`.
    pub fn parse<S: AsRef<str>>(pairs: &[S]) -> Result<Self, OverrideError> {
        let mut overrides = BTreeMap::new();
        for pair in pairs {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((name, value)) if !name.is_empty() => {
                    overrides.insert(name.to_string(), value.to_string());
                }
                _ => return Err(OverrideError::Malformed(pair.to_string())),
            }
        }
        Ok(Self(overrides))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for MacroOverrides {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Applies environment variables and overrides on top of merged macros.
pub struct OverrideApplier<'a> {
    env: &'a dyn Environment,
    overrides: &'a MacroOverrides,
}

impl<'a> OverrideApplier<'a> {
    pub fn new(env: &'a dyn Environment, overrides: &'a MacroOverrides) -> Self {
        Self { env, overrides }
    }

    /// Value of a macro's environment variable, recording its use.
    pub fn env_value(&self, macro_name: &str, usage: &mut EnvUsage) -> Option<String> {
        let var = env_var_name(macro_name);
        let value = self.env.var(&var)?;
        debug!(macro_name, variable = %var, "macro set from environment");
        usage.insert(macro_name.to_string(), var);
        Some(value)
    }

    /// Override first, then environment.
    pub fn bootstrap_value(&self, macro_name: &str, usage: &mut EnvUsage) -> Option<String> {
        match self.overrides.get(macro_name) {
            Some(value) => Some(value.to_string()),
            None => self.env_value(macro_name, usage),
        }
    }

    /// Apply the environment to every known macro plus `extra_names`, then
    /// apply every override.
    pub fn apply(
        &self,
        mut macros: LayeredMacros,
        extra_names: &BTreeSet<String>,
        usage: &mut EnvUsage,
    ) -> LayeredMacros {
        let names: BTreeSet<String> = macros
            .values()
            .keys()
            .cloned()
            .chain(extra_names.iter().cloned())
            .collect();

        for name in names {
            if let Some(value) = self.env_value(&name, usage) {
                macros.set(name, value, ConfigLayer::Environment);
            }
        }

        for (name, value) in self.overrides.iter() {
            macros.set(name.clone(), value.clone(), ConfigLayer::Override);
        }

        macros
    }
}
