//! Macro report with full provenance
//!
//! The JSON document printed by `list-macros --json`: raw macro values with
//! the layer that supplied each one, the expanded values, and the files and
//! environment variables that contributed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::macros::{ConfigLayer, ConfigSource, ProcessedMacros, RawMacros};

/// Schema version for the macro report
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "ellire/macro_report@1";

/// One raw macro value and where it came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMacroEntry {
    pub value: String,
    pub origin: ConfigLayer,
}

/// Resolved macros with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroReport {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When this report was computed
    pub created_at: DateTime<Utc>,

    pub profile: String,
    pub deploy_path: PathBuf,

    /// Contributing config files in precedence order
    pub config_files: Vec<ConfigSource>,

    /// Macro name → environment variable used
    pub env_vars_used: BTreeMap<String, String>,

    pub raw: BTreeMap<String, RawMacroEntry>,
    pub processed: BTreeMap<String, String>,

    /// Macros templates need that no source defined
    pub unresolved: BTreeSet<String>,
}

impl MacroReport {
    pub fn build(raw: &RawMacros, processed: &ProcessedMacros) -> Self {
        let raw_entries = raw
            .macros
            .values()
            .iter()
            .map(|(name, value)| {
                let entry = RawMacroEntry {
                    value: value.clone(),
                    origin: raw.macros.origin(name).unwrap_or(ConfigLayer::Core),
                };
                (name.clone(), entry)
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            profile: raw.profile.clone(),
            deploy_path: raw.deploy_path.clone(),
            config_files: raw.config_files.clone(),
            env_vars_used: processed.env_vars_used.clone(),
            raw: raw_entries,
            processed: processed.macros.clone(),
            unresolved: processed.unresolved.clone(),
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
