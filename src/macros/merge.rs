//! Layered macro merge
//!
//! Implements the config-file part of the precedence chain:
//! core defaults → system (globals, profile) → user (globals, profile)
//! → local (globals, profile) → instance (flat).
//!
//! Each layer is reduced into the accumulator key by key; a layer never
//! replaces the accumulator wholesale.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};

use super::core::{CONFIG_EXTENSION, DEPLOY_PATH, GLOBALS_SECTION, PROFILE};
use super::layer::ConfigLayer;
use super::MacroMap;
use crate::config::LoadedConfig;

/// Merge errors
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("missing {section} section in system config file {}", path.display())]
    MissingRequiredSection {
        path: PathBuf,
        section: &'static str,
    },
}

/// Loaded config files feeding the merge; None means the file was absent.
#[derive(Debug, Clone, Default)]
pub struct MergeSources {
    pub system: Option<LoadedConfig>,
    pub user: Option<LoadedConfig>,
    pub local: Option<LoadedConfig>,
    pub instance: Option<LoadedConfig>,
}

/// Macros whose values were decided before merging and must match what the
/// merge actually used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedMacros {
    pub profile: String,
    pub deploy_path: PathBuf,
    pub config_extension: String,
}

impl ForcedMacros {
    /// Overwrite the forced values, keeping existing origins.
    pub fn apply_to(&self, macros: &mut LayeredMacros) {
        macros.force(PROFILE, &self.profile);
        macros.force(DEPLOY_PATH, &self.deploy_path.to_string_lossy());
        macros.force(CONFIG_EXTENSION, &self.config_extension);
    }
}

/// Macro values together with the layer that last set each one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayeredMacros {
    values: MacroMap,
    origins: BTreeMap<String, ConfigLayer>,
}

impl LayeredMacros {
    /// Start from a mapping attributed to a single layer
    pub fn from_layer(layer: ConfigLayer, values: MacroMap) -> Self {
        Self::default().apply_layer(layer, values)
    }

    /// Reduce one layer into the accumulator, key by key
    pub fn apply_layer(mut self, layer: ConfigLayer, values: MacroMap) -> Self {
        for (name, value) in values {
            self.set(name, value, layer);
        }
        self
    }

    pub fn set(&mut self, name: String, value: String, layer: ConfigLayer) {
        self.origins.insert(name.clone(), layer);
        self.values.insert(name, value);
    }

    fn force(&mut self, name: &str, value: &str) {
        self.origins
            .entry(name.to_string())
            .or_insert(ConfigLayer::Core);
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn origin(&self, name: &str) -> Option<ConfigLayer> {
        self.origins.get(name).copied()
    }

    pub fn values(&self) -> &MacroMap {
        &self.values
    }

    pub fn origins(&self) -> &BTreeMap<String, ConfigLayer> {
        &self.origins
    }

    pub fn into_values(self) -> MacroMap {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Flatten one config value to its macro string.
///
/// - Strings: as-is
/// - Numbers and booleans: canonical text
/// - Null: empty string
/// - Arrays: comma-joined flattened elements
/// - Mappings: compact JSON text
pub fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Flatten a whole section into macros
pub fn section_macros(section: &Map<String, Value>) -> MacroMap {
    section
        .iter()
        .map(|(name, value)| (name.clone(), flatten_value(value)))
        .collect()
}

/// The system config must carry a `globals` mapping when it exists.
pub fn require_globals(system: &LoadedConfig) -> Result<(), MergeError> {
    if system.section(GLOBALS_SECTION).is_none() {
        return Err(MergeError::MissingRequiredSection {
            path: system.path.clone(),
            section: GLOBALS_SECTION,
        });
    }
    Ok(())
}

fn scoped_layers(
    config: Option<&LoadedConfig>,
    profile: &str,
    global_layer: ConfigLayer,
    profile_layer: ConfigLayer,
    layers: &mut Vec<(ConfigLayer, MacroMap)>,
) {
    let Some(config) = config else {
        return;
    };
    if let Some(globals) = config.section(GLOBALS_SECTION) {
        layers.push((global_layer, section_macros(globals)));
    }
    if let Some(section) = config.section(profile) {
        layers.push((profile_layer, section_macros(section)));
    }
}

/// Turn the loaded sources into an ordered list of layer contributions,
/// lowest precedence first.
pub fn layer_contributions(
    sources: &MergeSources,
    profile: &str,
) -> Result<Vec<(ConfigLayer, MacroMap)>, MergeError> {
    if let Some(system) = &sources.system {
        require_globals(system)?;
    }

    let mut layers = Vec::new();
    scoped_layers(
        sources.system.as_ref(),
        profile,
        ConfigLayer::SystemGlobal,
        ConfigLayer::SystemProfile,
        &mut layers,
    );
    scoped_layers(
        sources.user.as_ref(),
        profile,
        ConfigLayer::UserGlobal,
        ConfigLayer::UserProfile,
        &mut layers,
    );
    scoped_layers(
        sources.local.as_ref(),
        profile,
        ConfigLayer::LocalGlobal,
        ConfigLayer::LocalProfile,
        &mut layers,
    );
    if let Some(instance) = &sources.instance {
        layers.push((ConfigLayer::Instance, section_macros(&instance.values)));
    }

    Ok(layers)
}

/// Merge core defaults and config files for `forced.profile`, then force the
/// bootstrap macros onto the result.
pub fn merge(
    core: MacroMap,
    sources: &MergeSources,
    forced: &ForcedMacros,
) -> Result<LayeredMacros, MergeError> {
    let mut merged = layer_contributions(sources, &forced.profile)?
        .into_iter()
        .fold(
            LayeredMacros::from_layer(ConfigLayer::Core, core),
            |acc, (layer, values)| acc.apply_layer(layer, values),
        );

    forced.apply_to(&mut merged);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;
    use crate::macros::core::CoreMacros;
    use serde_json::json;

    fn loaded(name: &str, value: Value) -> LoadedConfig {
        LoadedConfig {
            path: PathBuf::from(name),
            format: ConfigFormat::Json,
            digest: String::new(),
            values: value.as_object().cloned().unwrap_or_default(),
        }
    }

    fn forced(profile: &str) -> ForcedMacros {
        ForcedMacros {
            profile: profile.to_string(),
            deploy_path: PathBuf::from("/srv/app"),
            config_extension: "json".to_string(),
        }
    }

    fn core() -> MacroMap {
        CoreMacros::for_deploy_path(PathBuf::from("/srv/app")).to_map()
    }

    #[test]
    fn test_core_only() {
        let merged = merge(core(), &MergeSources::default(), &forced("dev")).unwrap();

        assert_eq!(merged.get("profile"), Some("dev"));
        assert_eq!(merged.get("dist_file_extension"), Some("template"));
        assert_eq!(merged.origin("dist_file_extension"), Some(ConfigLayer::Core));
    }

    #[test]
    fn test_profile_overrides_globals_in_same_file() {
        let sources = MergeSources {
            system: Some(loaded(
                "system.json",
                json!({"globals": {"host": "localhost"}, "prod": {"host": "example.com"}}),
            )),
            ..Default::default()
        };

        let dev = merge(core(), &sources, &forced("dev")).unwrap();
        assert_eq!(dev.get("host"), Some("localhost"));
        assert_eq!(dev.origin("host"), Some(ConfigLayer::SystemGlobal));

        let prod = merge(core(), &sources, &forced("prod")).unwrap();
        assert_eq!(prod.get("host"), Some("example.com"));
        assert_eq!(prod.origin("host"), Some(ConfigLayer::SystemProfile));
    }

    #[test]
    fn test_later_file_globals_beat_earlier_profile() {
        let sources = MergeSources {
            system: Some(loaded(
                "system.json",
                json!({"globals": {}, "prod": {"host": "system-prod"}}),
            )),
            user: Some(loaded("user.json", json!({"globals": {"host": "user-global"}}))),
            ..Default::default()
        };

        let merged = merge(core(), &sources, &forced("prod")).unwrap();
        assert_eq!(merged.get("host"), Some("user-global"));
        assert_eq!(merged.origin("host"), Some(ConfigLayer::UserGlobal));
    }

    #[test]
    fn test_full_precedence_chain() {
        let sources = MergeSources {
            system: Some(loaded(
                "system.json",
                json!({"globals": {"a": "sg", "b": "sg", "c": "sg", "d": "sg"}, "dev": {"b": "sp"}}),
            )),
            user: Some(loaded(
                "user.json",
                json!({"globals": {"c": "ug"}, "dev": {"d": "up"}}),
            )),
            local: Some(loaded(
                "local.json",
                json!({"globals": {"e": "lg"}, "dev": {"e": "lp", "f": "lp"}}),
            )),
            instance: Some(loaded("instance.json", json!({"f": "inst"}))),
        };

        let merged = merge(core(), &sources, &forced("dev")).unwrap();
        assert_eq!(merged.get("a"), Some("sg"));
        assert_eq!(merged.get("b"), Some("sp"));
        assert_eq!(merged.get("c"), Some("ug"));
        assert_eq!(merged.get("d"), Some("up"));
        assert_eq!(merged.get("e"), Some("lp"));
        assert_eq!(merged.get("f"), Some("inst"));
        assert_eq!(merged.origin("f"), Some(ConfigLayer::Instance));
    }

    #[test]
    fn test_other_profile_section_ignored() {
        let sources = MergeSources {
            local: Some(loaded("local.json", json!({"prod": {"only_prod": "x"}}))),
            ..Default::default()
        };

        let merged = merge(core(), &sources, &forced("dev")).unwrap();
        assert!(!merged.contains("only_prod"));
    }

    #[test]
    fn test_system_without_globals_is_error() {
        let sources = MergeSources {
            system: Some(loaded("system.json", json!({"dev": {"a": "b"}}))),
            ..Default::default()
        };

        let err = merge(core(), &sources, &forced("dev")).unwrap_err();
        assert!(matches!(
            err,
            MergeError::MissingRequiredSection { section: "globals", .. }
        ));
    }

    #[test]
    fn test_other_sources_tolerate_missing_globals() {
        let sources = MergeSources {
            user: Some(loaded("user.json", json!({"dev": {"a": "user"}}))),
            local: Some(loaded("local.json", json!({}))),
            ..Default::default()
        };

        let merged = merge(core(), &sources, &forced("dev")).unwrap();
        assert_eq!(merged.get("a"), Some("user"));
    }

    #[test]
    fn test_instance_may_override_core_macros() {
        let sources = MergeSources {
            instance: Some(loaded(
                "instance.json",
                json!({"dist_file_extension": "dist", "macro_opening_string": "{{"}),
            )),
            ..Default::default()
        };

        let merged = merge(core(), &sources, &forced("dev")).unwrap();
        assert_eq!(merged.get("dist_file_extension"), Some("dist"));
        assert_eq!(merged.get("macro_opening_string"), Some("{{"));
    }

    #[test]
    fn test_forced_macros_win() {
        let sources = MergeSources {
            local: Some(loaded(
                "local.json",
                json!({"globals": {"profile": "other", "config_extension": "yml", "deploy_path": "/elsewhere"}}),
            )),
            ..Default::default()
        };

        let merged = merge(core(), &sources, &forced("dev")).unwrap();
        assert_eq!(merged.get("profile"), Some("dev"));
        assert_eq!(merged.get("config_extension"), Some("json"));
        assert_eq!(merged.get("deploy_path"), Some("/srv/app"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let sources = MergeSources {
            system: Some(loaded(
                "system.json",
                json!({"globals": {"a": 1}, "prod": {"a": 2}}),
            )),
            local: Some(loaded("local.json", json!({"prod": {"b": [1, 2]}}))),
            ..Default::default()
        };

        let once = merge(core(), &sources, &forced("prod")).unwrap();
        let twice = merge(core(), &sources, &forced("prod")).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_flatten_value() {
        assert_eq!(flatten_value(&json!("x")), "x");
        assert_eq!(flatten_value(&json!(80)), "80");
        assert_eq!(flatten_value(&json!(true)), "true");
        assert_eq!(flatten_value(&json!(null)), "");
        assert_eq!(flatten_value(&json!(["cache", "logs/"])), "cache,logs/");
        assert_eq!(flatten_value(&json!({"k": "v"})), r#"{"k":"v"}"#);
    }
}
