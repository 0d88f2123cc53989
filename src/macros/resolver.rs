//! Macro resolution
//!
//! Sequences one resolution run:
//! 1. Bootstrap: `config_extension`, `deploy_path` and `profile` are decided
//!    before the general merge, since they choose which files are read and
//!    which sections apply. The extension is re-read from the merge so far
//!    before each next file is located, so a user config can switch the local
//!    and instance extension.
//! 2. Load the config files and merge them over the core defaults.
//! 3. Apply environment variables and overrides.
//! 4. Seed macros that templates need from the environment, then expand.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use ellire_template::MacroRenderer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::core::{CoreMacros, CONFIG_EXTENSION, DEPLOY_PATH, GLOBALS_SECTION, PROFILE};
use super::env::{EnvUsage, Environment, MacroOverrides, OverrideApplier};
use super::expand::{referenced_names, ExpandError, MacroExpander};
use super::layer::ConfigLayer;
use super::merge::{
    flatten_value, merge, require_globals, ForcedMacros, LayeredMacros, MergeError, MergeSources,
};
use super::MacroMap;
use crate::config::{
    load_config_file, load_config_file_as, ConfigFormat, ConfigLocations, LoadError, LoadedConfig,
};

const DEFAULT_PROFILE: &str = "dev";
const DEFAULT_CONFIG_EXTENSION: &str = "json";

/// Resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("deploy path {} cannot be resolved: {source}", path.display())]
    DeployPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Expand(#[from] ExpandError),
}

/// Which config file a source is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    System,
    User,
    Local,
    Instance,
}

/// A config file that contributed to the merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,
    pub path: PathBuf,
    pub format: ConfigFormat,

    /// SHA-256 digest of the raw file bytes
    pub digest: String,
}

impl ConfigSource {
    fn new(origin: ConfigOrigin, loaded: &LoadedConfig) -> Self {
        Self {
            origin,
            path: loaded.path.clone(),
            format: loaded.format,
            digest: loaded.digest.clone(),
        }
    }
}

/// Merged macros before expansion
#[derive(Debug, Clone)]
pub struct RawMacros {
    pub profile: String,
    pub config_extension: String,
    pub deploy_path: PathBuf,
    pub macros: LayeredMacros,

    /// Config files read, in precedence order
    pub config_files: Vec<ConfigSource>,

    /// Macro name → environment variable used for it
    pub env_vars_used: EnvUsage,
}

impl RawMacros {
    fn forced(&self) -> ForcedMacros {
        ForcedMacros {
            profile: self.profile.clone(),
            deploy_path: self.deploy_path.clone(),
            config_extension: self.config_extension.clone(),
        }
    }
}

/// Fully expanded macros
#[derive(Debug, Clone)]
pub struct ProcessedMacros {
    pub macros: MacroMap,

    /// Layer that supplied each macro's raw value
    pub origins: BTreeMap<String, ConfigLayer>,

    pub env_vars_used: EnvUsage,

    /// Expansion passes run
    pub passes: usize,

    /// Names referenced by templates or macro values that no source defined
    pub unresolved: BTreeSet<String>,
}

struct Bootstrap {
    system: Option<LoadedConfig>,
    user: Option<LoadedConfig>,

    /// `config_extension` from an override or the environment
    requested_extension: Option<String>,
    deploy_path: PathBuf,
    profile: String,
}

impl Bootstrap {
    /// Extension for the next file, given the configs merged so far
    /// (highest precedence first)
    fn next_extension(&self, merged: &[Option<&LoadedConfig>]) -> String {
        self.requested_extension
            .clone()
            .or_else(|| merged_value(merged, &self.profile, CONFIG_EXTENSION))
            .unwrap_or_else(|| DEFAULT_CONFIG_EXTENSION.to_string())
    }
}

/// Load an optional config file; absent or unreadable means no contribution.
fn load_optional(
    origin: ConfigOrigin,
    path: &Path,
    format: Option<ConfigFormat>,
) -> Result<Option<LoadedConfig>, LoadError> {
    let result = match format {
        Some(format) => load_config_file_as(path, format),
        None => load_config_file(path),
    };

    match result {
        Ok(loaded) => {
            info!(?origin, path = %path.display(), "using config file");
            Ok(Some(loaded))
        }
        Err(e) if e.is_unreadable() => {
            debug!(?origin, path = %path.display(), "config file not present");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn globals_value(config: Option<&LoadedConfig>, name: &str) -> Option<String> {
    config?
        .section(GLOBALS_SECTION)?
        .get(name)
        .map(flatten_value)
}

/// Value of `name` as the merge so far sees it. `configs` run highest
/// precedence first; each is read at its profile section, then its globals.
fn merged_value(configs: &[Option<&LoadedConfig>], profile: &str, name: &str) -> Option<String> {
    configs.iter().flatten().find_map(|config| {
        [profile, GLOBALS_SECTION]
            .into_iter()
            .find_map(|section| config.section(section)?.get(name).map(flatten_value))
    })
}

/// Resolves macros from every source for one deployment.
pub struct MacroResolver<'e> {
    locations: ConfigLocations,
    env: &'e dyn Environment,
    overrides: MacroOverrides,
    working_dir: Option<PathBuf>,
}

impl<'e> MacroResolver<'e> {
    pub fn new(env: &'e dyn Environment) -> Self {
        Self {
            locations: ConfigLocations::default(),
            env,
            overrides: MacroOverrides::default(),
            working_dir: None,
        }
    }

    pub fn with_locations(mut self, locations: ConfigLocations) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_overrides(mut self, overrides: MacroOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Directory used as the default deploy path (default: process cwd)
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn locations(&self) -> &ConfigLocations {
        &self.locations
    }

    fn applier(&self) -> OverrideApplier<'_> {
        OverrideApplier::new(self.env, &self.overrides)
    }

    fn working_dir(&self) -> Result<PathBuf, ResolveError> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().map_err(|source| ResolveError::DeployPath {
                path: PathBuf::from("."),
                source,
            }),
        }
    }

    fn bootstrap(&self, usage: &mut EnvUsage) -> Result<Bootstrap, ResolveError> {
        let applier = self.applier();

        let system = load_optional(
            ConfigOrigin::System,
            &self.locations.system_file,
            Some(ConfigFormat::Json),
        )?;
        if let Some(system) = &system {
            require_globals(system)?;
        }

        let requested_profile = applier.bootstrap_value(PROFILE, usage);
        let requested_extension = applier.bootstrap_value(CONFIG_EXTENSION, usage);

        let working_dir = self.working_dir()?;
        let requested = applier
            .bootstrap_value(DEPLOY_PATH, usage)
            .map(|path| working_dir.join(path))
            .unwrap_or(working_dir);
        let deploy_path = requested
            .canonicalize()
            .map_err(|source| ResolveError::DeployPath {
                path: requested.clone(),
                source,
            })?;

        // The user file is located with the extension the system config
        // selects for its own profile.
        let system_profile = requested_profile
            .clone()
            .or_else(|| globals_value(system.as_ref(), PROFILE))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let user_extension = requested_extension
            .clone()
            .or_else(|| merged_value(&[system.as_ref()], &system_profile, CONFIG_EXTENSION))
            .unwrap_or_else(|| DEFAULT_CONFIG_EXTENSION.to_string());

        let user = match self.locations.user_file(&user_extension) {
            Some(path) => load_optional(ConfigOrigin::User, &path, None)?,
            None => None,
        };

        let profile = requested_profile
            .or_else(|| globals_value(user.as_ref(), PROFILE))
            .or_else(|| globals_value(system.as_ref(), PROFILE))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        debug!(%profile, %user_extension, deploy_path = %deploy_path.display(), "bootstrap macros resolved");

        Ok(Bootstrap {
            system,
            user,
            requested_extension,
            deploy_path,
            profile,
        })
    }

    /// Active profile, without merging anything
    pub fn resolve_profile(&self) -> Result<String, ResolveError> {
        Ok(self.bootstrap(&mut EnvUsage::new())?.profile)
    }

    /// Load, merge and apply environment and overrides
    pub fn resolve_raw(&self) -> Result<RawMacros, ResolveError> {
        let mut env_vars_used = EnvUsage::new();
        let boot = self.bootstrap(&mut env_vars_used)?;

        let local_extension = boot.next_extension(&[boot.user.as_ref(), boot.system.as_ref()]);
        let local = load_optional(
            ConfigOrigin::Local,
            &self
                .locations
                .local_file(&boot.deploy_path, &local_extension),
            None,
        )?;

        let instance_extension = boot.next_extension(&[
            local.as_ref(),
            boot.user.as_ref(),
            boot.system.as_ref(),
        ]);
        let instance = load_optional(
            ConfigOrigin::Instance,
            &self
                .locations
                .instance_file(&boot.deploy_path, &instance_extension),
            None,
        )?;

        let sources = MergeSources {
            system: boot.system,
            user: boot.user,
            local,
            instance,
        };
        let config_files = [
            (ConfigOrigin::System, &sources.system),
            (ConfigOrigin::User, &sources.user),
            (ConfigOrigin::Local, &sources.local),
            (ConfigOrigin::Instance, &sources.instance),
        ]
        .into_iter()
        .filter_map(|(origin, loaded)| loaded.as_ref().map(|l| ConfigSource::new(origin, l)))
        .collect();

        let forced = ForcedMacros {
            profile: boot.profile,
            deploy_path: boot.deploy_path,
            config_extension: instance_extension,
        };
        let core = CoreMacros::for_deploy_path(forced.deploy_path.clone()).to_map();
        let merged = merge(core, &sources, &forced)?;

        let mut macros = self
            .applier()
            .apply(merged, &BTreeSet::new(), &mut env_vars_used);
        forced.apply_to(&mut macros);

        info!(macros = macros.len(), profile = %forced.profile, "raw macros resolved");

        Ok(RawMacros {
            profile: forced.profile,
            config_extension: forced.config_extension,
            deploy_path: forced.deploy_path,
            macros,
            config_files,
            env_vars_used,
        })
    }

    /// Seed the names templates need from the environment, then expand.
    pub fn process(
        &self,
        raw: &RawMacros,
        renderer: &dyn MacroRenderer,
        needed: &BTreeSet<String>,
    ) -> Result<ProcessedMacros, ResolveError> {
        let mut env_vars_used = raw.env_vars_used.clone();

        let mut wanted = needed.clone();
        wanted.extend(referenced_names(renderer, raw.macros.values()));

        let mut seeded = self
            .applier()
            .apply(raw.macros.clone(), &wanted, &mut env_vars_used);
        raw.forced().apply_to(&mut seeded);

        let expansion = MacroExpander::new(renderer)
            .expand(seeded.values())
            .map_err(ExpandError::Circular)?;

        let mut unresolved: BTreeSet<String> = needed
            .iter()
            .filter(|name| !expansion.macros.contains_key(*name))
            .cloned()
            .collect();
        unresolved.extend(
            referenced_names(renderer, &expansion.macros)
                .into_iter()
                .filter(|name| !expansion.macros.contains_key(name)),
        );
        if !unresolved.is_empty() {
            warn!(?unresolved, "macros referenced but never defined");
        }

        Ok(ProcessedMacros {
            macros: expansion.macros,
            origins: seeded.origins().clone(),
            env_vars_used,
            passes: expansion.passes,
            unresolved,
        })
    }
}
