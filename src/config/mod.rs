//! Config source loading
//!
//! Reads the structured files that feed the macro layers:
//! 1. System config (/etc/ellire.json)
//! 2. User config (~/.ellire/ellire.<ext>)
//! 3. Local deployment config (<deploy_path>/ellire.<ext>)
//! 4. Instance config (<deploy_path>/.ellire-instance.<ext>)
//!
//! JSON, YAML, XML, INI and TOML all parse into one generic tree.

mod format;
mod install;
mod loader;
mod locations;

pub use format::ConfigFormat;
pub use install::{
    install_default_configs, install_default_file, InstallOutcome, InstallReport, InstallStatus,
    DEFAULT_CONFIG,
};
pub use loader::{load_config_file, load_config_file_as, LoadError, LoadedConfig};
pub use locations::{
    ConfigLocations, CONFIG_BASENAME, DEFAULT_SYSTEM_CONFIG, INSTANCE_CONFIG_BASENAME,
    USER_CONFIG_DIR,
};
