//! Default config installation
//!
//! Creates empty system and user config files so a machine can start setting
//! its profile and shared macros. Existing files are never touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::locations::ConfigLocations;

/// Contents of a freshly installed config file
pub const DEFAULT_CONFIG: &str = "{\n    \"globals\": {}\n}\n";

/// Extension used for installed user config files
const DEFAULT_EXTENSION: &str = "json";

/// What happened to one config file
#[derive(Debug)]
pub enum InstallStatus {
    AlreadyPresent,
    Installed,
    Failed(io::Error),
}

impl InstallStatus {
    /// Whether the file exists after installation
    pub fn is_present(&self) -> bool {
        !matches!(self, InstallStatus::Failed(_))
    }
}

#[derive(Debug)]
pub struct InstallOutcome {
    pub path: PathBuf,
    pub status: InstallStatus,
}

/// Install outcome for the system and user config files
#[derive(Debug)]
pub struct InstallReport {
    pub system: InstallOutcome,

    /// None when no user directory is known
    pub user: Option<InstallOutcome>,
}

fn write_default(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG)
}

/// Install the default config at `path` unless something is already there.
pub fn install_default_file(path: &Path) -> InstallOutcome {
    let status = if path.exists() {
        InstallStatus::AlreadyPresent
    } else {
        match write_default(path) {
            Ok(()) => {
                info!(path = %path.display(), "installed default config");
                InstallStatus::Installed
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot install default config");
                InstallStatus::Failed(e)
            }
        }
    };

    InstallOutcome {
        path: path.to_path_buf(),
        status,
    }
}

/// Install default system and user config files
pub fn install_default_configs(locations: &ConfigLocations) -> InstallReport {
    InstallReport {
        system: install_default_file(&locations.system_file),
        user: locations
            .user_file(DEFAULT_EXTENSION)
            .map(|path| install_default_file(&path)),
    }
}
