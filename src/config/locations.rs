//! Config file locations
//!
//! System config is always JSON at a fixed path; user, local and instance
//! files use the resolved `config_extension`.

use std::path::{Path, PathBuf};

/// Default system-wide config file
pub const DEFAULT_SYSTEM_CONFIG: &str = "/etc/ellire.json";

/// Directory under the user's home holding the user config
pub const USER_CONFIG_DIR: &str = ".ellire";

/// Base name of user and local config files
pub const CONFIG_BASENAME: &str = "ellire";

/// Base name of the per-instance config file
pub const INSTANCE_CONFIG_BASENAME: &str = ".ellire-instance";

/// Where each config layer is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocations {
    /// System config file
    pub system_file: PathBuf,

    /// Directory holding the user config, None when no home directory is known
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigLocations {
    fn default() -> Self {
        Self {
            system_file: PathBuf::from(DEFAULT_SYSTEM_CONFIG),
            user_dir: dirs::home_dir().map(|home| home.join(USER_CONFIG_DIR)),
        }
    }
}

impl ConfigLocations {
    /// Set the system config file
    pub fn with_system_file(mut self, path: PathBuf) -> Self {
        self.system_file = path;
        self
    }

    /// Set the user config directory
    pub fn with_user_dir(mut self, dir: PathBuf) -> Self {
        self.user_dir = Some(dir);
        self
    }

    /// User config file for the given extension
    pub fn user_file(&self, extension: &str) -> Option<PathBuf> {
        self.user_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", CONFIG_BASENAME, extension)))
    }

    /// Deployment config file at the deploy root
    pub fn local_file(&self, deploy_path: &Path, extension: &str) -> PathBuf {
        deploy_path.join(format!("{}.{}", CONFIG_BASENAME, extension))
    }

    /// Instance config file at the deploy root
    pub fn instance_file(&self, deploy_path: &Path, extension: &str) -> PathBuf {
        deploy_path.join(format!("{}.{}", INSTANCE_CONFIG_BASENAME, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let locations = ConfigLocations::default()
            .with_system_file(PathBuf::from("/tmp/sys.json"))
            .with_user_dir(PathBuf::from("/home/u/.ellire"));

        assert_eq!(locations.system_file, PathBuf::from("/tmp/sys.json"));
        assert_eq!(
            locations.user_file("yml"),
            Some(PathBuf::from("/home/u/.ellire/ellire.yml"))
        );
        assert_eq!(
            locations.local_file(Path::new("/srv/app"), "json"),
            PathBuf::from("/srv/app/ellire.json")
        );
        assert_eq!(
            locations.instance_file(Path::new("/srv/app"), "ini"),
            PathBuf::from("/srv/app/.ellire-instance.ini")
        );
    }

    #[test]
    fn test_no_home_means_no_user_file() {
        let locations = ConfigLocations {
            system_file: PathBuf::from(DEFAULT_SYSTEM_CONFIG),
            user_dir: None,
        };
        assert_eq!(locations.user_file("json"), None);
    }
}
