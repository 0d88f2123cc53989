//! Built-in core macros (lowest precedence layer)
//!
//! Control macros that steer resolution and rendering themselves.

use std::path::PathBuf;

use super::MacroMap;

pub const PROFILE: &str = "profile";
pub const CONFIG_EXTENSION: &str = "config_extension";
pub const DEPLOY_PATH: &str = "deploy_path";
pub const DIST_FILE_EXTENSION: &str = "dist_file_extension";
pub const GENERATED_FILES_WRITABLE: &str = "generated_files_writable";
pub const MACRO_OPENING_STRING: &str = "macro_opening_string";
pub const MACRO_CLOSING_STRING: &str = "macro_closing_string";

/// Optional comma-separated list of directories skipped during template discovery
pub const TEMPLATE_EXCLUDE_PATHS: &str = "template_exclude_paths";

/// Name of the section every config file may use for profile-independent values
pub const GLOBALS_SECTION: &str = "globals";

/// Macros configuring the delimiter syntax; never expanded
pub const UNPROCESSED_MACROS: &[&str] = &[MACRO_OPENING_STRING, MACRO_CLOSING_STRING];

/// Whether a macro is exempt from recursive expansion
pub fn is_unprocessed(name: &str) -> bool {
    UNPROCESSED_MACROS.contains(&name)
}

/// Boolean reading of a macro value
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Built-in core macro values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreMacros {
    /// Active profile (default: "dev")
    pub profile: String,

    /// Extension of user/local/instance config files (default: "json")
    pub config_extension: String,

    /// Deployment root (default: current directory)
    pub deploy_path: PathBuf,

    /// Extension marking template files (default: "template")
    pub dist_file_extension: String,

    /// Leave generated files writable (default: false)
    pub generated_files_writable: bool,

    /// Opening placeholder delimiter (default: "@")
    pub macro_opening_string: String,

    /// Closing placeholder delimiter (default: "@")
    pub macro_closing_string: String,
}

impl Default for CoreMacros {
    fn default() -> Self {
        Self {
            profile: "dev".to_string(),
            config_extension: "json".to_string(),
            deploy_path: PathBuf::from("."),
            dist_file_extension: "template".to_string(),
            generated_files_writable: false,
            macro_opening_string: "@".to_string(),
            macro_closing_string: "@".to_string(),
        }
    }
}

impl CoreMacros {
    /// Core defaults rooted at `deploy_path`
    pub fn for_deploy_path(deploy_path: PathBuf) -> Self {
        Self {
            deploy_path,
            ..Self::default()
        }
    }

    /// Convert to a macro mapping for merging
    pub fn to_map(&self) -> MacroMap {
        [
            (PROFILE, self.profile.clone()),
            (CONFIG_EXTENSION, self.config_extension.clone()),
            (DEPLOY_PATH, self.deploy_path.to_string_lossy().into_owned()),
            (DIST_FILE_EXTENSION, self.dist_file_extension.clone()),
            (
                GENERATED_FILES_WRITABLE,
                self.generated_files_writable.to_string(),
            ),
            (MACRO_OPENING_STRING, self.macro_opening_string.clone()),
            (MACRO_CLOSING_STRING, self.macro_closing_string.clone()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}
