//! Template discovery under the deploy path

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use super::exclude::{split_dir_list, ExcludeRules};
use super::TemplateError;
use crate::macros::core::{DEPLOY_PATH, DIST_FILE_EXTENSION, TEMPLATE_EXCLUDE_PATHS};
use crate::macros::MacroMap;

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Finds template files (`*.<dist_file_extension>`) below a root directory.
#[derive(Debug, Clone)]
pub struct TemplateFinder {
    root: PathBuf,
    extension: String,
    exclude: ExcludeRules,
}

impl TemplateFinder {
    pub fn new(root: PathBuf, extension: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            root,
            extension: extension.to_string(),
            exclude: ExcludeRules::new()?,
        })
    }

    /// Finder configured from resolved macros: `deploy_path`,
    /// `dist_file_extension` and `template_exclude_paths`.
    pub fn from_macros(macros: &MacroMap) -> Result<Self, TemplateError> {
        let root = macros
            .get(DEPLOY_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let extension = macros
            .get(DIST_FILE_EXTENSION)
            .map(String::as_str)
            .unwrap_or("template");

        let finder = Self::new(root, extension)?;
        match macros.get(TEMPLATE_EXCLUDE_PATHS) {
            Some(list) => finder.with_excludes(&split_dir_list(list)),
            None => Ok(finder),
        }
    }

    /// Skip the given directories
    pub fn with_excludes<S: AsRef<str>>(mut self, dirs: &[S]) -> Result<Self, TemplateError> {
        self.exclude = self.exclude.with_dirs(dirs)?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn is_template(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        let suffix = format!(".{}", self.extension);
        name.len() > suffix.len() && name.ends_with(&suffix)
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        if is_hidden(entry.file_name()) {
            return true;
        }
        match entry.path().strip_prefix(&self.root) {
            Ok(rel) => self.exclude.is_excluded(rel),
            Err(_) => false,
        }
    }

    /// Template paths relative to the root, sorted
    pub fn find(&self) -> Result<Vec<PathBuf>, TemplateError> {
        let mut templates = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(entry));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !self.is_template(entry.file_name()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                trace!(template = %rel.display(), "found template");
                templates.push(rel.to_path_buf());
            }
        }

        templates.sort();
        debug!(root = %self.root.display(), count = templates.len(), "template discovery finished");
        Ok(templates)
    }
}
