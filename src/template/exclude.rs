//! Directory exclusion rules for template discovery
//!
//! Hidden entries are pruned by the walker itself; these rules cover VCS
//! metadata directories and the configured `template_exclude_paths`.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Directories never searched for templates
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git",
    "**/.git/**",
    "**/.svn",
    "**/.svn/**",
    "**/.hg",
    "**/.hg/**",
    "**/.bzr",
    "**/.bzr/**",
    "**/CVS",
    "**/CVS/**",
    "**/_darcs",
    "**/_darcs/**",
];

/// Exclusion rules for filtering directories
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl ExcludeRules {
    /// Create exclusion rules with the VCS defaults
    pub fn new() -> Result<Self, globset::Error> {
        Self::build(Vec::new())
    }

    fn build(patterns: Vec<String>) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_EXCLUDES {
            builder.add(Glob::new(pattern)?);
        }
        for pattern in &patterns {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            glob_set: builder.build()?,
            patterns,
        })
    }

    /// Add excluded directories.
    ///
    /// A bare name (`cache`) matches a directory of that name at any depth; a
    /// name containing `/` (`var/cache`) is anchored at the search root. Glob
    /// syntax is allowed in either form.
    pub fn with_dirs<S: AsRef<str>>(self, dirs: &[S]) -> Result<Self, globset::Error> {
        let mut patterns = self.patterns;
        for dir in dirs {
            let dir = dir.as_ref().trim().trim_end_matches('/');
            if dir.is_empty() {
                continue;
            }
            if dir.contains('/') {
                patterns.push(dir.to_string());
                patterns.push(format!("{}/**", dir));
            } else {
                patterns.push(format!("**/{}", dir));
                patterns.push(format!("**/{}/**", dir));
            }
        }
        Self::build(patterns)
    }

    /// Check if a path relative to the search root is excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.glob_set.is_match(path)
    }
}

/// Split a comma-separated directory list
pub fn split_dir_list(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .collect()
}
