//! File generation from templates
//!
//! Generation runs in two phases. Every template is rendered and its output
//! path computed first; files are written only once the whole plan exists, so
//! a bad template name never leaves a half-updated deployment behind.

mod permissions;

pub use permissions::{copy_template_permissions, ensure_writable};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ellire_template::{MacroRenderer, Rendered};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::macros::core::{is_truthy, DEPLOY_PATH, DIST_FILE_EXTENSION, GENERATED_FILES_WRITABLE};
use crate::macros::MacroMap;
use crate::template::{load_template, TemplateError};

/// Generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("template {} does not end in .{extension}", path.display())]
    InvalidTemplateFilename { path: PathBuf, extension: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("could not write content to {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not set permissions on {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to one generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutcome {
    Changed,
    Skipped,
}

impl FileOutcome {
    pub fn label(self) -> &'static str {
        match self {
            FileOutcome::Changed => "CHANGED",
            FileOutcome::Skipped => "SKIPPED",
        }
    }
}

/// Macros one template referenced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMacros {
    pub known: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

/// Result of a generation run, keyed by template path relative to the root
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub outcomes: BTreeMap<PathBuf, FileOutcome>,
    pub macros: BTreeMap<PathBuf, TemplateMacros>,
}

impl GenerationReport {
    pub fn changed_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| **o == FileOutcome::Changed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| **o == FileOutcome::Skipped)
            .count()
    }

    /// Missing macros across all templates
    pub fn missing_macros(&self) -> BTreeSet<String> {
        self.macros
            .values()
            .flat_map(|m| m.missing.iter().cloned())
            .collect()
    }
}

struct PlannedFile {
    template: PathBuf,
    source: PathBuf,
    target: PathBuf,
    content: String,
}

/// Renders templates under a root directory into their output files.
pub struct FileGenerator<'r> {
    root: PathBuf,
    dist_extension: String,
    writable: bool,
    renderer: &'r dyn MacroRenderer,
}

impl<'r> FileGenerator<'r> {
    pub fn new(root: PathBuf, dist_extension: &str, renderer: &'r dyn MacroRenderer) -> Self {
        Self {
            root,
            dist_extension: dist_extension.to_string(),
            writable: false,
            renderer,
        }
    }

    /// Generator configured from `deploy_path`, `dist_file_extension` and
    /// `generated_files_writable`
    pub fn from_macros(macros: &MacroMap, renderer: &'r dyn MacroRenderer) -> Self {
        let root = macros
            .get(DEPLOY_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let extension = macros
            .get(DIST_FILE_EXTENSION)
            .map(String::as_str)
            .unwrap_or("template");
        let writable = macros
            .get(GENERATED_FILES_WRITABLE)
            .map(|v| is_truthy(v))
            .unwrap_or(false);

        Self::new(root, extension, renderer).with_writable(writable)
    }

    /// Leave generated files writable
    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Output path for a template: the template path without its
    /// `.<dist_extension>` suffix
    pub fn output_path(&self, template: &Path) -> Result<PathBuf, GenerateError> {
        let invalid = || GenerateError::InvalidTemplateFilename {
            path: template.to_path_buf(),
            extension: self.dist_extension.clone(),
        };

        let name = template
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(invalid)?;
        let suffix = format!(".{}", self.dist_extension);
        match name.strip_suffix(&suffix) {
            Some(stem) if !stem.is_empty() => Ok(template.with_file_name(stem)),
            _ => Err(invalid()),
        }
    }

    /// Render every template without writing anything
    pub fn inspect(
        &self,
        templates: &[PathBuf],
        macros: &MacroMap,
    ) -> Result<BTreeMap<PathBuf, TemplateMacros>, GenerateError> {
        let mut usage = BTreeMap::new();
        for template in templates {
            let text = load_template(&self.root.join(template))?;
            let rendered = self.renderer.render(&text, macros);
            usage.insert(template.clone(), self.template_macros(&rendered, macros));
        }
        Ok(usage)
    }

    /// Unbound names still referenced by the expanded values of `names`
    fn unbound_references(&self, names: &BTreeSet<String>, macros: &MacroMap) -> BTreeSet<String> {
        names
            .iter()
            .filter_map(|name| macros.get(name))
            .flat_map(|value| self.renderer.known_references(value))
            .filter(|name| !macros.contains_key(name))
            .collect()
    }

    /// Macros a rendered template used. A bound macro whose value still
    /// references an unbound name makes that name missing for the template.
    fn template_macros(&self, rendered: &Rendered, macros: &MacroMap) -> TemplateMacros {
        let indirect = self.unbound_references(&rendered.known, macros);

        let mut usage = TemplateMacros {
            known: rendered.known.clone(),
            missing: rendered.missing.clone(),
        };
        usage.known.extend(indirect.iter().cloned());
        usage.missing.extend(indirect);
        usage
    }

    fn plan(
        &self,
        templates: &[PathBuf],
        macros: &MacroMap,
        report: &mut GenerationReport,
    ) -> Result<Vec<PlannedFile>, GenerateError> {
        let mut planned = Vec::with_capacity(templates.len());

        for template in templates {
            let target = self.root.join(self.output_path(template)?);
            let source = self.root.join(template);
            let text = load_template(&source)?;
            let rendered = self.renderer.render(&text, macros);
            let usage = self.template_macros(&rendered, macros);

            if !usage.missing.is_empty() {
                warn!(
                    template = %template.display(),
                    missing = ?usage.missing,
                    "template references macros with no value"
                );
            }

            report.macros.insert(template.clone(), usage);
            planned.push(PlannedFile {
                template: template.clone(),
                source,
                target,
                content: rendered.output,
            });
        }

        Ok(planned)
    }

    fn write(&self, file: &PlannedFile) -> Result<FileOutcome, GenerateError> {
        if let Ok(existing) = fs::read(&file.target) {
            if existing == file.content.as_bytes() {
                debug!(output = %file.target.display(), "generated file unchanged");
                return Ok(FileOutcome::Skipped);
            }
        }

        let write_failed = |source| GenerateError::WriteFailed {
            path: file.target.clone(),
            source,
        };
        ensure_writable(&file.target).map_err(write_failed)?;
        fs::write(&file.target, &file.content).map_err(write_failed)?;

        copy_template_permissions(&file.source, &file.target, self.writable).map_err(|source| {
            GenerateError::Permissions {
                path: file.target.clone(),
                source,
            }
        })?;

        info!(output = %file.target.display(), "generated file written");
        Ok(FileOutcome::Changed)
    }

    /// Render all templates, then write every output whose content changed.
    pub fn generate(
        &self,
        templates: &[PathBuf],
        macros: &MacroMap,
    ) -> Result<GenerationReport, GenerateError> {
        let mut report = GenerationReport::default();
        let planned = self.plan(templates, macros, &mut report)?;

        for file in &planned {
            let outcome = self.write(file)?;
            report.outcomes.insert(file.template.clone(), outcome);
        }

        Ok(report)
    }
}
