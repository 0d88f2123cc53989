//! End-to-end run orchestration
//!
//! Order of a run:
//! 1. Resolve raw macros (bootstrap, load, merge, environment, overrides)
//! 2. Build the renderer from the raw delimiter macros
//! 3. Discover templates and collect the macros they need
//! 4. Seed and expand macros
//! 5. Generate files
//!
//! Every fatal error surfaces before step 5 writes anything.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::info;

use crate::generate::{FileGenerator, GenerateError, GenerationReport, TemplateMacros};
use crate::macros::{
    MacroResolver, OverrideError, ProcessedMacros, RawMacros, ResolveError,
};
use crate::template::{
    find_needed_macros, renderer_for, DelimitedRenderer, DelimiterError, TemplateError,
    TemplateFinder,
};

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Override(#[from] OverrideError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid macro delimiters: {0}")]
    Delimiter(#[from] DelimiterError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl PipelineError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Override(_) => 1,
            PipelineError::Resolve(ResolveError::Expand(_)) => 2,
            PipelineError::Resolve(_) => 1,
            PipelineError::Delimiter(_) => 1,
            PipelineError::Template(_) => 3,
            PipelineError::Generate(_) => 4,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Everything known once macros are fully resolved
#[derive(Debug)]
pub struct ResolvedRun {
    pub raw: RawMacros,

    /// Template paths relative to the deploy path
    pub templates: Vec<PathBuf>,

    /// Macros referenced anywhere in the templates
    pub needed: BTreeSet<String>,

    pub processed: ProcessedMacros,
    pub renderer: DelimitedRenderer,
}

/// A completed generation run
#[derive(Debug)]
pub struct ReprocessOutcome {
    pub run: ResolvedRun,
    pub report: GenerationReport,
}

/// Drives one resolution run over a deployment.
pub struct Pipeline<'e> {
    resolver: MacroResolver<'e>,
}

impl<'e> Pipeline<'e> {
    pub fn new(resolver: MacroResolver<'e>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &MacroResolver<'e> {
        &self.resolver
    }

    /// Resolve raw macros only
    pub fn resolve_raw(&self) -> PipelineResult<RawMacros> {
        Ok(self.resolver.resolve_raw()?)
    }

    /// Resolve and expand macros, discovering templates on the way
    pub fn resolve(&self) -> PipelineResult<ResolvedRun> {
        let raw = self.resolver.resolve_raw()?;
        let renderer = renderer_for(raw.macros.values())?;

        let templates = TemplateFinder::from_macros(raw.macros.values())?.find()?;
        let needed = find_needed_macros(&raw.deploy_path, &templates, &renderer)?;
        info!(
            templates = templates.len(),
            needed = needed.len(),
            "templates discovered"
        );

        let processed = self.resolver.process(&raw, &renderer, &needed)?;

        Ok(ResolvedRun {
            raw,
            templates,
            needed,
            processed,
            renderer,
        })
    }

    /// Full run: resolve, expand and regenerate every template
    pub fn reprocess(&self) -> PipelineResult<ReprocessOutcome> {
        let run = self.resolve()?;
        let report = FileGenerator::from_macros(&run.processed.macros, &run.renderer)
            .generate(&run.templates, &run.processed.macros)?;

        info!(
            changed = report.changed_count(),
            skipped = report.skipped_count(),
            "generation finished"
        );
        Ok(ReprocessOutcome { run, report })
    }

    /// Which macros each template uses, without writing anything
    pub fn template_macros(
        &self,
    ) -> PipelineResult<(ResolvedRun, BTreeMap<PathBuf, TemplateMacros>)> {
        let run = self.resolve()?;
        let usage = FileGenerator::from_macros(&run.processed.macros, &run.renderer)
            .inspect(&run.templates, &run.processed.macros)?;
        Ok((run, usage))
    }
}
