//! Ellire - layered macro resolution and template reprocessing
//!
//! Resolves named configuration values ("macros") from layered sources
//! (built-in defaults, system, user, deployment and instance config files,
//! environment variables and command-line overrides), expands macros that
//! reference other macros, and renders template files into deployed files.

pub mod config;
pub mod generate;
pub mod macros;
pub mod pipeline;
pub mod report;
pub mod template;

pub use config::{ConfigFormat, ConfigLocations, LoadError, LoadedConfig};
pub use generate::{FileGenerator, FileOutcome, GenerateError, GenerationReport};
pub use macros::{
    CircularReference, ConfigLayer, Environment, MacroMap, MacroOverrides, MacroResolver,
    ProcessEnvironment, ResolveError,
};
pub use pipeline::{Pipeline, PipelineError, PipelineResult};
pub use report::MacroReport;
pub use template::{DelimitedRenderer, MacroRenderer, TemplateFinder};
