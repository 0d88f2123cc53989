//! Macro resolution engine
//!
//! Precedence, lowest first:
//! core defaults < system globals < system profile < user globals
//! < user profile < local globals < local profile < instance
//! < environment < overrides
//!
//! After merging, macro values are expanded against each other until they
//! reach a fixed point.

use std::collections::BTreeMap;

pub mod core;
pub mod env;
pub mod expand;
pub mod layer;
pub mod merge;
pub mod resolver;

/// Macro name → value
pub type MacroMap = BTreeMap<String, String>;

pub use self::core::{is_truthy, CoreMacros};
pub use env::{
    env_var_name, EnvUsage, Environment, MacroOverrides, OverrideApplier, OverrideError,
    ProcessEnvironment, ENV_PREFIX,
};
pub use expand::{CircularReference, ExpandError, Expansion, MacroExpander, ResolutionGraph};
pub use layer::ConfigLayer;
pub use merge::{merge, ForcedMacros, LayeredMacros, MergeError, MergeSources};
pub use resolver::{
    ConfigOrigin, ConfigSource, MacroResolver, ProcessedMacros, RawMacros, ResolveError,
};
