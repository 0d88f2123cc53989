//! Fixed-point macro expansion with cycle detection
//!
//! Every pass renders each macro's current value against the whole current
//! mapping and stores the result. The loop ends on the first pass that leaves
//! the mapping unchanged. A resolution graph records, per root macro, the
//! chain of macros visited from it; a chain that leads back to its own root
//! aborts the expansion.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ellire_template::MacroRenderer;
use tracing::{debug, trace};

use super::core::is_unprocessed;
use super::MacroMap;

fn format_cycle(path: &[String], child: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(child))
        .collect::<Vec<_>>()
        .join(" => ")
}

/// A macro chain that leads back to where it started
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circular macro reference in {parent} ({})", format_cycle(.path, .child))]
pub struct CircularReference {
    /// Macro whose value closed the cycle
    pub parent: String,

    /// Macro it referenced (the root of the cycle)
    pub child: String,

    /// Chain from the root up to and including `parent`
    pub path: Vec<String>,
}

impl CircularReference {
    /// Full cycle, root first and root last
    pub fn cycle(&self) -> Vec<String> {
        let mut cycle = self.path.clone();
        cycle.push(self.child.clone());
        cycle
    }
}

/// Expansion errors
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error(transparent)]
    Circular(#[from] CircularReference),
}

fn resolve_names(names: &[String], path: &[usize]) -> Vec<String> {
    path.iter().map(|&id| names[id].clone()).collect()
}

/// Resolution chains, one per root macro, over interned macro names.
#[derive(Debug, Default)]
pub struct ResolutionGraph {
    names: Vec<String>,
    ids: HashMap<String, usize>,
    paths: BTreeMap<usize, Vec<usize>>,
}

impl ResolutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    fn names_of(&self, path: &[usize]) -> Vec<String> {
        resolve_names(&self.names, path)
    }

    /// Record that `parent`'s value references `children`.
    ///
    /// A parent seen for the first time becomes a root with chain
    /// `[parent, child]`. Every chain currently ending at `parent` is then
    /// extended by the child, unless the child is that chain's root.
    pub fn record<'a, I>(&mut self, parent: &str, children: I) -> Result<(), CircularReference>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let parent_id = self.intern(parent);

        for child in children {
            if child == parent {
                return Err(CircularReference {
                    parent: parent.to_string(),
                    child: child.clone(),
                    path: vec![parent.to_string()],
                });
            }

            let child_id = self.intern(child);
            self.paths
                .entry(parent_id)
                .or_insert_with(|| vec![parent_id, child_id]);

            for path in self.paths.values_mut() {
                if path.last() != Some(&parent_id) {
                    continue;
                }
                if path.first() == Some(&child_id) {
                    return Err(CircularReference {
                        parent: parent.to_string(),
                        child: child.clone(),
                        path: resolve_names(&self.names, path),
                    });
                }
                path.push(child_id);
            }
        }

        Ok(())
    }

    /// Chain currently rooted at `root`
    pub fn path_from(&self, root: &str) -> Option<Vec<String>> {
        let id = self.ids.get(root)?;
        self.paths.get(id).map(|path| self.names_of(path))
    }

    pub fn root_count(&self) -> usize {
        self.paths.len()
    }
}

/// Result of a successful expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Fully expanded macros
    pub macros: MacroMap,

    /// Number of passes run, including the final unchanged one
    pub passes: usize,
}

/// Expands macro values against each other until nothing changes.
pub struct MacroExpander<'r> {
    renderer: &'r dyn MacroRenderer,
}

impl<'r> MacroExpander<'r> {
    pub fn new(renderer: &'r dyn MacroRenderer) -> Self {
        Self { renderer }
    }

    pub fn expand(&self, raw: &MacroMap) -> Result<Expansion, CircularReference> {
        let mut macros = raw.clone();
        let mut graph = ResolutionGraph::new();
        let names: Vec<String> = macros
            .keys()
            .filter(|name| !is_unprocessed(name))
            .cloned()
            .collect();
        let mut passes = 0;

        loop {
            passes += 1;
            let previous = macros.clone();

            for name in &names {
                let rendered = self.renderer.render(&macros[name], &macros);
                graph.record(name, &rendered.known)?;
                if rendered.output != macros[name] {
                    trace!(macro_name = %name, value = %rendered.output, "expanded macro");
                }
                macros.insert(name.clone(), rendered.output);
            }

            if macros == previous {
                break;
            }
        }

        debug!(passes, macros = macros.len(), "macro expansion converged");
        Ok(Expansion { macros, passes })
    }
}

/// Names referenced by any of the given macro values
pub fn referenced_names(renderer: &dyn MacroRenderer, macros: &MacroMap) -> BTreeSet<String> {
    macros
        .values()
        .flat_map(|value| renderer.known_references(value))
        .collect()
}
