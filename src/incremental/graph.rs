//! The reverse-dependency map (spec.md §4.9 step 3; SPEC_FULL.md §4.8
//! "maintained incrementally by `incremental::graph::DependencyGraph`,
//! rebuilt from each module's `dependencies` list at
//! `add_module`/`redefine_module` time rather than recomputed from
//! scratch per recompile request").

use std::collections::{HashMap, HashSet};

use crate::model::module::Module;

#[derive(Default)]
pub struct DependencyGraph {
    /// `imported module name → modules that import it`.
    reverse: HashMap<String, HashSet<String>>,
    /// `module name → modules it imports`, kept only so `add_module` can
    /// remove stale edges on a redefinition without needing the old
    /// `Module` value around.
    forward: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    /// Idempotent: a module already present has its old edges dropped
    /// before the new ones are recorded, so repeated JIT redefinitions of
    /// the same module never leak stale reverse-dependency entries.
    pub fn add_module(&mut self, module: &Module) {
        self.remove_edges_for(&module.name);

        let dependencies: HashSet<String> = module.dependencies.iter().map(|d| d.module_name.clone()).collect();
        for dependency in &dependencies {
            self.reverse.entry(dependency.clone()).or_default().insert(module.name.clone());
        }
        self.forward.insert(module.name.clone(), dependencies);
    }

    /// Same as `add_module`; a distinct name for JIT redefinition call
    /// sites (spec.md §4.9 "JIT mode... causing symbol redefinition").
    pub fn redefine_module(&mut self, module: &Module) {
        self.add_module(module);
    }

    fn remove_edges_for(&mut self, module_name: &str) {
        if let Some(old_dependencies) = self.forward.remove(module_name) {
            for dependency in old_dependencies {
                if let Some(dependents) = self.reverse.get_mut(&dependency) {
                    dependents.remove(module_name);
                }
            }
        }
    }

    /// Every module that directly imports `module_name`, in no particular
    /// order (the caller orders its own enqueue results).
    pub fn dependents_of(&self, module_name: &str) -> Vec<String> {
        self.reverse.get(module_name).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::module::Dependency;

    fn module_depending_on(name: &str, deps: &[&str]) -> Module {
        let mut module = Module::new(name);
        module.dependencies = deps
            .iter()
            .map(|d| Dependency {
                module_name: d.to_string(),
                alias: d.to_string(),
                usages: None,
            })
            .collect();
        module
    }

    #[test]
    fn tracks_direct_dependents() {
        let mut graph = DependencyGraph::new();
        graph.add_module(&module_depending_on("B", &["C"]));
        graph.add_module(&module_depending_on("A", &["B"]));

        assert_eq!(graph.dependents_of("C"), vec!["B".to_string()]);
        assert_eq!(graph.dependents_of("B"), vec!["A".to_string()]);
        assert!(graph.dependents_of("A").is_empty());
    }

    #[test]
    fn redefining_a_module_drops_stale_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_module(&module_depending_on("A", &["B"]));
        assert_eq!(graph.dependents_of("B"), vec!["A".to_string()]);

        graph.redefine_module(&module_depending_on("A", &["C"]));
        assert!(graph.dependents_of("B").is_empty());
        assert_eq!(graph.dependents_of("C"), vec!["A".to_string()]);
    }
}
