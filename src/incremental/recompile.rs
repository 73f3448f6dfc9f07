//! Recompile propagation (spec.md §4.9 steps 1-4):
//!
//! 1. Hash the changed module's declarations before and after the edit.
//! 2. The symmetric difference of the two maps is the "changed" symbol
//!    set.
//! 3. Walk the reverse-dependency map; a direct dependent is only
//!    enqueued if it actually references one of the changed symbols —
//!    `Dependency::usages` (the explicit per-import symbol list, spec.md
//!    §3) is the primary source for that test, falling back to the
//!    analyzer-derived `AnalysisResult::import_usage` when a caller has
//!    it and `usages` is absent. A `None` `usages` list means a wildcard
//!    import and is always treated as "uses everything".
//! 4. Each enqueued module is itself treated, conservatively, as having
//!    had every one of its exported symbols change for the purpose of
//!    the next hop — the planner never actually recompiles anything, so
//!    it cannot know which of the dependent's symbols would really
//!    change, and treating the whole export surface as changed is the
//!    only sound over-approximation.

use std::collections::{HashSet, VecDeque};

use crate::analyzer::database::Database;
use crate::hash::SymbolNameToHash;

use super::graph::DependencyGraph;

/// The ordered list of modules that need to be recompiled as a
/// consequence of `module_name`'s declarations changing from
/// `old_fingerprints` to `new_fingerprints`, in breadth-first enqueue
/// order. `module_name` itself is never included — the caller already
/// knows it changed.
pub fn find_modules_to_recompile(
    db: &Database,
    graph: &DependencyGraph,
    module_name: &str,
    old_fingerprints: &SymbolNameToHash,
    new_fingerprints: &SymbolNameToHash,
) -> Vec<String> {
    let changed = changed_symbols(old_fingerprints, new_fingerprints);

    let mut order = Vec::new();
    let mut enqueued: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, String, HashSet<String>)> = graph
        .dependents_of(module_name)
        .into_iter()
        .filter(|dependent| uses_any_symbol(db, dependent, module_name, &changed))
        .map(|dependent| (dependent, module_name.to_string(), changed.clone()))
        .collect();

    while let Some((dependent, _imported, _changed_in_imported)) = queue.pop_front() {
        if !enqueued.insert(dependent.clone()) {
            continue;
        }
        order.push(dependent.clone());

        let dependent_exports: HashSet<String> = db
            .get_module(&dependent)
            .map(|module| module.exported_names().map(str::to_string).collect())
            .unwrap_or_default();

        for grandparent in graph.dependents_of(&dependent) {
            if enqueued.contains(&grandparent) {
                continue;
            }
            if uses_any_symbol(db, &grandparent, &dependent, &dependent_exports) {
                queue.push_back((grandparent, dependent.clone(), dependent_exports.clone()));
            }
        }
    }

    order
}

fn changed_symbols(old: &SymbolNameToHash, new: &SymbolNameToHash) -> HashSet<String> {
    let mut changed = HashSet::new();
    for (name, hash) in new {
        if old.get(name) != Some(hash) {
            changed.insert(name.clone());
        }
    }
    for name in old.keys() {
        if !new.contains_key(name) {
            changed.insert(name.clone());
        }
    }
    changed
}

/// Whether `dependent_name` (a module known to import `imported_name`)
/// actually references one of `changed` through that import. A
/// dependent no longer present in the database is treated
/// conservatively as using everything — it cannot be ruled out.
fn uses_any_symbol(db: &Database, dependent_name: &str, imported_name: &str, changed: &HashSet<String>) -> bool {
    let Some(dependent) = db.get_module(dependent_name) else {
        return true;
    };
    let Some(dependency) = dependent.dependencies.iter().find(|d| d.module_name == imported_name) else {
        return false;
    };
    match &dependency.usages {
        None => true,
        Some(names) => names.iter().any(|name| changed.contains(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Fingerprint;
    use crate::model::module::{Dependency, Module};

    fn module_using(name: &str, imports: &str, usages: Option<Vec<&str>>) -> Module {
        let mut module = Module::new(name);
        module.dependencies = vec![Dependency {
            module_name: imports.to_string(),
            alias: imports.to_string(),
            usages: usages.map(|names| names.into_iter().map(str::to_string).collect()),
        }];
        module
    }

    fn fp_map(pairs: &[(&str, u64)]) -> SymbolNameToHash {
        pairs.iter().map(|(name, value)| (name.to_string(), Fingerprint(*value))).collect()
    }

    #[test]
    fn unrelated_export_change_recompiles_nothing() {
        let db = Database::new();
        db.add_declarations(module_using("B", "C", Some(vec!["Foo"])));

        let mut graph = DependencyGraph::new();
        graph.add_module(&db.get_module("B").unwrap());

        let old = fp_map(&[("Foo", 1), ("Bar", 2)]);
        let new = fp_map(&[("Foo", 1), ("Bar", 99)]);

        assert!(find_modules_to_recompile(&db, &graph, "C", &old, &new).is_empty());
    }

    #[test]
    fn direct_dependent_using_changed_symbol_is_recompiled() {
        let db = Database::new();
        db.add_declarations(module_using("B", "C", Some(vec!["Foo"])));

        let mut graph = DependencyGraph::new();
        graph.add_module(&db.get_module("B").unwrap());

        let old = fp_map(&[("Foo", 1)]);
        let new = fp_map(&[("Foo", 2)]);

        assert_eq!(find_modules_to_recompile(&db, &graph, "C", &old, &new), vec!["B".to_string()]);
    }

    #[test]
    fn wildcard_import_always_propagates() {
        let db = Database::new();
        db.add_declarations(module_using("B", "C", None));

        let mut graph = DependencyGraph::new();
        graph.add_module(&db.get_module("B").unwrap());

        let old = fp_map(&[("Foo", 1)]);
        let new = fp_map(&[("Foo", 2)]);

        assert_eq!(find_modules_to_recompile(&db, &graph, "C", &old, &new), vec!["B".to_string()]);
    }

    #[test]
    fn change_propagates_transitively_through_a_chain() {
        let db = Database::new();
        let mut b = module_using("B", "C", Some(vec!["Bar"]));
        b.export_declarations.alias_type_declarations.push(crate::model::declaration::AliasTypeDeclaration {
            name: "Baz".into(),
            unique_name: None,
            target_type: vec![crate::model::types::TypeReference::create_integer_type(32, true)],
        });
        db.add_declarations(b);
        db.add_declarations(module_using("A", "B", Some(vec!["Baz"])));

        let mut graph = DependencyGraph::new();
        graph.add_module(&db.get_module("B").unwrap());
        graph.add_module(&db.get_module("A").unwrap());

        let old = fp_map(&[("Bar", 1)]);
        let new = fp_map(&[("Bar", 2)]);

        let plan = find_modules_to_recompile(&db, &graph, "C", &old, &new);
        assert_eq!(plan, vec!["B".to_string(), "A".to_string()]);
    }
}
