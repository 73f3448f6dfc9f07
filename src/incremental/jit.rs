//! JIT redefinition driver (spec.md §4.9 "JIT mode"; SPEC_FULL.md §2
//! "Declaration database snapshotting for JIT redefinition... requires a
//! dedicated `Database::redefine_module` entry point").
//!
//! Nothing in this crate links against an actual LLVM ORC JIT engine — no
//! such dependency is in `Cargo.toml`, and wiring one in is outside the
//! compiler-core boundary this crate covers (ORC session management,
//! memory management callbacks and the dylib search order belong to the
//! embedding executable). What belongs here is the *symbol resolution
//! contract* an ORC custom definition generator needs: given an
//! unresolved symbol name, which module owns it, so the caller can load
//! or redefine that module before asking a real JIT engine to retry the
//! lookup.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::analyzer::database::Database;
use crate::hash::{self, SymbolNameToHash};
use crate::model::module::Module;

use super::graph::DependencyGraph;
use super::recompile::find_modules_to_recompile;

/// `symbol name → owning module name`, the table an ORC custom
/// definition generator consults on an unresolved-symbol callback.
pub struct SymbolToModuleMap {
    owners: RwLock<HashMap<String, String>>,
}

impl SymbolToModuleMap {
    pub fn new() -> Self {
        SymbolToModuleMap {
            owners: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_module(&self, module: &Module) {
        let mut owners = self.owners.write().expect("symbol table lock poisoned");
        for name in module.exported_names() {
            owners.insert(name.to_string(), module.name.clone());
        }
    }

    /// The module that would need to be loaded to resolve `symbol`, if
    /// any module currently registered exports it.
    pub fn resolve(&self, symbol: &str) -> Option<String> {
        self.owners.read().expect("symbol table lock poisoned").get(symbol).cloned()
    }
}

impl Default for SymbolToModuleMap {
    fn default() -> Self {
        SymbolToModuleMap::new()
    }
}

/// Ties the declaration database, the dependency graph and the symbol
/// table together behind the one entry point a JIT session calls each
/// time a module is redefined: `add_module_for_compilation`.
pub struct JitDriver {
    graph: DependencyGraph,
    symbols: SymbolToModuleMap,
    fingerprints: HashMap<String, SymbolNameToHash>,
}

impl JitDriver {
    pub fn new() -> Self {
        JitDriver {
            graph: DependencyGraph::new(),
            symbols: SymbolToModuleMap::new(),
            fingerprints: HashMap::new(),
        }
    }

    /// Redefines `module` in `db`, updates the dependency graph and
    /// symbol table, and returns the ordered list of modules that now
    /// need recompiling as a consequence — empty the first time a module
    /// is ever added, since there is nothing to compare against yet.
    pub fn add_module_for_compilation(&mut self, db: &Database, module: Module) -> Vec<String> {
        let previous_fingerprints = self.fingerprints.get(&module.name).cloned();
        let new_fingerprints = hash::hash_module_declarations(&module);

        self.symbols.register_module(&module);
        self.graph.redefine_module(&module);
        db.redefine_module(module.clone());

        let plan = match previous_fingerprints {
            Some(old) => find_modules_to_recompile(db, &self.graph, &module.name, &old, &new_fingerprints),
            None => Vec::new(),
        };

        self.fingerprints.insert(module.name, new_fingerprints);
        plan
    }

    /// The module owning `symbol`, consulted from an ORC custom
    /// definition generator's unresolved-symbol callback.
    pub fn resolve_unresolved_symbol(&self, symbol: &str) -> Option<String> {
        self.symbols.resolve(symbol)
    }
}

impl Default for JitDriver {
    fn default() -> Self {
        JitDriver::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::{DeclarationBank, FunctionDeclaration, FunctionParameter, Linkage};
    use crate::model::module::Dependency;
    use crate::model::types::TypeReference;

    fn module_exporting_function(module_name: &str, function_name: &str, return_bits: u32) -> Module {
        let mut module = Module::new(module_name);
        module.export_declarations = DeclarationBank {
            function_declarations: vec![FunctionDeclaration {
                name: function_name.into(),
                unique_name: None,
                input_parameters: Vec::<FunctionParameter>::new(),
                output_parameter_types: vec![TypeReference::create_integer_type(return_bits, true)],
                is_variadic: false,
                linkage: Linkage::External,
                type_parameters: vec![],
                preconditions: vec![],
                postconditions: vec![],
            }],
            ..Default::default()
        };
        module
    }

    #[test]
    fn first_definition_of_a_module_has_no_recompile_plan() {
        let db = Database::new();
        let mut jit = JitDriver::new();

        let plan = jit.add_module_for_compilation(&db, module_exporting_function("A", "make", 32));
        assert!(plan.is_empty());
        assert_eq!(jit.resolve_unresolved_symbol("make"), Some("A".to_string()));
    }

    #[test]
    fn redefining_a_module_triggers_its_dependents() {
        let db = Database::new();
        let mut jit = JitDriver::new();

        jit.add_module_for_compilation(&db, module_exporting_function("A", "make", 32));

        let mut dependent = module_exporting_function("B", "use_make", 32);
        dependent.dependencies.push(Dependency {
            module_name: "A".into(),
            alias: "A".into(),
            usages: Some(vec!["make".into()]),
        });
        jit.add_module_for_compilation(&db, dependent);

        let redefined = module_exporting_function("A", "make", 64);
        let plan = jit.add_module_for_compilation(&db, redefined);

        assert_eq!(plan, vec!["B".to_string()]);
    }
}
