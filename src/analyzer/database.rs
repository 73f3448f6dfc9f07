//! The declaration database (spec.md §3 "Declaration database", §4.2).
//!
//! Indexes every declaration of every loaded module, keyed by
//! `(module_name, declaration_name)`. The spec describes lookups as
//! returning "a stable pointer-like handle that borrows the owning
//! module's storage" — valid for the lifetime of the enclosing
//! compilation. Rust's borrow checker cannot express a handle that
//! outlives mutable re-insertion during JIT redefinition (spec.md §9
//! "Declaration database freshness"), so `Database` owns `Arc<Module>`
//! per module behind a `RwLock` and lookups return owned clones of the
//! (cheaply-cloneable) `Declaration` value instead of references. This is
//! the Open Question resolution recorded in `DESIGN.md`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::model::declaration::{
    AliasTypeDeclaration, Declaration, EnumDeclaration, FunctionDeclaration, StructDeclaration,
    UnionDeclaration,
};
use crate::model::expr::Statement;
use crate::model::module::Module;
use crate::model::types::{CustomTypeReference, TypeInstance, TypeReference};

/// Key for `Database::call_instances`: spec.md §3, §9 "Generic
/// instantiation keys" — `(module, constructor name, argument statements)`.
/// Statement equality is structural, matching the spec's canonicalization
/// requirement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallInstanceKey {
    pub module: String,
    pub constructor_name: String,
    pub arguments: Vec<ArgumentStatementKey>,
}

/// `Statement` does not implement `Hash` (it nests `TypeReference`, which
/// does, but also float-bearing constant data in principle) so the map key
/// is a derived structural fingerprint of each argument statement's
/// `Debug` rendering. Two structurally identical argument lists always
/// collapse to the same key, satisfying the canonicalization note in
/// spec.md §9.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArgumentStatementKey(String);

impl From<&Statement> for ArgumentStatementKey {
    fn from(statement: &Statement) -> Self {
        ArgumentStatementKey(format!("{statement:?}"))
    }
}

#[derive(Default)]
pub struct Database {
    modules: RwLock<HashMap<String, Arc<Module>>>,
    /// `(module, function-constructor name, arguments) → synthesized
    /// concrete function`. Populated by `crate::analyzer::instantiate`.
    pub call_instances: RwLock<HashMap<CallInstanceKey, FunctionDeclaration>>,
    /// `Type_instance → concrete declaration it instantiates to`.
    pub instances: RwLock<HashMap<TypeInstanceKey, Declaration>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeInstanceKey(String);

impl From<&TypeInstance> for TypeInstanceKey {
    fn from(instance: &TypeInstance) -> Self {
        TypeInstanceKey(format!("{instance:?}"))
    }
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    /// `add_declarations(db, module)` (spec.md §4.2): idempotent; a later
    /// call for the same module name overwrites the previous entry
    /// wholesale, matching the "prefer overwrite semantics with atomic
    /// swap" guidance in spec.md §9.
    pub fn add_declarations(&self, module: Module) {
        let name = module.name.clone();
        self.modules
            .write()
            .expect("database lock poisoned")
            .insert(name, Arc::new(module));
    }

    /// Replaces a single module's declarations while a JIT session may
    /// still be executing code compiled against the previous ones
    /// (spec.md §4.9, §9 "Declaration database freshness"). Distinct in
    /// name from `add_declarations` only to mark the call sites that are
    /// redefinitions rather than first loads; the overwrite semantics are
    /// identical — `RwLock<HashMap<..>>` already gives callers an atomic
    /// swap of the `Arc<Module>`, so in-flight readers keep the old module
    /// alive until they finish.
    pub fn redefine_module(&self, module: Module) {
        self.add_declarations(module);
    }

    pub fn modules(&self) -> HashMap<String, Arc<Module>> {
        self.modules.read().expect("database lock poisoned").clone()
    }

    pub fn get_module(&self, module_name: &str) -> Option<Arc<Module>> {
        self.modules
            .read()
            .expect("database lock poisoned")
            .get(module_name)
            .cloned()
    }

    pub fn find_declaration(&self, module_name: &str, name: &str) -> Option<Declaration> {
        let module = self.get_module(module_name)?;
        module
            .export_declarations
            .iter()
            .chain(module.internal_declarations.iter())
            .find(|declaration| declaration.name() == name)
    }

    pub fn find_function_declaration(
        &self,
        module_name: &str,
        name: &str,
    ) -> Option<FunctionDeclaration> {
        match self.find_declaration(module_name, name)? {
            Declaration::Function(d) => Some(d),
            _ => None,
        }
    }

    pub fn find_struct_declaration(&self, module_name: &str, name: &str) -> Option<StructDeclaration> {
        match self.find_declaration(module_name, name)? {
            Declaration::Struct(d) => Some(d),
            _ => None,
        }
    }

    pub fn find_enum_declaration(&self, module_name: &str, name: &str) -> Option<EnumDeclaration> {
        match self.find_declaration(module_name, name)? {
            Declaration::Enum(d) => Some(d),
            _ => None,
        }
    }

    pub fn find_union_declaration(&self, module_name: &str, name: &str) -> Option<UnionDeclaration> {
        match self.find_declaration(module_name, name)? {
            Declaration::Union(d) => Some(d),
            _ => None,
        }
    }

    pub fn find_alias_type_declaration(
        &self,
        module_name: &str,
        name: &str,
    ) -> Option<AliasTypeDeclaration> {
        match self.find_declaration(module_name, name)? {
            Declaration::AliasType(d) => Some(d),
            _ => None,
        }
    }

    pub fn find_custom_declaration(&self, reference: &CustomTypeReference) -> Option<Declaration> {
        self.find_declaration(&reference.module_reference.name, &reference.name)
    }

    pub fn insert_call_instance(&self, key: CallInstanceKey, function: FunctionDeclaration) {
        self.call_instances
            .write()
            .expect("database lock poisoned")
            .insert(key, function);
    }

    pub fn get_call_instance(&self, key: &CallInstanceKey) -> Option<FunctionDeclaration> {
        self.call_instances
            .read()
            .expect("database lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn insert_type_instance(&self, instance: &TypeInstance, declaration: Declaration) {
        self.instances
            .write()
            .expect("database lock poisoned")
            .insert(TypeInstanceKey::from(instance), declaration);
    }

    pub fn get_type_instance(&self, instance: &TypeInstance) -> Option<Declaration> {
        self.instances
            .read()
            .expect("database lock poisoned")
            .get(&TypeInstanceKey::from(instance))
            .cloned()
    }

    /// `remove_unused_declarations(entry_module, deps)` (spec.md §4.2):
    /// walks the transitive usage set starting at `entry_module` and drops
    /// everything unreachable from each dependency module. Used to shrink
    /// JIT definition generators (spec.md §4.9).
    pub fn remove_unused_declarations(&self, entry_module: &str, deps: &[String]) {
        let reachable = self.transitive_usage_set(entry_module);

        let mut modules = self.modules.write().expect("database lock poisoned");
        for dep in deps {
            let Some(module) = modules.get(dep) else {
                continue;
            };
            let mut trimmed = (**module).clone();
            trimmed
                .export_declarations
                .retain_names(|name| reachable.contains(name));
            trimmed
                .internal_declarations
                .retain_names(|name| reachable.contains(name));
            modules.insert(dep.clone(), Arc::new(trimmed));
        }
    }

    fn transitive_usage_set(&self, entry_module: &str) -> std::collections::HashSet<String> {
        let mut seen = std::collections::HashSet::new();
        let Some(module) = self.get_module(entry_module) else {
            return seen;
        };

        let mut queue: Vec<String> = module
            .export_declarations
            .names()
            .chain(module.internal_declarations.names())
            .map(str::to_string)
            .collect();

        while let Some(name) = queue.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            for dependency in &module.dependencies {
                if let Some(dep_module) = self.get_module(&dependency.module_name) {
                    if dep_module.export_declarations.names().any(|n| n == name) {
                        queue.extend(
                            dep_module
                                .export_declarations
                                .names()
                                .map(str::to_string)
                                .collect::<Vec<_>>(),
                        );
                    }
                }
            }
        }

        seen
    }

    /// `get_underlying_type(db, t)` (spec.md §4.1): unwraps alias
    /// declarations until a non-alias is reached.
    pub fn get_underlying_type(&self, type_reference: &TypeReference) -> TypeReference {
        let mut current = type_reference.clone();
        loop {
            let TypeReference::Custom(reference) = &current else {
                return current;
            };
            let Some(Declaration::AliasType(alias)) = self.find_custom_declaration(reference) else {
                return current;
            };
            let Some(target) = alias.target_type.first().cloned() else {
                return current;
            };
            current = target;
        }
    }

    /// `find_underlying_declaration(db, t)` (spec.md §4.1).
    pub fn find_underlying_declaration(&self, type_reference: &TypeReference) -> Option<Declaration> {
        let underlying = self.get_underlying_type(type_reference);
        match underlying {
            TypeReference::Custom(reference) => self.find_custom_declaration(&reference),
            _ => None,
        }
    }

    /// `is_enum_type(db, t)` (spec.md §4.1).
    pub fn is_enum_type(&self, type_reference: &TypeReference) -> bool {
        matches!(
            self.find_underlying_declaration(type_reference),
            Some(Declaration::Enum(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::{DeclarationBank, DefinitionBank, GlobalVariableDeclaration};
    use crate::model::module::LanguageVersion;

    fn module_with_global(name: &str, global_name: &str) -> Module {
        Module {
            language_version: LanguageVersion::default(),
            name: name.into(),
            source_file_path: None,
            comment: None,
            dependencies: vec![],
            export_declarations: DeclarationBank {
                global_variable_declarations: vec![GlobalVariableDeclaration {
                    name: global_name.into(),
                    unique_name: None,
                    declared_type: TypeReference::create_integer_type(32, true),
                    initial_value: Statement::new(vec![]),
                    is_mutable: false,
                }],
                ..Default::default()
            },
            internal_declarations: DeclarationBank::default(),
            definitions: DefinitionBank::default(),
        }
    }

    #[test]
    fn add_declarations_overwrites_same_module_name() {
        let db = Database::new();
        db.add_declarations(module_with_global("A", "x"));
        assert!(db.find_declaration("A", "x").is_some());

        db.add_declarations(module_with_global("A", "y"));
        assert!(db.find_declaration("A", "x").is_none());
        assert!(db.find_declaration("A", "y").is_some());
    }

    #[test]
    fn lookup_never_panics_on_missing_module_or_name() {
        let db = Database::new();
        assert!(db.find_declaration("Nope", "x").is_none());

        db.add_declarations(module_with_global("A", "x"));
        assert!(db.find_declaration("A", "nope").is_none());
    }

    #[test]
    fn get_underlying_type_unwraps_alias_chain() {
        let mut module = module_with_global("A", "x");
        module.export_declarations.alias_type_declarations.push(AliasTypeDeclaration {
            name: "MyInt".into(),
            unique_name: None,
            target_type: vec![TypeReference::create_integer_type(32, true)],
        });
        let db = Database::new();
        db.add_declarations(module);

        let alias_ref = TypeReference::create_custom_type_reference("A", "MyInt");
        assert_eq!(
            db.get_underlying_type(&alias_ref),
            TypeReference::create_integer_type(32, true)
        );
    }
}
