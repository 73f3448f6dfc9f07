//! **Import** and **Declaration names** rules (spec.md §4.5).

use std::collections::HashSet;

use crate::analyzer::database::Database;
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::model::module::Module;
use crate::model::source_range::SourceRange;

use super::is_reserved;

pub fn validate_module_level(module: &Module, db: &Database, diagnostics: &mut DiagnosticBag) {
    validate_imports(module, db, diagnostics);
    validate_declaration_names(module, diagnostics);
}

fn validate_imports(module: &Module, db: &Database, diagnostics: &mut DiagnosticBag) {
    let mut seen_aliases = HashSet::new();

    for dependency in &module.dependencies {
        if !seen_aliases.insert(dependency.alias.clone()) {
            diagnostics.push(Diagnostic::error(
                SourceRange::default(),
                format!("import alias '{}' is used more than once.", dependency.alias),
            ));
        }

        if db.get_module(&dependency.module_name).is_none() {
            diagnostics.push(Diagnostic::error(
                SourceRange::default(),
                format!("module '{}' does not exist.", dependency.module_name),
            ));
        }
    }
}

fn validate_declaration_names(module: &Module, diagnostics: &mut DiagnosticBag) {
    for bank in [&module.export_declarations, &module.internal_declarations] {
        let mut seen = HashSet::new();
        for name in bank.names() {
            if is_reserved(name) {
                diagnostics.push(Diagnostic::error(
                    SourceRange::default(),
                    format!("declaration name '{name}' is a reserved keyword."),
                ));
            }
            if !seen.insert(name.to_string()) {
                diagnostics.push(Diagnostic::error(
                    SourceRange::default(),
                    format!("declaration name '{name}' is declared more than once."),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::{AliasTypeDeclaration, DeclarationBank, DefinitionBank};
    use crate::model::module::LanguageVersion;
    use crate::model::types::TypeReference;

    fn bare_module() -> Module {
        Module {
            language_version: LanguageVersion::default(),
            name: "M".into(),
            source_file_path: None,
            comment: None,
            dependencies: vec![],
            export_declarations: DeclarationBank::default(),
            internal_declarations: DeclarationBank::default(),
            definitions: DefinitionBank::default(),
        }
    }

    #[test]
    fn reserved_name_produces_a_diagnostic() {
        let mut module = bare_module();
        module.export_declarations.alias_type_declarations.push(AliasTypeDeclaration {
            name: "bool".into(),
            unique_name: None,
            target_type: vec![TypeReference::create_integer_type(32, true)],
        });

        let mut diagnostics = DiagnosticBag::default();
        validate_declaration_names(&module, &mut diagnostics);

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn duplicate_import_alias_produces_a_diagnostic() {
        let mut module = bare_module();
        module.dependencies.push(crate::model::module::Dependency {
            module_name: "C.stdio".into(),
            alias: "C".into(),
            usages: None,
        });
        module.dependencies.push(crate::model::module::Dependency {
            module_name: "C.stdlib".into(),
            alias: "C".into(),
            usages: None,
        });

        let db = Database::new();
        db.add_declarations(bare_module_named("C.stdio"));
        db.add_declarations(bare_module_named("C.stdlib"));

        let mut diagnostics = DiagnosticBag::default();
        validate_imports(&module, &db, &mut diagnostics);

        assert!(diagnostics.has_errors());
    }

    fn bare_module_named(name: &str) -> Module {
        let mut module = bare_module();
        module.name = name.into();
        module
    }
}
