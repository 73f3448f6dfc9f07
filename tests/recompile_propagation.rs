//! Seed tests 3 and 4 (spec.md §8): a chain `A -> B -> C` where `B` imports
//! `C.Bar` and `A` imports `B.Qux`. Changing `Bar`'s member default value
//! propagates to `[B, A]`; changing only the unrelated export `C.Other`
//! recompiles nothing.

use corec::analyzer::database::Database;
use corec::hash;
use corec::incremental::graph::DependencyGraph;
use corec::incremental::recompile::find_modules_to_recompile;
use corec::model::declaration::{AliasTypeDeclaration, DeclarationBank, StructDeclaration};
use corec::model::expr::{ConstantData, Expression, ExpressionKind, Statement};
use corec::model::module::{Dependency, Module};
use corec::model::types::TypeReference;

fn int_default(value_text: &str) -> Statement {
    Statement::new(vec![Expression::new(
        ExpressionKind::Constant {
            value_type: TypeReference::create_integer_type(32, true),
            data: ConstantData {
                value_text: value_text.into(),
            },
        },
        None,
    )])
}

fn module_c(bar_default: &str) -> Module {
    let mut module = Module::new("C");
    module.export_declarations = DeclarationBank {
        struct_declarations: vec![StructDeclaration {
            name: "Bar".into(),
            unique_name: None,
            member_types: vec![TypeReference::create_integer_type(32, true)],
            member_names: vec!["value".into()],
            member_default_values: vec![int_default(bar_default)],
            is_packed: false,
            is_literal: false,
        }],
        alias_type_declarations: vec![AliasTypeDeclaration {
            name: "Other".into(),
            unique_name: None,
            target_type: vec![TypeReference::create_integer_type(32, true)],
        }],
        ..Default::default()
    };
    module
}

fn module_b() -> Module {
    let mut module = Module::new("B");
    module.dependencies.push(Dependency {
        module_name: "C".into(),
        alias: "C".into(),
        usages: Some(vec!["Bar".into()]),
    });
    module.export_declarations = DeclarationBank {
        alias_type_declarations: vec![AliasTypeDeclaration {
            name: "Qux".into(),
            unique_name: None,
            target_type: vec![TypeReference::create_custom_type_reference("C", "Bar")],
        }],
        ..Default::default()
    };
    module
}

fn module_a() -> Module {
    let mut module = Module::new("A");
    module.dependencies.push(Dependency {
        module_name: "B".into(),
        alias: "B".into(),
        usages: Some(vec!["Qux".into()]),
    });
    module
}

fn build_graph(db: &Database) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add_module(&db.get_module("B").unwrap());
    graph.add_module(&db.get_module("A").unwrap());
    graph
}

#[test]
fn changing_a_member_default_value_recompiles_the_whole_chain() {
    let db = Database::new();
    let old_fingerprints = hash::hash_module_declarations(&module_c("0"));

    db.add_declarations(module_c("1"));
    let new_fingerprints = hash::hash_module_declarations(&db.get_module("C").unwrap());

    db.add_declarations(module_b());
    db.add_declarations(module_a());
    let graph = build_graph(&db);

    let plan = find_modules_to_recompile(&db, &graph, "C", &old_fingerprints, &new_fingerprints);
    assert_eq!(plan, vec!["B".to_string(), "A".to_string()]);
}

#[test]
fn changing_an_unrelated_export_recompiles_nothing() {
    let db = Database::new();
    let unchanged = module_c("0");
    let old_fingerprints = hash::hash_module_declarations(&unchanged);

    db.add_declarations(unchanged);
    db.add_declarations(module_b());
    db.add_declarations(module_a());
    let graph = build_graph(&db);

    let mut changed = module_c("0");
    changed.export_declarations.alias_type_declarations[0].target_type =
        vec![TypeReference::create_integer_type(64, true)];
    let new_fingerprints = hash::hash_module_declarations(&changed);

    let plan = find_modules_to_recompile(&db, &graph, "C", &old_fingerprints, &new_fingerprints);
    assert!(plan.is_empty(), "expected no recompilation, got {plan:?}");
}
