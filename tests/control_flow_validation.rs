//! End-to-end `analyzer::process_module` + `validator::validate_module`
//! coverage over a function body with nested control flow: a for-loop
//! containing an if whose body contains a continue, plus an unannotated
//! `var` read back after a for/if descent. No parser is available, so the
//! function is built by hand as an already-resolved `Module`, same as the
//! other integration tests.

use corec::analyzer::{self, database::Database, AnalysisOptions};
use corec::model::declaration::{DeclarationBank, DefinitionBank, FunctionDeclaration, FunctionDefinition, Linkage};
use corec::model::expr::{
    AccessType, ConstantData, Expression, ExpressionIndex, ExpressionKind, ForLoopHeader, IfSeriesEntry, Statement,
    VariableDecl,
};
use corec::model::module::Module;
use corec::model::types::TypeReference;
use corec::validator;

fn i32_type() -> TypeReference {
    TypeReference::create_integer_type(32, true)
}

fn int_constant(value_text: &str) -> Expression {
    Expression::new(
        ExpressionKind::Constant {
            value_type: i32_type(),
            data: ConstantData { value_text: value_text.into() },
        },
        None,
    )
}

fn var_decl_statement(value_text: &str) -> Statement {
    // var total = <value_text>; — unannotated, so the analyzer must deduce
    // `total`'s type from the initializer rather than leaving it bound to
    // its placeholder `NullPointer`.
    Statement::new(vec![
        Expression::new(
            ExpressionKind::VariableDecl(VariableDecl { name: "total".into(), is_mutable: true }),
            None,
        ),
        int_constant(value_text),
        Expression::new(
            ExpressionKind::Assignment {
                target: ExpressionIndex(0),
                source: ExpressionIndex(1),
                compound_operation: None,
            },
            None,
        ),
    ])
}

fn example_module() -> Module {
    let mut module = Module::new("Main");
    module.export_declarations = DeclarationBank {
        function_declarations: vec![FunctionDeclaration {
            name: "example".into(),
            unique_name: None,
            input_parameters: vec![],
            output_parameter_types: vec![i32_type()],
            is_variadic: false,
            linkage: Linkage::External,
            type_parameters: vec![],
            preconditions: vec![],
            postconditions: vec![],
        }],
        ..Default::default()
    };

    // if total { continue; } — `total` is `i32`, so the condition is not a
    // bool; this should be caught even though it's nested two levels deep
    // (for-loop body -> if body).
    let condition_statement = Statement::new(vec![Expression::new(
        ExpressionKind::Variable { name: "total".into(), access_type: AccessType::Read },
        None,
    )]);
    let continue_statement = Statement::new(vec![Expression::new(ExpressionKind::Continue, None)]);
    let if_statement = Statement::new(vec![Expression::new(
        ExpressionKind::If {
            series: vec![IfSeriesEntry {
                condition: Some(Box::new(condition_statement)),
                then_statements: vec![continue_statement],
            }],
        },
        None,
    )]);

    let for_statement = Statement::new(vec![
        int_constant("0"),
        int_constant("3"),
        Expression::new(
            ExpressionKind::ForLoop {
                header: ForLoopHeader {
                    variable_name: "i".into(),
                    range_begin: ExpressionIndex(0),
                    range_end: ExpressionIndex(1),
                    step_by: None,
                },
                then_statements: vec![if_statement],
            },
            None,
        ),
    ]);

    let return_statement = Statement::new(vec![
        Expression::new(ExpressionKind::Variable { name: "total".into(), access_type: AccessType::Read }, None),
        Expression::new(ExpressionKind::Return { value: Some(ExpressionIndex(0)) }, None),
    ]);

    module.definitions = DefinitionBank {
        function_definitions: vec![FunctionDefinition {
            name: "example".into(),
            // Two sibling `var total` declarations: this language's
            // flat-AST model makes each its own top-level statement, so the
            // redeclaration check must thread across them.
            statements: vec![
                var_decl_statement("0"),
                var_decl_statement("1"),
                for_statement,
                return_statement,
            ],
        }],
    };

    module
}

#[test]
fn nested_control_flow_and_inferred_locals_are_validated() {
    let db = Database::new();
    let result = analyzer::process_module(example_module(), &db, AnalysisOptions::default()).expect("analysis succeeds");
    let diagnostics = validator::validate_module(&result, &db);
    let messages: Vec<String> = diagnostics.iter().map(|d| d.message.clone()).collect();

    assert!(
        messages.iter().any(|m| m.contains("already declared")),
        "expected the second 'var total' to be flagged as a redeclaration, got: {messages:?}"
    );
    assert!(
        messages.iter().any(|m| m.contains("condition must be of type 'Bool'")),
        "expected the if-condition nested inside the for-loop to be checked, got: {messages:?}"
    );
    assert!(
        !messages.iter().any(|m| m.contains("does not exist")),
        "'total' should resolve through scope, not be treated as an undeclared variable: {messages:?}"
    );
    assert!(
        !messages.iter().any(|m| m.contains("return type is")),
        "an unannotated var's real type should flow to the return check: {messages:?}"
    );
    assert!(
        !messages.iter().any(|m| m.contains("'continue' is only valid")),
        "continue inside the nested for-loop body should see its enclosing loop: {messages:?}"
    );
}
