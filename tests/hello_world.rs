//! Seed test 1 (spec.md §8): a module that imports `C.stdio` and calls
//! `puts("Hello world!")` from `main` lowers to a string constant and a
//! `call i32 @puts(...)` inside `@main`, which returns `i32 0`.
//!
//! No parser is available, so the two modules are built by hand as
//! already-resolved `Module` values: `puts`'s declaration is what an
//! import-resolution pass would have materialized into `Main`'s own
//! internal declarations, matching the shape `codegen` consumes
//! regardless of how it got there.

use inkwell::context::Context;

use corec::analyzer::database::Database;
use corec::codegen;
use corec::model::declaration::{
    DeclarationBank, DefinitionBank, FunctionDeclaration, FunctionParameter, FunctionDefinition, Linkage,
};
use corec::model::expr::{AccessType, ConstantData, Expression, ExpressionIndex, ExpressionKind, Statement};
use corec::model::module::{Dependency, Module};
use corec::model::types::{FundamentalType, TypeReference};

const TARGET_TRIPLE: &str = "x86_64-unknown-linux-gnu";

fn c_string_type() -> TypeReference {
    TypeReference::create_pointer_type(vec![TypeReference::Fundamental(FundamentalType::CChar)], false)
}

fn stdio_module() -> Module {
    let mut module = Module::new("C.stdio");
    module.export_declarations = DeclarationBank {
        function_declarations: vec![FunctionDeclaration {
            name: "puts".into(),
            unique_name: None,
            input_parameters: vec![FunctionParameter {
                name: "s".into(),
                parameter_type: c_string_type(),
            }],
            output_parameter_types: vec![TypeReference::create_integer_type(32, true)],
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

fn main_module() -> Module {
    let mut module = Module::new("Main");
    module.dependencies.push(Dependency {
        module_name: "C.stdio".into(),
        alias: "C".into(),
        usages: Some(vec!["puts".into()]),
    });

    module.internal_declarations = DeclarationBank {
        function_declarations: vec![FunctionDeclaration {
            name: "puts".into(),
            unique_name: None,
            input_parameters: vec![FunctionParameter {
                name: "s".into(),
                parameter_type: c_string_type(),
            }],
            output_parameter_types: vec![TypeReference::create_integer_type(32, true)],
            is_variadic: false,
            linkage: Linkage::External,
            type_parameters: vec![],
            preconditions: vec![],
            postconditions: vec![],
        }],
        ..Default::default()
    };

    module.export_declarations = DeclarationBank {
        function_declarations: vec![FunctionDeclaration {
            name: "main".into(),
            unique_name: None,
            input_parameters: vec![],
            output_parameter_types: vec![TypeReference::create_integer_type(32, true)],
            is_variadic: false,
            linkage: Linkage::External,
            type_parameters: vec![],
            preconditions: vec![],
            postconditions: vec![],
        }],
        ..Default::default()
    };

    let call_statement = Statement::new(vec![
        Expression::new(
            ExpressionKind::Constant {
                value_type: c_string_type(),
                data: ConstantData {
                    value_text: "Hello world!".into(),
                },
            },
            None,
        ),
        Expression::new(
            ExpressionKind::Variable {
                name: "puts".into(),
                access_type: AccessType::Read,
            },
            None,
        ),
        Expression::new(
            ExpressionKind::Call {
                callee: ExpressionIndex(1),
                arguments: vec![ExpressionIndex(0)],
            },
            None,
        ),
    ]);

    let return_statement = Statement::new(vec![
        Expression::new(
            ExpressionKind::Constant {
                value_type: TypeReference::create_integer_type(32, true),
                data: ConstantData {
                    value_text: "0".into(),
                },
            },
            None,
        ),
        Expression::new(
            ExpressionKind::Return {
                value: Some(ExpressionIndex(0)),
            },
            None,
        ),
    ]);

    module.definitions = DefinitionBank {
        function_definitions: vec![FunctionDefinition {
            name: "main".into(),
            statements: vec![call_statement, return_statement],
        }],
    };

    module
}

#[test]
fn hello_world_emits_a_puts_call_returning_zero() {
    let db = Database::new();
    db.add_declarations(stdio_module());
    let main = main_module();
    db.add_declarations(main.clone());

    let context = Context::create();
    let ctx = codegen::compile_module_declarations(&context, "Main", &db).expect("declarations compile");
    codegen::compile_definitions(&ctx, &main, &db, &main.definitions.function_definitions, TARGET_TRIPLE).expect("definitions compile");

    let ir = ctx.module.print_to_string().to_string();

    assert!(
        ir.contains(r#"c"Hello world!\00""#),
        "expected the string literal as a global constant, got:\n{ir}"
    );
    assert!(ir.contains("define i32 @main("), "expected a defined @main, got:\n{ir}");
    assert!(ir.contains("call i32 @puts("), "expected a call to @puts, got:\n{ir}");
    assert!(ir.contains("ret i32 0"), "expected main to return 0, got:\n{ir}");
}
