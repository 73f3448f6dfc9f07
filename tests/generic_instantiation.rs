//! Seed test 7 (spec.md §8): the function constructor `add<T>(a:T,b:T)->T`
//! invoked as `add(1i32, 2i32)` rewrites to an `InstanceCall` and records a
//! `db.call_instances` entry keyed on `arguments = [statement-of-type
//! -expression(Int32)]`.

use corec::analyzer::database::{ArgumentStatementKey, CallInstanceKey, Database};
use corec::analyzer::scope::Scope;
use corec::analyzer::instantiate::instantiate_call;
use corec::model::declaration::{DeclarationBank, FunctionDeclaration, FunctionParameter, Linkage};
use corec::model::expr::{ConstantData, Expression, ExpressionIndex, ExpressionKind, Statement};
use corec::model::module::Module;
use corec::model::types::{ParameterType, TypeReference};

fn module_with_add_constructor() -> Module {
    let mut module = Module::new("M");
    module.export_declarations = DeclarationBank {
        function_declarations: vec![FunctionDeclaration {
            name: "add".into(),
            unique_name: None,
            input_parameters: vec![
                FunctionParameter {
                    name: "a".into(),
                    parameter_type: TypeReference::Parameter(ParameterType { name: "T".into() }),
                },
                FunctionParameter {
                    name: "b".into(),
                    parameter_type: TypeReference::Parameter(ParameterType { name: "T".into() }),
                },
            ],
            output_parameter_types: vec![TypeReference::Parameter(ParameterType { name: "T".into() })],
            is_variadic: false,
            linkage: Linkage::External,
            type_parameters: vec!["T".into()],
            preconditions: vec![],
            postconditions: vec![],
        }],
        ..Default::default()
    };
    module
}

fn int_literal(text: &str) -> Expression {
    Expression::new(
        ExpressionKind::Constant {
            value_type: TypeReference::create_integer_type(32, true),
            data: ConstantData { value_text: text.into() },
        },
        None,
    )
}

#[test]
fn add_one_two_instantiates_with_int32_argument() {
    let module = module_with_add_constructor();
    let db = Database::new();
    db.add_declarations(module.clone());
    let scope = Scope::new();

    let mut statement = Statement::new(vec![
        Expression::new(
            ExpressionKind::Function {
                declaration_name: "add".into(),
            },
            None,
        ),
        int_literal("1"),
        int_literal("2"),
        Expression::new(
            ExpressionKind::Call {
                callee: ExpressionIndex(0),
                arguments: vec![ExpressionIndex(1), ExpressionIndex(2)],
            },
            None,
        ),
    ]);
    let call_index = ExpressionIndex(3);

    let rewrote = instantiate_call(&module, &scope, &mut statement, call_index, &db).expect("instantiation succeeds");
    assert!(rewrote);

    assert!(
        matches!(statement.get(call_index).kind, ExpressionKind::InstanceCall { .. }),
        "the call site must become an InstanceCall, got {:?}",
        statement.get(call_index).kind
    );

    let expected_argument = Statement::new(vec![Expression::new(
        ExpressionKind::TypeExpression {
            type_reference: TypeReference::create_integer_type(32, true),
        },
        None,
    )]);
    let key = CallInstanceKey {
        module: "M".into(),
        constructor_name: "add".into(),
        arguments: vec![ArgumentStatementKey::from(&expected_argument)],
    };

    let instance = db.get_call_instance(&key).expect("an Int32 instance of 'add' was recorded");
    assert_eq!(instance.input_parameters[0].parameter_type, TypeReference::create_integer_type(32, true));
    assert_eq!(instance.output_parameter_types[0], TypeReference::create_integer_type(32, true));
}
