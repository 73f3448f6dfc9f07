//! Expression-type deduction (spec.md §4.4 `get_expression_type`).
//!
//! `get_expression_type` is pure given `(module, scope, statement,
//! expression, db)` — spec.md §8 requires it deterministic for a fixed
//! database and scope, which this function satisfies by never mutating
//! any of its arguments.

use crate::analyzer::database::Database;
use crate::analyzer::scope::Scope;
use crate::model::declaration::Declaration;
use crate::model::expr::{BinaryOperation, Expression, ExpressionKind, Statement, UnaryOperation};
use crate::model::module::Module;
use crate::model::types::TypeReference;

pub fn get_expression_type(
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    expression: &Expression,
    db: &Database,
) -> Option<TypeReference> {
    match &expression.kind {
        ExpressionKind::Variable { name, .. } => variable_type(module, scope, name, db),

        ExpressionKind::Access {
            base, member_name, ..
        } => access_type(module, scope, statement, statement.get(*base), member_name, db),

        ExpressionKind::DereferenceAndAccess { base, member_name } => {
            let base_type = get_expression_type(module, scope, statement, statement.get(*base), db)?;
            let pointee = db.get_underlying_type(&base_type.remove_pointer()?);
            member_type_of(&pointee, member_name, db)
        }

        ExpressionKind::Binary {
            left_hand_side, ..
        } => get_expression_type(module, scope, statement, statement.get(*left_hand_side), db),

        ExpressionKind::Assignment { target, .. } => {
            get_expression_type(module, scope, statement, statement.get(*target), db)
        }

        ExpressionKind::Call { callee, .. } | ExpressionKind::InstanceCall { instance: callee, .. } => {
            let callee_type = get_expression_type(module, scope, statement, statement.get(*callee), db)?;
            callee_type.get_function_output_type()
        }

        ExpressionKind::Cast {
            destination_type, ..
        } => Some(destination_type.clone()),

        ExpressionKind::Constant { value_type, .. } => Some(value_type.clone()),

        ExpressionKind::Unary {
            expression: inner,
            operation,
        } => unary_type(module, scope, statement, statement.get(*inner), *operation, db),

        ExpressionKind::Ternary { then_statement, .. } => {
            then_statement.root().and_then(|root| get_expression_type(module, scope, then_statement, root, db))
        }

        ExpressionKind::Parenthesis { inner } => {
            get_expression_type(module, scope, statement, statement.get(*inner), db)
        }

        ExpressionKind::NullPointer => Some(TypeReference::NullPointer),

        ExpressionKind::TypeExpression { type_reference } => Some(type_reference.clone()),

        ExpressionKind::Function { declaration_name } => db
            .find_function_declaration(&module.name, declaration_name)
            .map(|d| d.function_type()),

        ExpressionKind::VariableDecl(decl) => scope.get(&decl.name).cloned(),
        ExpressionKind::VariableDeclWithType { declared_type, .. } => Some(declared_type.clone()),

        ExpressionKind::Instantiate { .. } => None,

        // Statements, control flow and terminators do not themselves carry
        // a value type in this language.
        ExpressionKind::Block { .. }
        | ExpressionKind::Break { .. }
        | ExpressionKind::Continue
        | ExpressionKind::Defer { .. }
        | ExpressionKind::ForLoop { .. }
        | ExpressionKind::If { .. }
        | ExpressionKind::Return { .. }
        | ExpressionKind::Switch { .. }
        | ExpressionKind::ConstantArray { .. }
        | ExpressionKind::WhileLoop { .. } => None,
    }
}

fn variable_type(module: &Module, scope: &Scope, name: &str, db: &Database) -> Option<TypeReference> {
    if let Some(type_reference) = scope.get(name) {
        return Some(type_reference.clone());
    }

    if module.alias_for(name).is_some() || module.module_for_alias(name).is_some() {
        return None;
    }

    db.find_function_declaration(&module.name, name)
        .map(|d| d.function_type())
}

fn access_type(
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    base: &Expression,
    member_name: &str,
    db: &Database,
) -> Option<TypeReference> {
    if let ExpressionKind::Variable { name, .. } = &base.kind {
        if let Some(imported_module) = module.module_for_alias(name) {
            if db.find_declaration(imported_module, member_name).is_some() {
                return Some(TypeReference::create_custom_type_reference(
                    imported_module,
                    member_name,
                ));
            }
            return None;
        }
    }

    let base_type = get_expression_type(module, scope, statement, base, db)?;
    member_type_of(&base_type, member_name, db)
}

fn member_type_of(base_type: &TypeReference, member_name: &str, db: &Database) -> Option<TypeReference> {
    match db.find_underlying_declaration(base_type)? {
        Declaration::Struct(s) => s
            .member_names
            .iter()
            .position(|n| n == member_name)
            .and_then(|i| s.member_types.get(i).cloned()),
        Declaration::Union(u) => u
            .member_names
            .iter()
            .position(|n| n == member_name)
            .and_then(|i| u.member_types.get(i).cloned()),
        _ => None,
    }
}

fn unary_type(
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    operand: &Expression,
    operation: UnaryOperation,
    db: &Database,
) -> Option<TypeReference> {
    let operand_type = get_expression_type(module, scope, statement, operand, db);

    match operation {
        UnaryOperation::AddressOf => Some(TypeReference::create_pointer_type(
            operand_type.into_iter().collect(),
            true,
        )),
        UnaryOperation::Indirection => operand_type?.remove_pointer(),
        UnaryOperation::Not => Some(TypeReference::Fundamental(
            crate::model::types::FundamentalType::Bool,
        )),
        UnaryOperation::Minus
        | UnaryOperation::BitwiseNot
        | UnaryOperation::PreIncrement
        | UnaryOperation::PreDecrement
        | UnaryOperation::PostIncrement
        | UnaryOperation::PostDecrement => operand_type,
    }
}

/// Helper retained for callers (validator Binary rule) that need to
/// compare two deduced types for the spec's "structurally equal, with
/// pointer/null-pointer compatibility special-cased" rule (spec.md §4.5).
pub fn binary_operand_types_compatible(
    left: &TypeReference,
    right: &TypeReference,
    _operation: BinaryOperation,
) -> bool {
    if left == right {
        return true;
    }

    matches!(
        (left, right),
        (TypeReference::Pointer(_), TypeReference::NullPointer)
            | (TypeReference::NullPointer, TypeReference::Pointer(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::{DeclarationBank, DefinitionBank, FunctionDeclaration, Linkage};
    use crate::model::module::LanguageVersion;

    fn empty_module(name: &str) -> Module {
        Module {
            language_version: LanguageVersion::default(),
            name: name.into(),
            source_file_path: None,
            comment: None,
            dependencies: vec![],
            export_declarations: DeclarationBank::default(),
            internal_declarations: DeclarationBank::default(),
            definitions: DefinitionBank::default(),
        }
    }

    #[test]
    fn variable_resolves_from_scope_before_module_functions() {
        let module = empty_module("M");
        let db = Database::new();
        let mut scope = Scope::new();
        scope.declare("x", TypeReference::create_integer_type(32, true));

        let statement = Statement::new(vec![Expression::new(
            ExpressionKind::Variable {
                name: "x".into(),
                access_type: crate::model::expr::AccessType::Read,
            },
            None,
        )]);

        let deduced = get_expression_type(&module, &scope, &statement, statement.root().unwrap(), &db);
        assert_eq!(deduced, Some(TypeReference::create_integer_type(32, true)));
    }

    #[test]
    fn variable_falls_back_to_module_function_type() {
        let mut module = empty_module("M");
        module.export_declarations.function_declarations.push(FunctionDeclaration {
            name: "f".into(),
            unique_name: None,
            input_parameters: vec![],
            output_parameter_types: vec![TypeReference::create_integer_type(32, true)],
            is_variadic: false,
            linkage: Linkage::External,
            type_parameters: vec![],
            preconditions: vec![],
            postconditions: vec![],
        });
        let db = Database::new();
        db.add_declarations(module.clone());
        let scope = Scope::new();

        let statement = Statement::new(vec![Expression::new(
            ExpressionKind::Variable {
                name: "f".into(),
                access_type: crate::model::expr::AccessType::Read,
            },
            None,
        )]);

        let deduced = get_expression_type(&module, &scope, &statement, statement.root().unwrap(), &db);
        assert!(matches!(deduced, Some(TypeReference::Function(_))));
    }

    #[test]
    fn module_alias_variable_has_no_type() {
        let mut module = empty_module("M");
        module.dependencies.push(crate::model::module::Dependency {
            module_name: "C.stdio".into(),
            alias: "C".into(),
            usages: None,
        });
        let db = Database::new();
        let scope = Scope::new();

        let statement = Statement::new(vec![Expression::new(
            ExpressionKind::Variable {
                name: "C".into(),
                access_type: crate::model::expr::AccessType::Read,
            },
            None,
        )]);

        assert_eq!(
            get_expression_type(&module, &scope, &statement, statement.root().unwrap(), &db),
            None
        );
    }
}
