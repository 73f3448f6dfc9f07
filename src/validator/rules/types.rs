//! **Enum**, **Struct**, **Union**, **Global variable** and **Function
//! contracts** rules (spec.md §4.5). These operate over declarations
//! directly rather than the per-statement analyzed tree, since a
//! declaration's default values and enum literals are evaluated at
//! compile time rather than lowered like ordinary expressions.

use std::collections::{HashMap, HashSet};

use crate::analyzer::database::Database;
use crate::analyzer::scope::Scope;
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::model::declaration::{Declaration, FunctionDeclaration};
use crate::model::expr::{BinaryOperation, Expression, ExpressionKind, Statement};
use crate::model::module::Module;
use crate::model::source_range::SourceRange;

pub fn validate_declaration(module: &Module, db: &Database, declaration: &Declaration, diagnostics: &mut DiagnosticBag) {
    match declaration {
        Declaration::Enum(enum_declaration) => {
            let mut seen = HashSet::new();
            let mut running_value = -1i64;
            let mut sibling_values: HashMap<String, i64> = HashMap::new();

            for value in &enum_declaration.values {
                if !seen.insert(value.name.clone()) {
                    diagnostics.push(Diagnostic::error(
                        SourceRange::default(),
                        format!("enum member '{}' is declared more than once.", value.name),
                    ));
                }

                let resolved = match &value.value {
                    Some(statement) => evaluate_constant_i64(statement, &sibling_values),
                    None => Some(running_value + 1),
                };

                match resolved {
                    Some(resolved) if (i32::MIN as i64..=i32::MAX as i64).contains(&resolved) => {
                        running_value = resolved;
                        sibling_values.insert(value.name.clone(), resolved);
                    }
                    Some(_) => diagnostics.push(Diagnostic::error(
                        SourceRange::default(),
                        format!("enum member '{}' does not fit in a signed 32-bit integer.", value.name),
                    )),
                    None => diagnostics.push(Diagnostic::error(
                        SourceRange::default(),
                        format!("enum member '{}' is not compile-time computable.", value.name),
                    )),
                }
            }
        }

        Declaration::Struct(struct_declaration) => {
            let mut seen = HashSet::new();
            for name in &struct_declaration.member_names {
                if !seen.insert(name.clone()) {
                    diagnostics.push(Diagnostic::error(
                        SourceRange::default(),
                        format!("struct member '{name}' is declared more than once."),
                    ));
                }
            }

            for (index, default_value) in struct_declaration.member_default_values.iter().enumerate() {
                let Some(member_type) = struct_declaration.member_types.get(index) else {
                    continue;
                };
                let scope = Scope::new();
                let deduced_type = default_value
                    .root()
                    .and_then(|root| crate::analyzer::expr_type::get_expression_type(module, &scope, default_value, root, db));

                match deduced_type {
                    Some(deduced_type) if &deduced_type != member_type => diagnostics.push(Diagnostic::error(
                        SourceRange::default(),
                        format!(
                            "default value for member {} has type '{deduced_type}' but member type is '{member_type}'.",
                            struct_declaration.member_names.get(index).cloned().unwrap_or_default()
                        ),
                    )),
                    _ => {}
                }
            }
        }

        Declaration::Union(union_declaration) => {
            let mut seen = HashSet::new();
            for name in &union_declaration.member_names {
                if !seen.insert(name.clone()) {
                    diagnostics.push(Diagnostic::error(
                        SourceRange::default(),
                        format!("union member '{name}' is declared more than once."),
                    ));
                }
            }
        }

        Declaration::GlobalVariable(global) => {
            let scope = Scope::new();
            let deduced_type = global
                .initial_value
                .root()
                .and_then(|root| crate::analyzer::expr_type::get_expression_type(module, &scope, &global.initial_value, root, db));

            if let Some(deduced_type) = deduced_type {
                if deduced_type != global.declared_type {
                    diagnostics.push(Diagnostic::error(
                        SourceRange::default(),
                        format!(
                            "global '{}' is declared as '{}' but its initializer has type '{deduced_type}'.",
                            global.name, global.declared_type
                        ),
                    ));
                }
            }
        }

        Declaration::Function(_) | Declaration::AliasType(_) => {}
    }
}

pub fn validate_function_contracts(
    _module: &Module,
    _db: &Database,
    declaration: &FunctionDeclaration,
    diagnostics: &mut DiagnosticBag,
) {
    let names: HashSet<String> = declaration
        .input_parameters
        .iter()
        .map(|p| p.name.clone())
        .collect();

    for precondition in &declaration.preconditions {
        validate_contract_statement(precondition, &names, diagnostics, "precondition");
    }

    let mut names_with_outputs = names.clone();
    names_with_outputs.insert("result".into());
    for postcondition in &declaration.postconditions {
        validate_contract_statement(postcondition, &names_with_outputs, diagnostics, "postcondition");
    }
}

fn validate_contract_statement(
    statement: &Statement,
    allowed_names: &HashSet<String>,
    diagnostics: &mut DiagnosticBag,
    contract_kind: &str,
) {
    for expression in &statement.expressions {
        if let ExpressionKind::Variable { name, .. } = &expression.kind {
            if !allowed_names.contains(name) {
                diagnostics.push(Diagnostic::error(
                    SourceRange::default(),
                    format!("{contract_kind} references unknown name '{name}'."),
                ));
            }
        }
    }
}

/// Evaluates a compile-time constant `Statement` to a signed 64-bit value,
/// supporting literal constants, sibling enum-value references and the
/// arithmetic/bitwise binary operators. Returns `None` when the statement
/// is not compile-time computable — callers turn that into a diagnostic.
fn evaluate_constant_i64(statement: &Statement, siblings: &HashMap<String, i64>) -> Option<i64> {
    evaluate_expression_i64(statement, statement.root()?, siblings)
}

fn evaluate_expression_i64(
    statement: &Statement,
    expression: &Expression,
    siblings: &HashMap<String, i64>,
) -> Option<i64> {
    match &expression.kind {
        ExpressionKind::Constant { data, value_type } if value_type.is_integer() || value_type.is_bool() => {
            data.value_text.parse::<i64>().ok()
        }
        ExpressionKind::Variable { name, .. } => siblings.get(name).copied(),
        ExpressionKind::Binary {
            left_hand_side,
            right_hand_side,
            operation,
        } => {
            let left = evaluate_expression_i64(statement, statement.get(*left_hand_side), siblings)?;
            let right = evaluate_expression_i64(statement, statement.get(*right_hand_side), siblings)?;
            apply_binary_i64(*operation, left, right)
        }
        ExpressionKind::Parenthesis { inner } => {
            evaluate_expression_i64(statement, statement.get(*inner), siblings)
        }
        ExpressionKind::Unary { expression: inner, operation } => {
            let value = evaluate_expression_i64(statement, statement.get(*inner), siblings)?;
            match operation {
                crate::model::expr::UnaryOperation::Minus => Some(-value),
                crate::model::expr::UnaryOperation::BitwiseNot => Some(!value),
                _ => None,
            }
        }
        _ => None,
    }
}

fn apply_binary_i64(operation: BinaryOperation, left: i64, right: i64) -> Option<i64> {
    match operation {
        BinaryOperation::Add => Some(left + right),
        BinaryOperation::Subtract => Some(left - right),
        BinaryOperation::Multiply => Some(left * right),
        BinaryOperation::Divide if right != 0 => Some(left / right),
        BinaryOperation::Modulo if right != 0 => Some(left % right),
        BinaryOperation::BitwiseAnd => Some(left & right),
        BinaryOperation::BitwiseOr => Some(left | right),
        BinaryOperation::BitwiseXor => Some(left ^ right),
        BinaryOperation::ShiftLeft => Some(left << right),
        BinaryOperation::ShiftRight => Some(left >> right),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::EnumDeclaration;
    use crate::model::declaration::EnumValue;
    use crate::model::expr::ConstantData;
    use crate::model::types::TypeReference;

    fn const_statement(text: &str) -> Statement {
        Statement::new(vec![Expression::new(
            ExpressionKind::Constant {
                value_type: TypeReference::create_integer_type(32, true),
                data: ConstantData { value_text: text.into() },
            },
            None,
        )])
    }

    #[test]
    fn duplicate_enum_member_names_are_flagged() {
        let module = Module::new("M");
        let db = Database::new();
        let mut diagnostics = DiagnosticBag::default();

        let declaration = Declaration::Enum(EnumDeclaration {
            name: "Color".into(),
            unique_name: None,
            values: vec![
                EnumValue {
                    name: "Red".into(),
                    value: Some(const_statement("0")),
                },
                EnumValue {
                    name: "Red".into(),
                    value: Some(const_statement("1")),
                },
            ],
        });

        validate_declaration(&module, &db, &declaration, &mut diagnostics);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn implicit_enum_values_increment_from_the_previous_one() {
        let mut siblings = HashMap::new();
        siblings.insert("Red".into(), 0);
        let statement = const_statement("1");
        assert_eq!(evaluate_constant_i64(&statement, &siblings), Some(1));
    }
}
