//! **Break**/**Continue**, **For-loop**, **If/While/Ternary condition**,
//! **Switch** and **Return** rules (spec.md §4.5).

use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::model::expr::{Expression, ExpressionIndex, ForLoopHeader, Statement};
use crate::model::source_range::SourceRange;

use super::super::ValidationContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    Loop,
    Switch,
}

fn range_of(expression: &Expression) -> SourceRange {
    expression.source_range.clone().unwrap_or_default()
}

pub fn validate_break(
    loop_stack: &[LoopKind],
    loop_count: Option<u32>,
    expression: &Expression,
    diagnostics: &mut DiagnosticBag,
) {
    if loop_stack.is_empty() {
        diagnostics.push(Diagnostic::error(
            range_of(expression),
            "'break' is only valid inside a for/while loop or a switch.".to_string(),
        ));
        return;
    }

    let count = loop_count.unwrap_or(1);
    if count < 1 || count as usize > loop_stack.len() {
        diagnostics.push(Diagnostic::error(
            range_of(expression),
            format!("'break' count {count} exceeds the enclosing loop depth ({})." , loop_stack.len()),
        ));
    }
}

pub fn validate_continue(loop_stack: &[LoopKind], expression: &Expression, diagnostics: &mut DiagnosticBag) {
    if !loop_stack.iter().any(|kind| *kind == LoopKind::Loop) {
        diagnostics.push(Diagnostic::error(
            range_of(expression),
            "'continue' is only valid inside a for/while loop.".to_string(),
        ));
    }
}

pub fn validate_for_loop(
    context: &ValidationContext,
    statement: &Statement,
    header: &ForLoopHeader,
    expression: &Expression,
    diagnostics: &mut DiagnosticBag,
) {
    let begin = context.types.get(&header.range_begin);
    let end = context.types.get(&header.range_end);
    let step = header.step_by.and_then(|index| context.types.get(&index));

    let numeric = |t: &crate::model::types::TypeReference| t.is_integer() || t.is_floating_point();

    let all_present = match (begin, end) {
        (Some(b), Some(e)) => {
            numeric(b) && numeric(e) && b == e && step.map_or(true, |s| numeric(s) && s == b)
        }
        _ => true,
    };

    if !all_present {
        diagnostics.push(Diagnostic::error(
            range_of(expression),
            "for-loop range bounds and step must be numeric and of equal type.".to_string(),
        ));
    }

    let _ = statement;
}

pub fn validate_condition_is_bool(
    context: &ValidationContext,
    condition: &Statement,
    expression: &Expression,
    diagnostics: &mut DiagnosticBag,
) {
    let Some(root) = condition.root() else {
        return;
    };
    let condition_index = ExpressionIndex(condition.expressions.len() - 1);
    let Some(condition_type) = context.types.get(&condition_index) else {
        return;
    };

    if !condition_type.is_bool() {
        diagnostics.push(Diagnostic::error(
            root.source_range.clone().unwrap_or_else(|| range_of(expression)),
            format!("condition must be of type 'Bool', found '{condition_type}'."),
        ));
    }
}

/// Like `validate_condition_is_bool`, but for a condition that lives as a
/// plain index into the *current* statement's own expressions (the
/// `Ternary` condition) rather than as a nested `Statement`.
pub fn validate_condition_index_is_bool(
    context: &ValidationContext,
    condition: ExpressionIndex,
    statement: &Statement,
    expression: &Expression,
    diagnostics: &mut DiagnosticBag,
) {
    let Some(condition_type) = context.types.get(&condition) else {
        return;
    };

    if !condition_type.is_bool() {
        diagnostics.push(Diagnostic::error(
            range_of(statement.get(condition)),
            format!("condition must be of type 'Bool', found '{condition_type}'."),
        ));
    }
}

pub fn validate_switch(
    context: &ValidationContext,
    _statement: &Statement,
    value: &ExpressionIndex,
    expression: &Expression,
    diagnostics: &mut DiagnosticBag,
) {
    let Some(value_type) = context.types.get(value) else {
        return;
    };

    if !value_type.is_integer() && !context.db.is_enum_type(value_type) {
        diagnostics.push(Diagnostic::error(
            range_of(expression),
            format!("switch value must be integer or enum, found '{value_type}'."),
        ));
    }
}

pub fn validate_return(
    context: &ValidationContext,
    statement: &Statement,
    value: Option<ExpressionIndex>,
    expression: &Expression,
    diagnostics: &mut DiagnosticBag,
) {
    let declared_output = context.current_function.output_parameter_types.first();

    match (value, declared_output) {
        (None, None) => {}
        (None, Some(expected)) => diagnostics.push(Diagnostic::error(
            range_of(expression),
            format!("missing return value of type '{expected}'."),
        )),
        (Some(_), None) => diagnostics.push(Diagnostic::error(
            range_of(expression),
            "function returns void but a value was provided.".to_string(),
        )),
        (Some(index), Some(expected)) => {
            if let Some(actual) = context.types.get(&index) {
                if actual != expected {
                    diagnostics.push(Diagnostic::error(
                        range_of(statement.get(index)),
                        format!("return type is '{expected}' but '{actual}' was provided."),
                    ));
                }
            }
        }
    }
}
