//! The validator: per-construct diagnostic rules over an analyzed module
//! (spec.md §4.5). This is the user-visible quality gate — it never
//! panics and never aborts a module; every problem becomes a `Diagnostic`.

pub mod rules;

use std::collections::{HashMap, HashSet};

use crate::analyzer::database::Database;
use crate::analyzer::{AnalysisResult, ExpressionTypes, StatementTypes};
use crate::diagnostics::DiagnosticBag;
use crate::model::declaration::FunctionDeclaration;
use crate::model::expr::{Expression, ExpressionIndex, Statement};
use crate::model::module::Module;

pub struct ValidationContext<'a> {
    pub module: &'a Module,
    pub db: &'a Database,
    pub types: &'a ExpressionTypes,
    /// The nested statements' own deduced types, keyed by the index of the
    /// container expression (`Block`, `If`, `ForLoop`, `WhileLoop`,
    /// `Switch`, `Ternary`, ...) that owns them — the validator's
    /// counterpart to `analyzer::visit_children`'s recursion.
    pub nested: &'a HashMap<ExpressionIndex, Vec<StatementTypes>>,
    /// The function whose body is currently being validated — needed by
    /// the Return rule to check against the declared output type.
    pub current_function: &'a FunctionDeclaration,
}

fn child_types<'a>(context: &ValidationContext<'a>, index: ExpressionIndex) -> std::slice::Iter<'a, StatementTypes> {
    static EMPTY: Vec<StatementTypes> = Vec::new();
    context.nested.get(&index).unwrap_or(&EMPTY).iter()
}

fn nested_context<'a>(context: &ValidationContext<'a>, types: &'a StatementTypes) -> ValidationContext<'a> {
    ValidationContext {
        module: context.module,
        db: context.db,
        types: &types.types,
        nested: &types.nested,
        current_function: context.current_function,
    }
}

/// Names declared so far in the current function body, threaded across
/// every statement reached from it — including nested ones — so that two
/// sibling `var`s anywhere in the same function are checked for
/// redeclaration (spec.md §4.5's redeclaration rule; this language
/// represents each `var` as its own `Statement`, so a per-statement set
/// would never see more than one declaration at a time). A block's
/// declarations are removed again once the block ends, mirroring
/// `Scope::mark`/`truncate_to` in the analyzer.
#[derive(Default)]
struct DeclaredNames {
    names: HashSet<String>,
    frames: Vec<Vec<String>>,
}

impl DeclaredNames {
    fn enter(&mut self) {
        self.frames.push(Vec::new());
    }

    fn exit(&mut self) {
        if let Some(frame) = self.frames.pop() {
            for name in frame {
                self.names.remove(&name);
            }
        }
    }

    fn declare(&mut self, name: &str) {
        self.names.insert(name.to_string());
        if let Some(frame) = self.frames.last_mut() {
            frame.push(name.to_string());
        }
    }
}

/// Runs every rule family over every analyzed statement of `result` and
/// returns the accumulated diagnostics. Consumes the per-statement type
/// trees the analyzer already computed rather than re-deducing them.
pub fn validate_module(result: &AnalysisResult, db: &Database) -> DiagnosticBag {
    let mut diagnostics = DiagnosticBag::default();
    let Some(module) = &result.module else {
        return diagnostics;
    };

    rules::names::validate_module_level(module, db, &mut diagnostics);

    for declaration in module.export_declarations.iter().chain(module.internal_declarations.iter()) {
        rules::types::validate_declaration(module, db, &declaration, &mut diagnostics);
    }

    for definition in &module.definitions.function_definitions {
        let Some(types_per_statement) = result.statement_types.get(&definition.name) else {
            continue;
        };
        let declaration = module
            .export_declarations
            .function_declarations
            .iter()
            .chain(module.internal_declarations.function_declarations.iter())
            .find(|d| d.name == definition.name);

        let Some(declaration) = declaration else {
            continue;
        };
        rules::types::validate_function_contracts(module, db, declaration, &mut diagnostics);

        let mut loop_stack: Vec<rules::control_flow::LoopKind> = Vec::new();
        let mut declared_names = DeclaredNames::default();
        for (statement, types) in definition.statements.iter().zip(types_per_statement) {
            let context = ValidationContext {
                module,
                db,
                types: &types.types,
                nested: &types.nested,
                current_function: declaration,
            };
            validate_statement(&context, statement, &mut loop_stack, &mut declared_names, &mut diagnostics);
        }
    }

    diagnostics
}

/// Dispatches children before parents: the spec's "descends
/// expression-by-expression in reverse" (spec.md §4.5) corresponds to
/// visiting indices from the end of the vector (children were appended
/// first) toward the start. Recurses into every nested body the same way
/// `analyzer::visit_children` does, so every validation rule applies
/// regardless of how deeply the statement it targets is nested.
fn validate_statement(
    context: &ValidationContext,
    statement: &Statement,
    loop_stack: &mut Vec<rules::control_flow::LoopKind>,
    declared_names: &mut DeclaredNames,
    diagnostics: &mut DiagnosticBag,
) {
    for i in (0..statement.expressions.len()).rev() {
        let index = ExpressionIndex(i);
        let expression = statement.get(index);
        validate_expression(
            context,
            statement,
            index,
            expression,
            loop_stack,
            declared_names,
            diagnostics,
        );
    }
}

fn validate_statements_in_new_scope<'a>(
    context: &ValidationContext<'a>,
    statements: &[Statement],
    children: &mut std::slice::Iter<'a, StatementTypes>,
    loop_stack: &mut Vec<rules::control_flow::LoopKind>,
    declared_names: &mut DeclaredNames,
    diagnostics: &mut DiagnosticBag,
) {
    declared_names.enter();
    for inner in statements {
        if let Some(inner_types) = children.next() {
            let inner_context = nested_context(context, inner_types);
            validate_statement(&inner_context, inner, loop_stack, declared_names, diagnostics);
        }
    }
    declared_names.exit();
}

fn validate_expression(
    context: &ValidationContext,
    statement: &Statement,
    index: ExpressionIndex,
    expression: &Expression,
    loop_stack: &mut Vec<rules::control_flow::LoopKind>,
    declared_names: &mut DeclaredNames,
    diagnostics: &mut DiagnosticBag,
) {
    use crate::model::expr::ExpressionKind::*;

    match &expression.kind {
        Access { .. } | DereferenceAndAccess { .. } => {
            rules::expressions::validate_access(context, statement, index, expression, diagnostics)
        }
        Assignment { .. } => rules::expressions::validate_assignment(context, statement, index, expression, diagnostics),
        Binary { .. } => rules::expressions::validate_binary(context, statement, index, expression, diagnostics),
        Call { .. } | InstanceCall { .. } => {
            rules::expressions::validate_call(context, statement, index, expression, diagnostics)
        }
        Cast { .. } => rules::expressions::validate_cast(context, statement, index, expression, diagnostics),
        Instantiate { .. } => rules::expressions::validate_instantiate(context, statement, index, expression, diagnostics),
        NullPointer => rules::expressions::validate_null_literal(context, statement, index, diagnostics),
        Unary { .. } => rules::expressions::validate_unary(context, statement, index, expression, diagnostics),
        Variable { name, .. } => {
            rules::expressions::validate_variable_reference(context, index, name, expression, diagnostics)
        }
        VariableDecl(decl) | VariableDeclWithType { decl, .. } => {
            rules::expressions::validate_variable_decl(context, statement, index, decl, &declared_names.names, diagnostics);
            declared_names.declare(&decl.name);
        }
        Break { loop_count } => {
            rules::control_flow::validate_break(loop_stack, *loop_count, expression, diagnostics)
        }
        Continue => rules::control_flow::validate_continue(loop_stack, expression, diagnostics),
        Block { statements } => {
            let mut children = child_types(context, index);
            validate_statements_in_new_scope(context, statements, &mut children, loop_stack, declared_names, diagnostics);
        }
        ForLoop { header, then_statements } => {
            rules::control_flow::validate_for_loop(context, statement, header, expression, diagnostics);
            let mut children = child_types(context, index);
            loop_stack.push(rules::control_flow::LoopKind::Loop);
            validate_statements_in_new_scope(context, then_statements, &mut children, loop_stack, declared_names, diagnostics);
            loop_stack.pop();
        }
        WhileLoop { condition, then_statements } => {
            let mut children = child_types(context, index);
            if let Some(condition_types) = children.next() {
                let condition_context = nested_context(context, condition_types);
                rules::control_flow::validate_condition_is_bool(&condition_context, condition, expression, diagnostics);
            }
            loop_stack.push(rules::control_flow::LoopKind::Loop);
            validate_statements_in_new_scope(context, then_statements, &mut children, loop_stack, declared_names, diagnostics);
            loop_stack.pop();
        }
        Switch { value, cases } => {
            rules::control_flow::validate_switch(context, statement, value, expression, diagnostics);
            let mut children = child_types(context, index);
            loop_stack.push(rules::control_flow::LoopKind::Switch);
            for case in cases {
                validate_statements_in_new_scope(context, &case.statements, &mut children, loop_stack, declared_names, diagnostics);
            }
            loop_stack.pop();
        }
        If { series } => {
            let mut children = child_types(context, index);
            for entry in series {
                if let Some(condition) = &entry.condition {
                    if let Some(condition_types) = children.next() {
                        let condition_context = nested_context(context, condition_types);
                        rules::control_flow::validate_condition_is_bool(&condition_context, condition, expression, diagnostics);
                    }
                }
                validate_statements_in_new_scope(
                    context,
                    &entry.then_statements,
                    &mut children,
                    loop_stack,
                    declared_names,
                    diagnostics,
                );
            }
        }
        Ternary { condition, then_statement, else_statement } => {
            rules::control_flow::validate_condition_index_is_bool(context, *condition, statement, expression, diagnostics);
            // Ternary arms don't introduce a new declaration scope in the
            // analyzer either (`visit_children`'s `Ternary` arm recurses
            // without a `scope.mark`/`truncate_to` pair), so neither does
            // this recursion.
            if let Some(children) = context.nested.get(&index) {
                let mut children = children.iter();
                if let Some(then_types) = children.next() {
                    let then_context = nested_context(context, then_types);
                    validate_statement(&then_context, then_statement, loop_stack, declared_names, diagnostics);
                }
                if let Some(else_types) = children.next() {
                    let else_context = nested_context(context, else_types);
                    validate_statement(&else_context, else_statement, loop_stack, declared_names, diagnostics);
                }
            }
        }
        Return { value } => rules::control_flow::validate_return(context, statement, *value, expression, diagnostics),
        _ => {}
    }
}
