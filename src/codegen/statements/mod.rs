//! Lowering for the control-flow statement kinds — `Block`, `If`,
//! `ForLoop`, `WhileLoop`, `Switch`, `Ternary`, `Return`, `Break`,
//! `Continue` and `Defer` — plus the forward-order per-`Statement` driver
//! that ties them together with `codegen::expressions` (spec.md §4.6).
//!
//! A `Statement`'s expressions are visited in ascending index order:
//! children are appended at smaller indices than the parents that
//! reference them, so by the time a parent is reached every index it
//! names is already present in `values`.

use inkwell::basic_block::BasicBlock;
use inkwell::values::{BasicValue, BasicValueEnum, FunctionValue, IntValue};

use crate::analyzer::database::Database;
use crate::analyzer::scope::Scope;
use crate::model::expr::{ExpressionIndex, ExpressionKind, IfSeriesEntry, Statement, SwitchCase};
use crate::model::module::Module;
use crate::model::types::TypeReference;

use super::context::{BlockKind, CodegenContext};
use super::expressions::{self, ValueMap};
use super::CodegenError;

fn llvm_err(error: inkwell::builder::BuilderError) -> CodegenError {
    CodegenError::Llvm(error.to_string())
}

fn current_function<'ctx>(ctx: &CodegenContext<'ctx>) -> Result<FunctionValue<'ctx>, CodegenError> {
    ctx.builder
        .get_insert_block()
        .and_then(|block| block.get_parent())
        .ok_or_else(|| CodegenError::UnsupportedOperation("statement compiled outside of a function body".into()))
}

fn root_value<'ctx>(statement: &Statement, values: &ValueMap<'ctx>) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let index = ExpressionIndex(statement.expressions.len().saturating_sub(1));
    values.get(&index).copied().ok_or(CodegenError::MissingValue(index.0))
}

/// Runs every expression of `statement` in order, feeding each already
/// computed sibling value forward, and returns the values produced so a
/// caller (a nested statement's parent) can read out the root.
pub fn compile_statement<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    statement: &Statement,
    target_triple: &str,
) -> Result<ValueMap<'ctx>, CodegenError> {
    let mut values = ValueMap::new();
    let instantiate_hints = expressions::collect_instantiate_type_hints(ctx, module, scope, statement, db);

    for position in 0..statement.expressions.len() {
        if ctx.current_block_is_terminated() {
            break;
        }

        let index = ExpressionIndex(position);
        let expression = statement.get(index).clone();

        match &expression.kind {
            ExpressionKind::Block { statements } => {
                compile_block_body(ctx, module, db, scope, statements, target_triple)?;
            }
            ExpressionKind::If { series } => {
                compile_if(ctx, module, db, scope, series, target_triple)?;
            }
            ExpressionKind::ForLoop { header, then_statements } => {
                let begin = values.get(&header.range_begin).copied().ok_or(CodegenError::MissingValue(header.range_begin.0))?;
                let end = values.get(&header.range_end).copied().ok_or(CodegenError::MissingValue(header.range_end.0))?;
                let step = match header.step_by {
                    Some(step_index) => Some(values.get(&step_index).copied().ok_or(CodegenError::MissingValue(step_index.0))?),
                    None => None,
                };
                compile_for_loop(
                    ctx,
                    module,
                    db,
                    scope,
                    &header.variable_name,
                    begin,
                    end,
                    step,
                    then_statements,
                    target_triple,
                )?;
            }
            ExpressionKind::WhileLoop { condition, then_statements } => {
                compile_while_loop(ctx, module, db, scope, condition, then_statements, target_triple)?;
            }
            ExpressionKind::Switch { value, cases } => {
                let switch_value = values.get(value).copied().ok_or(CodegenError::MissingValue(value.0))?;
                compile_switch(ctx, module, db, scope, switch_value, cases, &values, target_triple)?;
            }
            ExpressionKind::Defer { statement: deferred } => {
                ctx.push_defer((**deferred).clone());
            }
            ExpressionKind::Return { value } => {
                let return_value = match value {
                    Some(index) => Some(values.get(index).copied().ok_or(CodegenError::MissingValue(index.0))?),
                    None => None,
                };
                compile_return(ctx, module, db, scope, return_value, target_triple)?;
            }
            ExpressionKind::Break { loop_count } => {
                let target = ctx
                    .nth_break_target(*loop_count)
                    .ok_or_else(|| CodegenError::UnsupportedOperation("'break' outside of a loop or switch".into()))?;
                ctx.builder.build_unconditional_branch(target).map_err(llvm_err)?;
            }
            ExpressionKind::Continue => {
                let target = ctx
                    .nearest_repeat_block()
                    .ok_or_else(|| CodegenError::UnsupportedOperation("'continue' outside of a loop".into()))?;
                ctx.builder.build_unconditional_branch(target).map_err(llvm_err)?;
            }
            ExpressionKind::Ternary { condition, then_statement, else_statement } => {
                let condition_value = values.get(condition).copied().ok_or(CodegenError::MissingValue(condition.0))?;
                let result_type = expressions::type_of(module, scope, statement, statement.get(index), db).ok_or(CodegenError::MissingType(index.0))?;
                let value = compile_ternary(ctx, module, db, scope, condition_value, then_statement, else_statement, &result_type, target_triple)?;
                values.insert(index, value);
            }
            _ => {
                let value = expressions::compile_expression(ctx, module, db, scope, statement, index, &expression, &values, &instantiate_hints, target_triple)?;
                expressions::declare_if_variable_decl(scope, &expression);
                if let Some(value) = value {
                    values.insert(index, value);
                }
            }
        }
    }

    Ok(values)
}

/// A fresh codegen/analyzer scope frame, then each statement of a block
/// body in sequence.
fn compile_block_body<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    statements: &[Statement],
    target_triple: &str,
) -> Result<(), CodegenError> {
    ctx.enter_scope();
    let mark = scope.mark();

    for nested in statements {
        if ctx.current_block_is_terminated() {
            break;
        }
        compile_statement(ctx, module, db, scope, nested, target_triple)?;
    }

    scope.truncate_to(mark);
    ctx.exit_scope();
    Ok(())
}

fn compile_if<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    series: &[IfSeriesEntry],
    target_triple: &str,
) -> Result<(), CodegenError> {
    let function = current_function(ctx)?;
    let merge_block = ctx.context.append_basic_block(function, "if_end");

    for entry in series {
        match &entry.condition {
            Some(condition_statement) => {
                let then_block = ctx.context.append_basic_block(function, "if_then");
                let next_block = ctx.context.append_basic_block(function, "if_next");

                let condition_values = compile_statement(ctx, module, db, scope, condition_statement, target_triple)?;
                let condition_value = root_value(condition_statement, &condition_values)?;
                ctx.builder
                    .build_conditional_branch(condition_value.into_int_value(), then_block, next_block)
                    .map_err(llvm_err)?;

                ctx.builder.position_at_end(then_block);
                compile_block_body(ctx, module, db, scope, &entry.then_statements, target_triple)?;
                if !ctx.current_block_is_terminated() {
                    ctx.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;
                }

                ctx.builder.position_at_end(next_block);
            }
            None => {
                compile_block_body(ctx, module, db, scope, &entry.then_statements, target_triple)?;
                if !ctx.current_block_is_terminated() {
                    ctx.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;
                }
            }
        }
    }

    if !ctx.current_block_is_terminated() {
        ctx.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;
    }

    ctx.builder.position_at_end(merge_block);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn compile_for_loop<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    variable_name: &str,
    begin: BasicValueEnum<'ctx>,
    end: BasicValueEnum<'ctx>,
    step: Option<BasicValueEnum<'ctx>>,
    then_statements: &[Statement],
    target_triple: &str,
) -> Result<(), CodegenError> {
    let function = current_function(ctx)?;
    // Matches the type the analyzer itself assigns a for-loop's induction
    // variable (`analyzer::visit_children`): a plain signed 32-bit integer.
    let loop_variable_type = TypeReference::create_integer_type(32, true);

    ctx.enter_scope();
    let mark = scope.mark();

    let pointer = expressions::declare_local(ctx, variable_name, &loop_variable_type)?;
    ctx.builder.build_store(pointer, begin).map_err(llvm_err)?;
    scope.declare(variable_name.to_string(), loop_variable_type.clone());

    let condition_block = ctx.context.append_basic_block(function, "for_cond");
    let body_block = ctx.context.append_basic_block(function, "for_body");
    let increment_block = ctx.context.append_basic_block(function, "for_inc");
    let after_block = ctx.context.append_basic_block(function, "for_end");

    let llvm_type = ctx.get_llvm_type(&loop_variable_type);
    let int_type = llvm_type.into_int_type();

    ctx.builder.build_unconditional_branch(condition_block).map_err(llvm_err)?;

    ctx.builder.position_at_end(condition_block);
    let current = ctx.builder.build_load(int_type, pointer, "for_var").map_err(llvm_err)?.into_int_value();
    let condition = ctx
        .builder
        .build_int_compare(inkwell::IntPredicate::SLT, current, end.into_int_value(), "for_cmp")
        .map_err(llvm_err)?;
    ctx.builder.build_conditional_branch(condition, body_block, after_block).map_err(llvm_err)?;

    ctx.builder.position_at_end(body_block);
    ctx.push_block(BlockKind::Loop, increment_block, after_block);
    compile_block_body(ctx, module, db, scope, then_statements, target_triple)?;
    ctx.pop_block();
    if !ctx.current_block_is_terminated() {
        ctx.builder.build_unconditional_branch(increment_block).map_err(llvm_err)?;
    }

    ctx.builder.position_at_end(increment_block);
    let current = ctx.builder.build_load(int_type, pointer, "for_var").map_err(llvm_err)?.into_int_value();
    let step_value = step.map(|v| v.into_int_value()).unwrap_or_else(|| int_type.const_int(1, false));
    let next = ctx.builder.build_int_add(current, step_value, "for_next").map_err(llvm_err)?;
    ctx.builder.build_store(pointer, next).map_err(llvm_err)?;
    ctx.builder.build_unconditional_branch(condition_block).map_err(llvm_err)?;

    ctx.builder.position_at_end(after_block);
    scope.truncate_to(mark);
    ctx.exit_scope();
    Ok(())
}

fn compile_while_loop<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    condition: &Statement,
    then_statements: &[Statement],
    target_triple: &str,
) -> Result<(), CodegenError> {
    let function = current_function(ctx)?;
    let condition_block = ctx.context.append_basic_block(function, "while_cond");
    let body_block = ctx.context.append_basic_block(function, "while_body");
    let after_block = ctx.context.append_basic_block(function, "while_end");

    ctx.builder.build_unconditional_branch(condition_block).map_err(llvm_err)?;

    ctx.builder.position_at_end(condition_block);
    let condition_values = compile_statement(ctx, module, db, scope, condition, target_triple)?;
    let condition_value = root_value(condition, &condition_values)?;
    ctx.builder
        .build_conditional_branch(condition_value.into_int_value(), body_block, after_block)
        .map_err(llvm_err)?;

    ctx.builder.position_at_end(body_block);
    ctx.push_block(BlockKind::Loop, condition_block, after_block);
    compile_block_body(ctx, module, db, scope, then_statements, target_triple)?;
    ctx.pop_block();
    if !ctx.current_block_is_terminated() {
        ctx.builder.build_unconditional_branch(condition_block).map_err(llvm_err)?;
    }

    ctx.builder.position_at_end(after_block);
    Ok(())
}

/// C-style fallthrough switch: a case without an explicit trailing
/// `break` runs into the next case's body. A `break` inside a case
/// targets this switch's `after_block` through `BlockKind::Switch`;
/// `continue` stays transparent to it (`CodegenContext::nearest_repeat_block`
/// only matches `BlockKind::Loop`) and keeps searching outward.
fn compile_switch<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    switch_value: BasicValueEnum<'ctx>,
    cases: &[SwitchCase],
    values: &ValueMap<'ctx>,
    target_triple: &str,
) -> Result<(), CodegenError> {
    let function = current_function(ctx)?;
    let after_block = ctx.context.append_basic_block(function, "switch_end");

    let mut entries: Vec<(BasicBlock<'ctx>, Option<IntValue<'ctx>>, &Vec<Statement>)> = Vec::with_capacity(cases.len());
    for case in cases {
        let block = ctx.context.append_basic_block(function, "switch_case");
        let case_constant = match case.case_value {
            Some(index) => Some(values.get(&index).copied().ok_or(CodegenError::MissingValue(index.0))?.into_int_value()),
            None => None,
        };
        entries.push((block, case_constant, &case.statements));
    }

    let default_block = entries.iter().find(|(_, constant, _)| constant.is_none()).map(|(block, _, _)| *block).unwrap_or(after_block);
    let branch_table: Vec<(IntValue<'ctx>, BasicBlock<'ctx>)> = entries.iter().filter_map(|(block, constant, _)| constant.map(|value| (value, *block))).collect();

    ctx.builder.build_switch(switch_value.into_int_value(), default_block, &branch_table).map_err(llvm_err)?;

    ctx.push_block(BlockKind::Switch, after_block, after_block);
    for (position, (block, _, statements)) in entries.iter().enumerate() {
        ctx.builder.position_at_end(*block);
        compile_block_body(ctx, module, db, scope, statements, target_triple)?;
        if !ctx.current_block_is_terminated() {
            let fallthrough = entries.get(position + 1).map(|(block, _, _)| *block).unwrap_or(after_block);
            ctx.builder.build_unconditional_branch(fallthrough).map_err(llvm_err)?;
        }
    }
    ctx.pop_block();

    ctx.builder.position_at_end(after_block);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn compile_ternary<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    condition_value: BasicValueEnum<'ctx>,
    then_statement: &Statement,
    else_statement: &Statement,
    result_type: &TypeReference,
    target_triple: &str,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let function = current_function(ctx)?;
    let llvm_type = ctx.get_llvm_type(result_type);
    let slot = ctx.builder.build_alloca(llvm_type, "ternary").map_err(llvm_err)?;

    let then_block = ctx.context.append_basic_block(function, "ternary_then");
    let else_block = ctx.context.append_basic_block(function, "ternary_else");
    let merge_block = ctx.context.append_basic_block(function, "ternary_merge");

    ctx.builder
        .build_conditional_branch(condition_value.into_int_value(), then_block, else_block)
        .map_err(llvm_err)?;

    ctx.builder.position_at_end(then_block);
    let then_values = compile_statement(ctx, module, db, scope, then_statement, target_triple)?;
    let then_value = root_value(then_statement, &then_values)?;
    ctx.builder.build_store(slot, then_value).map_err(llvm_err)?;
    if !ctx.current_block_is_terminated() {
        ctx.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;
    }

    ctx.builder.position_at_end(else_block);
    let else_values = compile_statement(ctx, module, db, scope, else_statement, target_triple)?;
    let else_value = root_value(else_statement, &else_values)?;
    ctx.builder.build_store(slot, else_value).map_err(llvm_err)?;
    if !ctx.current_block_is_terminated() {
        ctx.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;
    }

    ctx.builder.position_at_end(merge_block);
    ctx.builder.build_load(llvm_type, slot, "ternary_value").map_err(llvm_err)
}

fn compile_return<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    value: Option<BasicValueEnum<'ctx>>,
    target_triple: &str,
) -> Result<(), CodegenError> {
    for deferred in ctx.take_defers() {
        compile_statement(ctx, module, db, scope, &deferred, target_triple)?;
    }

    match value {
        Some(value) => {
            let value: &dyn BasicValue = &value;
            ctx.builder.build_return(Some(value)).map_err(llvm_err)?;
        }
        None => {
            ctx.builder.build_return(None).map_err(llvm_err)?;
        }
    }

    Ok(())
}
