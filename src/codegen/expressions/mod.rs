//! Lowering for expression kinds that produce (or consume) a value in
//! place — everything except the control-flow forms, which live in
//! `codegen::statements` because they need fresh basic blocks and walk
//! their own nested `Statement`s rather than a single instruction
//! (spec.md §4.6).
//!
//! Every expression's type is derived on demand via
//! `analyzer::expr_type::get_expression_type` rather than from the
//! analyzer's precomputed `StatementTypes` tree: codegen walks the IR
//! builder's own live `Scope` (rebuilt as it lowers each statement) instead
//! of threading the analyzer's result alongside it, so re-deriving here is
//! simpler than looking a nested statement's entry up in that tree.

use std::collections::HashMap;

use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValue, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

use crate::analyzer::database::Database;
use crate::analyzer::expr_type;
use crate::analyzer::scope::Scope;
use crate::model::declaration::Declaration;
use crate::model::expr::{
    AccessType, BinaryOperation, CastType, Expression, ExpressionIndex, ExpressionKind, Statement, UnaryOperation, VariableDecl,
};
use crate::model::module::Module;
use crate::model::types::{FunctionType, TypeReference};

use super::abi::{self, ArgKind};
use super::context::{CodegenContext, Variable};
use super::statements;
use super::CodegenError;

pub type ValueMap<'ctx> = HashMap<ExpressionIndex, BasicValueEnum<'ctx>>;

pub(super) fn type_of(module: &Module, scope: &Scope, statement: &Statement, expression: &Expression, db: &Database) -> Option<TypeReference> {
    expr_type::get_expression_type(module, scope, statement, expression, db)
}

fn value_of<'ctx>(values: &ValueMap<'ctx>, index: ExpressionIndex) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    values.get(&index).copied().ok_or(CodegenError::MissingValue(index.0))
}

fn resolve_function_type(module: &Module, scope: &Scope, statement: &Statement, callee: ExpressionIndex, db: &Database) -> Option<FunctionType> {
    match type_of(module, scope, statement, statement.get(callee), db)? {
        TypeReference::Function(function_type) => Some(function_type),
        TypeReference::FunctionPointer(pointer) => Some((*pointer.function_type).clone()),
        _ => None,
    }
}

/// `Instantiate` expressions deduce no type of their own (`expr_type`
/// always returns `None` for them): the target struct/union type comes
/// from whatever consumes the literal — an assignment's declared/inferred
/// target type, a `return`'s function signature, a call argument's
/// parameter type, or (recursively) an enclosing `Instantiate`'s member
/// type. This walks `statement` once per pass, seeding every `Instantiate`
/// index it can resolve, and repeats until a pass makes no further
/// progress so nested literals pick up a type from the outer one.
pub(super) fn collect_instantiate_type_hints(ctx: &CodegenContext, module: &Module, scope: &Scope, statement: &Statement, db: &Database) -> HashMap<ExpressionIndex, TypeReference> {
    let mut hints: HashMap<ExpressionIndex, TypeReference> = HashMap::new();
    let is_instantiate = |index: ExpressionIndex| matches!(statement.get(index).kind, ExpressionKind::Instantiate { .. });

    for _ in 0..statement.expressions.len().max(1) {
        let mut changed = false;

        for (position, expression) in statement.expressions.iter().enumerate() {
            match &expression.kind {
                ExpressionKind::Assignment { target, source, .. } if is_instantiate(*source) && !hints.contains_key(source) => {
                    if let Some(target_type) = type_of(module, scope, statement, statement.get(*target), db) {
                        hints.insert(*source, target_type);
                        changed = true;
                    }
                }
                ExpressionKind::Call { callee, arguments } | ExpressionKind::InstanceCall { instance: callee, arguments } => {
                    if let Some(function_type) = resolve_function_type(module, scope, statement, *callee, db) {
                        for (argument_position, argument_index) in arguments.iter().enumerate() {
                            if is_instantiate(*argument_index) && !hints.contains_key(argument_index) {
                                if let Some(parameter_type) = function_type.input_parameter_types.get(argument_position) {
                                    hints.insert(*argument_index, parameter_type.clone());
                                    changed = true;
                                }
                            }
                        }
                    }
                }
                ExpressionKind::Return { value: Some(value_index) } if is_instantiate(*value_index) && !hints.contains_key(value_index) => {
                    if let Some(return_type) = ctx.current_return_type() {
                        hints.insert(*value_index, return_type);
                        changed = true;
                    }
                }
                ExpressionKind::Instantiate { members, .. } => {
                    let Some(target_type) = hints.get(&ExpressionIndex(position)).cloned() else { continue };
                    let Some(declaration) = db.find_underlying_declaration(&target_type) else { continue };
                    let member_layout = match declaration {
                        Declaration::Struct(s) => Some((s.member_names, s.member_types)),
                        Declaration::Union(u) => Some((u.member_names, u.member_types)),
                        _ => None,
                    };
                    let Some((member_names, member_types)) = member_layout else { continue };
                    for member in members {
                        if !is_instantiate(member.value) || hints.contains_key(&member.value) {
                            continue;
                        }
                        if let Some(field_index) = member_names.iter().position(|name| name == &member.member_name) {
                            hints.insert(member.value, member_types[field_index].clone());
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }

        if !changed {
            break;
        }
    }

    hints
}

/// Lowers a single expression, given that every child index already has an
/// entry in `values` (codegen visits a statement's expressions in
/// ascending index order: children are appended before the parents that
/// reference them).
#[allow(clippy::too_many_arguments)]
pub fn compile_expression<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    statement: &Statement,
    index: ExpressionIndex,
    expression: &Expression,
    values: &ValueMap<'ctx>,
    instantiate_hints: &HashMap<ExpressionIndex, TypeReference>,
    target_triple: &str,
) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
    let value = match &expression.kind {
        ExpressionKind::Constant { value_type, data } => Some(compile_constant(ctx, value_type, &data.value_text)?),
        ExpressionKind::NullPointer => Some(ctx.context.ptr_type(Default::default()).const_null().into()),
        ExpressionKind::Parenthesis { inner } => Some(value_of(values, *inner)?),
        ExpressionKind::Variable { name, access_type } => compile_variable(ctx, name, *access_type)?,
        ExpressionKind::Access { base, member_name, access_type } => {
            Some(compile_access(ctx, module, scope, statement, *base, member_name, *access_type, db, values)?)
        }
        ExpressionKind::DereferenceAndAccess { base, member_name } => {
            Some(compile_dereference_access(ctx, module, scope, statement, *base, member_name, db, values)?)
        }
        ExpressionKind::Binary { left_hand_side, right_hand_side, operation } => {
            let operand_type = type_of(module, scope, statement, statement.get(*left_hand_side), db).unwrap_or(TypeReference::NullPointer);
            Some(apply_binary(ctx, &operand_type, value_of(values, *left_hand_side)?, value_of(values, *right_hand_side)?, *operation)?)
        }
        ExpressionKind::Unary { expression: operand, operation } => {
            Some(compile_unary(ctx, module, scope, statement, *operand, *operation, db, values)?)
        }
        ExpressionKind::Cast { source, destination_type, cast_type } => {
            Some(compile_cast(ctx, module, scope, statement, *source, destination_type, *cast_type, db, values)?)
        }
        ExpressionKind::Assignment { target, source, compound_operation } => {
            compile_assignment(ctx, module, db, scope, statement, *target, *source, *compound_operation, values)?;
            None
        }
        ExpressionKind::Call { callee, arguments } => {
            Some(compile_call(ctx, module, scope, statement, *callee, arguments, db, values, target_triple)?)
        }
        ExpressionKind::InstanceCall { instance, arguments } => {
            Some(compile_call(ctx, module, scope, statement, *instance, arguments, db, values, target_triple)?)
        }
        ExpressionKind::Function { declaration_name } => {
            let function = find_function(ctx, declaration_name)?;
            Some(function.as_global_value().as_pointer_value().into())
        }
        ExpressionKind::Instantiate { members, .. } => {
            let target_type = instantiate_hints.get(&index).cloned().ok_or(CodegenError::MissingType(index.0))?;
            Some(compile_instantiate(ctx, &target_type, members, db, values)?)
        }
        ExpressionKind::ConstantArray { array_data } => {
            let array_type = type_of(module, scope, statement, expression, db).ok_or(CodegenError::MissingType(index.0))?;
            Some(compile_constant_array(ctx, module, db, scope, &array_type, array_data, target_triple)?)
        }
        ExpressionKind::VariableDecl(_) => None,
        ExpressionKind::VariableDeclWithType { decl, declared_type } => {
            let pointer = declare_local(ctx, &decl.name, declared_type)?;
            Some(pointer.into())
        }
        _ => None,
    };

    Ok(value)
}

/// Scope bookkeeping that mirrors `analyzer::visit_children`'s own
/// mutation of the same expression kinds, kept outside
/// `compile_expression` so callers can run it before or after lowering as
/// the control-flow statement compiler requires.
pub(super) fn declare_if_variable_decl(scope: &mut Scope, expression: &Expression) {
    match &expression.kind {
        ExpressionKind::VariableDecl(decl) => scope.declare(decl.name.clone(), TypeReference::NullPointer),
        ExpressionKind::VariableDeclWithType { decl, declared_type } => scope.declare(decl.name.clone(), declared_type.clone()),
        _ => {}
    }
}

pub(super) fn declare_local<'ctx>(ctx: &CodegenContext<'ctx>, name: &str, type_reference: &TypeReference) -> Result<PointerValue<'ctx>, CodegenError> {
    let llvm_type = ctx.get_llvm_type(type_reference);
    let pointer = ctx.builder.build_alloca(llvm_type, name).map_err(|error| CodegenError::Llvm(error.to_string()))?;
    ctx.declare_variable(
        name,
        Variable {
            pointer,
            llvm_type,
            type_reference: type_reference.clone(),
        },
    );
    Ok(pointer)
}

fn compile_constant<'ctx>(ctx: &CodegenContext<'ctx>, value_type: &TypeReference, text: &str) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    if value_type.is_bool() {
        let value = text == "true" || text == "1";
        return Ok(ctx.context.bool_type().const_int(value as u64, false).into());
    }

    if value_type.is_c_string() {
        let global = ctx.builder.build_global_string_ptr(text, "str").map_err(|error| CodegenError::Llvm(error.to_string()))?;
        return Ok(global.as_pointer_value().into());
    }

    if value_type.is_floating_point() {
        let parsed: f64 = text.parse().map_err(|_| CodegenError::InvalidConstant(text.to_string()))?;
        let BasicTypeEnum::FloatType(float_type) = ctx.get_llvm_type(value_type) else {
            return Err(CodegenError::InvalidConstant(text.to_string()));
        };
        return Ok(float_type.const_float(parsed).into());
    }

    if value_type.is_integer() {
        let BasicTypeEnum::IntType(int_type) = ctx.get_llvm_type(value_type) else {
            return Err(CodegenError::InvalidConstant(text.to_string()));
        };
        let parsed: i64 = text.parse().map_err(|_| CodegenError::InvalidConstant(text.to_string()))?;
        return Ok(int_type.const_int(parsed as u64, value_type.is_signed_integer()).into());
    }

    Err(CodegenError::InvalidConstant(text.to_string()))
}

fn compile_variable<'ctx>(ctx: &CodegenContext<'ctx>, name: &str, access_type: AccessType) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
    if let Some(variable) = ctx.find_variable(name) {
        return match access_type {
            AccessType::Write => Ok(Some(variable.pointer.into())),
            AccessType::Read => ctx
                .builder
                .build_load(variable.llvm_type, variable.pointer, name)
                .map(Some)
                .map_err(|error| CodegenError::Llvm(error.to_string())),
        };
    }

    if let Some(function) = ctx.module.get_function(name) {
        return Ok(Some(function.as_global_value().as_pointer_value().into()));
    }

    // A module alias (an imported namespace, referenced only via `Access`)
    // never has a runtime value of its own.
    Ok(None)
}

fn find_function<'ctx>(ctx: &CodegenContext<'ctx>, name: &str) -> Result<FunctionValue<'ctx>, CodegenError> {
    ctx.module.get_function(name).ok_or_else(|| CodegenError::UnknownFunction(name.to_string()))
}

fn member_offset(member_names: &[String], member_name: &str) -> Result<u32, CodegenError> {
    member_names
        .iter()
        .position(|name| name == member_name)
        .map(|position| position as u32)
        .ok_or_else(|| CodegenError::UnknownMember(member_name.to_string()))
}

#[allow(clippy::too_many_arguments)]
fn compile_access<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    base: ExpressionIndex,
    member_name: &str,
    access_type: AccessType,
    db: &Database,
    values: &ValueMap<'ctx>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let base_type = type_of(module, scope, statement, statement.get(base), db).ok_or(CodegenError::MissingType(base.0))?;

    if db.is_enum_type(&base_type) {
        return compile_enum_member(ctx, db, &base_type, member_name);
    }

    let base_expression = statement.get(base);
    let base_is_lvalue = matches!(base_expression.kind, ExpressionKind::Variable { .. } | ExpressionKind::Access { .. });

    let base_pointer = if base_is_lvalue {
        value_of(values, base)?.into_pointer_value()
    } else {
        let base_value = value_of(values, base)?;
        let slot = ctx.builder.build_alloca(base_value.get_type(), "access_tmp").map_err(|error| CodegenError::Llvm(error.to_string()))?;
        ctx.builder.build_store(slot, base_value).map_err(|error| CodegenError::Llvm(error.to_string()))?;
        slot
    };

    compile_member_access(ctx, db, &base_type, base_pointer, member_name, access_type)
}

#[allow(clippy::too_many_arguments)]
fn compile_dereference_access<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    base: ExpressionIndex,
    member_name: &str,
    db: &Database,
    values: &ValueMap<'ctx>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let pointer_type = type_of(module, scope, statement, statement.get(base), db).ok_or(CodegenError::MissingType(base.0))?;
    let pointee_type = pointer_type.remove_pointer().ok_or_else(|| CodegenError::UnknownMember(member_name.to_string()))?;
    let base_pointer = value_of(values, base)?.into_pointer_value();
    compile_member_access(ctx, db, &pointee_type, base_pointer, member_name, AccessType::Read)
}

fn compile_enum_member<'ctx>(ctx: &CodegenContext<'ctx>, db: &Database, base_type: &TypeReference, member_name: &str) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let Some(Declaration::Enum(declaration)) = db.find_underlying_declaration(base_type) else {
        return Err(CodegenError::UnknownMember(member_name.to_string()));
    };
    let mut running = -1i64;
    for value in &declaration.values {
        running = match &value.value {
            None => running + 1,
            Some(statement) => evaluate_enum_literal(statement).unwrap_or(running + 1),
        };
        if value.name == member_name {
            return Ok(ctx.context.i32_type().const_int(running as u64, true).into());
        }
    }
    Err(CodegenError::UnknownMember(member_name.to_string()))
}

fn evaluate_enum_literal(statement: &Statement) -> Option<i64> {
    match &statement.root()?.kind {
        ExpressionKind::Constant { data, .. } => data.value_text.parse().ok(),
        _ => None,
    }
}

fn compile_member_access<'ctx>(
    ctx: &CodegenContext<'ctx>,
    db: &Database,
    aggregate_type: &TypeReference,
    base_pointer: PointerValue<'ctx>,
    member_name: &str,
    access_type: AccessType,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let declaration = db.find_underlying_declaration(aggregate_type).ok_or_else(|| CodegenError::UnknownMember(member_name.to_string()))?;

    let (member_types, field_index) = match declaration {
        Declaration::Struct(s) => (s.member_types, member_offset(&s.member_names, member_name)?),
        Declaration::Union(u) => (u.member_types, member_offset(&u.member_names, member_name)?),
        _ => return Err(CodegenError::UnknownMember(member_name.to_string())),
    };

    let member_type = &member_types[field_index as usize];
    let llvm_aggregate_type = ctx.get_llvm_type(aggregate_type);
    let llvm_member_type = ctx.get_llvm_type(member_type);

    let field_pointer = match llvm_aggregate_type {
        BasicTypeEnum::StructType(struct_type) => ctx
            .builder
            .build_struct_gep(struct_type, base_pointer, field_index, member_name)
            .map_err(|error| CodegenError::Llvm(error.to_string()))?,
        // Unions are modeled as a flat byte array (codegen::util); every
        // member aliases offset zero, reinterpreted through its own type.
        _ => base_pointer,
    };

    match access_type {
        AccessType::Write => Ok(field_pointer.into()),
        AccessType::Read => ctx
            .builder
            .build_load(llvm_member_type, field_pointer, member_name)
            .map_err(|error| CodegenError::Llvm(error.to_string())),
    }
}

fn apply_binary<'ctx>(
    ctx: &CodegenContext<'ctx>,
    operand_type: &TypeReference,
    left: BasicValueEnum<'ctx>,
    right: BasicValueEnum<'ctx>,
    operation: BinaryOperation,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let builder = &ctx.builder;
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());

    if operand_type.is_floating_point() {
        let (left, right) = (left.into_float_value(), right.into_float_value());
        return match operation {
            BinaryOperation::Add => builder.build_float_add(left, right, "fadd").map(BasicValueEnum::from),
            BinaryOperation::Subtract => builder.build_float_sub(left, right, "fsub").map(BasicValueEnum::from),
            BinaryOperation::Multiply => builder.build_float_mul(left, right, "fmul").map(BasicValueEnum::from),
            BinaryOperation::Divide => builder.build_float_div(left, right, "fdiv").map(BasicValueEnum::from),
            BinaryOperation::Modulo => builder.build_float_rem(left, right, "frem").map(BasicValueEnum::from),
            BinaryOperation::Equal => builder.build_float_compare(FloatPredicate::OEQ, left, right, "feq").map(BasicValueEnum::from),
            BinaryOperation::NotEqual => builder.build_float_compare(FloatPredicate::ONE, left, right, "fne").map(BasicValueEnum::from),
            BinaryOperation::LessThan => builder.build_float_compare(FloatPredicate::OLT, left, right, "flt").map(BasicValueEnum::from),
            BinaryOperation::LessThanOrEqual => builder.build_float_compare(FloatPredicate::OLE, left, right, "fle").map(BasicValueEnum::from),
            BinaryOperation::GreaterThan => builder.build_float_compare(FloatPredicate::OGT, left, right, "fgt").map(BasicValueEnum::from),
            BinaryOperation::GreaterThanOrEqual => builder.build_float_compare(FloatPredicate::OGE, left, right, "fge").map(BasicValueEnum::from),
            _ => Err(CodegenError::UnsupportedOperation(format!("{operation:?} on floating point"))),
        }
        .map_err(err);
    }

    if operand_type.is_bool() {
        let (left, right) = (left.into_int_value(), right.into_int_value());
        return match operation {
            BinaryOperation::LogicalAnd => builder.build_and(left, right, "and"),
            BinaryOperation::LogicalOr => builder.build_or(left, right, "or"),
            BinaryOperation::Equal => builder.build_int_compare(IntPredicate::EQ, left, right, "eq"),
            BinaryOperation::NotEqual => builder.build_int_compare(IntPredicate::NE, left, right, "ne"),
            _ => return Err(CodegenError::UnsupportedOperation(format!("{operation:?} on bool"))),
        }
        .map(BasicValueEnum::from)
        .map_err(err);
    }

    // Integer, pointer-as-integer, or enum-backing-integer arithmetic.
    let (left, right) = (left.into_int_value(), right.into_int_value());
    let signed = operand_type.is_signed_integer();
    match operation {
        BinaryOperation::Add => builder.build_int_add(left, right, "add").map(BasicValueEnum::from),
        BinaryOperation::Subtract => builder.build_int_sub(left, right, "sub").map(BasicValueEnum::from),
        BinaryOperation::Multiply => builder.build_int_mul(left, right, "mul").map(BasicValueEnum::from),
        BinaryOperation::Divide if signed => builder.build_int_signed_div(left, right, "sdiv").map(BasicValueEnum::from),
        BinaryOperation::Divide => builder.build_int_unsigned_div(left, right, "udiv").map(BasicValueEnum::from),
        BinaryOperation::Modulo if signed => builder.build_int_signed_rem(left, right, "srem").map(BasicValueEnum::from),
        BinaryOperation::Modulo => builder.build_int_unsigned_rem(left, right, "urem").map(BasicValueEnum::from),
        BinaryOperation::BitwiseAnd => builder.build_and(left, right, "band").map(BasicValueEnum::from),
        BinaryOperation::BitwiseOr => builder.build_or(left, right, "bor").map(BasicValueEnum::from),
        BinaryOperation::BitwiseXor => builder.build_xor(left, right, "bxor").map(BasicValueEnum::from),
        BinaryOperation::ShiftLeft => builder.build_left_shift(left, right, "shl").map(BasicValueEnum::from),
        BinaryOperation::ShiftRight => builder.build_right_shift(left, right, signed, "shr").map(BasicValueEnum::from),
        BinaryOperation::Equal | BinaryOperation::Has => builder.build_int_compare(IntPredicate::EQ, left, right, "eq").map(BasicValueEnum::from),
        BinaryOperation::NotEqual => builder.build_int_compare(IntPredicate::NE, left, right, "ne").map(BasicValueEnum::from),
        BinaryOperation::LessThan => builder
            .build_int_compare(if signed { IntPredicate::SLT } else { IntPredicate::ULT }, left, right, "lt")
            .map(BasicValueEnum::from),
        BinaryOperation::LessThanOrEqual => builder
            .build_int_compare(if signed { IntPredicate::SLE } else { IntPredicate::ULE }, left, right, "le")
            .map(BasicValueEnum::from),
        BinaryOperation::GreaterThan => builder
            .build_int_compare(if signed { IntPredicate::SGT } else { IntPredicate::UGT }, left, right, "gt")
            .map(BasicValueEnum::from),
        BinaryOperation::GreaterThanOrEqual => builder
            .build_int_compare(if signed { IntPredicate::SGE } else { IntPredicate::UGE }, left, right, "ge")
            .map(BasicValueEnum::from),
        BinaryOperation::LogicalAnd => builder.build_and(left, right, "and").map(BasicValueEnum::from),
        BinaryOperation::LogicalOr => builder.build_or(left, right, "or").map(BasicValueEnum::from),
    }
    .map_err(err)
}

#[allow(clippy::too_many_arguments)]
fn compile_unary<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    operand_index: ExpressionIndex,
    operation: UnaryOperation,
    db: &Database,
    values: &ValueMap<'ctx>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let operand = value_of(values, operand_index)?;
    let operand_type = || type_of(module, scope, statement, statement.get(operand_index), db).ok_or(CodegenError::MissingType(operand_index.0));
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());

    match operation {
        UnaryOperation::AddressOf => Ok(operand),
        UnaryOperation::Indirection => {
            let pointee_type = operand_type()?.remove_pointer().ok_or_else(|| CodegenError::UnsupportedOperation("'*' on non-pointer".into()))?;
            let llvm_pointee = ctx.get_llvm_type(&pointee_type);
            ctx.builder.build_load(llvm_pointee, operand.into_pointer_value(), "deref").map_err(err)
        }
        UnaryOperation::Not | UnaryOperation::BitwiseNot => ctx.builder.build_not(operand.into_int_value(), "not").map(BasicValueEnum::from).map_err(err),
        UnaryOperation::Minus if operand_type()?.is_floating_point() => ctx.builder.build_float_neg(operand.into_float_value(), "fneg").map(BasicValueEnum::from).map_err(err),
        UnaryOperation::Minus => ctx.builder.build_int_neg(operand.into_int_value(), "neg").map(BasicValueEnum::from).map_err(err),
        UnaryOperation::PreIncrement | UnaryOperation::PreDecrement | UnaryOperation::PostIncrement | UnaryOperation::PostDecrement => {
            compile_increment_decrement(ctx, statement, operand_index, operation, operand_type()?)
        }
    }
}

fn compile_increment_decrement<'ctx>(
    ctx: &CodegenContext<'ctx>,
    statement: &Statement,
    operand_index: ExpressionIndex,
    operation: UnaryOperation,
    operand_type: TypeReference,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let ExpressionKind::Variable { name, .. } = &statement.get(operand_index).kind else {
        return Err(CodegenError::UnsupportedOperation("increment/decrement target must be a variable".into()));
    };
    let variable = ctx.find_variable(name).ok_or_else(|| CodegenError::UnknownVariable(name.clone()))?;
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());

    let current = ctx.builder.build_load(variable.llvm_type, variable.pointer, name).map_err(err)?;
    let one = ctx.get_llvm_type(&operand_type).into_int_type().const_int(1, false);
    let is_increment = matches!(operation, UnaryOperation::PreIncrement | UnaryOperation::PostIncrement);
    let updated = if is_increment {
        ctx.builder.build_int_add(current.into_int_value(), one, "inc")
    } else {
        ctx.builder.build_int_sub(current.into_int_value(), one, "dec")
    }
    .map_err(err)?;

    ctx.builder.build_store(variable.pointer, updated).map_err(err)?;

    let is_pre = matches!(operation, UnaryOperation::PreIncrement | UnaryOperation::PreDecrement);
    Ok(if is_pre { updated.into() } else { current })
}

#[allow(clippy::too_many_arguments)]
fn compile_cast<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    source_index: ExpressionIndex,
    destination_type: &TypeReference,
    _cast_type: CastType,
    db: &Database,
    values: &ValueMap<'ctx>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let source_type = type_of(module, scope, statement, statement.get(source_index), db).ok_or(CodegenError::MissingType(source_index.0))?;
    let source_value = value_of(values, source_index)?;
    let destination_llvm = ctx.get_llvm_type(destination_type);
    let builder = &ctx.builder;
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());

    let source_is_float = source_type.is_floating_point();
    let destination_is_float = destination_type.is_floating_point();

    match (source_is_float, destination_is_float) {
        (true, true) => {
            let destination_float = destination_llvm.into_float_type();
            builder.build_float_cast(source_value.into_float_value(), destination_float, "fcast").map(BasicValueEnum::from)
        }
        (true, false) => {
            let destination_int = destination_llvm.into_int_type();
            if destination_type.is_signed_integer() {
                builder.build_float_to_signed_int(source_value.into_float_value(), destination_int, "fptosi").map(BasicValueEnum::from)
            } else {
                builder.build_float_to_unsigned_int(source_value.into_float_value(), destination_int, "fptoui").map(BasicValueEnum::from)
            }
        }
        (false, true) => {
            let destination_float = destination_llvm.into_float_type();
            if source_type.is_signed_integer() {
                builder.build_signed_int_to_float(source_value.into_int_value(), destination_float, "sitofp").map(BasicValueEnum::from)
            } else {
                builder.build_unsigned_int_to_float(source_value.into_int_value(), destination_float, "uitofp").map(BasicValueEnum::from)
            }
        }
        (false, false) => {
            let destination_int = destination_llvm.into_int_type();
            let source_int = source_value.into_int_value();
            let source_bits = source_int.get_type().get_bit_width();
            let destination_bits = destination_int.get_bit_width();
            if destination_bits == source_bits {
                builder.build_bit_cast(source_int, destination_int, "bitcast").map(|value| value.into())
            } else if destination_bits < source_bits {
                builder.build_int_truncate(source_int, destination_int, "trunc").map(BasicValueEnum::from)
            } else if source_type.is_signed_integer() {
                builder.build_int_s_extend(source_int, destination_int, "sext").map(BasicValueEnum::from)
            } else {
                builder.build_int_z_extend(source_int, destination_int, "zext").map(BasicValueEnum::from)
            }
        }
    }
    .map_err(err)
}

#[allow(clippy::too_many_arguments)]
fn compile_assignment<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    statement: &Statement,
    target_index: ExpressionIndex,
    source_index: ExpressionIndex,
    compound_operation: Option<BinaryOperation>,
    values: &ValueMap<'ctx>,
) -> Result<(), CodegenError> {
    let source_value = value_of(values, source_index)?;
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());

    // `var x = expr;` without an explicit type: the declaration itself
    // typed to `NullPointer` (analyzer::expr_type's placeholder for an
    // unannotated `VariableDecl`), so the alloca's real type comes from
    // the initializer instead.
    if let ExpressionKind::VariableDecl(VariableDecl { name, .. }) = &statement.get(target_index).kind {
        let source_type = type_of(module, scope, statement, statement.get(source_index), db).unwrap_or(TypeReference::NullPointer);
        let pointer = declare_local(ctx, name, &source_type)?;
        scope.declare(name.clone(), source_type);
        ctx.builder.build_store(pointer, source_value).map_err(err)?;
        return Ok(());
    }

    let target_pointer = value_of(values, target_index)?.into_pointer_value();

    let value_to_store = match compound_operation {
        None => source_value,
        Some(operation) => {
            let target_type = type_of(module, scope, statement, statement.get(target_index), db).unwrap_or(TypeReference::NullPointer);
            let current = ctx.builder.build_load(ctx.get_llvm_type(&target_type), target_pointer, "compound_lhs").map_err(err)?;
            apply_binary(ctx, &target_type, current, source_value, operation)?
        }
    };

    ctx.builder.build_store(target_pointer, value_to_store).map_err(err)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn compile_call<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    scope: &Scope,
    statement: &Statement,
    callee_index: ExpressionIndex,
    arguments: &[ExpressionIndex],
    db: &Database,
    values: &ValueMap<'ctx>,
    target_triple: &str,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let function_type = resolve_function_type(module, scope, statement, callee_index, db).ok_or(CodegenError::MissingType(callee_index.0))?;

    let callee_value = value_of(values, callee_index)?;
    let BasicValueEnum::PointerValue(callee_pointer) = callee_value else {
        return Err(CodegenError::UnsupportedOperation("callee is not a function pointer".into()));
    };
    let function = find_function_by_pointer(ctx, callee_pointer)?;

    let mut compiled_arguments = Vec::with_capacity(arguments.len());
    for (position, argument_index) in arguments.iter().enumerate() {
        let argument_value = value_of(values, *argument_index)?;
        let classification = function_type.input_parameter_types.get(position).map(|t| abi::classify_argument(ctx, target_triple, t));
        match classification {
            Some(classification) if classification.kind == ArgKind::Direct && classification.eightbytes.len() > 1 => {
                compiled_arguments.extend(split_struct_argument(ctx, argument_value, &classification)?);
            }
            Some(classification) if classification.kind == ArgKind::Indirect => {
                let temporary = ctx.builder.build_alloca(argument_value.get_type(), "indirect_arg").map_err(|error| CodegenError::Llvm(error.to_string()))?;
                ctx.builder.build_store(temporary, argument_value).map_err(|error| CodegenError::Llvm(error.to_string()))?;
                compiled_arguments.push(temporary.into());
            }
            _ => compiled_arguments.push(argument_value),
        }
    }

    let argument_metadata: Vec<inkwell::values::BasicMetadataValueEnum> = compiled_arguments.into_iter().map(Into::into).collect();
    let call_site = ctx.builder.build_call(function, &argument_metadata, "call").map_err(|error| CodegenError::Llvm(error.to_string()))?;
    call_site.try_as_basic_value().left().ok_or(CodegenError::VoidValueUsed)
}

fn split_struct_argument<'ctx>(ctx: &CodegenContext<'ctx>, aggregate: BasicValueEnum<'ctx>, classification: &abi::ArgClassification) -> Result<Vec<BasicValueEnum<'ctx>>, CodegenError> {
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());
    let slot = ctx.builder.build_alloca(aggregate.get_type(), "coerce_tmp").map_err(err)?;
    ctx.builder.build_store(slot, aggregate).map_err(err)?;

    let mut pieces = Vec::with_capacity(classification.eightbytes.len());
    for index in 0..classification.eightbytes.len() {
        let offset = ctx.context.i32_type().const_int(index as u64, false);
        let element_pointer = unsafe { ctx.builder.build_gep(ctx.context.i64_type(), slot, &[offset], "eightbyte").map_err(err)? };
        pieces.push(ctx.builder.build_load(ctx.context.i64_type(), element_pointer, "eightbyte_val").map_err(err)?);
    }
    Ok(pieces)
}

fn find_function_by_pointer<'ctx>(ctx: &CodegenContext<'ctx>, pointer: PointerValue<'ctx>) -> Result<FunctionValue<'ctx>, CodegenError> {
    ctx.module
        .get_functions()
        .find(|f| f.as_global_value().as_pointer_value() == pointer)
        .ok_or_else(|| CodegenError::UnsupportedOperation("indirect calls through a non-named function pointer are not supported".into()))
}

fn compile_instantiate<'ctx>(
    ctx: &CodegenContext<'ctx>,
    target_type: &TypeReference,
    members: &[crate::model::expr::InstantiateMemberValuePair],
    db: &Database,
    values: &ValueMap<'ctx>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());
    let declaration = db.find_underlying_declaration(target_type).ok_or_else(|| CodegenError::UnsupportedOperation("instantiate target is not a struct/union".into()))?;

    let member_names = match &declaration {
        Declaration::Struct(s) => s.member_names.clone(),
        Declaration::Union(u) => u.member_names.clone(),
        _ => return Err(CodegenError::UnsupportedOperation("instantiate target is not a struct/union".into())),
    };

    let llvm_type = ctx.get_llvm_type(target_type);
    let slot = ctx.builder.build_alloca(llvm_type, "instantiate").map_err(err)?;

    for member in members {
        let field_index = member_offset(&member_names, &member.member_name)?;
        let value = value_of(values, member.value)?;
        let field_pointer = match llvm_type {
            BasicTypeEnum::StructType(struct_type) => ctx.builder.build_struct_gep(struct_type, slot, field_index, &member.member_name).map_err(err)?,
            _ => slot,
        };
        ctx.builder.build_store(field_pointer, value).map_err(err)?;
    }

    ctx.builder.build_load(llvm_type, slot, "instantiate_value").map_err(err)
}

fn compile_constant_array<'ctx>(
    ctx: &CodegenContext<'ctx>,
    module: &Module,
    db: &Database,
    scope: &mut Scope,
    array_type: &TypeReference,
    array_data: &[Statement],
    target_triple: &str,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let err = |e: inkwell::builder::BuilderError| CodegenError::Llvm(e.to_string());
    let llvm_type = ctx.get_llvm_type(array_type);
    let BasicTypeEnum::ArrayType(array_llvm_type) = llvm_type else {
        return Err(CodegenError::UnsupportedOperation("constant array does not have array type".into()));
    };

    let slot = ctx.builder.build_alloca(array_llvm_type, "array").map_err(err)?;

    for (element_index, element_statement) in array_data.iter().enumerate() {
        if element_statement.root().is_none() {
            continue;
        }
        let root_index = ExpressionIndex(element_statement.expressions.len() - 1);
        let element_values = statements::compile_statement(ctx, module, db, scope, element_statement, target_triple)?;
        let element_value = element_values.get(&root_index).copied().ok_or(CodegenError::MissingValue(root_index.0))?;

        let offset = ctx.context.i32_type().const_int(0, false);
        let element_offset = ctx.context.i32_type().const_int(element_index as u64, false);
        let element_pointer = unsafe { ctx.builder.build_gep(array_llvm_type, slot, &[offset, element_offset], "array_elem").map_err(err)? };
        ctx.builder.build_store(element_pointer, element_value).map_err(err)?;
    }

    ctx.builder.build_load(llvm_type, slot, "array_value").map_err(err)
}
