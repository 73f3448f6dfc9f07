//! LLVM code generation (spec.md §4.6-§4.7).
//!
//! Takes a validated `Module`/`DefinitionBank` pair and a `Database` of
//! declarations and lowers every function definition to LLVM IR, one
//! `inkwell::context::Context`-scoped `CodegenContext` per compiled
//! module. Submodule layout:
//!
//! - `context` — the `CodegenContext`/variable-scope/block-stack state
//!   threaded through every lowering call.
//! - `util` — `TypeReference` → LLVM type conversion.
//! - `abi` — C-ABI argument classification for calls across the language
//!   boundary.
//! - `expressions` — value-producing expression kinds.
//! - `statements` — control-flow statement kinds and the per-`Statement`
//!   driver.
//!
//! Every statement/expression's type is derived on demand through
//! `analyzer::expr_type::get_expression_type` rather than read from a
//! precomputed map, since the analyzer only stores one per top-level
//! function statement (see `context` module docs and `analyzer::mod`).
//! Codegen keeps its own `analyzer::scope::Scope`, built fresh per
//! function and mutated in lockstep with the analyzer's own traversal
//! order, purely to support those on-demand lookups.

pub mod abi;
pub mod context;
pub mod expressions;
pub mod statements;
pub mod util;

use std::error::Error;
use std::fmt;

use inkwell::context::Context;
use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::AddressSpace;

use crate::analyzer::database::Database;
use crate::analyzer::scope::Scope;
use crate::model::declaration::{Declaration, FunctionDeclaration, FunctionDefinition, Linkage as ModelLinkage};
use crate::model::module::Module;

use context::{CodegenContext, Variable};

#[derive(Debug)]
pub enum CodegenError {
    Llvm(String),
    MissingType(usize),
    MissingValue(usize),
    InvalidConstant(String),
    UnknownFunction(String),
    UnknownMember(String),
    UnknownVariable(String),
    UnsupportedOperation(String),
    VoidValueUsed,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::Llvm(message) => write!(f, "LLVM error: {message}"),
            CodegenError::MissingType(index) => write!(f, "no deduced type for expression #{index}"),
            CodegenError::MissingValue(index) => write!(f, "no compiled value for expression #{index}"),
            CodegenError::InvalidConstant(text) => write!(f, "invalid constant literal '{text}'"),
            CodegenError::UnknownFunction(name) => write!(f, "reference to unknown function '{name}'"),
            CodegenError::UnknownMember(name) => write!(f, "reference to unknown member '{name}'"),
            CodegenError::UnknownVariable(name) => write!(f, "reference to unknown variable '{name}'"),
            CodegenError::UnsupportedOperation(message) => write!(f, "unsupported operation: {message}"),
            CodegenError::VoidValueUsed => write!(f, "a void-returning call was used as a value"),
        }
    }
}

impl Error for CodegenError {}

/// Declares every function (and the C-linkage externs it calls into) in
/// `ctx.module` without generating a body, so forward/mutually-recursive
/// calls resolve regardless of definition order.
pub fn declare_functions(ctx: &CodegenContext, db: &Database) -> Result<(), CodegenError> {
    for (module_name, module) in db.modules() {
        let names: Vec<String> = module.exported_names().chain(module.internal_declarations.names()).map(str::to_string).collect();
        for name in names {
            let Some(declaration) = db.find_function_declaration(&module_name, &name) else {
                continue;
            };
            declare_function(ctx, &declaration)?;
        }
    }
    Ok(())
}

fn declare_function<'ctx>(ctx: &CodegenContext<'ctx>, declaration: &FunctionDeclaration) -> Result<inkwell::values::FunctionValue<'ctx>, CodegenError> {
    let symbol_name = declaration.unique_name.as_deref().unwrap_or(&declaration.name);
    if let Some(existing) = ctx.module.get_function(symbol_name) {
        return Ok(existing);
    }

    let parameter_types: Vec<BasicMetadataTypeEnum> = declaration
        .input_parameters
        .iter()
        .map(|parameter| ctx.get_llvm_type(&parameter.parameter_type).into())
        .collect();

    let llvm_function_type = match declaration.output_parameter_types.first() {
        None => ctx.context.void_type().fn_type(&parameter_types, declaration.is_variadic),
        Some(output_type) => ctx.get_llvm_type(output_type).fn_type(&parameter_types, declaration.is_variadic),
    };

    let linkage = match declaration.linkage {
        ModelLinkage::External => Linkage::External,
        ModelLinkage::Internal => Linkage::Internal,
    };
    Ok(ctx.module.add_function(symbol_name, llvm_function_type, Some(linkage)))
}

/// Lowers every function body in `definitions`, assuming `declare_functions`
/// has already run over the whole program so calls resolve.
pub fn compile_definitions(ctx: &CodegenContext, module: &Module, db: &Database, definitions: &[FunctionDefinition], target_triple: &str) -> Result<(), CodegenError> {
    for definition in definitions {
        compile_function(ctx, module, db, definition, target_triple)?;
    }
    Ok(())
}

fn compile_function(ctx: &CodegenContext, module: &Module, db: &Database, definition: &FunctionDefinition, target_triple: &str) -> Result<(), CodegenError> {
    let Some(declaration) = db.find_function_declaration(&module.name, &definition.name) else {
        return Err(CodegenError::UnknownFunction(definition.name.clone()));
    };

    let function = declare_function(ctx, &declaration)?;
    // `is_function_constructor()` definitions (a struct/union's implicit
    // "new" initializer) carry no user-written body to lower; the
    // declaration alone is what callers link against.
    if declaration.is_function_constructor() {
        return Ok(());
    }

    let entry_block = ctx.context.append_basic_block(function, "entry");
    ctx.builder.position_at_end(entry_block);

    let mut scope = Scope::new();
    ctx.enter_scope();
    ctx.set_current_return_type(declaration.output_parameter_types.first().cloned());

    for (position, parameter) in declaration.input_parameters.iter().enumerate() {
        let llvm_value = function.get_nth_param(position as u32).ok_or_else(|| CodegenError::UnknownVariable(parameter.name.clone()))?;
        let llvm_type = ctx.get_llvm_type(&parameter.parameter_type);
        let pointer = ctx.builder.build_alloca(llvm_type, &parameter.name).map_err(|error| CodegenError::Llvm(error.to_string()))?;
        ctx.builder.build_store(pointer, llvm_value).map_err(|error| CodegenError::Llvm(error.to_string()))?;
        ctx.declare_variable(
            parameter.name.as_str(),
            Variable {
                pointer,
                llvm_type,
                type_reference: parameter.parameter_type.clone(),
            },
        );
        scope.declare(parameter.name.clone(), parameter.parameter_type.clone());
    }

    for statement in &definition.statements {
        if ctx.current_block_is_terminated() {
            break;
        }
        statements::compile_statement(ctx, module, db, &mut scope, statement, target_triple)?;
    }

    if !ctx.current_block_is_terminated() {
        for deferred in ctx.take_defers() {
            statements::compile_statement(ctx, module, db, &mut scope, &deferred, target_triple)?;
        }
        if declaration.output_parameter_types.is_empty() {
            ctx.builder.build_return(None).map_err(|error| CodegenError::Llvm(error.to_string()))?;
        } else {
            // A non-void function whose control flow falls off the end
            // without every path returning is a validator-caught error
            // (spec.md §4.5); codegen only needs a well-formed terminator
            // so the module still verifies.
            ctx.builder.build_unreachable().map_err(|error| CodegenError::Llvm(error.to_string()))?;
        }
    }

    ctx.set_current_return_type(None);
    ctx.exit_scope();
    Ok(())
}

/// Declares every global variable so later function bodies can reference
/// them regardless of declaration order, mirroring `declare_functions`.
pub fn declare_globals(ctx: &CodegenContext, db: &Database) -> Result<(), CodegenError> {
    for (module_name, module) in db.modules() {
        let names: Vec<String> = module.exported_names().chain(module.internal_declarations.names()).map(str::to_string).collect();
        for name in names {
            let Some(Declaration::GlobalVariable(declaration)) = db.find_declaration(&module_name, &name) else {
                continue;
            };
            let llvm_type = ctx.get_llvm_type(&declaration.declared_type);
            let symbol_name = declaration.unique_name.as_deref().unwrap_or(&declaration.name);
            let global = ctx.module.add_global(llvm_type, Some(AddressSpace::default()), symbol_name);
            global.set_initializer(&llvm_type.const_zero());
        }
    }
    Ok(())
}

/// Entry point for a whole program: creates the `inkwell::context::Context`
/// the caller keeps alive for the lifetime of the returned module string,
/// declares every function/global, then compiles every definition.
pub fn compile_module_declarations<'ctx>(context: &'ctx Context, module_name: &str, db: &'ctx Database) -> Result<CodegenContext<'ctx>, CodegenError> {
    let ctx = CodegenContext::new(context, module_name, db);
    declare_globals(&ctx, db)?;
    declare_functions(&ctx, db)?;
    Ok(ctx)
}
