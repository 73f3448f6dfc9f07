//! Conversion from `model::types::TypeReference` to LLVM types, and a
//! handful of shared numeric/predicate helpers used by both the
//! expression and statement emitters.

use inkwell::context::Context;
use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::AddressSpace;

use crate::model::declaration::Declaration;
use crate::model::types::{CustomTypeReference, FundamentalType, TypeReference};

use super::context::CodegenContext;

pub fn type_reference_to_llvm_type<'ctx>(
    ctx: &CodegenContext<'ctx>,
    type_reference: &TypeReference,
) -> BasicTypeEnum<'ctx> {
    match type_reference {
        TypeReference::Builtin(_) => ctx.context.ptr_type(AddressSpace::default()).into(),
        TypeReference::Fundamental(fundamental) => fundamental_to_llvm(ctx.context, *fundamental),
        TypeReference::Integer(integer) => ctx.context.custom_width_int_type(integer.number_of_bits).into(),
        TypeReference::Pointer(_) | TypeReference::FunctionPointer(_) | TypeReference::NullPointer => {
            ctx.context.ptr_type(AddressSpace::default()).into()
        }
        TypeReference::ConstantArray(array) => {
            let element = array
                .value_type
                .first()
                .map(|element_type| ctx.get_llvm_type(element_type))
                .unwrap_or_else(|| ctx.context.i8_type().into());
            element.array_type(array.size as u32).into()
        }
        TypeReference::Function(_) => ctx.context.ptr_type(AddressSpace::default()).into(),
        TypeReference::Custom(custom) => custom_type_to_llvm(ctx, custom),
        TypeReference::TypeInstance(instance) => custom_type_to_llvm(ctx, &instance.type_constructor),
        TypeReference::Parameter(parameter) => {
            panic!("unresolved generic parameter '{}' reached codegen", parameter.name)
        }
    }
}

fn fundamental_to_llvm<'ctx>(context: &'ctx Context, fundamental: FundamentalType) -> BasicTypeEnum<'ctx> {
    use FundamentalType::*;
    match fundamental {
        Bool => context.bool_type().into(),
        Byte | CBool | CChar | CSignedChar | CUnsignedChar => context.i8_type().into(),
        CShort | CUnsignedShort => context.i16_type().into(),
        CInt | CUnsignedInt => context.i32_type().into(),
        CLong | CUnsignedLong | CLongLong | CUnsignedLongLong => context.i64_type().into(),
        Float16 => context.f16_type().into(),
        Float32 => context.f32_type().into(),
        Float64 => context.f64_type().into(),
    }
}

/// A generic struct/alias instance's LLVM representation is that of its
/// non-generic declaration shape; the type arguments themselves only
/// participate in name mangling and monomorphized function bodies, never
/// in the aggregate's field layout for the language's `struct`/`union`
/// declarations this bridges to.
fn custom_type_to_llvm<'ctx>(ctx: &CodegenContext<'ctx>, reference: &CustomTypeReference) -> BasicTypeEnum<'ctx> {
    match ctx.db.find_custom_declaration(reference) {
        Some(Declaration::Struct(declaration)) => {
            let field_types: Vec<BasicTypeEnum<'ctx>> = declaration
                .member_types
                .iter()
                .map(|member_type| ctx.get_llvm_type(member_type))
                .collect();
            ctx.context.struct_type(&field_types, declaration.is_packed).into()
        }
        Some(Declaration::Union(declaration)) => {
            // A union's LLVM representation is a byte array as wide as its
            // largest member; loads/stores go through a bitcast at the use
            // site rather than a native LLVM union (LLVM has none).
            let widest = declaration
                .member_types
                .iter()
                .map(|member_type| llvm_size_of(ctx, member_type))
                .max()
                .unwrap_or(0);
            ctx.context.i8_type().array_type(widest as u32).into()
        }
        Some(Declaration::Enum(_)) => ctx.context.i32_type().into(),
        Some(Declaration::AliasType(declaration)) => match declaration.target_type.first() {
            Some(target) => ctx.get_llvm_type(target),
            None => ctx.context.i8_type().into(),
        },
        Some(Declaration::Function(_)) | Some(Declaration::GlobalVariable(_)) | None => {
            ctx.context.ptr_type(AddressSpace::default()).into()
        }
    }
}

/// Best-effort byte size of a type's LLVM representation, used only to
/// size a union's backing byte array. Aggregates recurse through their
/// own `get_llvm_type` conversion rather than duplicating layout logic.
fn llvm_size_of<'ctx>(ctx: &CodegenContext<'ctx>, type_reference: &TypeReference) -> u64 {
    llvm_size_of_basic(ctx, ctx.get_llvm_type(type_reference))
}

fn llvm_size_of_basic<'ctx>(ctx: &CodegenContext<'ctx>, ty: BasicTypeEnum<'ctx>) -> u64 {
    match ty {
        BasicTypeEnum::IntType(t) => (t.get_bit_width() as u64).div_ceil(8),
        BasicTypeEnum::FloatType(_) => 8,
        BasicTypeEnum::PointerType(_) => 8,
        BasicTypeEnum::ArrayType(t) => t.len() as u64 * llvm_size_of_basic(ctx, t.get_element_type()),
        BasicTypeEnum::StructType(t) => t.get_field_types().iter().map(|f| llvm_size_of_basic(ctx, *f)).sum(),
        BasicTypeEnum::VectorType(_) | BasicTypeEnum::ScalableVectorType(_) => 16,
    }
}
