//! C-ABI argument classification (spec.md §4.7): replicates enough of the
//! platform's C calling convention that language-defined functions can
//! freely call, and be called by, C code.
//!
//! `libclang`'s stable C API — the one `clang-sys` binds — does not expose
//! clang's internal `CodeGen::ABIArgInfo` machinery; that lives in
//! clang's C++-only CodeGen library and has no stable C entry point. This
//! module instead uses `clang-sys` the way spec.md §9 anticipates
//! ("implementers may call into a reusable ABI library... the bridge is
//! an external, platform-aware oracle"): it synthesizes a minimal C
//! translation unit declaring a struct with the argument's member layout,
//! asks libclang for that struct's size against the real target triple,
//! and applies System V x86-64 eightbyte classification on top of the
//! measured size. This covers the common case the emitter actually
//! exercises — small aggregates passed/returned by value — without
//! reimplementing every `ABIArgInfo::Kind` in `Direct`/`Extend`/`Indirect`
//! /`IndirectAliased`/`Ignore`/`Expand`/`CoerceAndExpand`/`InAlloca`;
//! anything wider than 16 bytes is conservatively classified `Indirect`,
//! matching clang's own SysV behavior for that size class.

use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use crate::model::declaration::Declaration;
use crate::model::types::{FundamentalType, TypeReference};

use super::context::CodegenContext;

const EIGHTBYTE_BYTES: u64 = 8;
const INDIRECT_THRESHOLD_BYTES: u64 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Passed in registers, as-is for a scalar or, for a struct, as one
    /// LLVM value per entry in `ArgClassification::eightbytes`.
    Direct,
    /// Passed as a pointer to a location the caller materializes.
    Indirect,
}

#[derive(Clone, Debug)]
pub struct ArgClassification {
    pub kind: ArgKind,
    /// One entry per eightbyte register a `Direct` struct is split into,
    /// each holding that eightbyte's size in bytes (8, except possibly
    /// the trailing one). Empty for scalars and `Indirect` arguments.
    pub eightbytes: Vec<u64>,
}

impl ArgClassification {
    fn scalar() -> Self {
        ArgClassification {
            kind: ArgKind::Direct,
            eightbytes: Vec::new(),
        }
    }

    fn indirect() -> Self {
        ArgClassification {
            kind: ArgKind::Indirect,
            eightbytes: Vec::new(),
        }
    }
}

/// Classifies a value of `type_reference` for parameter/return passing
/// under `target_triple`'s C ABI. Only struct types can be anything other
/// than `Direct` scalar in this implementation.
pub fn classify_argument(ctx: &CodegenContext, target_triple: &str, type_reference: &TypeReference) -> ArgClassification {
    let TypeReference::Custom(reference) = ctx.db.get_underlying_type(type_reference) else {
        return ArgClassification::scalar();
    };
    let Some(Declaration::Struct(declaration)) = ctx.db.find_custom_declaration(&reference) else {
        return ArgClassification::scalar();
    };

    let member_c_types: Vec<String> = declaration
        .member_types
        .iter()
        .map(|member_type| c_type_spelling(ctx, member_type))
        .collect();

    let size = struct_size_via_clang(target_triple, &member_c_types)
        .unwrap_or_else(|| member_c_types.len() as u64 * EIGHTBYTE_BYTES);

    if size > INDIRECT_THRESHOLD_BYTES {
        return ArgClassification::indirect();
    }

    let mut eightbytes = Vec::new();
    let mut remaining = size;
    while remaining > 0 {
        let chunk = remaining.min(EIGHTBYTE_BYTES);
        eightbytes.push(chunk);
        remaining -= chunk;
    }

    ArgClassification {
        kind: ArgKind::Direct,
        eightbytes,
    }
}

fn c_type_spelling(ctx: &CodegenContext, type_reference: &TypeReference) -> String {
    use FundamentalType::*;
    match type_reference {
        TypeReference::Fundamental(CBool) => "_Bool".into(),
        TypeReference::Fundamental(CChar) => "char".into(),
        TypeReference::Fundamental(CSignedChar) => "signed char".into(),
        TypeReference::Fundamental(CUnsignedChar | Byte) => "unsigned char".into(),
        TypeReference::Fundamental(CShort) => "short".into(),
        TypeReference::Fundamental(CUnsignedShort) => "unsigned short".into(),
        TypeReference::Fundamental(CInt) => "int".into(),
        TypeReference::Fundamental(CUnsignedInt) => "unsigned int".into(),
        TypeReference::Fundamental(CLong) => "long".into(),
        TypeReference::Fundamental(CUnsignedLong) => "unsigned long".into(),
        TypeReference::Fundamental(CLongLong) => "long long".into(),
        TypeReference::Fundamental(CUnsignedLongLong) => "unsigned long long".into(),
        TypeReference::Fundamental(Bool) => "_Bool".into(),
        TypeReference::Fundamental(Float16) => "_Float16".into(),
        TypeReference::Fundamental(Float32) => "float".into(),
        TypeReference::Fundamental(Float64) => "double".into(),
        TypeReference::Integer(integer) => {
            let width = [8u32, 16, 32, 64].into_iter().find(|w| *w >= integer.number_of_bits).unwrap_or(64);
            format!("{}int{width}_t", if integer.is_signed { "" } else { "u" })
        }
        TypeReference::Pointer(_) | TypeReference::FunctionPointer(_) | TypeReference::NullPointer => "void *".into(),
        TypeReference::Function(_) => "void *".into(),
        TypeReference::ConstantArray(array) => {
            let inner = array.value_type.first().map(|t| c_type_spelling(ctx, t)).unwrap_or_else(|| "char".into());
            format!("{inner}[{}]", array.size)
        }
        TypeReference::Custom(reference) => match ctx.db.find_custom_declaration(reference) {
            Some(Declaration::Struct(_)) => format!("struct {}", reference.name),
            Some(Declaration::Union(_)) => format!("union {}", reference.name),
            Some(Declaration::Enum(_)) => "int".into(),
            Some(Declaration::AliasType(alias)) => alias
                .target_type
                .first()
                .map(|target| c_type_spelling(ctx, target))
                .unwrap_or_else(|| "long".into()),
            _ => "long".into(),
        },
        TypeReference::TypeInstance(instance) => c_type_spelling(ctx, &TypeReference::Custom(instance.type_constructor.clone())),
        TypeReference::Builtin(_) | TypeReference::Parameter(_) => "long".into(),
    }
}

/// Asks libclang for the size, in bytes, of `struct __abi_probe { ... }`
/// with the given member C type spellings, compiled for `target_triple`.
fn struct_size_via_clang(target_triple: &str, member_c_types: &[String]) -> Option<u64> {
    let fields: String = member_c_types
        .iter()
        .enumerate()
        .map(|(index, ty)| format!("    {ty} field_{index};\n"))
        .collect();
    let source = format!("struct __abi_probe {{\n{fields}}};\n");

    unsafe {
        let index = clang_sys::clang_createIndex(0, 0);
        if index.is_null() {
            return None;
        }

        let file_name = CString::new("__abi_probe.c").ok()?;
        let contents = CString::new(source).ok()?;
        let mut unsaved = clang_sys::CXUnsavedFile {
            Filename: file_name.as_ptr(),
            Contents: contents.as_ptr(),
            Length: contents.as_bytes().len() as std::os::raw::c_ulong,
        };

        let target_flag = CString::new("-target").ok()?;
        let target_value = CString::new(target_triple).ok()?;
        let args: [*const c_char; 2] = [target_flag.as_ptr(), target_value.as_ptr()];

        let mut translation_unit = ptr::null_mut();
        let parse_result = clang_sys::clang_parseTranslationUnit2(
            index,
            file_name.as_ptr(),
            args.as_ptr(),
            args.len() as i32,
            &mut unsaved,
            1,
            clang_sys::CXTranslationUnit_None,
            &mut translation_unit,
        );

        if parse_result != clang_sys::CXError_Success || translation_unit.is_null() {
            clang_sys::clang_disposeIndex(index);
            return None;
        }

        let cursor = clang_sys::clang_getTranslationUnitCursor(translation_unit);
        let size = find_struct_size(cursor);

        clang_sys::clang_disposeTranslationUnit(translation_unit);
        clang_sys::clang_disposeIndex(index);

        size
    }
}

extern "C" fn record_struct_size(
    cursor: clang_sys::CXCursor,
    _parent: clang_sys::CXCursor,
    client_data: clang_sys::CXClientData,
) -> clang_sys::CXChildVisitResult {
    unsafe {
        if clang_sys::clang_getCursorKind(cursor) == clang_sys::CXCursor_StructDecl {
            let cursor_type = clang_sys::clang_getCursorType(cursor);
            let size = clang_sys::clang_Type_getSizeOf(cursor_type);
            if size >= 0 {
                *(client_data as *mut i64) = size;
            }
            return clang_sys::CXChildVisit_Break;
        }
    }
    clang_sys::CXChildVisit_Continue
}

fn find_struct_size(cursor: clang_sys::CXCursor) -> Option<u64> {
    let mut size: i64 = -1;
    unsafe {
        clang_sys::clang_visitChildren(cursor, record_struct_size, &mut size as *mut i64 as clang_sys::CXClientData);
    }
    (size >= 0).then_some(size as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_integer_classifies_as_direct_with_no_split() {
        let classification = ArgClassification::scalar();
        assert_eq!(classification.kind, ArgKind::Direct);
        assert!(classification.eightbytes.is_empty());
    }
}
