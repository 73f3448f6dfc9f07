//! Semantic type references shared by the analyzer, validator and codegen.
//!
//! `TypeReference` is a tagged union over every shape a type can take in a
//! declaration or expression. Equality, hashing and (de)serialization are
//! all structural, matching the contract in spec.md §3 ("Equality is
//! structural. A type reference owns its subcomponents.").

use serde::{Deserialize, Serialize};

/// Name of a declaring module plus the declaration within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleReference {
    pub name: String,
}

impl ModuleReference {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleReference { name: name.into() }
    }
}

/// Fundamental, non-integer primitive types with fixed C-ABI representations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundamentalType {
    Bool,
    Byte,
    Float16,
    Float32,
    Float64,
    CBool,
    CChar,
    CSignedChar,
    CUnsignedChar,
    CShort,
    CUnsignedShort,
    CInt,
    CUnsignedInt,
    CLong,
    CUnsignedLong,
    CLongLong,
    CUnsignedLongLong,
}

/// An arbitrary-width integer type, `number_of_bits` in `1..=64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegerType {
    pub number_of_bits: u32,
    pub is_signed: bool,
}

/// A pointer type. `element_type` holds zero elements for a void pointer or
/// exactly one for a pointer to a concrete type, mirroring the source
/// implementation's "0 or 1 element" convention instead of `Option<Type>` so
/// that hashing/serialization stay structurally uniform with arrays.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerType {
    pub element_type: Vec<TypeReference>,
    pub is_mutable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstantArrayType {
    pub value_type: Vec<TypeReference>,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub input_parameter_types: Vec<TypeReference>,
    pub output_parameter_types: Vec<TypeReference>,
    pub is_variadic: bool,
}

/// Wraps a `FunctionType` with parameter names kept only for documentation
/// and debug-info purposes; they do not participate in equality.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionPointerType {
    pub function_type: Box<FunctionType>,
    pub input_parameter_names: Vec<String>,
}

impl PartialEq for FunctionPointerType {
    fn eq(&self, other: &Self) -> bool {
        self.function_type == other.function_type
    }
}
impl Eq for FunctionPointerType {}
impl std::hash::Hash for FunctionPointerType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.function_type.hash(state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomTypeReference {
    pub module_reference: ModuleReference,
    pub name: String,
}

/// A realized application of a type constructor (generic struct/alias) to
/// concrete argument statements, e.g. `Vector<Int32>`. `arguments` are
/// `Statement`s (not bare `TypeReference`s) because the source language
/// allows type arguments to be written as type-expressions, which the
/// analyzer evaluates the same way it evaluates any other statement.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInstance {
    pub type_constructor: CustomTypeReference,
    pub arguments: Vec<crate::model::expr::Statement>,
}

/// A bound name inside a type- or function-constructor template, e.g. the
/// `T` in `add<T>(a: T, b: T) -> T`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterType {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum TypeReference {
    Builtin(String),
    Fundamental(FundamentalType),
    Integer(IntegerType),
    Pointer(PointerType),
    ConstantArray(ConstantArrayType),
    Function(FunctionType),
    FunctionPointer(FunctionPointerType),
    Custom(CustomTypeReference),
    TypeInstance(TypeInstance),
    Parameter(ParameterType),
    NullPointer,
}

impl TypeReference {
    pub fn create_pointer_type(elements: Vec<TypeReference>, is_mutable: bool) -> TypeReference {
        TypeReference::Pointer(PointerType {
            element_type: elements,
            is_mutable,
        })
    }

    pub fn create_integer_type(bits: u32, signed: bool) -> TypeReference {
        TypeReference::Integer(IntegerType {
            number_of_bits: bits,
            is_signed: signed,
        })
    }

    pub fn create_custom_type_reference(module: impl Into<String>, name: impl Into<String>) -> TypeReference {
        TypeReference::Custom(CustomTypeReference {
            module_reference: ModuleReference::new(module),
            name: name.into(),
        })
    }

    pub fn void_pointer(is_mutable: bool) -> TypeReference {
        TypeReference::create_pointer_type(vec![], is_mutable)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, TypeReference::Integer(_))
            || matches!(self, TypeReference::Fundamental(f) if matches!(
                f,
                FundamentalType::CBool
                    | FundamentalType::CChar
                    | FundamentalType::CSignedChar
                    | FundamentalType::CUnsignedChar
                    | FundamentalType::CShort
                    | FundamentalType::CUnsignedShort
                    | FundamentalType::CInt
                    | FundamentalType::CUnsignedInt
                    | FundamentalType::CLong
                    | FundamentalType::CUnsignedLong
                    | FundamentalType::CLongLong
                    | FundamentalType::CUnsignedLongLong
            ))
    }

    pub fn is_signed_integer(&self) -> bool {
        match self {
            TypeReference::Integer(i) => i.is_signed,
            TypeReference::Fundamental(f) => matches!(
                f,
                FundamentalType::CChar
                    | FundamentalType::CSignedChar
                    | FundamentalType::CShort
                    | FundamentalType::CInt
                    | FundamentalType::CLong
                    | FundamentalType::CLongLong
            ),
            _ => false,
        }
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self,
            TypeReference::Fundamental(FundamentalType::Float16)
                | TypeReference::Fundamental(FundamentalType::Float32)
                | TypeReference::Fundamental(FundamentalType::Float64)
        )
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, TypeReference::Fundamental(FundamentalType::Bool))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeReference::Pointer(_))
    }

    /// A pointer with a concrete (non-void) pointee.
    pub fn is_non_void_pointer(&self) -> bool {
        matches!(self, TypeReference::Pointer(p) if !p.element_type.is_empty())
    }

    pub fn is_function_pointer(&self) -> bool {
        matches!(self, TypeReference::FunctionPointer(_))
    }

    /// A pointer to `byte`/`CChar`, the language's C-string convention.
    pub fn is_c_string(&self) -> bool {
        match self {
            TypeReference::Pointer(p) => matches!(
                p.element_type.first(),
                Some(TypeReference::Fundamental(FundamentalType::CChar))
                    | Some(TypeReference::Fundamental(FundamentalType::Byte))
            ),
            _ => false,
        }
    }

    pub fn remove_pointer(&self) -> Option<TypeReference> {
        match self {
            TypeReference::Pointer(p) => p.element_type.first().cloned(),
            _ => None,
        }
    }

    pub fn get_function_output_type(&self) -> Option<TypeReference> {
        match self {
            TypeReference::Function(f) => f.output_parameter_types.first().cloned(),
            TypeReference::FunctionPointer(fp) => {
                fp.function_type.output_parameter_types.first().cloned()
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeReference::Builtin(name) => write!(f, "{name}"),
            TypeReference::Fundamental(t) => write!(f, "{t:?}"),
            TypeReference::Integer(IntegerType {
                number_of_bits,
                is_signed,
            }) => write!(f, "{}{number_of_bits}", if *is_signed { "Int" } else { "Uint" }),
            TypeReference::Pointer(p) => {
                let mutability = if p.is_mutable { "mut " } else { "" };
                match p.element_type.first() {
                    Some(inner) => write!(f, "*{mutability}{inner}"),
                    None => write!(f, "*{mutability}void"),
                }
            }
            TypeReference::ConstantArray(a) => match a.value_type.first() {
                Some(inner) => write!(f, "[{inner}; {}]", a.size),
                None => write!(f, "[<unknown>; {}]", a.size),
            },
            TypeReference::Function(t) => {
                let params = t
                    .input_parameter_types
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let outputs = t
                    .output_parameter_types
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({params}) -> ({outputs})")
            }
            TypeReference::FunctionPointer(fp) => write!(f, "{}", TypeReference::Function((*fp.function_type).clone())),
            TypeReference::Custom(c) => write!(f, "{}.{}", c.module_reference.name, c.name),
            TypeReference::TypeInstance(i) => write!(
                f,
                "{}.{}<...>",
                i.type_constructor.module_reference.name, i.type_constructor.name
            ),
            TypeReference::Parameter(p) => write!(f, "{}", p.name),
            TypeReference::NullPointer => write!(f, "<null>"),
        }
    }
}
