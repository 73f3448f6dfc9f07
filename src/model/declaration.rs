//! Declaration banks: alias/enum/struct/union/function/global declarations
//! that make up a module's `export` and `internal` banks (spec.md §3).

use serde::{Deserialize, Serialize};

use super::expr::Statement;
use super::types::TypeReference;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Linkage {
    External,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AliasTypeDeclaration {
    pub name: String,
    pub unique_name: Option<String>,
    pub target_type: Vec<TypeReference>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    /// The literal-value expression; `None` means "implicitly the previous
    /// value plus one", matching C-style enum numbering.
    pub value: Option<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDeclaration {
    pub name: String,
    pub unique_name: Option<String>,
    pub values: Vec<EnumValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructDeclaration {
    pub name: String,
    pub unique_name: Option<String>,
    pub member_types: Vec<TypeReference>,
    pub member_names: Vec<String>,
    pub member_default_values: Vec<Statement>,
    pub is_packed: bool,
    pub is_literal: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnionDeclaration {
    pub name: String,
    pub unique_name: Option<String>,
    pub member_types: Vec<TypeReference>,
    pub member_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    pub parameter_type: TypeReference,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub unique_name: Option<String>,
    pub input_parameters: Vec<FunctionParameter>,
    pub output_parameter_types: Vec<TypeReference>,
    pub is_variadic: bool,
    pub linkage: Linkage,
    /// Non-empty for function *constructors* (generic templates); the names
    /// of the type parameters they introduce, e.g. `["T"]` for
    /// `add<T>(a: T, b: T) -> T`.
    pub type_parameters: Vec<String>,
    pub preconditions: Vec<Statement>,
    pub postconditions: Vec<Statement>,
}

impl FunctionDeclaration {
    pub fn is_function_constructor(&self) -> bool {
        !self.type_parameters.is_empty()
    }

    pub fn function_type(&self) -> TypeReference {
        TypeReference::Function(super::types::FunctionType {
            input_parameter_types: self
                .input_parameters
                .iter()
                .map(|p| p.parameter_type.clone())
                .collect(),
            output_parameter_types: self.output_parameter_types.clone(),
            is_variadic: self.is_variadic,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariableDeclaration {
    pub name: String,
    pub unique_name: Option<String>,
    pub declared_type: TypeReference,
    pub initial_value: Statement,
    pub is_mutable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    AliasType(AliasTypeDeclaration),
    Enum(EnumDeclaration),
    Struct(StructDeclaration),
    Union(UnionDeclaration),
    Function(FunctionDeclaration),
    GlobalVariable(GlobalVariableDeclaration),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::AliasType(d) => &d.name,
            Declaration::Enum(d) => &d.name,
            Declaration::Struct(d) => &d.name,
            Declaration::Union(d) => &d.name,
            Declaration::Function(d) => &d.name,
            Declaration::GlobalVariable(d) => &d.name,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarationBank {
    pub alias_type_declarations: Vec<AliasTypeDeclaration>,
    pub enum_declarations: Vec<EnumDeclaration>,
    pub struct_declarations: Vec<StructDeclaration>,
    pub union_declarations: Vec<UnionDeclaration>,
    pub function_declarations: Vec<FunctionDeclaration>,
    pub global_variable_declarations: Vec<GlobalVariableDeclaration>,
}

impl DeclarationBank {
    pub fn iter(&self) -> impl Iterator<Item = Declaration> + '_ {
        self.alias_type_declarations
            .iter()
            .cloned()
            .map(Declaration::AliasType)
            .chain(self.enum_declarations.iter().cloned().map(Declaration::Enum))
            .chain(self.struct_declarations.iter().cloned().map(Declaration::Struct))
            .chain(self.union_declarations.iter().cloned().map(Declaration::Union))
            .chain(self.function_declarations.iter().cloned().map(Declaration::Function))
            .chain(
                self.global_variable_declarations
                    .iter()
                    .cloned()
                    .map(Declaration::GlobalVariable),
            )
    }

    /// Drop every declaration whose name does not satisfy `keep`. Used by
    /// `crate::analyzer::database::Database::remove_unused_declarations`
    /// to shrink a module's banks to its transitively-used subset.
    pub fn retain_names(&mut self, keep: impl Fn(&str) -> bool) {
        self.alias_type_declarations.retain(|d| keep(&d.name));
        self.enum_declarations.retain(|d| keep(&d.name));
        self.struct_declarations.retain(|d| keep(&d.name));
        self.union_declarations.retain(|d| keep(&d.name));
        self.function_declarations.retain(|d| keep(&d.name));
        self.global_variable_declarations.retain(|d| keep(&d.name));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.alias_type_declarations
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.enum_declarations.iter().map(|d| d.name.as_str()))
            .chain(self.struct_declarations.iter().map(|d| d.name.as_str()))
            .chain(self.union_declarations.iter().map(|d| d.name.as_str()))
            .chain(self.function_declarations.iter().map(|d| d.name.as_str()))
            .chain(
                self.global_variable_declarations
                    .iter()
                    .map(|d| d.name.as_str()),
            )
    }
}

/// The body of a function definition: the statements making up a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionBank {
    pub function_definitions: Vec<FunctionDefinition>,
}
