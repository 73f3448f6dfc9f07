//! The statement/expression tree.
//!
//! Sub-expressions are referenced by index into the owning `Statement`'s
//! `expressions` vector rather than by pointer (spec.md §3, §9 "AST
//! sharing"): this keeps a `Statement` movable, trivially cloneable and
//! directly `serde`-serializable, and is the representation the analyzer,
//! validator and codegen all walk.

use serde::{Deserialize, Serialize};

use super::source_range::SourceRange;
use super::types::TypeReference;
use super::wire::LengthPrefixedVec;

/// An index into the sibling `Expression` vector of the `Statement` that
/// owns it. Never a pointer — see module docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpressionIndex(pub usize);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub expressions: Vec<Expression>,
}

impl Statement {
    pub fn new(expressions: Vec<Expression>) -> Self {
        Statement { expressions }
    }

    /// The root expression of the statement: by convention the last entry,
    /// since children are appended before their parents during construction.
    pub fn root(&self) -> Option<&Expression> {
        self.expressions.last()
    }

    pub fn get(&self, index: ExpressionIndex) -> &Expression {
        &self.expressions[index.0]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub source_range: Option<SourceRange>,
}

impl Expression {
    pub fn new(kind: ExpressionKind, source_range: Option<SourceRange>) -> Self {
        Expression { kind, source_range }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LogicalAnd,
    LogicalOr,
    Has,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperation {
    Not,
    Minus,
    BitwiseNot,
    AddressOf,
    Indirection,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastType {
    Numeric,
    Enum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    Read,
    Write,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstantData {
    pub value_text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstantiateMemberValuePair {
    pub member_name: String,
    pub value: ExpressionIndex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstantiateExpressionType {
    Default,
    Explicit,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub is_mutable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub case_value: Option<ExpressionIndex>,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForLoopHeader {
    pub variable_name: String,
    pub range_begin: ExpressionIndex,
    pub range_end: ExpressionIndex,
    pub step_by: Option<ExpressionIndex>,
}

/// Every shape an expression can take. Container kinds hold
/// `ExpressionIndex`/`Statement` children rather than owning nested
/// `Expression`s directly (spec.md §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ExpressionKind {
    Access {
        base: ExpressionIndex,
        member_name: String,
        access_type: AccessType,
    },
    DereferenceAndAccess {
        base: ExpressionIndex,
        member_name: String,
    },
    Assignment {
        target: ExpressionIndex,
        source: ExpressionIndex,
        compound_operation: Option<BinaryOperation>,
    },
    Binary {
        left_hand_side: ExpressionIndex,
        right_hand_side: ExpressionIndex,
        operation: BinaryOperation,
    },
    Block {
        statements: Vec<Statement>,
    },
    Break {
        loop_count: Option<u32>,
    },
    Call {
        callee: ExpressionIndex,
        arguments: Vec<ExpressionIndex>,
    },
    Cast {
        source: ExpressionIndex,
        destination_type: TypeReference,
        cast_type: CastType,
    },
    Constant {
        value_type: TypeReference,
        data: ConstantData,
    },
    ConstantArray {
        array_data: LengthPrefixedVec<Statement>,
    },
    Continue,
    Defer {
        statement: Box<Statement>,
    },
    ForLoop {
        header: ForLoopHeader,
        then_statements: Vec<Statement>,
    },
    Function {
        declaration_name: String,
    },
    If {
        series: Vec<IfSeriesEntry>,
    },
    InstanceCall {
        instance: ExpressionIndex,
        arguments: Vec<ExpressionIndex>,
    },
    Instantiate {
        instance_type: InstantiateExpressionType,
        members: Vec<InstantiateMemberValuePair>,
    },
    NullPointer,
    Parenthesis {
        inner: ExpressionIndex,
    },
    Return {
        value: Option<ExpressionIndex>,
    },
    Switch {
        value: ExpressionIndex,
        cases: Vec<SwitchCase>,
    },
    Ternary {
        condition: ExpressionIndex,
        then_statement: Box<Statement>,
        else_statement: Box<Statement>,
    },
    TypeExpression {
        type_reference: TypeReference,
    },
    Unary {
        expression: ExpressionIndex,
        operation: UnaryOperation,
    },
    VariableDecl(VariableDecl),
    VariableDeclWithType {
        decl: VariableDecl,
        declared_type: TypeReference,
    },
    Variable {
        name: String,
        access_type: AccessType,
    },
    WhileLoop {
        condition: Box<Statement>,
        then_statements: Vec<Statement>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IfSeriesEntry {
    pub condition: Option<Box<Statement>>,
    pub then_statements: Vec<Statement>,
}
