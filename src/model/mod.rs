//! The shared data model: semantic types, the declaration/statement/
//! expression tree, and the `Module` they live in. Everything here is
//! `serde`-(de)serializable so it can round-trip through the on-disk `.hl`
//! cache format described in spec.md §6.

pub mod declaration;
pub mod expr;
pub mod module;
pub mod source_range;
pub mod types;
pub mod wire;

pub use declaration::{Declaration, DeclarationBank, DefinitionBank};
pub use expr::{Expression, ExpressionIndex, ExpressionKind, Statement};
pub use module::Module;
pub use source_range::SourceRange;
pub use types::TypeReference;
pub use wire::LengthPrefixedVec;
