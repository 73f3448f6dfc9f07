//! The module compiler & builder (spec.md §4.8): drives a whole artifact
//! from a descriptor to emitted LLVM bitcode/object files end to end,
//! resolving transitive dependency artifacts, caching parsed modules and
//! compiled output by mtime, and catching tier-2 compilation failures at
//! module boundaries (spec.md §7) so one broken module in an artifact
//! does not abort the rest.
//!
//! `corec` does not implement a lexer, parser, C-header importer or
//! linker invocation (Non-goals, reaffirmed in SPEC_FULL.md) — those stay
//! external collaborators this module calls through the `ModuleSource`
//! and `HeaderImporter` traits.

pub mod artifact;
pub mod cache;
pub mod module_compiler;

use std::fmt;
use std::path::PathBuf;

pub use artifact::ArtifactDescriptor;
pub use cache::ArtifactCache;
pub use module_compiler::{BuildProducts, HeaderImporter, ModuleCompiler, ModuleSource};

/// Tier-3 tool failure (spec.md §7): abortive for the whole process.
/// Callers surface this through `anyhow::Context` at the outermost
/// `build_artifact` call; `corec` itself never calls `std::process::exit`
/// — that remains the embedding CLI's job (SPEC_FULL.md §7).
#[derive(Debug)]
pub enum ToolError {
    Io { path: PathBuf, source: String },
    CorruptCache { path: PathBuf, source: String },
    MissingHeader { header_path: String },
    MissingSource { module_name: String },
    UnresolvedDependency { artifact_name: String },
    CyclicDependency { artifact_name: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Io { path, source } => write!(f, "I/O error at '{}': {source}", path.display()),
            ToolError::CorruptCache { path, source } => write!(f, "corrupt cache file '{}': {source}", path.display()),
            ToolError::MissingHeader { header_path } => write!(f, "missing required header '{header_path}'"),
            ToolError::MissingSource { module_name } => write!(f, "no source available for module '{module_name}'"),
            ToolError::UnresolvedDependency { artifact_name } => write!(f, "could not resolve dependency artifact '{artifact_name}'"),
            ToolError::CyclicDependency { artifact_name } => write!(f, "cyclic dependency involving artifact '{artifact_name}'"),
        }
    }
}

impl std::error::Error for ToolError {}

/// Environment variable naming the file the compiler refuses to start
/// without being able to parse (spec.md §6): the language's builtin
/// declarations module. `corec` never reads `std::env::args()`/`env::var`
/// itself (that belongs to the embedding CLI), so this is published as a
/// constant the CLI is expected to consult and hand the resulting path to
/// `ModuleSource`, rather than a `std::env::var` call living here.
pub const BUILTIN_SOURCE_FILE_PATH_ENV_VAR: &str = "BUILTIN_SOURCE_FILE_PATH";
