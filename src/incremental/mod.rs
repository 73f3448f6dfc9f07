//! Incremental recompilation and JIT build orchestration (spec.md §4.9,
//! §5).
//!
//! Three independent pieces, composed by the embedding driver (a watch
//! CLI, a JIT REPL) rather than by one god object here:
//!
//! - [`graph::DependencyGraph`] maintains the reverse-dependency map.
//! - [`recompile::find_modules_to_recompile`] walks it to plan a minimal
//!   recompile set from a single module's before/after fingerprints.
//! - [`watch::FileWatchDriver`] and [`jit::JitDriver`] are the two
//!   concrete drivers spec.md §4.9 describes: one reacting to file-system
//!   edits, one reacting to a JIT session's module redefinitions.

pub mod graph;
pub mod jit;
pub mod recompile;
pub mod watch;

pub use graph::DependencyGraph;
pub use jit::JitDriver;
pub use recompile::find_modules_to_recompile;
pub use watch::{DatabaseHandle, FileWatchDriver};
