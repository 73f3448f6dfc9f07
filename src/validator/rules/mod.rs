//! Rule families, grouped by the construct they validate (spec.md §4.5).
//! Each file covers several of the spec's "representative rules" bullets;
//! the grouping follows shared helper needs rather than a 1:1 mapping to
//! the prose bullet list.

pub mod control_flow;
pub mod expressions;
pub mod names;
pub mod types;

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Fundamental-type keywords plus the literal keywords, reserved against
/// use as declaration names (spec.md §4.5 "Declaration names").
pub static RESERVED_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "bool", "byte", "float16", "float32", "float64", "c_bool", "c_char", "c_schar",
        "c_uchar", "c_short", "c_ushort", "c_int", "c_uint", "c_long", "c_ulong", "c_longlong",
        "c_ulonglong", "true", "false", "null", "void",
    ])
});

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(name)
}
