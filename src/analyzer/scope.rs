//! `Scope` (spec.md §3, §4.4, glossary): "an append-only, truncate-on-
//! block-exit stack of (name, type) variable bindings, valid for the
//! duration of a function body."
//!
//! Unlike the teacher's `typechecker::scope::Scope` (a stack of
//! `HashMap`-backed frames holding shared mutable type slots for
//! unification), this scope is flat and value-oriented: bindings are
//! pushed on declaration and the whole tail is truncated on block exit,
//! exactly mirroring spec.md's "record variable count on entry, truncate
//! back on exit" discipline rather than a nested-frame model.

use crate::model::types::TypeReference;

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub type_reference: TypeReference,
}

#[derive(Clone, Debug, Default)]
pub struct Scope {
    bindings: Vec<Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// Mark the current position so a matching `truncate_to` can unwind
    /// exactly the bindings introduced since.
    pub fn mark(&self) -> usize {
        self.bindings.len()
    }

    pub fn truncate_to(&mut self, mark: usize) {
        self.bindings.truncate(mark);
    }

    pub fn declare(&mut self, name: impl Into<String>, type_reference: TypeReference) {
        self.bindings.push(Binding {
            name: name.into(),
            type_reference,
        });
    }

    /// Innermost-first lookup: later declarations shadow earlier ones with
    /// the same name, matching ordinary block-scoping rules.
    pub fn get(&self, name: &str) -> Option<&TypeReference> {
        self.bindings
            .iter()
            .rev()
            .find(|binding| binding.name == name)
            .map(|binding| &binding.type_reference)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_removes_bindings_declared_after_mark() {
        let mut scope = Scope::new();
        scope.declare("a", TypeReference::create_integer_type(32, true));

        let mark = scope.mark();
        scope.declare("b", TypeReference::create_integer_type(32, true));
        assert!(scope.contains("b"));

        scope.truncate_to(mark);
        assert!(!scope.contains("b"));
        assert!(scope.contains("a"));
    }

    #[test]
    fn shadowing_returns_the_most_recent_binding() {
        let mut scope = Scope::new();
        scope.declare("x", TypeReference::create_integer_type(32, true));
        scope.declare("x", TypeReference::create_integer_type(64, false));

        assert_eq!(scope.get("x"), Some(&TypeReference::create_integer_type(64, false)));
    }
}
