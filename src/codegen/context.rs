//! LLVM codegen context: the teacher's `context`/`module`/`builder` triple
//! plus scoped variable bookkeeping, regeneralized from the teacher's
//! five-variant `Type` to `model::types::TypeReference` and extended with
//! the `Block_info` stack the emitter needs for `break`/`continue`
//! targeting (spec.md §4.6).

use std::cell::RefCell;
use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::BasicTypeEnum;
use inkwell::values::PointerValue;

use crate::analyzer::database::Database;
use crate::model::expr::Statement;
use crate::model::types::TypeReference;

use super::util;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Loop,
    Switch,
}

/// One entry of the emitter's block stack (spec.md §4.6): `break` and
/// `continue` never search the LLVM CFG, they just index into this.
pub struct BlockInfo<'ctx> {
    pub kind: BlockKind,
    pub repeat_block: BasicBlock<'ctx>,
    pub after_block: BasicBlock<'ctx>,
}

#[derive(Clone)]
pub struct Variable<'ctx> {
    pub pointer: PointerValue<'ctx>,
    pub llvm_type: BasicTypeEnum<'ctx>,
    pub type_reference: TypeReference,
}

#[derive(Default)]
struct Scope<'ctx> {
    variables: HashMap<String, Variable<'ctx>>,
}

type ScopeFrame<'ctx> = RefCell<Scope<'ctx>>;

pub struct CodegenContext<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub db: &'ctx Database,
    types: RefCell<HashMap<TypeReference, BasicTypeEnum<'ctx>>>,
    scopes: RefCell<Vec<ScopeFrame<'ctx>>>,
    blocks: RefCell<Vec<BlockInfo<'ctx>>>,
    /// Statements registered by `defer`, function-scoped and run in reverse
    /// registration order immediately before every `return` and at the
    /// implicit end of the function body.
    defers: RefCell<Vec<Statement>>,
    /// The declared return type of the function currently being compiled,
    /// if any. `Instantiate` expressions carry no type of their own
    /// (spec.md §4.5: "deduces target type from an enclosing annotation,
    /// return type, or call-argument position"), so a `return` of one
    /// needs this to know what to build.
    current_return_type: RefCell<Option<TypeReference>>,
}

impl<'ctx> CodegenContext<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, db: &'ctx Database) -> Self {
        CodegenContext {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
            db,
            types: RefCell::new(HashMap::new()),
            scopes: RefCell::new(Vec::new()),
            blocks: RefCell::new(Vec::new()),
            defers: RefCell::new(Vec::new()),
            current_return_type: RefCell::new(None),
        }
    }

    pub fn set_current_return_type(&self, return_type: Option<TypeReference>) {
        *self.current_return_type.borrow_mut() = return_type;
    }

    pub fn current_return_type(&self) -> Option<TypeReference> {
        self.current_return_type.borrow().clone()
    }

    pub fn push_defer(&self, statement: Statement) {
        self.defers.borrow_mut().push(statement);
    }

    /// Drains every pending deferred statement in LIFO order. Called at
    /// every `return` and at a function's implicit fall-off-the-end exit.
    pub fn take_defers(&self) -> Vec<Statement> {
        let mut pending = self.defers.borrow_mut();
        let drained: Vec<Statement> = pending.drain(..).collect();
        drained.into_iter().rev().collect()
    }

    pub fn get_llvm_type(&self, type_reference: &TypeReference) -> BasicTypeEnum<'ctx> {
        if let Some(existing) = self.types.borrow().get(type_reference) {
            return *existing;
        }

        let llvm_type = util::type_reference_to_llvm_type(self, type_reference);
        self.types.borrow_mut().insert(type_reference.clone(), llvm_type);
        llvm_type
    }

    pub fn enter_scope(&self) {
        self.scopes.borrow_mut().push(ScopeFrame::default());
    }

    pub fn exit_scope(&self) {
        self.scopes.borrow_mut().pop();
    }

    pub fn declare_variable(&self, name: impl Into<String>, variable: Variable<'ctx>) {
        let scopes = self.scopes.borrow();
        if let Some(scope) = scopes.last() {
            scope.borrow_mut().variables.insert(name.into(), variable);
        }
    }

    pub fn find_variable(&self, name: &str) -> Option<Variable<'ctx>> {
        let scopes = self.scopes.borrow();
        scopes
            .iter()
            .rev()
            .find_map(|scope| scope.borrow().variables.get(name).cloned())
    }

    pub fn push_block(&self, kind: BlockKind, repeat_block: BasicBlock<'ctx>, after_block: BasicBlock<'ctx>) {
        self.blocks.borrow_mut().push(BlockInfo {
            kind,
            repeat_block,
            after_block,
        });
    }

    pub fn pop_block(&self) {
        self.blocks.borrow_mut().pop();
    }

    /// `break` target for the given 1-based `loop_count` (defaults to 1):
    /// the `after_block` of the `loop_count`-th enclosing loop/switch,
    /// counting from the innermost.
    pub fn nth_break_target(&self, loop_count: Option<u32>) -> Option<BasicBlock<'ctx>> {
        let count = loop_count.unwrap_or(1).max(1) as usize;
        self.blocks.borrow().iter().rev().nth(count - 1).map(|b| b.after_block)
    }

    /// `continue` target: the `repeat_block` of the nearest enclosing
    /// *loop* (switches are transparent to `continue`, spec.md §4.6).
    pub fn nearest_repeat_block(&self) -> Option<BasicBlock<'ctx>> {
        self.blocks
            .borrow()
            .iter()
            .rev()
            .find(|b| b.kind == BlockKind::Loop)
            .map(|b| b.repeat_block)
    }

    /// `true` once the builder's current block already ends in a
    /// terminator — callers must not append a fall-through branch in that
    /// case (spec.md §4.6 "block-ending invariant").
    pub fn current_block_is_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }
}
