//! The analyzer: scope-based expression-type deduction and
//! function-constructor instantiation over a parsed module (spec.md §4.4).

pub mod database;
pub mod expr_type;
pub mod instantiate;
pub mod scope;

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, trace};

use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::model::declaration::FunctionDeclaration;
use crate::model::expr::{Expression, ExpressionIndex, ExpressionKind, Statement};
use crate::model::module::Module;
use crate::model::types::TypeReference;

pub use database::Database;
pub use scope::Scope;

/// Compilation-failure tier (spec.md §7, tier 2): an invariant the
/// analyzer or a downstream emitter relies on was broken. Aborts
/// processing of the current module only.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisError {
    pub message: String,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "analysis failure: {}", self.message)
    }
}

impl std::error::Error for AnalysisError {}

impl From<instantiate::InstantiationError> for AnalysisError {
    fn from(value: instantiate::InstantiationError) -> Self {
        AnalysisError {
            message: value.to_string(),
        }
    }
}

/// Per-statement deduced types, keyed by `ExpressionIndex` — satisfies the
/// spec.md §8 invariant `|expression_types| = |statement.expressions|`.
pub type ExpressionTypes = HashMap<ExpressionIndex, TypeReference>;

/// The deduced types for one `Statement`, together with the deduced types of
/// every `Statement` it nests (block bodies, if/for/while bodies, switch
/// cases, ternary arms, constant-array elements, defers), keyed by the index
/// of the container expression that owns them. A container's children are
/// recorded in the same order `visit_children`/`collect_import_usage` walk
/// them, so a consumer that recurses the same way the analyzer built this
/// tree always finds the matching entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatementTypes {
    pub types: ExpressionTypes,
    pub nested: HashMap<ExpressionIndex, Vec<StatementTypes>>,
}

#[derive(Debug, Default)]
pub struct AnalysisResult {
    pub module: Option<Module>,
    pub diagnostics: DiagnosticBag,
    /// One `StatementTypes` tree per function, keyed by function name, for
    /// every statement visited, including everything nested inside it. The
    /// validator consumes this directly instead of re-deducing types.
    pub statement_types: HashMap<String, Vec<StatementTypes>>,
    /// Imported module alias → symbols of that module actually referenced
    /// via `alias.member` access, across every function body in this
    /// module. Not in spec.md's own text, but presupposed by its §4.9 step
    /// 3 ("a module directly importing the current one that uses a symbol
    /// in `changed`") and by `Database::remove_unused_declarations` (§4.2)
    /// — both need to know which imported names a module actually touches,
    /// not merely which modules it imports.
    pub import_usage: HashMap<String, HashSet<String>>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AnalysisOptions {
    /// When set, a failed generic instantiation is turned into a
    /// diagnostic instead of aborting the module — used by the language
    /// server, which must keep analyzing the rest of the file.
    pub tolerate_instantiation_failures: bool,
}

/// `process_module(module, db, options) → AnalysisResult` (spec.md §4.4).
pub fn process_module(
    mut module: Module,
    db: &Database,
    options: AnalysisOptions,
) -> Result<AnalysisResult, AnalysisError> {
    debug!("analyzing module '{}'", module.name);
    let mut result = AnalysisResult::default();

    let function_definitions = module.definitions.function_definitions.clone();
    for definition in function_definitions {
        let Some(declaration) = find_function(&module, &definition.name) else {
            continue;
        };

        let mut scope = Scope::new();
        for parameter in &declaration.input_parameters {
            scope.declare(parameter.name.clone(), parameter.parameter_type.clone());
        }

        let mut per_statement_types = Vec::new();
        for precondition in &declaration.preconditions {
            per_statement_types.push(StatementTypes {
                types: deduce_statement(&module, &scope, precondition, db),
                nested: HashMap::new(),
            });
        }
        for postcondition in &declaration.postconditions {
            per_statement_types.push(StatementTypes {
                types: deduce_statement(&module, &scope, postcondition, db),
                nested: HashMap::new(),
            });
        }

        let mut statements = definition.statements;
        for statement in statements.iter_mut() {
            let statement_types =
                visit_statement(&module, &mut scope, statement, db, options, &mut result.diagnostics)?;
            per_statement_types.push(statement_types);
            collect_import_usage(&module, statement, &mut result.import_usage);
        }

        if let Some(function_definition) = module
            .definitions
            .function_definitions
            .iter_mut()
            .find(|d| d.name == definition.name)
        {
            function_definition.statements = statements;
        }

        result.statement_types.insert(definition.name.clone(), per_statement_types);
    }

    result.module = Some(module);
    Ok(result)
}

fn find_function(module: &Module, name: &str) -> Option<FunctionDeclaration> {
    module
        .export_declarations
        .function_declarations
        .iter()
        .chain(module.internal_declarations.function_declarations.iter())
        .find(|d| d.name == name)
        .cloned()
}

fn deduce_statement(module: &Module, scope: &Scope, statement: &Statement, db: &Database) -> ExpressionTypes {
    let mut types = ExpressionTypes::new();
    for (index, expression) in statement.expressions.iter().enumerate() {
        if let Some(type_reference) = expr_type::get_expression_type(module, scope, statement, expression, db) {
            types.insert(ExpressionIndex(index), type_reference);
        }
    }
    types
}

/// Recursively descends into every sub-expression kind that carries
/// statements — blocks, if-series, for/while bodies, switch cases, ternary
/// arms, variable-decl RHS, constant-array elements, instantiate member
/// values — per spec.md §4.4, rewriting generic calls and threading scope,
/// and returns the deduced types for `statement` itself plus every
/// `Statement` it nests.
fn visit_statement(
    module: &Module,
    scope: &mut Scope,
    statement: &mut Statement,
    db: &Database,
    options: AnalysisOptions,
    diagnostics: &mut DiagnosticBag,
) -> Result<StatementTypes, AnalysisError> {
    // Expressions within a statement are processed right-to-left (deepest
    // child first) per spec.md §5's ordering guarantee, which for our
    // append-children-before-parents tree is simply index order.
    let count = statement.expressions.len();
    let mut nested: HashMap<ExpressionIndex, Vec<StatementTypes>> = HashMap::new();
    for i in 0..count {
        let index = ExpressionIndex(i);
        try_instantiate(module, scope, statement, index, db, options, diagnostics)?;
        visit_children(module, scope, statement, index, db, options, diagnostics, &mut nested)?;
    }

    let types = deduce_statement(module, scope, statement, db);
    Ok(StatementTypes { types, nested })
}

fn try_instantiate(
    module: &Module,
    scope: &Scope,
    statement: &mut Statement,
    index: ExpressionIndex,
    db: &Database,
    options: AnalysisOptions,
    diagnostics: &mut DiagnosticBag,
) -> Result<(), AnalysisError> {
    if !matches!(statement.get(index).kind, ExpressionKind::Call { .. }) {
        return Ok(());
    }

    match instantiate::instantiate_call(module, scope, statement, index, db) {
        Ok(_) => Ok(()),
        Err(error) if options.tolerate_instantiation_failures => {
            let range = statement.get(index).source_range.clone().unwrap_or_default();
            diagnostics.push(Diagnostic::error(range, error.to_string()));
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

fn visit_children(
    module: &Module,
    scope: &mut Scope,
    statement: &mut Statement,
    index: ExpressionIndex,
    db: &Database,
    options: AnalysisOptions,
    diagnostics: &mut DiagnosticBag,
    nested: &mut HashMap<ExpressionIndex, Vec<StatementTypes>>,
) -> Result<(), AnalysisError> {
    let kind = statement.get(index).kind.clone();
    match kind {
        ExpressionKind::Block { mut statements } => {
            let mark = scope.mark();
            let mut children = Vec::with_capacity(statements.len());
            for inner in statements.iter_mut() {
                children.push(visit_statement(module, scope, inner, db, options, diagnostics)?);
            }
            scope.truncate_to(mark);
            nested.insert(index, children);
            replace_kind(statement, index, ExpressionKind::Block { statements });
        }
        ExpressionKind::If { mut series } => {
            let mut children = Vec::new();
            for entry in series.iter_mut() {
                if let Some(condition) = entry.condition.as_mut() {
                    children.push(visit_statement(module, scope, condition, db, options, diagnostics)?);
                }
                let mark = scope.mark();
                for inner in entry.then_statements.iter_mut() {
                    children.push(visit_statement(module, scope, inner, db, options, diagnostics)?);
                }
                scope.truncate_to(mark);
            }
            nested.insert(index, children);
            replace_kind(statement, index, ExpressionKind::If { series });
        }
        ExpressionKind::ForLoop {
            header,
            mut then_statements,
        } => {
            let mark = scope.mark();
            scope.declare(header.variable_name.clone(), TypeReference::create_integer_type(32, true));
            let mut children = Vec::with_capacity(then_statements.len());
            for inner in then_statements.iter_mut() {
                children.push(visit_statement(module, scope, inner, db, options, diagnostics)?);
            }
            scope.truncate_to(mark);
            nested.insert(index, children);
            replace_kind(
                statement,
                index,
                ExpressionKind::ForLoop {
                    header,
                    then_statements,
                },
            );
        }
        ExpressionKind::WhileLoop {
            mut condition,
            mut then_statements,
        } => {
            let mut children = Vec::with_capacity(then_statements.len() + 1);
            children.push(visit_statement(module, scope, &mut condition, db, options, diagnostics)?);
            let mark = scope.mark();
            for inner in then_statements.iter_mut() {
                children.push(visit_statement(module, scope, inner, db, options, diagnostics)?);
            }
            scope.truncate_to(mark);
            nested.insert(index, children);
            replace_kind(
                statement,
                index,
                ExpressionKind::WhileLoop {
                    condition,
                    then_statements,
                },
            );
        }
        ExpressionKind::Switch { value, mut cases } => {
            let mut children = Vec::new();
            for case in cases.iter_mut() {
                let mark = scope.mark();
                for inner in case.statements.iter_mut() {
                    children.push(visit_statement(module, scope, inner, db, options, diagnostics)?);
                }
                scope.truncate_to(mark);
            }
            nested.insert(index, children);
            replace_kind(statement, index, ExpressionKind::Switch { value, cases });
        }
        ExpressionKind::Ternary {
            condition,
            mut then_statement,
            mut else_statement,
        } => {
            let mut children = Vec::with_capacity(2);
            children.push(visit_statement(module, scope, &mut then_statement, db, options, diagnostics)?);
            children.push(visit_statement(module, scope, &mut else_statement, db, options, diagnostics)?);
            nested.insert(index, children);
            replace_kind(
                statement,
                index,
                ExpressionKind::Ternary {
                    condition,
                    then_statement,
                    else_statement,
                },
            );
        }
        ExpressionKind::ConstantArray { mut array_data } => {
            let mut children = Vec::with_capacity(array_data.len());
            for inner in array_data.iter_mut() {
                children.push(visit_statement(module, scope, inner, db, options, diagnostics)?);
            }
            nested.insert(index, children);
            replace_kind(statement, index, ExpressionKind::ConstantArray { array_data });
        }
        ExpressionKind::Defer { statement: mut inner } => {
            let child = visit_statement(module, scope, &mut inner, db, options, diagnostics)?;
            nested.insert(index, vec![child]);
            replace_kind(statement, index, ExpressionKind::Defer { statement: inner });
        }
        ExpressionKind::VariableDecl(decl) => {
            scope.declare(decl.name.clone(), TypeReference::NullPointer);
        }
        ExpressionKind::VariableDeclWithType { decl, declared_type } => {
            scope.declare(decl.name.clone(), declared_type.clone());
        }
        ExpressionKind::Assignment { target, source, .. } => {
            // An unannotated `var x = expr;` binds `x` to `NullPointer` when
            // its `VariableDecl` is visited above; once the initializer's
            // real type is known, rebind `x` to it so every later read of
            // `x` in this scope deduces its actual type instead of
            // `NullPointer`. Mirrors `codegen::expressions::compile_assignment`,
            // which applies the same rebind for the IR it emits.
            if let ExpressionKind::VariableDecl(decl) = &statement.get(target).kind {
                let source_type = expr_type::get_expression_type(module, scope, statement, statement.get(source), db)
                    .unwrap_or(TypeReference::NullPointer);
                scope.declare(decl.name.clone(), source_type);
            }
        }
        _ => {
            trace!("no nested statements to visit for expression {index:?}");
        }
    }
    Ok(())
}

/// Records every `alias.member` access in `statement` (and everything it
/// nests) into `usage`, keyed by the imported module name the alias
/// resolves to rather than the alias text itself.
fn collect_import_usage(module: &Module, statement: &Statement, usage: &mut HashMap<String, HashSet<String>>) {
    for expression in &statement.expressions {
        if let ExpressionKind::Access { base, member_name, .. } = &expression.kind {
            if let ExpressionKind::Variable { name, .. } = &statement.get(*base).kind {
                if let Some(imported_module) = module.module_for_alias(name) {
                    usage.entry(imported_module.to_string()).or_default().insert(member_name.clone());
                }
            }
        }
    }

    for expression in &statement.expressions {
        match &expression.kind {
            ExpressionKind::Block { statements } => {
                for inner in statements {
                    collect_import_usage(module, inner, usage);
                }
            }
            ExpressionKind::If { series } => {
                for entry in series {
                    if let Some(condition) = &entry.condition {
                        collect_import_usage(module, condition, usage);
                    }
                    for inner in &entry.then_statements {
                        collect_import_usage(module, inner, usage);
                    }
                }
            }
            ExpressionKind::ForLoop { then_statements, .. } => {
                for inner in then_statements {
                    collect_import_usage(module, inner, usage);
                }
            }
            ExpressionKind::WhileLoop { condition, then_statements } => {
                collect_import_usage(module, condition, usage);
                for inner in then_statements {
                    collect_import_usage(module, inner, usage);
                }
            }
            ExpressionKind::Switch { cases, .. } => {
                for case in cases {
                    for inner in &case.statements {
                        collect_import_usage(module, inner, usage);
                    }
                }
            }
            ExpressionKind::Ternary { then_statement, else_statement, .. } => {
                collect_import_usage(module, then_statement, usage);
                collect_import_usage(module, else_statement, usage);
            }
            ExpressionKind::ConstantArray { array_data } => {
                for inner in array_data {
                    collect_import_usage(module, inner, usage);
                }
            }
            ExpressionKind::Defer { statement: inner } => {
                collect_import_usage(module, inner, usage);
            }
            _ => {}
        }
    }
}

fn replace_kind(statement: &mut Statement, index: ExpressionIndex, kind: ExpressionKind) {
    let existing: &mut Expression = &mut statement.expressions[index.0];
    existing.kind = kind;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::{DefinitionBank, FunctionDefinition, Linkage};
    use crate::model::module::LanguageVersion;

    fn module_with_function(name: &str, statements: Vec<Statement>) -> Module {
        let mut module = Module::new("M");
        module.language_version = LanguageVersion::default();
        module.export_declarations.function_declarations.push(FunctionDeclaration {
            name: name.into(),
            unique_name: None,
            input_parameters: vec![],
            output_parameter_types: vec![],
            is_variadic: false,
            linkage: Linkage::External,
            type_parameters: vec![],
            preconditions: vec![],
            postconditions: vec![],
        });
        module.definitions = DefinitionBank {
            function_definitions: vec![FunctionDefinition {
                name: name.into(),
                statements,
            }],
        };
        module
    }

    #[test]
    fn process_module_produces_one_type_map_per_statement() {
        let statement = Statement::new(vec![Expression::new(
            ExpressionKind::Constant {
                value_type: TypeReference::create_integer_type(32, true),
                data: crate::model::expr::ConstantData { value_text: "0".into() },
            },
            None,
        )]);
        let module = module_with_function("main", vec![statement]);
        let db = Database::new();

        let result = process_module(module, &db, AnalysisOptions::default()).unwrap();
        let types = result.statement_types.get("main").unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].types.len(), 1);
        assert!(types[0].nested.is_empty());
    }

    #[test]
    fn an_unannotated_variable_decl_is_rebound_to_its_initializer_type() {
        // var x = 0; return x;
        let decl_statement = Statement::new(vec![
            Expression::new(ExpressionKind::VariableDecl(crate::model::expr::VariableDecl {
                name: "x".into(),
                is_mutable: false,
            }), None),
            Expression::new(
                ExpressionKind::Constant {
                    value_type: TypeReference::create_integer_type(32, true),
                    data: crate::model::expr::ConstantData { value_text: "0".into() },
                },
                None,
            ),
            Expression::new(
                ExpressionKind::Assignment {
                    target: ExpressionIndex(0),
                    source: ExpressionIndex(1),
                    compound_operation: None,
                },
                None,
            ),
        ]);
        let return_statement = Statement::new(vec![
            Expression::new(ExpressionKind::Variable { name: "x".into(), access_type: crate::model::expr::AccessType::Read }, None),
            Expression::new(ExpressionKind::Return { value: Some(ExpressionIndex(0)) }, None),
        ]);

        let module = module_with_function("main", vec![decl_statement, return_statement]);
        let db = Database::new();

        let result = process_module(module, &db, AnalysisOptions::default()).unwrap();
        let types = result.statement_types.get("main").unwrap();
        let return_types = &types[1].types;
        assert_eq!(
            return_types.get(&ExpressionIndex(0)),
            Some(&TypeReference::create_integer_type(32, true)),
        );
    }
}
