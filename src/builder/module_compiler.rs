//! The 7-step artifact build pipeline (spec.md §4.8).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use inkwell::context::Context;
use inkwell::targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple};
use inkwell::OptimizationLevel;
use log::{error, info, warn};

use crate::analyzer::{self, database::Database, AnalysisOptions};
use crate::codegen;
use crate::model::module::Module;
use crate::validator;

use super::artifact::{ArtifactDescriptor, CHeaderDependency};
use super::cache::ArtifactCache;
use super::ToolError;

/// External collaborator: turns a source file path into a parsed
/// `Module`. `corec` has no lexer/parser of its own (Non-goals); this
/// trait is the seam an embedding CLI plugs its parser into. The second
/// element of the return tuple is the path whose mtime the cache compares
/// against.
pub trait ModuleSource {
    fn load(&self, source_path: &str) -> Result<Module, ToolError>;
}

/// External collaborator: turns a C header into a synthetic `Module` of
/// external-linkage declarations (Non-goals: "no C-header importer" — the
/// implementation lives outside this crate).
pub trait HeaderImporter {
    fn import(&self, header: &CHeaderDependency, search_paths: &[PathBuf]) -> Result<Module, ToolError>;
}

/// Resolves artifact descriptors named in a `dependencies` list against a
/// set of search directories, each expected to contain `<name>.json`.
pub struct Repository {
    search_paths: Vec<PathBuf>,
}

impl Repository {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Repository { search_paths }
    }

    fn find(&self, artifact_name: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| dir.join(format!("{artifact_name}.json")))
            .find(|path| path.is_file())
    }

    fn load(&self, artifact_name: &str) -> Result<ArtifactDescriptor, ToolError> {
        let path = self.find(artifact_name).ok_or_else(|| ToolError::UnresolvedDependency {
            artifact_name: artifact_name.to_string(),
        })?;
        let contents = std::fs::read_to_string(&path).map_err(|error| ToolError::Io {
            path: path.clone(),
            source: error.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|error| ToolError::CorruptCache {
            path,
            source: error.to_string(),
        })
    }
}

/// Depth-first post-order traversal of `root`'s `dependencies`, so the
/// returned list has every artifact's dependencies before the artifact
/// itself (spec.md §4.8 step 1 "topologically sorted").
fn resolve_artifact_order(repository: &Repository, root: ArtifactDescriptor) -> Result<Vec<ArtifactDescriptor>, ToolError> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    visit(repository, root, &mut order, &mut visited, &mut visiting)?;
    Ok(order)
}

fn visit(
    repository: &Repository,
    descriptor: ArtifactDescriptor,
    order: &mut Vec<ArtifactDescriptor>,
    visited: &mut HashSet<String>,
    visiting: &mut HashSet<String>,
) -> Result<(), ToolError> {
    if visited.contains(&descriptor.name) {
        return Ok(());
    }
    if !visiting.insert(descriptor.name.clone()) {
        return Err(ToolError::CyclicDependency {
            artifact_name: descriptor.name.clone(),
        });
    }

    for dependency_name in descriptor.dependencies.clone() {
        if visited.contains(&dependency_name) {
            continue;
        }
        let dependency = repository.load(&dependency_name)?;
        visit(repository, dependency, order, visited, visiting)?;
    }

    visiting.remove(&descriptor.name);
    visited.insert(descriptor.name.clone());
    order.push(descriptor);
    Ok(())
}

/// The emitted output of one `build_artifact` call: every module's
/// bitcode (or object) file plus the external libraries the not-yet-run
/// linker needs, resolved for the target/debug/dynamic-preference triple
/// requested.
#[derive(Debug, Default)]
pub struct BuildProducts {
    pub output_name: String,
    pub is_library: bool,
    pub emitted_files: Vec<PathBuf>,
    pub required_libraries: Vec<String>,
    /// Modules whose analysis or codegen failed (tier 2, spec.md §7):
    /// recorded rather than aborting the whole artifact build.
    pub failed_modules: Vec<String>,
}

pub struct ModuleCompiler {
    repository: Repository,
    cache: ArtifactCache,
    header_search_paths: Vec<PathBuf>,
    target_triple: String,
    target_os: String,
    is_debug: bool,
    prefer_dynamic: bool,
}

impl ModuleCompiler {
    pub fn new(
        build_dir: &Path,
        repository_paths: Vec<PathBuf>,
        header_search_paths: Vec<PathBuf>,
        target_triple: impl Into<String>,
        target_os: impl Into<String>,
        is_debug: bool,
        prefer_dynamic: bool,
    ) -> Result<Self, ToolError> {
        Ok(ModuleCompiler {
            repository: Repository::new(repository_paths),
            cache: ArtifactCache::new(build_dir)?,
            header_search_paths,
            target_triple: target_triple.into(),
            target_os: target_os.into(),
            is_debug,
            prefer_dynamic,
        })
    }

    /// Runs the full pipeline for `descriptor_path`'s artifact and every
    /// transitive dependency artifact (spec.md §4.8 steps 1-6; step 7's
    /// Windows DLL copy is `copy_windows_dependencies`, called separately
    /// once the caller knows the output `bin/` directory).
    pub fn build_artifact(
        &self,
        descriptor_path: &Path,
        module_source: &dyn ModuleSource,
        header_importer: &dyn HeaderImporter,
    ) -> anyhow::Result<BuildProducts> {
        let root_contents = std::fs::read_to_string(descriptor_path)
            .with_context(|| format!("reading artifact descriptor '{}'", descriptor_path.display()))?;
        let root: ArtifactDescriptor =
            serde_json::from_str(&root_contents).with_context(|| format!("parsing artifact descriptor '{}'", descriptor_path.display()))?;

        let root_name = root.name.clone();
        let order = resolve_artifact_order(&self.repository, root).context("resolving transitive dependency artifacts")?;

        let db = Database::new();
        let llvm_context = Context::create();

        let mut products = BuildProducts::default();
        for descriptor in &order {
            let is_root = descriptor.name == root_name;
            self.build_one_artifact(&llvm_context, &db, descriptor, module_source, header_importer, &mut products)?;
            if is_root {
                products.output_name = descriptor.info.output_name().to_string();
                products.is_library = descriptor.info.is_library();
                products.required_libraries = descriptor.resolve_external_libraries(&self.target_os, self.is_debug, self.prefer_dynamic);
            }
        }

        Ok(products)
    }

    fn build_one_artifact(
        &self,
        llvm_context: &Context,
        db: &Database,
        descriptor: &ArtifactDescriptor,
        module_source: &dyn ModuleSource,
        header_importer: &dyn HeaderImporter,
        products: &mut BuildProducts,
    ) -> anyhow::Result<()> {
        for header in &descriptor.c_headers {
            self.load_header_module(header, header_importer, db)
                .with_context(|| format!("importing C header for module '{}'", header.module_name))?;
        }

        for source_path in &descriptor.modules {
            self.compile_module(llvm_context, db, source_path, module_source, products)
                .with_context(|| format!("compiling module from '{source_path}'"))?;
        }

        Ok(())
    }

    fn load_header_module(&self, header: &CHeaderDependency, header_importer: &dyn HeaderImporter, db: &Database) -> Result<(), ToolError> {
        let cache_path = self.cache.module_path(&header.module_name);
        let header_path = PathBuf::from(&header.header_path);

        let module = if self.cache.is_fresh(&cache_path, &header_path) {
            self.cache.load_module(&header.module_name)
        } else {
            None
        };

        let module = match module {
            Some(module) => module,
            None => {
                let module = header_importer.import(header, &self.header_search_paths)?;
                self.cache.store_module(&module)?;
                module
            }
        };

        db.add_declarations(module);
        Ok(())
    }

    /// Steps 3-5: parse (or reuse the cached parse), analyze, validate,
    /// and emit. A module whose analysis/codegen fails is logged and
    /// skipped — it does not abort the rest of the artifact (spec.md §7
    /// tier 2).
    fn compile_module(
        &self,
        llvm_context: &Context,
        db: &Database,
        source_path: &str,
        module_source: &dyn ModuleSource,
        products: &mut BuildProducts,
    ) -> Result<(), ToolError> {
        let module = self.load_or_parse_module(source_path, module_source)?;
        let module_name = module.name.clone();

        let analysis = match analyzer::process_module(module, db, AnalysisOptions::default()) {
            Ok(result) => result,
            Err(error) => {
                error!("analysis of module '{module_name}' failed: {error}");
                products.failed_modules.push(module_name);
                return Ok(());
            }
        };

        let diagnostic_errors = analysis.diagnostics.has_errors();
        for diagnostic in analysis.diagnostics.iter() {
            warn!("{}", diagnostic.to_cli_line());
        }

        let Some(analyzed_module) = analysis.module.clone() else {
            products.failed_modules.push(module_name);
            return Ok(());
        };

        let validation = validator::validate_module(&analysis, db);
        for diagnostic in validation.iter() {
            warn!("{}", diagnostic.to_cli_line());
        }

        db.add_declarations(analyzed_module.clone());

        if diagnostic_errors || validation.has_errors() {
            products.failed_modules.push(module_name);
            return Ok(());
        }

        match self.emit_module(llvm_context, &analyzed_module, db) {
            Ok(emitted) => products.emitted_files.push(emitted),
            Err(error) => {
                error!("codegen of module '{module_name}' failed: {error}");
                products.failed_modules.push(module_name);
            }
        }

        Ok(())
    }

    fn load_or_parse_module(&self, source_path: &str, module_source: &dyn ModuleSource) -> Result<Module, ToolError> {
        let input_path = PathBuf::from(source_path);
        let stem = input_path.file_stem().and_then(|s| s.to_str()).unwrap_or(source_path).to_string();
        let cache_path = self.cache.module_path(&stem);

        if self.cache.is_fresh(&cache_path, &input_path) {
            if let Some(cached) = self.cache.load_module(&stem) {
                return Ok(cached);
            }
        }

        let module = module_source.load(source_path)?;
        self.cache.store_module(&module)?;
        Ok(module)
    }

    /// Step 5: emit LLVM IR for `module`, reusing the cached bitcode file
    /// if it is newer than the module's `.hl` cache entry.
    fn emit_module(&self, llvm_context: &Context, module: &Module, db: &Database) -> Result<PathBuf, ToolError> {
        let hl_path = self.cache.module_path(&module.name);
        let output_path = if self.target_os == "windows" && self.is_debug {
            self.cache.object_path(&module.name)
        } else {
            self.cache.bitcode_path(&module.name)
        };

        if self.cache.is_fresh(&output_path, &hl_path) {
            info!("reusing cached codegen output for module '{}'", module.name);
            return Ok(output_path);
        }

        let ctx = codegen::compile_module_declarations(llvm_context, &module.name, db).map_err(|error| ToolError::Io {
            path: output_path.clone(),
            source: error.to_string(),
        })?;

        codegen::compile_definitions(&ctx, module, db, &module.definitions.function_definitions, &self.target_triple).map_err(|error| {
            ToolError::Io {
                path: output_path.clone(),
                source: error.to_string(),
            }
        })?;

        if output_path.extension().and_then(|e| e.to_str()) == Some("obj") {
            write_object_file(&ctx.module, &self.target_triple, &output_path)?;
        } else {
            ctx.module.write_bitcode_to_path(&output_path);
        }

        Ok(output_path)
    }

    /// Step 7: copies every dependency library's Windows DLL into the
    /// output `bin/` directory. A no-op on other targets; `corec` does
    /// not invoke the linker itself (Non-goals), so this only moves
    /// already-built artifacts around, not anything the linker produced.
    pub fn copy_windows_dependencies(&self, dependency_dlls: &[PathBuf], bin_dir: &Path) -> Result<(), ToolError> {
        if self.target_os != "windows" {
            return Ok(());
        }

        std::fs::create_dir_all(bin_dir).map_err(|error| ToolError::Io {
            path: bin_dir.to_path_buf(),
            source: error.to_string(),
        })?;

        for dll in dependency_dlls {
            let Some(file_name) = dll.file_name() else { continue };
            let destination = bin_dir.join(file_name);
            std::fs::copy(dll, &destination).map_err(|error| ToolError::Io {
                path: destination,
                source: error.to_string(),
            })?;
        }

        Ok(())
    }
}

fn write_object_file(module: &inkwell::module::Module, target_triple: &str, output_path: &Path) -> Result<(), ToolError> {
    Target::initialize_all(&InitializationConfig::default());

    let triple = TargetTriple::create(target_triple);
    let target = Target::from_triple(&triple).map_err(|error| ToolError::Io {
        path: output_path.to_path_buf(),
        source: error.to_string(),
    })?;

    let target_machine = target
        .create_target_machine(&triple, "generic", "", OptimizationLevel::None, RelocMode::Default, CodeModel::Default)
        .ok_or_else(|| ToolError::Io {
            path: output_path.to_path_buf(),
            source: "could not create target machine".to_string(),
        })?;

    target_machine
        .write_to_file(module, FileType::Object, output_path)
        .map_err(|error| ToolError::Io {
            path: output_path.to_path_buf(),
            source: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::{DeclarationBank, DefinitionBank, FunctionDeclaration, FunctionParameter, Linkage};
    use crate::model::module::LanguageVersion;
    use crate::model::types::TypeReference;

    struct FixedModuleSource(Module);

    impl ModuleSource for FixedModuleSource {
        fn load(&self, _source_path: &str) -> Result<Module, ToolError> {
            Ok(self.0.clone())
        }
    }

    struct NoHeaders;

    impl HeaderImporter for NoHeaders {
        fn import(&self, header: &CHeaderDependency, _search_paths: &[PathBuf]) -> Result<Module, ToolError> {
            Err(ToolError::MissingHeader {
                header_path: header.header_path.clone(),
            })
        }
    }

    fn empty_function_module(name: &str) -> Module {
        let mut module = Module::new(name);
        module.language_version = LanguageVersion::default();
        module.export_declarations = DeclarationBank {
            function_declarations: vec![FunctionDeclaration {
                name: "main".into(),
                unique_name: None,
                input_parameters: Vec::<FunctionParameter>::new(),
                output_parameter_types: vec![TypeReference::create_integer_type(32, true)],
                is_variadic: false,
                linkage: Linkage::External,
                type_parameters: vec![],
                preconditions: vec![],
                postconditions: vec![],
            }],
            ..Default::default()
        };
        module.definitions = DefinitionBank {
            function_definitions: vec![crate::model::declaration::FunctionDefinition {
                name: "main".into(),
                statements: vec![crate::model::expr::Statement::new(vec![
                    crate::model::expr::Expression::new(
                        crate::model::expr::ExpressionKind::Constant {
                            value_type: TypeReference::create_integer_type(32, true),
                            data: crate::model::expr::ConstantData { value_text: "0".into() },
                        },
                        None,
                    ),
                    crate::model::expr::Expression::new(
                        crate::model::expr::ExpressionKind::Return {
                            value: Some(crate::model::expr::ExpressionIndex(0)),
                        },
                        None,
                    ),
                ])],
            }],
        };
        module
    }

    #[test]
    fn resolve_artifact_order_puts_dependencies_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("B.json"),
            r#"{"name": "B", "info": {"type": "Library_info", "value": {"output_name": "b"}}}"#,
        )
        .unwrap();

        let repository = Repository::new(vec![dir.path().to_path_buf()]);
        let root = ArtifactDescriptor {
            name: "A".into(),
            info: super::super::artifact::ArtifactInfo::Executable(super::super::artifact::ExecutableInfo { output_name: "a".into() }),
            c_headers: vec![],
            external_libraries: vec![],
            dependencies: vec!["B".into()],
            modules: vec![],
        };

        let order = resolve_artifact_order(&repository, root).unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].name, "B");
        assert_eq!(order[1].name, "A");
    }

    #[test]
    fn cyclic_dependency_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("B.json"),
            r#"{"name": "B", "info": {"type": "Library_info", "value": {"output_name": "b"}}, "dependencies": ["A"]}"#,
        )
        .unwrap();

        let repository = Repository::new(vec![dir.path().to_path_buf()]);
        let root = ArtifactDescriptor {
            name: "A".into(),
            info: super::super::artifact::ArtifactInfo::Executable(super::super::artifact::ExecutableInfo { output_name: "a".into() }),
            c_headers: vec![],
            external_libraries: vec![],
            dependencies: vec!["B".into()],
            modules: vec![],
        };

        assert!(resolve_artifact_order(&repository, root).is_err());
    }

    #[test]
    fn build_artifact_emits_bitcode_for_a_simple_module() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor_path = dir.path().join("A.json");
        std::fs::write(
            &descriptor_path,
            r#"{"name": "A", "info": {"type": "Executable_info", "value": {"output_name": "a"}}, "modules": ["A.hltxt"]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("A.hltxt"), "fn main() -> i32 { return 0 }").unwrap();

        let compiler = ModuleCompiler::new(dir.path(), vec![dir.path().to_path_buf()], vec![], "x86_64-unknown-linux-gnu", "linux", false, false).unwrap();

        let source = FixedModuleSource(empty_function_module("A"));
        let products = compiler.build_artifact(&descriptor_path, &source, &NoHeaders).unwrap();

        assert_eq!(products.output_name, "a");
        assert!(!products.is_library);
        assert_eq!(products.emitted_files.len(), 1);
        assert!(products.failed_modules.is_empty());
        assert!(products.emitted_files[0].exists());
    }
}
