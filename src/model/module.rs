//! `Module`: a named translation unit (spec.md §3).

use serde::{Deserialize, Serialize};

use super::declaration::{DeclarationBank, DefinitionBank};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub module_name: String,
    pub alias: String,
    pub usages: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub language_version: LanguageVersion,
    pub name: String,
    pub source_file_path: Option<String>,
    pub comment: Option<String>,
    pub dependencies: Vec<Dependency>,
    pub export_declarations: DeclarationBank,
    pub internal_declarations: DeclarationBank,
    pub definitions: DefinitionBank,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            language_version: LanguageVersion::default(),
            name: name.into(),
            source_file_path: None,
            comment: None,
            dependencies: Vec::new(),
            export_declarations: DeclarationBank::default(),
            internal_declarations: DeclarationBank::default(),
            definitions: DefinitionBank::default(),
        }
    }

    /// All declarations visible from outside the module.
    pub fn exported_names(&self) -> impl Iterator<Item = &str> {
        self.export_declarations.names()
    }

    pub fn alias_for(&self, module_name: &str) -> Option<&str> {
        self.dependencies
            .iter()
            .find(|d| d.module_name == module_name)
            .map(|d| d.alias.as_str())
    }

    pub fn module_for_alias(&self, alias: &str) -> Option<&str> {
        self.dependencies
            .iter()
            .find(|d| d.alias == alias)
            .map(|d| d.module_name.as_str())
    }
}
