//! Artifact descriptor: the JSON input to `build_artifact` (spec.md §6,
//! §4.8). Only `Deserialize` is needed — nothing in this crate ever
//! produces a descriptor, it only consumes one handed in by the external
//! CLI (spec.md §1 "the CLI... remain external collaborators").

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct LibraryInfo {
    pub output_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExecutableInfo {
    pub output_name: String,
}

/// `info` in the wire format: `{ "type": "Library_info" | "Executable_info", "value": {..} }`,
/// the same tagged-variant shape `model::types::TypeReference` uses.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ArtifactInfo {
    #[serde(rename = "Library_info")]
    Library(LibraryInfo),
    #[serde(rename = "Executable_info")]
    Executable(ExecutableInfo),
}

impl ArtifactInfo {
    pub fn output_name(&self) -> &str {
        match self {
            ArtifactInfo::Library(l) => &l.output_name,
            ArtifactInfo::Executable(e) => &e.output_name,
        }
    }

    pub fn is_library(&self) -> bool {
        matches!(self, ArtifactInfo::Library(_))
    }
}

/// One dependency on a C header (spec.md §4.8 step 2): `module_name` is
/// the synthetic language module the header importer produces, cached at
/// `artifacts/<module_name>.hl`.
#[derive(Clone, Debug, Deserialize)]
pub struct CHeaderDependency {
    pub module_name: String,
    pub header_path: String,
}

/// One row of the per-OS external-library resolution table (SPEC_FULL.md
/// §2 "External library resolution table"), keyed by `(target_os,
/// is_debug, prefer_dynamic)`. A `HashMap` keyed by a struct cannot
/// round-trip through JSON object keys, so the wire format is a flat
/// array of rows instead; `resolve_external_libraries` does the lookup.
#[derive(Clone, Debug, Deserialize)]
pub struct ExternalLibraryEntry {
    pub target_os: String,
    #[serde(default)]
    pub is_debug: bool,
    #[serde(default)]
    pub prefer_dynamic: bool,
    pub libraries: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub info: ArtifactInfo,
    #[serde(default)]
    pub c_headers: Vec<CHeaderDependency>,
    #[serde(default)]
    pub external_libraries: Vec<ExternalLibraryEntry>,
    /// Ordered; resolved against the repository search paths passed to
    /// `ModuleCompiler` (spec.md §6 "Artifact descriptor").
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Source file paths belonging to this artifact itself, each handed
    /// to `ModuleSource::load` (spec.md §4.8 step 3). Not spelled out in
    /// spec.md's distilled descriptor shape but required for step 3 to
    /// have anything to parse; recorded as an Open Question resolution in
    /// DESIGN.md.
    #[serde(default)]
    pub modules: Vec<String>,
}

impl ArtifactDescriptor {
    /// The entry matching `(target_os, is_debug, prefer_dynamic)` exactly,
    /// if the descriptor carries one (spec.md §4.8 step 6).
    pub fn resolve_external_libraries(&self, target_os: &str, is_debug: bool, prefer_dynamic: bool) -> Vec<String> {
        self.external_libraries
            .iter()
            .find(|entry| entry.target_os == target_os && entry.is_debug == is_debug && entry.prefer_dynamic == prefer_dynamic)
            .map(|entry| entry.libraries.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_executable_descriptor_with_tagged_info() {
        let json = r#"{
            "name": "app",
            "info": { "type": "Executable_info", "value": { "output_name": "app" } },
            "dependencies": ["libcore"]
        }"#;
        let descriptor: ArtifactDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.name, "app");
        assert!(!descriptor.info.is_library());
        assert_eq!(descriptor.info.output_name(), "app");
        assert_eq!(descriptor.dependencies, vec!["libcore".to_string()]);
    }

    #[test]
    fn resolves_external_libraries_for_exact_key_match() {
        let descriptor = ArtifactDescriptor {
            name: "app".into(),
            info: ArtifactInfo::Executable(ExecutableInfo { output_name: "app".into() }),
            c_headers: vec![],
            external_libraries: vec![
                ExternalLibraryEntry {
                    target_os: "linux".into(),
                    is_debug: false,
                    prefer_dynamic: true,
                    libraries: vec!["m".into(), "pthread".into()],
                },
                ExternalLibraryEntry {
                    target_os: "windows".into(),
                    is_debug: false,
                    prefer_dynamic: true,
                    libraries: vec!["kernel32".into()],
                },
            ],
            dependencies: vec![],
            modules: vec![],
        };

        assert_eq!(
            descriptor.resolve_external_libraries("linux", false, true),
            vec!["m".to_string(), "pthread".to_string()]
        );
        assert!(descriptor.resolve_external_libraries("linux", true, true).is_empty());
    }
}
