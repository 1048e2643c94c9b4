//! # Project Reader
//!
//! The file-reading collaborator: turns a project directory into a
//! [`ProjectInput`] for the engine.
//!
//! ```text
//! <root>/
//! ├── archgraph.toml                 engine config (optional)
//! ├── architecture.toml              systems / containers / components
//! └── src/
//!     └── <system>/
//!         ├── relationships.toml     relationship store
//!         └── **/*.d2                diagram sources
//! ```
//!
//! A diagram's scope is the deepest element whose slug path matches the
//! directories between `src/<system>/` and the file.

use archgraph_core::{
    ArchError, DiagramSource, Engine, EngineConfig, Hierarchy, ProjectInput, QualifiedId,
    RelationshipStore, slugify,
};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Engine config file name, relative to the project root.
pub const CONFIG_FILE: &str = "archgraph.toml";

/// Architecture model file name, relative to the project root.
pub const MODEL_FILE: &str = "architecture.toml";

/// Directory holding one sub-directory per system.
pub const SOURCE_DIR: &str = "src";

/// Maximum size of the architecture model file (8 MB).
const MAX_MODEL_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// An opened project directory.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: EngineConfig,
}

impl Project {
    /// Open `root`, canonicalizing it (it is the cache key) and loading
    /// the optional engine config.
    pub fn open(root: &Path) -> Result<Self, ArchError> {
        let root = root.canonicalize().map_err(|e| ArchError::Io {
            context: format!("opening project {}", root.display()),
            source: e,
        })?;
        if !root.is_dir() {
            return Err(ArchError::Config(format!(
                "project root {} is not a directory",
                root.display()
            )));
        }
        let config = EngineConfig::load(&root.join(CONFIG_FILE))?;
        Ok(Self { root, config })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(SOURCE_DIR)
    }

    /// The relationship store for this project, wired to `engine`'s cache.
    #[must_use]
    pub fn store(&self, engine: &Engine) -> RelationshipStore {
        engine.store(self.source_dir(), &self.root)
    }

    /// Read the model file.
    pub fn hierarchy(&self) -> Result<Hierarchy, ArchError> {
        let path = self.root.join(MODEL_FILE);
        let io_err = |e: std::io::Error| ArchError::Io {
            context: format!("reading {}", path.display()),
            source: e,
        };
        let metadata = std::fs::metadata(&path).map_err(io_err)?;
        if metadata.len() > MAX_MODEL_FILE_SIZE {
            return Err(ArchError::Deserialization {
                path: path.clone(),
                message: format!(
                    "file size {} bytes exceeds maximum allowed {} bytes",
                    metadata.len(),
                    MAX_MODEL_FILE_SIZE
                ),
            });
        }
        let text = std::fs::read_to_string(&path).map_err(io_err)?;
        Hierarchy::from_toml_str(&text).map_err(|e| ArchError::Deserialization {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    /// Read everything the engine needs for one build.
    pub fn load_input(&self, store: &RelationshipStore) -> Result<ProjectInput, ArchError> {
        let hierarchy = self.hierarchy()?;
        let stored = store.load_all()?;
        let diagrams = self.diagrams(&hierarchy);
        tracing::debug!(
            root = %self.root.display(),
            elements = hierarchy.len(),
            stored = stored.len(),
            diagrams = diagrams.len(),
            "project read"
        );
        Ok(ProjectInput {
            root: self.root.clone(),
            hierarchy,
            stored,
            diagrams,
        })
    }

    /// Collect diagram sources beneath every system directory.
    ///
    /// Unreadable files are logged and skipped.
    fn diagrams(&self, hierarchy: &Hierarchy) -> Vec<DiagramSource> {
        let mut sources = Vec::new();
        for system in hierarchy.systems() {
            let system_dir = self.source_dir().join(system.as_str());
            if !system_dir.is_dir() {
                continue;
            }
            let walker = WalkDir::new(&system_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !is_hidden(e));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !self.is_diagram(entry.path()) {
                    continue;
                }
                match std::fs::read_to_string(entry.path()) {
                    Ok(text) => sources.push(DiagramSource {
                        path: entry
                            .path()
                            .strip_prefix(&self.root)
                            .unwrap_or(entry.path())
                            .to_path_buf(),
                        scope: scope_for(hierarchy, system, &system_dir, entry.path()),
                        text,
                    }),
                    Err(e) => tracing::warn!(
                        file = %entry.path().display(),
                        error = %e,
                        "skipping unreadable diagram"
                    ),
                }
            }
        }
        sources
    }

    fn is_diagram(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.config.diagram_extension)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Deepest known element along the directories from `system_dir` to `file`.
fn scope_for(
    hierarchy: &Hierarchy,
    system: &QualifiedId,
    system_dir: &Path,
    file: &Path,
) -> QualifiedId {
    let mut scope = system.clone();
    let Some(relative) = file
        .parent()
        .and_then(|parent| parent.strip_prefix(system_dir).ok())
    else {
        return scope;
    };
    for component in relative.components() {
        let Some(name) = component.as_os_str().to_str() else {
            break;
        };
        let Ok(candidate) = QualifiedId::normalize(&format!("{}/{}", scope, slugify(name)))
        else {
            break;
        };
        if hierarchy.get(&candidate).is_none() {
            break;
        }
        scope = candidate;
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MODEL: &str = r#"
[[systems]]
name = "Shop"

[[systems.containers]]
name = "API"

[[systems.containers.components]]
name = "Handler"

[[systems.containers]]
name = "DB"
"#;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(MODEL_FILE), MODEL).expect("model");
        fs::create_dir_all(dir.path().join("src/shop/api/.cache")).expect("dirs");
        fs::write(dir.path().join("src/shop/top.d2"), "api -> db: reads").expect("d2");
        fs::write(dir.path().join("src/shop/api/inner.d2"), "handler -> db").expect("d2");
        fs::write(dir.path().join("src/shop/api/.cache/old.d2"), "x -> y").expect("d2");
        fs::write(dir.path().join("src/shop/notes.md"), "api -> db").expect("md");
        dir
    }

    #[test]
    fn reads_diagrams_with_scopes() {
        let dir = project();
        let project = Project::open(dir.path()).expect("open");
        let engine = Engine::new(project.config().clone()).expect("engine");
        let input = project.load_input(&project.store(&engine)).expect("input");

        let found: Vec<_> = input
            .diagrams
            .iter()
            .map(|d| (d.path.display().to_string(), d.scope.to_string()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("src/shop/api/inner.d2".to_string(), "shop/api".to_string()),
                ("src/shop/top.d2".to_string(), "shop".to_string()),
            ]
        );
    }

    #[test]
    fn missing_model_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = Project::open(dir.path()).expect("open");
        assert!(matches!(project.hierarchy(), Err(ArchError::Io { .. })));
    }

    #[test]
    fn config_file_is_honoured() {
        let dir = project();
        fs::write(dir.path().join(CONFIG_FILE), "diagram_extension = \"md\"").expect("config");
        let project = Project::open(dir.path()).expect("open");
        let engine = Engine::new(project.config().clone()).expect("engine");
        let input = project.load_input(&project.store(&engine)).expect("input");
        assert_eq!(input.diagrams.len(), 1);
    }
}
