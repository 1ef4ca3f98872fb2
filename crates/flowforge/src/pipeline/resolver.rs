use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use flowforge_parser::ImportResolver;

/// Resolves DSL imports as file paths relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileImportResolver {
    base: PathBuf,
}

impl FileImportResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// A resolver for imports written in the file at `path`.
    pub fn for_file(path: &Path) -> Self {
        Self::new(path.parent().unwrap_or_else(|| Path::new(".")))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl ImportResolver for FileImportResolver {
    fn resolve(&self, path: &str) -> Option<String> {
        let full_path = self.base.join(path);
        match fs::read_to_string(&full_path) {
            Ok(source) => Some(source),
            Err(err) => {
                debug!(path:? = full_path, err:%; "Import could not be read");
                None
            }
        }
    }
}
