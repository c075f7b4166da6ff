use std::path::{Path, PathBuf};

use crate::runtime::error::ScriptError;

pub const SCRIPT_EXTENSION: &str = "star";

/// Finds `<root>/<name>.star` across an ordered list of roots; the first
/// existing file wins.
#[derive(Debug, Clone)]
pub struct ScriptResolver {
    roots: Vec<PathBuf>,
}

impl Default for ScriptResolver {
    fn default() -> Self {
        Self::new(["strategy", ".", "strategies"])
    }
}

impl ScriptResolver {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let file = format!("{name}.{SCRIPT_EXTENSION}");
        self.roots.iter().map(|root| root.join(&file)).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<PathBuf, ScriptError> {
        if !is_valid_name(name) {
            return Err(ScriptError::NotFound {
                strategy: name.to_string(),
                searched: Vec::new(),
            });
        }
        let candidates = self.candidates(name);
        candidates
            .iter()
            .find(|path| path.is_file())
            .cloned()
            .ok_or_else(|| ScriptError::NotFound {
                strategy: name.to_string(),
                searched: candidates,
            })
    }

    pub fn read(&self, name: &str) -> Result<(PathBuf, String), ScriptError> {
        let path = self.resolve(name)?;
        let source = std::fs::read_to_string(&path).map_err(|source| ScriptError::Io {
            strategy: name.to_string(),
            path: path.clone(),
            source,
        })?;
        Ok((path, source))
    }
}

/// Strategy names are plain file stems; no separators or parent segments.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).components().count() == 1
}
