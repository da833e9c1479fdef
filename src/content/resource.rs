//! Mapping resource ids onto the public folder.

use std::path::{Path, PathBuf};

/// File served when a directory is requested.
pub const INDEX_FILE: &str = "index.html";

/// Root folder used when an application configures none.
pub const DEFAULT_ROOT: &str = "html";

/// What a resource id points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A regular file, possibly the index of a requested directory.
    File(PathBuf),
    /// A directory without an index file.
    Directory(PathBuf),
    Missing(PathBuf),
    /// The id tries to leave the root folder.
    Forbidden,
}

impl Resource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resource::File(p) | Resource::Directory(p) | Resource::Missing(p) => Some(p),
            Resource::Forbidden => None,
        }
    }
}

/// Resolves resource ids against a root folder.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    root: PathBuf,
}

impl ResourceResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `resource_id` (a request target without its leading `/`).
    ///
    /// The query string and fragment are not part of the lookup.
    pub fn resolve(&self, resource_id: &str) -> Resource {
        let path_part = resource_id
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let mut path = self.root.clone();
        for segment in path_part.split(['/', '\\']) {
            match segment {
                "" | "." => continue,
                ".." => return Resource::Forbidden,
                s if s.contains(':') => return Resource::Forbidden,
                s => path.push(s),
            }
        }

        if path.is_dir() {
            let index = path.join(INDEX_FILE);
            if index.is_file() {
                Resource::File(index)
            } else {
                Resource::Directory(path)
            }
        } else if path.exists() {
            Resource::File(path)
        } else {
            Resource::Missing(path)
        }
    }
}

impl Default for ResourceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}
