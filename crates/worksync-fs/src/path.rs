//! Normalized workspace path handling
//!
//! Workspace paths always use forward slashes internally and convert to the
//! platform-native form only at I/O boundaries. Depot paths coming from the
//! version-control server already use forward slashes; normalizing local
//! paths the same way means filter rules and manifest entries compare
//! consistently on every platform.

use std::path::{Path, PathBuf};

/// A workspace-relative or absolute path normalized to forward slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspacePath {
    inner: String,
}

impl WorkspacePath {
    /// Create a new `WorkspacePath` from any path-like input.
    ///
    /// Backslashes are converted to forward slashes for internal storage.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy();
        Self {
            inner: raw.replace('\\', "/"),
        }
    }

    /// Get the normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native `PathBuf` for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a relative segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        let segment = segment.trim_start_matches('/');
        let joined = if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment)
        } else {
            format!("{}/{}", self.inner, segment)
        };
        Self { inner: joined }
    }

    /// Get the parent directory, if any.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            None => None,
        }
    }

    /// Get the final path component.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Return this path relative to `base`, if `base` is an ancestor.
    ///
    /// The comparison is case-insensitive, matching how the version-control
    /// server treats client paths on case-preserving filesystems.
    pub fn strip_prefix(&self, base: &WorkspacePath) -> Option<&str> {
        let base_str = base.inner.trim_end_matches('/');
        if self.inner.len() <= base_str.len() {
            return None;
        }
        let (head, tail) = self.inner.split_at(base_str.len());
        if head.eq_ignore_ascii_case(base_str) && tail.starts_with('/') {
            Some(&tail[1..])
        } else {
            None
        }
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }
}

impl AsRef<Path> for WorkspacePath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for WorkspacePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for WorkspacePath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

/// Split a path into lower-cased segment tokens for filter matching.
///
/// Leading slashes (including the `//depot` prefix of depot paths once the
/// root has been stripped) do not produce empty tokens.
pub fn split_path_tokens(path: &str) -> Vec<String> {
    path.replace('\\', "/")
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn backslashes_are_normalized() {
        let path = WorkspacePath::new(r"C:\work\project");
        assert_eq!(path.as_str(), "C:/work/project");
    }

    #[test]
    fn join_handles_separators() {
        let root = WorkspacePath::new("/work/project/");
        assert_eq!(root.join("sub/file.txt").as_str(), "/work/project/sub/file.txt");
        assert_eq!(
            WorkspacePath::new("/work/project").join("/sub").as_str(),
            "/work/project/sub"
        );
    }

    #[test]
    fn parent_and_file_name() {
        let path = WorkspacePath::new("/a/b/c.txt");
        assert_eq!(path.file_name(), Some("c.txt"));
        assert_eq!(path.parent().unwrap().as_str(), "/a/b");
        assert_eq!(WorkspacePath::new("/a").parent().unwrap().as_str(), "/");
        assert!(WorkspacePath::new("a").parent().is_none());
    }

    #[test]
    fn strip_prefix_is_case_insensitive() {
        let base = WorkspacePath::new("/Work/Project");
        let path = WorkspacePath::new("/work/project/Engine/Build.cs");
        assert_eq!(path.strip_prefix(&base), Some("Engine/Build.cs"));
        assert_eq!(WorkspacePath::new("/other/file").strip_prefix(&base), None);
    }

    #[test]
    fn split_tokens_lowercases_and_drops_empties() {
        assert_eq!(
            split_path_tokens("/Engine/Source//File.CPP"),
            vec!["engine", "source", "file.cpp"]
        );
        assert_eq!(split_path_tokens(r"A\B"), vec!["a", "b"]);
    }
}
