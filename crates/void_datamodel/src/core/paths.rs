//! Lexical path helpers for project-relative file references

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without touching the file system
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Express `target` relative to the directory `base`.
///
/// Both paths are normalized first. Paths on different roots are returned
/// unchanged.
pub fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base = normalize(base);
    let target = normalize(target);
    if base.has_root() != target.has_root() {
        return target;
    }
    let base_parts: Vec<_> = base.components().collect();
    let target_parts: Vec<_> = target.components().collect();
    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 && base.has_root() {
        return target;
    }

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

/// Resolve a stored path against `folder` unless it is already absolute
pub fn resolve_in(folder: Option<&Path>, stored: &str) -> PathBuf {
    let stored = Path::new(stored);
    match folder {
        Some(folder) if stored.is_relative() => normalize(&folder.join(stored)),
        _ => normalize(stored),
    }
}

/// Render a path with forward slashes for storage in documents
pub fn to_document_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/p/scenes"), Path::new("/p/shared/lib.vproj")),
            PathBuf::from("../shared/lib.vproj")
        );
        assert_eq!(
            relative_to(Path::new("/p"), Path::new("/p/a.vproj")),
            PathBuf::from("a.vproj")
        );
    }

    #[test]
    fn test_resolve_in() {
        assert_eq!(
            resolve_in(Some(Path::new("/p/scenes")), "../shared/lib.vproj"),
            PathBuf::from("/p/shared/lib.vproj")
        );
        assert_eq!(resolve_in(None, "a/../b"), PathBuf::from("b"));
    }
}
