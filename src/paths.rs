//! Path helpers for user-supplied archive paths

use crate::error::{SelfextError, SelfextResult};
use std::path::{Component, Path, PathBuf};

/// Normalize a path by removing `.` and resolving `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {} // Skip `.`
            Component::ParentDir => {
                // Pop the last component if it's a normal component
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else if !matches!(
                    components.last(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }
    components.iter().collect()
}

/// Expand a leading `~` and make the path absolute.
///
/// `~` alone is the home directory and `~/rest` is `<home>/rest`. Any other
/// path is resolved against the current directory.
pub fn expand_path(path: &str) -> SelfextResult<PathBuf> {
    if path.is_empty() {
        return Err(SelfextError::InvalidPath("path cannot be empty".to_string()));
    }

    let expanded = if path == "~" {
        home_dir()?
    } else if let Some(rest) = path.strip_prefix("~/").or_else(|| {
        if cfg!(windows) {
            path.strip_prefix("~\\")
        } else {
            None
        }
    }) {
        home_dir()?.join(rest)
    } else {
        PathBuf::from(path)
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map_err(|e| {
                SelfextError::InvalidPath(format!("cannot resolve current directory: {}", e))
            })?
            .join(expanded)
    };

    Ok(normalize_path(&absolute))
}

fn home_dir() -> SelfextResult<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| SelfextError::InvalidPath("cannot determine home directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_expand_empty() {
        assert!(matches!(expand_path(""), Err(SelfextError::InvalidPath(_))));
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~").unwrap(), normalize_path(&home));
        assert_eq!(
            expand_path("~/archives/data.zip").unwrap(),
            normalize_path(&home.join("archives").join("data.zip"))
        );
    }

    #[test]
    fn test_expand_relative() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            expand_path("data.zip").unwrap(),
            normalize_path(&cwd.join("data.zip"))
        );
        assert!(expand_path("./x/../data.zip").unwrap().is_absolute());
    }

    #[test]
    fn test_tilde_in_name_is_literal() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            expand_path("~backup.zip").unwrap(),
            normalize_path(&cwd.join("~backup.zip"))
        );
    }
}
