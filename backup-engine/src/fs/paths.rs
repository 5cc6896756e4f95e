//! Home-relative shorthand expansion and source/destination checks.

use std::path::{Path, PathBuf};

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

/// A source is valid when it is non-empty and names an existing directory.
pub fn validate_source(path: &Path) -> bool {
    !is_blank(path) && expand_home(path).is_dir()
}

/// A destination is valid when it is non-empty and exists or can be created.
pub fn validate_destination(path: &Path) -> bool {
    if is_blank(path) {
        return false;
    }
    let expanded = expand_home(path);
    expanded.is_dir() || std::fs::create_dir_all(&expanded).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/backups")), home.join("backups"));
        }
        assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        assert_eq!(expand_home(Path::new("rel/~x")), PathBuf::from("rel/~x"));
    }

    #[test]
    fn test_validate_source() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        assert!(validate_source(dir.path()));
        assert!(!validate_source(&dir.path().join("missing")));
        assert!(!validate_source(Path::new("")));
        Ok(())
    }

    #[test]
    fn test_validate_destination_creates() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let dest = dir.path().join("new/nested");
        assert!(validate_destination(&dest));
        assert!(dest.is_dir());
        assert!(!validate_destination(Path::new("  ")));
        Ok(())
    }
}
