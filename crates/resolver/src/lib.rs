use anyhow_source_location::format_error;
use std::path::{Path, PathBuf};

/// Locates a locally installed executable by walking up parent
/// `node_modules/.bin` directories until found or the filesystem root is
/// reached.
///
/// Scoped packages (`node_modules/@scope/package`) nest one level deeper
/// than plain packages, so when the walk moves into a directory whose name
/// carries the `@` scope marker it skips one additional level before
/// checking again.
pub fn resolve(name: &str, start_directory: &Path) -> Option<PathBuf> {
    let mut directory = start_directory.to_path_buf();
    loop {
        let candidate = directory
            .join("node_modules")
            .join(".bin")
            .join(name);
        if candidate.is_file() {
            return Some(candidate);
        }

        let mut parent = directory.parent()?.to_path_buf();
        if is_scope_directory(&parent) {
            parent = parent.parent()?.to_path_buf();
        }
        directory = parent;
    }
}

/// Same walk as [`resolve`] but treats a missing binary as an error with a
/// message naming the executable.
pub fn require(name: &str, start_directory: &Path) -> anyhow::Result<PathBuf> {
    resolve(name, start_directory).ok_or(format_error!(
        "Could not find `{name}` in any node_modules/.bin directory above {}",
        start_directory.display()
    ))
}

fn is_scope_directory(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('@'))
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    fn install_binary(root: &Path, name: &str) -> PathBuf {
        let bin_directory = root.join("node_modules").join(".bin");
        std::fs::create_dir_all(&bin_directory).unwrap();
        let binary = bin_directory.join(name);
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        binary
    }

    #[test]
    fn test_resolve_in_start_directory() {
        let workspace = tempfile::tempdir().unwrap();
        let binary = install_binary(workspace.path(), "truffle");
        let resolved = resolve("truffle", workspace.path()).unwrap();
        assert_eq!(resolved, binary);
    }

    #[test]
    fn test_resolve_in_parent_directory() {
        let workspace = tempfile::tempdir().unwrap();
        let binary = install_binary(workspace.path(), "ganache-cli");
        let nested = workspace.path().join("packages").join("app");
        std::fs::create_dir_all(&nested).unwrap();
        let resolved = resolve("ganache-cli", &nested).unwrap();
        assert_eq!(resolved, binary);
    }

    #[test]
    fn test_resolve_skips_scope_directory() {
        let workspace = tempfile::tempdir().unwrap();
        let binary = install_binary(workspace.path(), "truffle");
        let scoped = workspace
            .path()
            .join("node_modules")
            .join("@aragon")
            .join("cli");
        std::fs::create_dir_all(&scoped).unwrap();
        let resolved = resolve("truffle", &scoped).unwrap();
        assert_eq!(resolved, binary);
    }

    #[test]
    fn test_resolve_not_found_terminates() {
        let workspace = tempfile::tempdir().unwrap();
        let nested = workspace.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert!(resolve("missing-binary", &nested).is_none());
    }

    #[test]
    fn test_require_reports_missing_binary() {
        let workspace = tempfile::tempdir().unwrap();
        let result = require("missing-binary", workspace.path());
        assert!(result.is_err());
    }
}
