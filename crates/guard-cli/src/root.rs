use guard_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `GUARD_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.migration/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(&cwd)
}

fn resolve_from(start: &Path) -> PathBuf {
    find_upward(start, paths::CONTROL_DIR)
        .or_else(|| find_upward(start, ".git"))
        .unwrap_or_else(|| start.to_path_buf())
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

/// Directory holding the records: the parent of `--config` when given,
/// otherwise `<root>/.migration`.
pub fn record_dir(root: &Path, config: Option<&Path>) -> PathBuf {
    match config.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        Some(_) => PathBuf::from("."),
        None => paths::control_dir(root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_control_dir_above_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".migration")).unwrap();
        let subdir = dir.path().join("src/deep");
        std::fs::create_dir_all(&subdir).unwrap();
        assert_eq!(resolve_from(&subdir), dir.path());
    }

    #[test]
    fn control_dir_beats_git() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("services/billing");
        std::fs::create_dir_all(nested.join(".migration")).unwrap();
        assert_eq!(resolve_from(&nested.join("src")), nested);
    }

    #[test]
    fn record_dir_follows_config_flag() {
        let root = Path::new("/repo");
        assert_eq!(record_dir(root, None), Path::new("/repo/.migration"));
        assert_eq!(
            record_dir(root, Some(Path::new("/etc/gov/config.yaml"))),
            Path::new("/etc/gov")
        );
        assert_eq!(record_dir(root, Some(Path::new("config.yaml"))), Path::new("."));
    }
}
