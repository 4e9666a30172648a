use crate::error::{GuardError, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Control-plane layout
// ---------------------------------------------------------------------------

pub const CONTROL_DIR: &str = ".migration";

pub const CONFIG_FILE: &str = "config.yaml";
pub const RATCHETS_FILE: &str = "ratchets.yaml";
pub const DENYLIST_FILE: &str = "denylist.yaml";
pub const SLICES_FILE: &str = "slices.yaml";
pub const MAP_FILE: &str = "map.yaml";
pub const DECISIONS_FILE: &str = "decisions.yaml";

/// Version-control and dependency-cache directories that no scan ever enters.
pub const ALWAYS_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".jj",
    "node_modules",
    "bower_components",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".gradle",
    CONTROL_DIR,
];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn control_dir(root: &Path) -> PathBuf {
    root.join(CONTROL_DIR)
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

pub fn ratchets_path(dir: &Path) -> PathBuf {
    dir.join(RATCHETS_FILE)
}

pub fn denylist_path(dir: &Path) -> PathBuf {
    dir.join(DENYLIST_FILE)
}

pub fn slices_path(dir: &Path) -> PathBuf {
    dir.join(SLICES_FILE)
}

pub fn map_path(dir: &Path) -> PathBuf {
    dir.join(MAP_FILE)
}

pub fn decisions_path(dir: &Path) -> PathBuf {
    dir.join(DECISIONS_FILE)
}

/// Render `path` relative to `root` with forward slashes, the form every
/// record and report uses.
pub fn to_record_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(p) => parts.push(p.to_string_lossy().into_owned()),
            Component::ParentDir => parts.push("..".to_string()),
            _ => {}
        }
    }
    parts.join("/")
}

/// Normalize a path string as written in a record (`./src/a.ts`, `src\a.ts`)
/// to the canonical `src/a.ts` form.
pub fn normalize_record_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    unified
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// True if `path` equals `prefix` or lies beneath it. An empty prefix is the
/// project root and contains everything.
pub fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = normalize_record_path(prefix);
    if prefix.is_empty() {
        return true;
    }
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

// ---------------------------------------------------------------------------
// Id validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*$").unwrap())
}

pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 128 || !id_re().is_match(id) {
        return Err(GuardError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
