use crate::error::{GuardError, Result};
use crate::paths;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// CountUnit
// ---------------------------------------------------------------------------

/// What a scan counts: files containing at least one match, or matching lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountUnit {
    #[default]
    Files,
    Lines,
}

impl CountUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            CountUnit::Files => "files",
            CountUnit::Lines => "lines",
        }
    }
}

impl fmt::Display for CountUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FileSelector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSelector {
    /// Walk roots, relative to the project root. Empty means the project root.
    #[serde(default)]
    pub root_paths: Vec<String>,
    /// Globs matched against the project-relative path. Empty means every file.
    #[serde(default)]
    pub include_globs: Vec<String>,
    /// Directory names (`dist`) or project-relative directories (`src/legacy`)
    /// to skip, on top of the version-control and dependency-cache defaults.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
}

impl FileSelector {
    /// Compile globs and merge excludes. `owner` names the record in errors.
    pub fn compile(&self, owner: &str, extra_excludes: &[String]) -> Result<CompiledSelector> {
        let include = if self.include_globs.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for g in &self.include_globs {
                let glob = Glob::new(g).map_err(|e| GuardError::InvalidGlob {
                    id: owner.to_string(),
                    glob: g.clone(),
                    message: e.to_string(),
                })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(|e| GuardError::InvalidGlob {
                id: owner.to_string(),
                glob: self.include_globs.join(","),
                message: e.to_string(),
            })?)
        };

        let mut exclude_names: HashSet<String> = paths::ALWAYS_EXCLUDED_DIRS
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut exclude_paths = Vec::new();
        for raw in self.exclude_dirs.iter().chain(extra_excludes) {
            let normalized = paths::normalize_record_path(raw);
            if normalized.is_empty() {
                continue;
            }
            if normalized.contains('/') {
                exclude_paths.push(normalized);
            } else {
                exclude_names.insert(normalized);
            }
        }

        let mut roots: Vec<String> = self
            .root_paths
            .iter()
            .map(|r| paths::normalize_record_path(r))
            .collect();
        if roots.is_empty() {
            roots.push(String::new());
        }
        roots.sort();
        roots.dedup();

        Ok(CompiledSelector {
            roots,
            include,
            exclude_names,
            exclude_paths,
        })
    }
}

// ---------------------------------------------------------------------------
// CompiledSelector
// ---------------------------------------------------------------------------

/// A `FileSelector` ready to walk. Cheap to clone into worker threads.
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    roots: Vec<String>,
    include: Option<GlobSet>,
    exclude_names: HashSet<String>,
    exclude_paths: Vec<String>,
}

/// Files selected under a project root, keyed by record path.
#[derive(Debug, Default)]
pub struct Selection {
    pub files: BTreeMap<String, PathBuf>,
    pub warnings: Vec<String>,
}

impl CompiledSelector {
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Skip one more project-relative directory.
    pub fn exclude_path(&mut self, rel: &str) {
        let normalized = paths::normalize_record_path(rel);
        if !normalized.is_empty() && !self.exclude_paths.contains(&normalized) {
            self.exclude_paths.push(normalized);
        }
    }

    fn excluded_dir(&self, rel: &str, name: &str) -> bool {
        self.exclude_names.contains(name)
            || self.exclude_paths.iter().any(|p| paths::is_under(rel, p))
    }

    fn included(&self, rel: &str) -> bool {
        match &self.include {
            Some(set) => set.is_match(rel),
            None => true,
        }
    }

    /// Walk every root and return the selected files, sorted and deduplicated.
    /// Walk failures become warnings; they never abort the selection.
    pub fn select(&self, project_root: &Path) -> Selection {
        let mut selection = Selection::default();
        for root in &self.roots {
            let start = if root.is_empty() {
                project_root.to_path_buf()
            } else {
                project_root.join(root)
            };
            if !start.exists() {
                let shown = if root.is_empty() { "." } else { root.as_str() };
                tracing::warn!(root = shown, "scope root does not exist");
                selection
                    .warnings
                    .push(format!("scope root '{shown}' does not exist"));
                continue;
            }

            let walker = WalkDir::new(&start)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| {
                    if entry.depth() == 0 || !entry.file_type().is_dir() {
                        return true;
                    }
                    let rel = paths::to_record_path(project_root, entry.path());
                    let name = entry.file_name().to_string_lossy();
                    !self.excluded_dir(&rel, &name)
                });

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(err) => {
                        let at = err
                            .path()
                            .map(|p| paths::to_record_path(project_root, p))
                            .unwrap_or_else(|| root.clone());
                        tracing::warn!(path = %at, error = %err, "walk error");
                        selection.warnings.push(format!("cannot walk '{at}': {err}"));
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = paths::to_record_path(project_root, entry.path());
                if !self.included(&rel) {
                    continue;
                }
                selection.files.insert(rel, entry.path().to_path_buf());
            }
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, "x\n").unwrap();
    }

    fn names(sel: &Selection) -> Vec<&str> {
        sel.files.keys().map(|s| s.as_str()).collect()
    }

    #[test]
    fn default_excludes_skip_vcs_and_dependency_caches() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts");
        touch(dir.path(), ".git/config");
        touch(dir.path(), "node_modules/lib/index.ts");
        touch(dir.path(), ".migration/ratchets.yaml");

        let sel = FileSelector::default().compile("t", &[]).unwrap();
        assert_eq!(names(&sel.select(dir.path())), vec!["src/a.ts"]);
    }

    #[test]
    fn include_globs_and_exclude_dirs_combine() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts");
        touch(dir.path(), "src/a.py");
        touch(dir.path(), "src/legacy/old.ts");
        touch(dir.path(), "src/dist/bundle.ts");
        touch(dir.path(), "tests/a.test.ts");

        let selector = FileSelector {
            root_paths: vec!["src".into()],
            include_globs: vec!["**/*.ts".into()],
            exclude_dirs: vec!["src/legacy".into(), "dist".into()],
        };
        let sel = selector.compile("t", &[]).unwrap().select(dir.path());
        assert_eq!(names(&sel), vec!["src/a.ts"]);
        assert!(sel.warnings.is_empty());
    }

    #[test]
    fn overlapping_roots_are_deduplicated() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/auth/a.ts");

        let selector = FileSelector {
            root_paths: vec!["src".into(), "./src/auth".into()],
            ..Default::default()
        };
        let sel = selector.compile("t", &[]).unwrap().select(dir.path());
        assert_eq!(names(&sel), vec!["src/auth/a.ts"]);
    }

    #[test]
    fn file_root_selects_that_file() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "settings.py");
        let selector = FileSelector {
            root_paths: vec!["settings.py".into()],
            ..Default::default()
        };
        let sel = selector.compile("t", &[]).unwrap().select(dir.path());
        assert_eq!(names(&sel), vec!["settings.py"]);
    }

    #[test]
    fn missing_root_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let selector = FileSelector {
            root_paths: vec!["nowhere".into()],
            ..Default::default()
        };
        let sel = selector.compile("t", &[]).unwrap().select(dir.path());
        assert!(sel.files.is_empty());
        assert_eq!(sel.warnings, vec!["scope root 'nowhere' does not exist"]);
    }

    #[test]
    fn invalid_glob_is_reported_with_owner() {
        let selector = FileSelector {
            include_globs: vec!["src/[".into()],
            ..Default::default()
        };
        let err = selector.compile("jwt-verify", &[]).unwrap_err();
        assert!(matches!(err, GuardError::InvalidGlob { ref id, .. } if id == "jwt-verify"));
    }

    #[test]
    fn excluded_path_skips_only_that_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "gov/ratchets.yaml");
        touch(dir.path(), "src/gov/a.ts");

        let mut selector = FileSelector::default().compile("t", &[]).unwrap();
        selector.exclude_path("gov");
        assert_eq!(names(&selector.select(dir.path())), vec!["src/gov/a.ts"]);
    }

    #[test]
    fn unit_is_snake_case_in_yaml() {
        let yaml = serde_yaml::to_string(&CountUnit::Lines).unwrap();
        assert_eq!(yaml.trim(), "lines");
    }
}
