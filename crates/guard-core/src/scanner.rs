//! Pattern counting over a file selection.
//!
//! Matching is regex-over-lines, the same shape as `grep -E`. A file counts
//! once under [`CountUnit::Files`] no matter how many of its lines match.

use crate::error::{GuardError, Result};
use crate::selector::{CompiledSelector, CountUnit};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compile a record's pattern. Failure is a configuration error.
pub fn compile_pattern(id: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| GuardError::InvalidPattern {
        id: id.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub count: u64,
    pub matched_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Counts occurrences of a pattern. Implementations are read-only and must be
/// safe to call from several worker threads at once.
pub trait Scanner: Send + Sync {
    fn count(&self, pattern: &Regex, scope: &CompiledSelector, unit: CountUnit) -> ScanOutcome;
}

/// Line-oriented regex scanner rooted at the project directory.
#[derive(Debug, Clone)]
pub struct RegexScanner {
    root: PathBuf,
}

impl RegexScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Scanner for RegexScanner {
    fn count(&self, pattern: &Regex, scope: &CompiledSelector, unit: CountUnit) -> ScanOutcome {
        let selection = scope.select(&self.root);
        let mut outcome = ScanOutcome {
            warnings: selection.warnings,
            ..Default::default()
        };

        for (rel, abs) in &selection.files {
            let bytes = match std::fs::read(abs) {
                Ok(b) => b,
                Err(err) => {
                    tracing::warn!(path = %rel, error = %err, "unreadable file skipped");
                    outcome.warnings.push(format!("cannot read '{rel}': {err}"));
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&bytes);
            let hits = text.lines().filter(|line| pattern.is_match(line)).count() as u64;
            if hits == 0 {
                continue;
            }
            outcome.matched_files.push(rel.clone());
            outcome.count += match unit {
                CountUnit::Files => 1,
                CountUnit::Lines => hits,
            };
        }

        tracing::debug!(
            pattern = pattern.as_str(),
            count = outcome.count,
            unit = unit.as_str(),
            files = selection.files.len(),
            "scan complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::FileSelector;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, body).unwrap();
    }

    fn src_scope() -> CompiledSelector {
        FileSelector {
            root_paths: vec!["src".into()],
            ..Default::default()
        }
        .compile("test", &[])
        .unwrap()
    }

    #[test]
    fn files_unit_counts_each_file_once() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "jwt.verify(a)\njwt.verify(b)\n");
        write(dir.path(), "src/b.ts", "jwt.verify(c)\n");
        write(dir.path(), "src/c.ts", "jwt.sign(d)\n");

        let re = compile_pattern("jwt", r"jwt\.verify\(").unwrap();
        let out = RegexScanner::new(dir.path()).count(&re, &src_scope(), CountUnit::Files);
        assert_eq!(out.count, 2);
        assert_eq!(out.matched_files, vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn lines_unit_counts_matching_lines() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "jwt.verify(a)\njwt.verify(b)\nok\n");
        write(dir.path(), "src/b.ts", "jwt.verify(c)\n");

        let re = compile_pattern("jwt", r"jwt\.verify\(").unwrap();
        let out = RegexScanner::new(dir.path()).count(&re, &src_scope(), CountUnit::Lines);
        assert_eq!(out.count, 3);
        assert_eq!(out.matched_files.len(), 2);
    }

    #[test]
    fn invalid_pattern_is_configuration_error() {
        let err = compile_pattern("broken", r"jwt\.verify(").unwrap_err();
        assert!(matches!(err, GuardError::InvalidPattern { ref id, .. } if id == "broken"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn non_utf8_content_is_still_scanned() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("src/bin.dat");
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, [0xff, 0xfe, b'\n', b'r', b'a', b'w', b'(', b')', b'\n']).unwrap();

        let re = compile_pattern("raw", r"raw\(\)").unwrap();
        let out = RegexScanner::new(dir.path()).count(&re, &src_scope(), CountUnit::Files);
        assert_eq!(out.count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_a_warning() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "objects.raw(\n");
        write(dir.path(), "src/locked.ts", "objects.raw(\n");
        let locked = dir.path().join("src/locked.ts");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read(&locked).is_ok() {
            // running as root: permissions are not enforced
            return;
        }

        let re = compile_pattern("raw", r"objects\.raw\(").unwrap();
        let out = RegexScanner::new(dir.path()).count(&re, &src_scope(), CountUnit::Files);
        assert_eq!(out.count, 1);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("src/locked.ts"));
    }
}
