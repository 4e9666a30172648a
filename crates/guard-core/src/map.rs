use crate::error::Result;
use crate::io;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// MapEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStatus {
    Pending,
    Migrated,
    Deleted,
}

impl fmt::Display for MapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MapStatus::Pending => "pending",
            MapStatus::Migrated => "migrated",
            MapStatus::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapEntry {
    pub slice_id: String,
    pub capability: String,
    pub current_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    pub status: MapStatus,
    #[serde(default)]
    pub delete_in_pr: bool,
}

// ---------------------------------------------------------------------------
// FileMap (map.yaml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMap {
    #[serde(default)]
    pub entries: Vec<MapEntry>,
}

impl FileMap {
    pub fn load(dir: &Path) -> Result<Self> {
        io::read_yaml_or_default(&paths::map_path(dir))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        io::write_yaml(&paths::map_path(dir), self)
    }

    /// Paths the map accounts for: the `current_path` of every entry not yet
    /// deleted.
    pub fn tracked_paths(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|e| e.status != MapStatus::Deleted)
            .map(|e| paths::normalize_record_path(&e.current_path))
            .collect()
    }

    /// Record paths whose existence decides whether an entry is stale,
    /// sorted and deduplicated.
    pub fn existence_probes(&self) -> Vec<String> {
        let probes: BTreeSet<String> = self
            .entries
            .iter()
            .filter_map(probed_path)
            .map(paths::normalize_record_path)
            .collect();
        probes.into_iter().collect()
    }
}

fn probed_path(entry: &MapEntry) -> Option<&str> {
    match entry.status {
        MapStatus::Pending | MapStatus::Deleted => Some(&entry.current_path),
        MapStatus::Migrated => entry.target_path.as_deref(),
    }
}

// ---------------------------------------------------------------------------
// Consistency check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleEntry {
    pub entry: MapEntry,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapResult {
    pub governed_files: usize,
    pub unmapped_files: Vec<String>,
    pub stale_entries: Vec<StaleEntry>,
    pub ok: bool,
}

impl MapResult {
    pub fn violation_count(&self) -> usize {
        self.unmapped_files.len() + self.stale_entries.len()
    }
}

fn stale_reason(entry: &MapEntry, present: &dyn Fn(&str) -> bool) -> Option<String> {
    let present = |p: &str| present(paths::normalize_record_path(p).as_str());
    match entry.status {
        MapStatus::Pending if !present(&entry.current_path) => Some(format!(
            "pending entry but '{}' does not exist",
            entry.current_path
        )),
        MapStatus::Migrated => match &entry.target_path {
            None => Some("migrated entry has no target_path".to_string()),
            Some(target) if !present(target) => {
                Some(format!("migrated entry but target '{target}' does not exist"))
            }
            Some(_) => None,
        },
        MapStatus::Deleted if present(&entry.current_path) => Some(format!(
            "deleted entry but '{}' still exists",
            entry.current_path
        )),
        _ => None,
    }
}

/// Compare the files the migration governs against the map, probing the
/// filesystem directly.
pub fn check_map(
    root: &Path,
    map: &FileMap,
    governed: &BTreeSet<String>,
    migration_roots: &[String],
) -> MapResult {
    check_map_with(map, governed, migration_roots, &|rel: &str| {
        io::path_present(&root.join(rel))
    })
}

/// `governed` is every file a ratchet or denylist pattern matched, plus live
/// deletion targets and touched paths. Only files under `migration_roots`
/// (empty = whole project) are required to be mapped. `present` answers for
/// the normalized paths listed by [`FileMap::existence_probes`].
pub fn check_map_with(
    map: &FileMap,
    governed: &BTreeSet<String>,
    migration_roots: &[String],
    present: &dyn Fn(&str) -> bool,
) -> MapResult {
    let tracked = map.tracked_paths();
    let in_roots = |path: &str| {
        migration_roots.is_empty() || migration_roots.iter().any(|r| paths::is_under(path, r))
    };

    let scoped: Vec<&String> = governed.iter().filter(|p| in_roots(p)).collect();
    let unmapped_files: Vec<String> = scoped
        .iter()
        .filter(|p| !tracked.contains(p.as_str()))
        .map(|p| p.to_string())
        .collect();

    let stale_entries: Vec<StaleEntry> = map
        .entries
        .iter()
        .filter_map(|entry| {
            stale_reason(entry, present).map(|reason| StaleEntry {
                entry: entry.clone(),
                reason,
            })
        })
        .collect();

    MapResult {
        governed_files: scoped.len(),
        ok: unmapped_files.is_empty() && stale_entries.is_empty(),
        unmapped_files,
        stale_entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(current: &str, target: Option<&str>, status: MapStatus) -> MapEntry {
        MapEntry {
            slice_id: "slice-001".into(),
            capability: "auth".into(),
            current_path: current.into(),
            target_path: target.map(String::from),
            status,
            delete_in_pr: false,
        }
    }

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, "x").unwrap();
    }

    fn governed(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unreferenced_governed_file_is_unmapped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/auth/a.ts");
        touch(dir.path(), "src/auth/new.ts");
        let map = FileMap {
            entries: vec![entry("src/auth/a.ts", None, MapStatus::Pending)],
        };

        let result = check_map(
            dir.path(),
            &map,
            &governed(&["src/auth/a.ts", "src/auth/new.ts"]),
            &[],
        );
        assert_eq!(result.unmapped_files, vec!["src/auth/new.ts"]);
        assert!(!result.ok);
        assert_eq!(result.violation_count(), 1);
    }

    #[test]
    fn files_outside_migration_roots_are_ignored() {
        let dir = TempDir::new().unwrap();
        let result = check_map(
            dir.path(),
            &FileMap::default(),
            &governed(&["scripts/tool.ts"]),
            &["src".to_string()],
        );
        assert!(result.ok);
        assert_eq!(result.governed_files, 0);
    }

    #[test]
    fn deleted_entries_do_not_count_as_mapped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts");
        let map = FileMap {
            entries: vec![entry("src/a.ts", None, MapStatus::Deleted)],
        };
        let result = check_map(dir.path(), &map, &governed(&["src/a.ts"]), &[]);
        assert_eq!(result.unmapped_files, vec!["src/a.ts"]);
        assert_eq!(result.stale_entries.len(), 1);
        assert!(result.stale_entries[0].reason.contains("still exists"));
    }

    #[test]
    fn migrated_target_is_not_tracked_but_must_exist() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/new/a.ts");
        let map = FileMap {
            entries: vec![
                entry("src/old/a.ts", Some("src/new/a.ts"), MapStatus::Migrated),
                entry("src/old/b.ts", Some("src/new/b.ts"), MapStatus::Migrated),
                entry("src/old/c.ts", None, MapStatus::Migrated),
            ],
        };
        let result = check_map(dir.path(), &map, &governed(&["src/new/a.ts"]), &[]);
        assert_eq!(result.unmapped_files, vec!["src/new/a.ts"]);
        let reasons: Vec<&str> = result.stale_entries.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(
            reasons,
            vec![
                "migrated entry but target 'src/new/b.ts' does not exist",
                "migrated entry has no target_path"
            ]
        );
    }

    #[test]
    fn staleness_uses_only_the_supplied_probe_answers() {
        let map = FileMap {
            entries: vec![
                entry("./src/a.ts", None, MapStatus::Pending),
                entry("src/old/b.ts", Some("src/new/b.ts"), MapStatus::Migrated),
                entry("src/c.ts", None, MapStatus::Deleted),
                entry("src/a.ts", None, MapStatus::Pending),
            ],
        };
        assert_eq!(
            map.existence_probes(),
            vec!["src/a.ts", "src/c.ts", "src/new/b.ts"]
        );

        let result = check_map_with(&map, &BTreeSet::new(), &[], &|p: &str| p == "src/new/b.ts");
        let stale: Vec<&str> = result
            .stale_entries
            .iter()
            .map(|s| s.entry.current_path.as_str())
            .collect();
        assert_eq!(stale, vec!["./src/a.ts", "src/a.ts"]);
    }

    #[test]
    fn pending_entry_for_missing_file_is_stale() {
        let dir = TempDir::new().unwrap();
        let map = FileMap {
            entries: vec![entry("src/gone.ts", None, MapStatus::Pending)],
        };
        let result = check_map(dir.path(), &map, &BTreeSet::new(), &[]);
        assert_eq!(result.stale_entries.len(), 1);
        assert!(!result.ok);
    }

    #[test]
    fn record_paths_are_normalized_before_comparison() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts");
        let map = FileMap {
            entries: vec![entry("./src/a.ts", None, MapStatus::Pending)],
        };
        let result = check_map(dir.path(), &map, &governed(&["src/a.ts"]), &[]);
        assert!(result.ok);
    }
}
