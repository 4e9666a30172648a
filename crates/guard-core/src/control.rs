//! The control plane: every governance record, read fresh and validated.
//!
//! Nothing here is cached across runs. A `ControlPlane` is built once per
//! invocation and thrown away; any record edited between runs is picked up by
//! the next `load`.

use crate::config::{ConfigWarning, GuardConfig};
use crate::denylist::{Denylist, DenylistRule};
use crate::error::{GuardError, Result};
use crate::map::FileMap;
use crate::paths;
use crate::ratchet::{Ratchet, RatchetLedger};
use crate::scanner::{compile_pattern, ScanOutcome, Scanner};
use crate::selector::{CompiledSelector, CountUnit, FileSelector};
use crate::slice::{format_cycle, SliceGraph};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// CompiledCheck
// ---------------------------------------------------------------------------

/// A pattern and scope compiled once at load time, ready to hand to a worker.
#[derive(Debug, Clone)]
pub struct CompiledCheck {
    pub id: String,
    pub pattern: Regex,
    pub scope: CompiledSelector,
    pub unit: CountUnit,
}

impl CompiledCheck {
    pub fn compile(
        id: &str,
        pattern: &str,
        scope: &FileSelector,
        unit: CountUnit,
        extra_excludes: &[String],
    ) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            pattern: compile_pattern(id, pattern)?,
            scope: scope.compile(id, extra_excludes)?,
            unit,
        })
    }

    pub fn scan(&self, scanner: &dyn Scanner) -> ScanOutcome {
        scanner.count(&self.pattern, &self.scope, self.unit)
    }
}

/// A denylist rule declared inside a slice.
#[derive(Debug, Clone)]
pub struct SliceRuleCheck {
    pub slice_id: String,
    pub rule: DenylistRule,
    pub check: CompiledCheck,
}

// ---------------------------------------------------------------------------
// ControlPlane
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ControlPlane {
    pub root: PathBuf,
    pub dir: PathBuf,
    pub config: GuardConfig,
    pub ratchets: RatchetLedger,
    pub denylist: Denylist,
    pub slices: SliceGraph,
    pub map: FileMap,
    ratchet_checks: Vec<CompiledCheck>,
    denylist_checks: Vec<CompiledCheck>,
    slice_rule_checks: Vec<SliceRuleCheck>,
}

impl ControlPlane {
    /// Load and validate every record. `config_file` overrides the default
    /// `<root>/.migration/config.yaml`; the other records are read from the
    /// directory that holds it.
    ///
    /// Any configuration error aborts here, before a single check runs.
    pub fn load(root: &Path, config_file: Option<&Path>) -> Result<Self> {
        let (dir, config_path) = match config_file {
            Some(file) => {
                let dir = file
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (dir, file.to_path_buf())
            }
            None => {
                let dir = paths::control_dir(root);
                let file = paths::config_path(&dir);
                (dir, file)
            }
        };

        let config = GuardConfig::load_file(&config_path)?;
        let ratchets = RatchetLedger::load(&dir)?;
        let denylist = Denylist::load(&dir)?;
        let slices = SliceGraph::load(&dir)?;
        let map = FileMap::load(&dir)?;

        let extra = &config.exclude_dirs;
        // Records kept outside `.migration/` but inside the project must not
        // be scanned as source.
        let record_rel = dir
            .strip_prefix(root)
            .ok()
            .map(|rel| paths::to_record_path(Path::new(""), rel))
            .filter(|rel| !rel.is_empty());
        let compile = |id: &str, pattern: &str, scope: &FileSelector, unit: CountUnit| {
            let mut check = CompiledCheck::compile(id, pattern, scope, unit, extra)?;
            if let Some(rel) = &record_rel {
                check.scope.exclude_path(rel);
            }
            Ok::<_, GuardError>(check)
        };

        let mut seen = HashSet::new();
        let mut ratchet_checks = Vec::with_capacity(ratchets.ratchets.len());
        for r in &ratchets.ratchets {
            paths::validate_id(&r.id)?;
            if !seen.insert(r.id.as_str()) {
                return Err(GuardError::DuplicateId {
                    kind: "ratchet",
                    id: r.id.clone(),
                });
            }
            ratchet_checks.push(compile(&r.id, &r.pattern, &r.scope, r.unit)?);
        }

        let mut seen = HashSet::new();
        let mut denylist_checks = Vec::with_capacity(denylist.rules.len());
        for rule in &denylist.rules {
            paths::validate_id(&rule.id)?;
            if !seen.insert(rule.id.clone()) {
                return Err(GuardError::DuplicateId {
                    kind: "denylist rule",
                    id: rule.id.clone(),
                });
            }
            denylist_checks.push(compile(&rule.id, &rule.pattern, &rule.scope, rule.unit)?);
        }

        let mut slice_rule_checks = Vec::new();
        for slice in slices.slices() {
            for rule in &slice.denylist_patterns {
                paths::validate_id(&rule.id)?;
                if !seen.insert(rule.id.clone()) {
                    return Err(GuardError::DuplicateId {
                        kind: "denylist rule",
                        id: rule.id.clone(),
                    });
                }
                slice_rule_checks.push(SliceRuleCheck {
                    slice_id: slice.id.clone(),
                    rule: rule.clone(),
                    check: compile(&rule.id, &rule.pattern, &rule.scope, rule.unit)?,
                });
            }
        }

        if let Some((slice, dependency)) = slices.unknown_dependencies().into_iter().next() {
            return Err(GuardError::UnknownDependency { slice, dependency });
        }

        let cycles = slices.detect_cycles();
        if !cycles.is_empty() {
            let rendered: Vec<String> = cycles.iter().map(|c| format_cycle(c)).collect();
            return Err(GuardError::CyclicDependencies(rendered.join("; ")));
        }

        tracing::debug!(
            dir = %dir.display(),
            ratchets = ratchet_checks.len(),
            denylist = denylist_checks.len(),
            slices = slices.len(),
            map_entries = map.entries.len(),
            "control plane loaded"
        );

        Ok(Self {
            root: root.to_path_buf(),
            dir,
            config,
            ratchets,
            denylist,
            slices,
            map,
            ratchet_checks,
            denylist_checks,
            slice_rule_checks,
        })
    }

    pub fn ratchet_checks(&self) -> &[CompiledCheck] {
        &self.ratchet_checks
    }

    pub fn denylist_checks(&self) -> &[CompiledCheck] {
        &self.denylist_checks
    }

    pub fn slice_rule_checks(&self) -> &[SliceRuleCheck] {
        &self.slice_rule_checks
    }

    /// The ratchet record and its compiled check.
    pub fn ratchet(&self, id: &str) -> Result<(&Ratchet, &CompiledCheck)> {
        self.ratchets
            .ratchets
            .iter()
            .zip(&self.ratchet_checks)
            .find(|(r, _)| r.id == id)
            .ok_or_else(|| GuardError::RatchetNotFound(id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Non-fatal validation
    // -----------------------------------------------------------------------

    /// Lint the loaded records. Fatal problems never get here; `load` has
    /// already refused them.
    pub fn validate_warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = self.config.validate(&self.root);

        let mut scope_lint = |owner: String, scope: &FileSelector| {
            if scope.root_paths.is_empty() {
                warnings.push(ConfigWarning::warning(format!(
                    "{owner} has no root_paths; it scans the whole project"
                )));
            }
            for root in &scope.root_paths {
                let rel = paths::normalize_record_path(root);
                if !self.root.join(&rel).exists() {
                    warnings.push(ConfigWarning::warning(format!(
                        "{owner} scope root '{root}' does not exist"
                    )));
                }
            }
        };
        for r in &self.ratchets.ratchets {
            scope_lint(format!("ratchet '{}'", r.id), &r.scope);
        }
        for rule in &self.denylist.rules {
            scope_lint(format!("denylist rule '{}'", rule.id), &rule.scope);
        }
        for check in &self.slice_rule_checks {
            scope_lint(
                format!("denylist rule '{}' (slice '{}')", check.rule.id, check.slice_id),
                &check.rule.scope,
            );
        }

        for r in &self.ratchets.ratchets {
            if r.budget == 0 && r.promoted_to.is_none() {
                warnings.push(ConfigWarning::warning(format!(
                    "ratchet '{}' is at budget 0; promote it to a denylist rule",
                    r.id
                )));
            }
            if !r.history_is_monotonic() {
                warnings.push(ConfigWarning::error(format!(
                    "ratchet '{}' budget history increases: {:?}",
                    r.id,
                    r.budgets_held()
                )));
            }
        }

        let ratchet_ids: HashSet<&str> =
            self.ratchets.ratchets.iter().map(|r| r.id.as_str()).collect();
        let roots = &self.config.roots;
        for slice in self.slices.slices() {
            for id in &slice.ratchets {
                if !ratchet_ids.contains(id.as_str()) {
                    warnings.push(ConfigWarning::warning(format!(
                        "slice '{}' lists unknown ratchet '{id}'",
                        slice.id
                    )));
                }
            }
            for target in &slice.deletion_targets {
                let path = paths::normalize_record_path(&target.path);
                if !roots.is_empty() && !roots.iter().any(|r| paths::is_under(&path, r)) {
                    warnings.push(ConfigWarning::warning(format!(
                        "deletion target '{path}' of slice '{}' is outside the migration roots",
                        slice.id
                    )));
                }
            }
        }

        for entry in &self.map.entries {
            if self.slices.get(&entry.slice_id).is_err() {
                warnings.push(ConfigWarning::warning(format!(
                    "map entry '{}' names unknown slice '{}'",
                    entry.current_path, entry.slice_id
                )));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
