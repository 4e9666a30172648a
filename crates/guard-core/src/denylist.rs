use crate::error::{GuardError, Result};
use crate::io;
use crate::paths;
use crate::scanner::ScanOutcome;
use crate::selector::{CountUnit, FileSelector};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A pattern that must never match. No budget: any hit is a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenylistRule {
    pub id: String,
    pub label: String,
    pub pattern: String,
    /// Only changes the reported count; zero is zero either way.
    #[serde(default)]
    pub unit: CountUnit,
    #[serde(default)]
    pub scope: FileSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenylistResult {
    pub id: String,
    pub label: String,
    pub count: u64,
    pub ok: bool,
    /// Rules declared by a slice only bite once that slice is done.
    pub enforced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owning_slice: Option<String>,
    pub matched_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DenylistRule {
    pub fn evaluate(&self, outcome: ScanOutcome) -> DenylistResult {
        DenylistResult {
            id: self.id.clone(),
            label: self.label.clone(),
            count: outcome.count,
            ok: outcome.count == 0,
            enforced: true,
            owning_slice: None,
            matched_files: outcome.matched_files,
            warnings: outcome.warnings,
        }
    }

    /// Evaluate a rule a slice declared. Before the slice is done the result
    /// is informational and always `ok`.
    pub fn evaluate_for_slice(
        &self,
        outcome: ScanOutcome,
        slice_id: &str,
        slice_done: bool,
    ) -> DenylistResult {
        let mut result = self.evaluate(outcome);
        result.owning_slice = Some(slice_id.to_string());
        result.enforced = slice_done;
        if !slice_done {
            result.ok = true;
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Denylist (denylist.yaml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Denylist {
    #[serde(default)]
    pub rules: Vec<DenylistRule>,
}

impl Denylist {
    pub fn load(dir: &Path) -> Result<Self> {
        io::read_yaml_or_default(&paths::denylist_path(dir))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        io::write_yaml(&paths::denylist_path(dir), self)
    }

    pub fn get(&self, id: &str) -> Result<&DenylistRule> {
        self.rules
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| GuardError::DenylistRuleNotFound(id.to_string()))
    }

    /// Rules are never mutated in place; adding an id twice is refused.
    pub fn add(&mut self, rule: DenylistRule) -> Result<()> {
        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(GuardError::DuplicateId {
                kind: "denylist rule",
                id: rule.id,
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<DenylistRule> {
        let pos = self
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| GuardError::DenylistRuleNotFound(id.to_string()))?;
        Ok(self.rules.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> DenylistRule {
        DenylistRule {
            id: "raw-sql".into(),
            label: "Raw SQL through the ORM".into(),
            pattern: r"\.raw\(".into(),
            unit: CountUnit::Files,
            scope: FileSelector::default(),
        }
    }

    fn outcome(count: u64) -> ScanOutcome {
        ScanOutcome {
            count,
            matched_files: (0..count).map(|i| format!("app/m{i}.py")).collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn zero_tolerance() {
        for count in 0..5 {
            let result = rule().evaluate(outcome(count));
            assert_eq!(result.ok, count == 0, "count {count}");
            assert!(result.enforced);
        }
    }

    #[test]
    fn slice_rules_are_informational_until_done() {
        let pending = rule().evaluate_for_slice(outcome(3), "slice-004", false);
        assert!(pending.ok);
        assert!(!pending.enforced);
        assert_eq!(pending.count, 3);

        let done = rule().evaluate_for_slice(outcome(3), "slice-004", true);
        assert!(!done.ok);
        assert_eq!(done.owning_slice.as_deref(), Some("slice-004"));
    }

    #[test]
    fn add_refuses_duplicates_and_remove_requires_presence() {
        let mut list = Denylist::default();
        list.add(rule()).unwrap();
        assert!(matches!(
            list.add(rule()),
            Err(GuardError::DuplicateId { .. })
        ));
        assert_eq!(list.remove("raw-sql").unwrap().id, "raw-sql");
        assert!(matches!(
            list.remove("raw-sql"),
            Err(GuardError::DenylistRuleNotFound(_))
        ));
    }

    #[test]
    fn unit_defaults_to_files() {
        let yaml = "id: a\nlabel: A\npattern: x\n";
        let r: DenylistRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(r.unit, CountUnit::Files);
    }
}
