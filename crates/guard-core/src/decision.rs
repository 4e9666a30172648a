//! Charter-level changes to the control plane.
//!
//! Promoting a ratchet and retiring a denylist rule are the only ways a rule
//! set changes shape. Each one appends a [`Decision`] to `decisions.yaml`.

use crate::denylist::{Denylist, DenylistRule};
use crate::error::{GuardError, Result};
use crate::io;
use crate::paths;
use crate::ratchet::RatchetLedger;
use crate::slice::SliceGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    PromoteRatchet,
    RetireDenylistRule,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionKind::PromoteRatchet => "promote_ratchet",
            DecisionKind::RetireDenylistRule => "retire_denylist_rule",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub kind: DecisionKind,
    pub subject: String,
    pub rationale: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionLog {
    #[serde(default)]
    pub decisions: Vec<Decision>,
}

impl DecisionLog {
    pub fn load(dir: &Path) -> Result<Self> {
        io::read_yaml_or_default(&paths::decisions_path(dir))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        io::write_yaml(&paths::decisions_path(dir), self)
    }

    fn next_id(&self) -> String {
        let max = self
            .decisions
            .iter()
            .filter_map(|d| d.id.strip_prefix('D')?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("D{}", max + 1)
    }

    pub fn record(
        &mut self,
        kind: DecisionKind,
        subject: impl Into<String>,
        rationale: impl Into<String>,
    ) -> &Decision {
        let decision = Decision {
            id: self.next_id(),
            kind,
            subject: subject.into(),
            rationale: rationale.into(),
            decided_at: Utc::now(),
        };
        self.decisions.push(decision);
        &self.decisions[self.decisions.len() - 1]
    }
}

fn require_rationale(rationale: &str) -> Result<()> {
    if rationale.trim().is_empty() {
        return Err(GuardError::InvariantViolation(
            "a charter-level change needs a rationale".to_string(),
        ));
    }
    Ok(())
}

/// Convert a ratchet that has reached zero into a denylist rule with the same
/// id, pattern, scope and label. `live_count` is the current scan result; the
/// caller measures it so promotion never trusts a stale budget alone.
///
/// Every check runs before the first write. Records are then written in a
/// fixed order: the denylist rule, the ratchet's `promoted_to`, the decision
/// last. If a write fails part way, the rule is already enforced and running
/// the promotion again finishes the remaining records.
pub fn promote_ratchet(
    dir: &Path,
    id: &str,
    live_count: u64,
    rationale: &str,
) -> Result<(DenylistRule, Decision)> {
    require_rationale(rationale)?;
    let mut ledger = RatchetLedger::load(dir)?;
    let mut denylist = Denylist::load(dir)?;
    let mut log = DecisionLog::load(dir)?;
    let slices = SliceGraph::load(dir)?;

    let ratchet = ledger.get_mut(id)?;
    if let Some(rule) = &ratchet.promoted_to {
        return Err(GuardError::InvariantViolation(format!(
            "ratchet '{id}' was already promoted to denylist rule '{rule}'"
        )));
    }
    if ratchet.budget > 0 {
        return Err(GuardError::InvariantViolation(format!(
            "ratchet '{id}' has budget {}; only a ratchet at 0 can be promoted",
            ratchet.budget
        )));
    }
    if live_count > 0 {
        return Err(GuardError::InvariantViolation(format!(
            "ratchet '{id}' still matches {live_count} {}; promotion needs a live count of 0",
            ratchet.unit
        )));
    }

    let rule = DenylistRule {
        id: ratchet.id.clone(),
        label: ratchet.label.clone(),
        pattern: ratchet.pattern.clone(),
        unit: ratchet.unit,
        scope: ratchet.scope.clone(),
    };
    if let Some(owner) = slices
        .slices()
        .iter()
        .find(|s| s.denylist_patterns.iter().any(|r| r.id == rule.id))
    {
        tracing::debug!(rule = %rule.id, slice = %owner.id, "rule id already declared by slice");
        return Err(GuardError::DuplicateId {
            kind: "denylist rule",
            id: rule.id,
        });
    }
    // A rule identical to the one being created is what an interrupted
    // promotion leaves behind.
    let resumed = denylist.get(&rule.id).is_ok_and(|existing| *existing == rule);
    if !resumed {
        denylist.add(rule.clone())?;
    }
    ratchet.promoted_to = Some(rule.id.clone());
    let decision = log
        .record(DecisionKind::PromoteRatchet, id, rationale)
        .clone();

    denylist.save(dir)?;
    ledger.save(dir)?;
    log.save(dir)?;
    tracing::info!(ratchet = id, decision = %decision.id, "ratchet promoted to denylist");
    Ok((rule, decision))
}

/// Remove a global denylist rule. The only sanctioned path for a rule to go.
pub fn retire_denylist_rule(
    dir: &Path,
    id: &str,
    rationale: &str,
) -> Result<(DenylistRule, Decision)> {
    require_rationale(rationale)?;
    let mut denylist = Denylist::load(dir)?;
    let mut log = DecisionLog::load(dir)?;

    let rule = denylist.remove(id)?;
    let decision = log
        .record(DecisionKind::RetireDenylistRule, id, rationale)
        .clone();

    denylist.save(dir)?;
    log.save(dir)?;
    tracing::info!(rule = id, decision = %decision.id, "denylist rule retired");
    Ok((rule, decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratchet::Ratchet;
    use crate::selector::{CountUnit, FileSelector};
    use tempfile::TempDir;

    fn seed(dir: &Path, budget: u64) {
        let ratchet = Ratchet::new(
            "jwt-verify",
            "Direct jwt.verify calls",
            r"jwt\.verify\(",
            CountUnit::Files,
            budget,
            FileSelector {
                root_paths: vec!["src".into()],
                ..Default::default()
            },
        );
        RatchetLedger {
            ratchets: vec![ratchet],
        }
        .save(dir)
        .unwrap();
    }

    #[test]
    fn promotion_creates_rule_and_decision() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), 0);

        let (rule, decision) =
            promote_ratchet(dir.path(), "jwt-verify", 0, "auth moved to middleware").unwrap();
        assert_eq!(rule.pattern, r"jwt\.verify\(");
        assert_eq!(rule.scope.root_paths, vec!["src"]);
        assert_eq!(decision.id, "D1");
        assert_eq!(decision.kind, DecisionKind::PromoteRatchet);

        let denylist = Denylist::load(dir.path()).unwrap();
        assert_eq!(denylist.get("jwt-verify").unwrap().label, "Direct jwt.verify calls");
        let ledger = RatchetLedger::load(dir.path()).unwrap();
        assert_eq!(
            ledger.get("jwt-verify").unwrap().promoted_to.as_deref(),
            Some("jwt-verify")
        );

        let err = promote_ratchet(dir.path(), "jwt-verify", 0, "again").unwrap_err();
        assert!(err.to_string().contains("already promoted"));
    }

    #[test]
    fn promotion_needs_zero_budget_and_zero_count() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), 2);
        assert!(matches!(
            promote_ratchet(dir.path(), "jwt-verify", 0, "r"),
            Err(GuardError::InvariantViolation(_))
        ));

        seed(dir.path(), 0);
        assert!(matches!(
            promote_ratchet(dir.path(), "jwt-verify", 1, "r"),
            Err(GuardError::InvariantViolation(_))
        ));
        assert!(Denylist::load(dir.path()).unwrap().rules.is_empty());
        assert!(DecisionLog::load(dir.path()).unwrap().decisions.is_empty());
    }

    #[test]
    fn retire_records_decision_and_ids_increase() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), 0);
        promote_ratchet(dir.path(), "jwt-verify", 0, "zero").unwrap();

        let (rule, decision) =
            retire_denylist_rule(dir.path(), "jwt-verify", "capability reinstated").unwrap();
        assert_eq!(rule.id, "jwt-verify");
        assert_eq!(decision.id, "D2");
        assert!(Denylist::load(dir.path()).unwrap().rules.is_empty());

        assert!(matches!(
            retire_denylist_rule(dir.path(), "jwt-verify", "again"),
            Err(GuardError::DenylistRuleNotFound(_))
        ));
    }

    #[test]
    fn promotion_refuses_an_id_declared_by_a_slice() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), 0);
        std::fs::write(
            paths::slices_path(dir.path()),
            "slices:\n  - id: slice-001\n    name: Auth\n    denylist_patterns:\n      - id: jwt-verify\n        label: JWT\n        pattern: jwt\n",
        )
        .unwrap();

        let err = promote_ratchet(dir.path(), "jwt-verify", 0, "zero").unwrap_err();
        assert!(matches!(err, GuardError::DuplicateId { kind: "denylist rule", .. }));
        assert!(Denylist::load(dir.path()).unwrap().rules.is_empty());
        assert!(RatchetLedger::load(dir.path())
            .unwrap()
            .get("jwt-verify")
            .unwrap()
            .promoted_to
            .is_none());
        assert!(DecisionLog::load(dir.path()).unwrap().decisions.is_empty());
    }

    #[test]
    fn interrupted_promotion_can_be_finished() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), 0);
        // Only the denylist write landed.
        let ledger = RatchetLedger::load(dir.path()).unwrap();
        let r = ledger.get("jwt-verify").unwrap();
        let mut denylist = Denylist::default();
        denylist
            .add(DenylistRule {
                id: r.id.clone(),
                label: r.label.clone(),
                pattern: r.pattern.clone(),
                unit: r.unit,
                scope: r.scope.clone(),
            })
            .unwrap();
        denylist.save(dir.path()).unwrap();

        let (_, decision) = promote_ratchet(dir.path(), "jwt-verify", 0, "finish").unwrap();
        assert_eq!(decision.id, "D1");
        assert_eq!(Denylist::load(dir.path()).unwrap().rules.len(), 1);

        let mut other = Denylist::load(dir.path()).unwrap();
        other.rules[0].pattern = "something else".into();
        other.save(dir.path()).unwrap();
        seed(dir.path(), 0);
        assert!(matches!(
            promote_ratchet(dir.path(), "jwt-verify", 0, "clash"),
            Err(GuardError::DuplicateId { .. })
        ));
    }

    #[test]
    fn blank_rationale_is_refused() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), 0);
        assert!(promote_ratchet(dir.path(), "jwt-verify", 0, "  ").is_err());
    }
}
