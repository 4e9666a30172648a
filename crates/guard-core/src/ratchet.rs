use crate::error::{GuardError, Result};
use crate::io;
use crate::paths;
use crate::scanner::ScanOutcome;
use crate::selector::{CountUnit, FileSelector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Ratchet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetChange {
    pub budget: u64,
    pub changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A budget on a known anti-pattern that may only ever shrink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ratchet {
    pub id: String,
    pub label: String,
    pub pattern: String,
    /// Deliberately has no default: every ratchet states what it counts.
    pub unit: CountUnit,
    pub budget: u64,
    #[serde(default)]
    pub scope: FileSelector,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub budget_history: Vec<BudgetChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetResult {
    pub id: String,
    pub label: String,
    pub unit: CountUnit,
    pub count: u64,
    pub budget: u64,
    pub ok: bool,
    pub matched_files: Vec<String>,
    /// Live count when it has fallen below the budget: the value an operator
    /// may commit to with `decrease`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_budget: Option<u64>,
    /// Count and budget are both zero and no denylist rule exists yet.
    pub promote_to_denylist: bool,
    /// Every budget held, when the recorded history ever went up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_regression: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RatchetResult {
    pub fn over_budget(&self) -> bool {
        self.count > self.budget
    }

    /// Over budget and a raised budget are separate violations.
    pub fn violation_count(&self) -> usize {
        usize::from(self.over_budget()) + usize::from(self.history_regression.is_some())
    }
}

impl Ratchet {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        pattern: impl Into<String>,
        unit: CountUnit,
        budget: u64,
        scope: FileSelector,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            pattern: pattern.into(),
            unit,
            budget,
            scope,
            budget_history: vec![BudgetChange {
                budget,
                changed_at: Utc::now(),
                note: Some("initial count".to_string()),
            }],
            promoted_to: None,
        }
    }

    pub fn evaluate(&self, outcome: ScanOutcome) -> RatchetResult {
        let count = outcome.count;
        let history_regression = (!self.history_is_monotonic()).then(|| self.budgets_held());
        RatchetResult {
            id: self.id.clone(),
            label: self.label.clone(),
            unit: self.unit,
            count,
            budget: self.budget,
            ok: count <= self.budget && history_regression.is_none(),
            matched_files: outcome.matched_files,
            suggested_budget: (count < self.budget).then_some(count),
            promote_to_denylist: count == 0 && self.budget == 0 && self.promoted_to.is_none(),
            history_regression,
            warnings: outcome.warnings,
        }
    }

    /// Lower the budget. Raising it is an invariant violation and leaves the
    /// record untouched. Returns `false` when `new_budget` equals the current
    /// budget (nothing to record).
    pub fn decrease(&mut self, new_budget: u64, note: Option<String>) -> Result<bool> {
        if new_budget > self.budget {
            return Err(GuardError::InvariantViolation(format!(
                "ratchet '{}' budget may only decrease: current {}, requested {}",
                self.id, self.budget, new_budget
            )));
        }
        if new_budget == self.budget {
            return Ok(false);
        }
        let now = Utc::now();
        if self.budget_history.is_empty() {
            self.budget_history.push(BudgetChange {
                budget: self.budget,
                changed_at: now,
                note: Some("baseline".to_string()),
            });
        }
        self.budget = new_budget;
        self.budget_history.push(BudgetChange {
            budget: new_budget,
            changed_at: now,
            note,
        });
        Ok(true)
    }

    /// Every budget this ratchet has held, oldest first.
    pub fn budgets_held(&self) -> Vec<u64> {
        let mut held: Vec<u64> = self.budget_history.iter().map(|c| c.budget).collect();
        if held.last() != Some(&self.budget) {
            held.push(self.budget);
        }
        held
    }

    /// A hand-edited history that ever went up fails every run until the
    /// record is repaired.
    pub fn history_is_monotonic(&self) -> bool {
        self.budgets_held().windows(2).all(|w| w[1] <= w[0])
    }
}

// ---------------------------------------------------------------------------
// RatchetLedger (ratchets.yaml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatchetLedger {
    #[serde(default)]
    pub ratchets: Vec<Ratchet>,
}

impl RatchetLedger {
    pub fn load(dir: &Path) -> Result<Self> {
        io::read_yaml_or_default(&paths::ratchets_path(dir))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        io::write_yaml(&paths::ratchets_path(dir), self)
    }

    pub fn get(&self, id: &str) -> Result<&Ratchet> {
        self.ratchets
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| GuardError::RatchetNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Ratchet> {
        self.ratchets
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GuardError::RatchetNotFound(id.to_string()))
    }

    pub fn decrease(&mut self, id: &str, new_budget: u64, note: Option<String>) -> Result<bool> {
        self.get_mut(id)?.decrease(new_budget, note)
    }
}

/// Load `ratchets.yaml`, lower one budget and write the file back in a single
/// atomic replace. A refused decrease writes nothing.
pub fn decrease_budget(
    dir: &Path,
    id: &str,
    new_budget: u64,
    note: Option<String>,
) -> Result<Ratchet> {
    let mut ledger = RatchetLedger::load(dir)?;
    let changed = ledger.decrease(id, new_budget, note)?;
    if changed {
        ledger.save(dir)?;
    }
    Ok(ledger.get(id)?.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
