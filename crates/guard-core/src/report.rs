use crate::deletion::DeletionResult;
use crate::denylist::DenylistResult;
use crate::map::MapResult;
use crate::ratchet::RatchetResult;
use crate::slice::SliceGraphSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of one guard run. Regenerated on every invocation and never
/// written back as a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardReport {
    pub ratchet_results: Vec<RatchetResult>,
    pub denylist_results: Vec<DenylistResult>,
    pub deletion_results: Vec<DeletionResult>,
    pub map_results: MapResult,
    pub slice_graph_results: SliceGraphSummary,
    /// Unreadable files, missing scope roots and similar environment trouble.
    pub warnings: Vec<String>,
    pub strict: bool,
    pub error_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl GuardReport {
    pub fn is_clean(&self) -> bool {
        self.error_count == 0
    }

    /// One line per violation, each naming the label and the count or path
    /// involved.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        for r in &self.ratchet_results {
            if r.over_budget() {
                out.push(format!(
                    "ratchet '{}' ({}): {} {} over budget {} [{}]",
                    r.id,
                    r.label,
                    r.count,
                    r.unit,
                    r.budget,
                    r.matched_files.join(", ")
                ));
            }
            if let Some(held) = &r.history_regression {
                out.push(format!(
                    "ratchet '{}' ({}): budget history increases {held:?}",
                    r.id, r.label
                ));
            }
        }
        for d in self.denylist_results.iter().filter(|d| !d.ok) {
            out.push(format!(
                "denylist '{}' ({}): {} match(es) [{}]",
                d.id,
                d.label,
                d.count,
                d.matched_files.join(", ")
            ));
        }
        for t in self.deletion_results.iter().filter(|t| !t.ok) {
            out.push(format!(
                "deletion target '{}' ({}) still exists; slice '{}' is done",
                t.path, t.label, t.owning_slice_id
            ));
        }
        for f in &self.map_results.unmapped_files {
            out.push(format!("unmapped file '{f}': no map entry references it"));
        }
        for s in &self.map_results.stale_entries {
            out.push(format!(
                "stale map entry '{}' (slice '{}'): {}",
                s.entry.current_path, s.entry.slice_id, s.reason
            ));
        }
        if self.strict {
            for w in &self.warnings {
                out.push(format!("strict: {w}"));
            }
        }
        out
    }

    /// Budgets that could be lowered to the live count.
    pub fn decrease_suggestions(&self) -> Vec<(&str, u64, u64)> {
        self.ratchet_results
            .iter()
            .filter_map(|r| r.suggested_budget.map(|s| (r.id.as_str(), r.budget, s)))
            .collect()
    }

    pub fn promotion_candidates(&self) -> Vec<&str> {
        self.ratchet_results
            .iter()
            .filter(|r| r.promote_to_denylist)
            .map(|r| r.id.as_str())
            .collect()
    }
}
