use crate::deletion::DeletionTarget;
use crate::denylist::DenylistRule;
use crate::error::{GuardError, Result};
use crate::io;
use crate::paths;
use crate::scanner::{compile_pattern, Scanner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// SliceStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceStatus {
    #[default]
    Proposed,
    InProgress,
    Done,
}

impl SliceStatus {
    pub fn all() -> &'static [SliceStatus] {
        &[SliceStatus::Proposed, SliceStatus::InProgress, SliceStatus::Done]
    }

    pub fn next(self) -> Option<SliceStatus> {
        match self {
            SliceStatus::Proposed => Some(SliceStatus::InProgress),
            SliceStatus::InProgress => Some(SliceStatus::Done),
            SliceStatus::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SliceStatus::Proposed => "proposed",
            SliceStatus::InProgress => "in_progress",
            SliceStatus::Done => "done",
        }
    }
}

impl fmt::Display for SliceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SliceStatus {
    type Err = GuardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(SliceStatus::Proposed),
            "in_progress" | "in-progress" => Ok(SliceStatus::InProgress),
            "done" => Ok(SliceStatus::Done),
            _ => Err(GuardError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Slice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: SliceStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Slice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: SliceStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub touched_paths: Vec<String>,
    #[serde(default)]
    pub deletion_targets: Vec<DeletionTarget>,
    #[serde(default)]
    pub denylist_patterns: Vec<DenylistRule>,
    /// Ratchets this slice is expected to drive down.
    #[serde(default)]
    pub ratchets: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_history: Vec<StatusChange>,
}

impl Slice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: SliceStatus::Proposed,
            dependencies: Vec::new(),
            touched_paths: Vec::new(),
            deletion_targets: Vec::new(),
            denylist_patterns: Vec::new(),
            ratchets: Vec::new(),
            risks: Vec::new(),
            notes: None,
            status_history: vec![StatusChange {
                status: SliceStatus::Proposed,
                at: Utc::now(),
            }],
        }
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.dependencies = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == SliceStatus::Done
    }
}

// ---------------------------------------------------------------------------
// Completion guards
// ---------------------------------------------------------------------------

/// What must hold before a slice may close. Returns one message per
/// unresolved problem; empty means the slice may become `done`.
pub trait CompletionGuards {
    fn unresolved(&self, slice: &Slice) -> Result<Vec<String>>;
}

/// Checks deletion targets against the live filesystem and scans the
/// slice's denylist patterns.
pub struct FilesystemGuards<'a> {
    pub root: &'a Path,
    pub scanner: &'a dyn Scanner,
    pub extra_excludes: &'a [String],
}

impl CompletionGuards for FilesystemGuards<'_> {
    fn unresolved(&self, slice: &Slice) -> Result<Vec<String>> {
        let mut problems = Vec::new();
        for target in &slice.deletion_targets {
            if target.exists_under(self.root) {
                problems.push(format!(
                    "deletion target '{}' still exists{}",
                    paths::normalize_record_path(&target.path),
                    labelled(&target.label)
                ));
            }
        }
        for rule in &slice.denylist_patterns {
            let pattern = compile_pattern(&rule.id, &rule.pattern)?;
            let scope = rule.scope.compile(&rule.id, self.extra_excludes)?;
            let outcome = self.scanner.count(&pattern, &scope, rule.unit);
            if outcome.count > 0 {
                problems.push(format!(
                    "denylist '{}'{} matched {} {}: {}",
                    rule.id,
                    labelled(&rule.label),
                    outcome.count,
                    rule.unit,
                    outcome.matched_files.join(", ")
                ));
            }
        }
        Ok(problems)
    }
}

fn labelled(label: &str) -> String {
    if label.is_empty() {
        String::new()
    } else {
        format!(" ({label})")
    }
}

// ---------------------------------------------------------------------------
// SliceGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SliceFile {
    #[serde(default)]
    slices: Vec<Slice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSlice {
    pub id: String,
    pub waiting_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceGraphSummary {
    pub total: usize,
    pub proposed: usize,
    pub in_progress: usize,
    pub done: usize,
    pub eligible: Vec<String>,
    pub blocked: Vec<BlockedSlice>,
    pub cycles: Vec<Vec<String>>,
}

/// Slices and their dependency edges, in record order.
///
/// Every mutation takes `&mut self`, so within a process a transition can
/// never interleave with an eligibility query or another transition.
#[derive(Debug, Clone, Default)]
pub struct SliceGraph {
    slices: Vec<Slice>,
    index: HashMap<String, usize>,
}

impl SliceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slices(slices: Vec<Slice>) -> Result<Self> {
        let mut graph = Self::new();
        for slice in slices {
            graph.add(slice)?;
        }
        Ok(graph)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let file: SliceFile = io::read_yaml_or_default(&paths::slices_path(dir))?;
        Self::from_slices(file.slices)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let file = SliceFile {
            slices: self.slices.clone(),
        };
        io::write_yaml(&paths::slices_path(dir), &file)
    }

    pub fn add(&mut self, mut slice: Slice) -> Result<()> {
        paths::validate_id(&slice.id)?;
        if self.index.contains_key(&slice.id) {
            return Err(GuardError::DuplicateId {
                kind: "slice",
                id: slice.id,
            });
        }
        for target in &mut slice.deletion_targets {
            if target.owning_slice_id.is_empty() {
                target.owning_slice_id = slice.id.clone();
            } else if target.owning_slice_id != slice.id {
                return Err(GuardError::InvalidRecord(format!(
                    "deletion target '{}' is declared in slice '{}' but owned by '{}'",
                    target.path, slice.id, target.owning_slice_id
                )));
            }
        }
        self.index.insert(slice.id.clone(), self.slices.len());
        self.slices.push(slice);
        Ok(())
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Slice> {
        self.index
            .get(id)
            .map(|&i| &self.slices[i])
            .ok_or_else(|| GuardError::SliceNotFound(id.to_string()))
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.get(id).map(Slice::is_done).unwrap_or(false)
    }

    /// Dependencies of `id` that are not `done`. Unknown ids count as not done.
    pub fn pending_dependencies(&self, id: &str) -> Result<Vec<String>> {
        let slice = self.get(id)?;
        Ok(slice
            .dependencies
            .iter()
            .filter(|dep| !self.is_done(dep))
            .cloned()
            .collect())
    }

    /// Every `proposed` slice whose dependencies are all `done`, in record order.
    pub fn eligible(&self) -> Vec<String> {
        self.slices
            .iter()
            .filter(|s| s.status == SliceStatus::Proposed)
            .filter(|s| s.dependencies.iter().all(|d| self.is_done(d)))
            .map(|s| s.id.clone())
            .collect()
    }

    /// `(slice, dependency)` pairs naming a slice that does not exist.
    pub fn unknown_dependencies(&self) -> Vec<(String, String)> {
        let mut unknown = Vec::new();
        for slice in &self.slices {
            for dep in &slice.dependencies {
                if !self.index.contains_key(dep) {
                    unknown.push((slice.id.clone(), dep.clone()));
                }
            }
        }
        unknown
    }

    /// Dependency cycles, each listed from its first-visited slice. Depth-first
    /// search with an explicit recursion stack; record order keeps the output
    /// stable.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Finished,
        }

        fn visit(
            graph: &SliceGraph,
            node: usize,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
            cycles: &mut Vec<Vec<String>>,
        ) {
            marks[node] = Mark::OnStack;
            stack.push(node);
            for dep in &graph.slices[node].dependencies {
                let Some(&next) = graph.index.get(dep) else {
                    continue;
                };
                match marks[next] {
                    Mark::Unvisited => visit(graph, next, marks, stack, cycles),
                    Mark::OnStack => {
                        if let Some(start) = stack.iter().position(|&n| n == next) {
                            cycles.push(
                                stack[start..]
                                    .iter()
                                    .map(|&n| graph.slices[n].id.clone())
                                    .collect(),
                            );
                        }
                    }
                    Mark::Finished => {}
                }
            }
            stack.pop();
            marks[node] = Mark::Finished;
        }

        let mut marks = vec![Mark::Unvisited; self.slices.len()];
        let mut stack = Vec::new();
        let mut cycles = Vec::new();
        for node in 0..self.slices.len() {
            if marks[node] == Mark::Unvisited {
                visit(self, node, &mut marks, &mut stack, &mut cycles);
            }
        }
        cycles
    }

    /// Check a transition without applying it.
    pub fn can_transition(
        &self,
        id: &str,
        target: SliceStatus,
        guards: &dyn CompletionGuards,
    ) -> Result<()> {
        let slice = self.get(id)?;
        let from = slice.status;

        if target <= from {
            return Err(GuardError::InvalidTransition {
                slice: id.to_string(),
                from: from.to_string(),
                to: target.to_string(),
                reason: "transitions are forward-only".to_string(),
            });
        }
        if from.next() != Some(target) {
            return Err(GuardError::InvalidTransition {
                slice: id.to_string(),
                from: from.to_string(),
                to: target.to_string(),
                reason: "a slice must pass through in_progress".to_string(),
            });
        }

        match target {
            SliceStatus::InProgress => {
                let pending = self.pending_dependencies(id)?;
                if !pending.is_empty() {
                    return Err(GuardError::BlockedByDependency {
                        slice: id.to_string(),
                        pending,
                    });
                }
            }
            SliceStatus::Done => {
                let problems = guards.unresolved(slice)?;
                if !problems.is_empty() {
                    return Err(GuardError::UnresolvedGuards {
                        slice: id.to_string(),
                        problems,
                    });
                }
            }
            SliceStatus::Proposed => {}
        }
        Ok(())
    }

    pub fn transition(
        &mut self,
        id: &str,
        target: SliceStatus,
        guards: &dyn CompletionGuards,
    ) -> Result<()> {
        self.can_transition(id, target, guards)?;

        let i = self.index[id];
        let slice = &mut self.slices[i];
        let now = Utc::now();
        if slice.status_history.is_empty() {
            slice.status_history.push(StatusChange {
                status: slice.status,
                at: now,
            });
        }
        slice.status = target;
        slice.status_history.push(StatusChange {
            status: target,
            at: now,
        });
        tracing::debug!(slice = id, status = %target, "slice transitioned");
        Ok(())
    }

    pub fn summary(&self) -> SliceGraphSummary {
        let count = |st: SliceStatus| self.slices.iter().filter(|s| s.status == st).count();
        let blocked = self
            .slices
            .iter()
            .filter(|s| s.status == SliceStatus::Proposed)
            .filter_map(|s| {
                let waiting_on: Vec<String> = s
                    .dependencies
                    .iter()
                    .filter(|d| !self.is_done(d))
                    .cloned()
                    .collect();
                (!waiting_on.is_empty()).then(|| BlockedSlice {
                    id: s.id.clone(),
                    waiting_on,
                })
            })
            .collect();
        SliceGraphSummary {
            total: self.slices.len(),
            proposed: count(SliceStatus::Proposed),
            in_progress: count(SliceStatus::InProgress),
            done: count(SliceStatus::Done),
            eligible: self.eligible(),
            blocked,
            cycles: self.detect_cycles(),
        }
    }
}

pub fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {first}", cycle.join(" -> ")),
        None => String::new(),
    }
}

/// Load `slices.yaml`, apply one transition and write it back atomically.
/// A refused transition writes nothing.
pub fn transition_slice(
    dir: &Path,
    id: &str,
    target: SliceStatus,
    guards: &dyn CompletionGuards,
) -> Result<Slice> {
    let mut graph = SliceGraph::load(dir)?;
    graph.transition(id, target, guards)?;
    graph.save(dir)?;
    Ok(graph.get(id)?.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::RegexScanner;
    use crate::selector::{CountUnit, FileSelector};
    use tempfile::TempDir;

    struct NoGuards;

    impl CompletionGuards for NoGuards {
        fn unresolved(&self, _slice: &Slice) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct AlwaysBlocked;

    impl CompletionGuards for AlwaysBlocked {
        fn unresolved(&self, slice: &Slice) -> Result<Vec<String>> {
            Ok(vec![format!("{} has leftovers", slice.id)])
        }
    }

    fn graph(slices: Vec<Slice>) -> SliceGraph {
        SliceGraph::from_slices(slices).unwrap()
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let mut g = SliceGraph::new();
        g.add(Slice::new("slice-001", "Auth")).unwrap();
        let err = g.add(Slice::new("slice-001", "Again")).unwrap_err();
        assert!(matches!(err, GuardError::DuplicateId { kind: "slice", .. }));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn eligible_is_proposed_with_done_dependencies() {
        let mut g = graph(vec![
            Slice::new("a", "A"),
            Slice::new("b", "B").depends_on(&["a"]),
            Slice::new("c", "C"),
            Slice::new("d", "D").depends_on(&["a", "c"]),
        ]);
        assert_eq!(g.eligible(), vec!["a", "c"]);

        g.transition("a", SliceStatus::InProgress, &NoGuards).unwrap();
        assert_eq!(g.eligible(), vec!["c"]);

        g.transition("a", SliceStatus::Done, &NoGuards).unwrap();
        assert_eq!(g.eligible(), vec!["b", "c"]);
    }

    #[test]
    fn in_progress_blocked_iff_a_dependency_is_not_done() {
        let mut g = graph(vec![
            Slice::new("a", "A"),
            Slice::new("b", "B"),
            Slice::new("c", "C").depends_on(&["a", "b"]),
        ]);
        let err = g
            .transition("c", SliceStatus::InProgress, &NoGuards)
            .unwrap_err();
        match err {
            GuardError::BlockedByDependency { pending, .. } => assert_eq!(pending, vec!["a", "b"]),
            other => panic!("unexpected: {other}"),
        }

        for id in ["a", "b"] {
            g.transition(id, SliceStatus::InProgress, &NoGuards).unwrap();
        }
        g.transition("a", SliceStatus::Done, &NoGuards).unwrap();
        assert!(g.transition("c", SliceStatus::InProgress, &NoGuards).is_err());

        g.transition("b", SliceStatus::Done, &NoGuards).unwrap();
        g.transition("c", SliceStatus::InProgress, &NoGuards).unwrap();
        assert_eq!(g.get("c").unwrap().status, SliceStatus::InProgress);
    }

    #[test]
    fn transitions_are_forward_only() {
        let mut g = graph(vec![Slice::new("a", "A")]);
        g.transition("a", SliceStatus::InProgress, &NoGuards).unwrap();
        g.transition("a", SliceStatus::Done, &NoGuards).unwrap();

        for back in [SliceStatus::Proposed, SliceStatus::InProgress, SliceStatus::Done] {
            let err = g.transition("a", back, &NoGuards).unwrap_err();
            assert!(matches!(err, GuardError::InvalidTransition { .. }), "{back}");
        }
        assert_eq!(g.get("a").unwrap().status, SliceStatus::Done);
    }

    #[test]
    fn cannot_skip_in_progress() {
        let mut g = graph(vec![Slice::new("a", "A")]);
        let err = g.transition("a", SliceStatus::Done, &NoGuards).unwrap_err();
        assert!(err.to_string().contains("must pass through in_progress"));
    }

    #[test]
    fn done_requires_guards_to_resolve() {
        let mut g = graph(vec![Slice::new("a", "A")]);
        g.transition("a", SliceStatus::InProgress, &NoGuards).unwrap();
        let err = g.transition("a", SliceStatus::Done, &AlwaysBlocked).unwrap_err();
        assert!(matches!(err, GuardError::UnresolvedGuards { .. }));
        assert_eq!(g.get("a").unwrap().status, SliceStatus::InProgress);
    }

    #[test]
    fn history_records_each_transition() {
        let mut g = graph(vec![Slice::new("a", "A")]);
        g.transition("a", SliceStatus::InProgress, &NoGuards).unwrap();
        g.transition("a", SliceStatus::Done, &NoGuards).unwrap();
        let statuses: Vec<SliceStatus> = g
            .get("a")
            .unwrap()
            .status_history
            .iter()
            .map(|c| c.status)
            .collect();
        assert_eq!(statuses, SliceStatus::all().to_vec());
    }

    #[test]
    fn three_cycle_is_detected() {
        let g = graph(vec![
            Slice::new("A", "A").depends_on(&["B"]),
            Slice::new("B", "B").depends_on(&["C"]),
            Slice::new("C", "C").depends_on(&["A"]),
        ]);
        let cycles = g.detect_cycles();
        assert_eq!(cycles, vec![vec!["A", "B", "C"]]);
        assert_eq!(format_cycle(&cycles[0]), "A -> B -> C -> A");
    }

    #[test]
    fn self_dependency_is_a_cycle_and_diamonds_are_not() {
        let g = graph(vec![Slice::new("a", "A").depends_on(&["a"])]);
        assert_eq!(g.detect_cycles(), vec![vec!["a"]]);

        let diamond = graph(vec![
            Slice::new("top", "T").depends_on(&["l", "r"]),
            Slice::new("l", "L").depends_on(&["base"]),
            Slice::new("r", "R").depends_on(&["base"]),
            Slice::new("base", "B"),
        ]);
        assert!(diamond.detect_cycles().is_empty());
    }

    #[test]
    fn unknown_dependencies_are_listed_and_never_satisfied() {
        let g = graph(vec![Slice::new("a", "A").depends_on(&["ghost"])]);
        assert_eq!(
            g.unknown_dependencies(),
            vec![("a".to_string(), "ghost".to_string())]
        );
        assert!(g.eligible().is_empty());
    }

    #[test]
    fn deletion_target_owner_is_filled_and_checked() {
        let mut s = Slice::new("slice-002", "Users");
        s.deletion_targets.push(DeletionTarget::new("a.snap", "", ""));
        let g = graph(vec![s]);
        assert_eq!(
            g.get("slice-002").unwrap().deletion_targets[0].owning_slice_id,
            "slice-002"
        );

        let mut bad = Slice::new("slice-003", "Orders");
        bad.deletion_targets
            .push(DeletionTarget::new("b.snap", "slice-009", ""));
        assert!(matches!(
            SliceGraph::from_slices(vec![bad]),
            Err(GuardError::InvalidRecord(_))
        ));
    }

    #[test]
    fn snapshot_deletion_scenario() {
        const SNAP: &str = "__tests__/__snapshots__/users.test.ts.snap";
        let dir = TempDir::new().unwrap();
        let snap = dir.path().join(SNAP);
        std::fs::create_dir_all(snap.parent().unwrap()).unwrap();
        std::fs::write(&snap, "exports[`users`] = 1;").unwrap();

        let mut s = Slice::new("slice-002", "Users tests");
        s.status = SliceStatus::InProgress;
        s.deletion_targets
            .push(DeletionTarget::new(SNAP, "slice-002", "users snapshot"));
        let mut g = graph(vec![s]);

        let scanner = RegexScanner::new(dir.path());
        let guards = FilesystemGuards {
            root: dir.path(),
            scanner: &scanner,
            extra_excludes: &[],
        };
        let err = g.transition("slice-002", SliceStatus::Done, &guards).unwrap_err();
        match &err {
            GuardError::UnresolvedGuards { problems, .. } => {
                assert!(problems[0].contains(SNAP));
                assert!(problems[0].contains("users snapshot"));
            }
            other => panic!("unexpected: {other}"),
        }

        std::fs::remove_file(&snap).unwrap();
        g.transition("slice-002", SliceStatus::Done, &guards).unwrap();
        assert!(g.is_done("slice-002"));
    }

    #[test]
    fn slice_denylist_patterns_gate_completion() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/models.py"), "Model.objects.raw('x')\n").unwrap();

        let mut s = Slice::new("orm", "ORM cleanup");
        s.status = SliceStatus::InProgress;
        s.denylist_patterns.push(DenylistRule {
            id: "raw-sql".into(),
            label: "raw SQL".into(),
            pattern: r"objects\.raw\(".into(),
            unit: CountUnit::Files,
            scope: FileSelector {
                root_paths: vec!["app".into()],
                ..Default::default()
            },
        });
        let mut g = graph(vec![s]);
        let scanner = RegexScanner::new(dir.path());
        let guards = FilesystemGuards {
            root: dir.path(),
            scanner: &scanner,
            extra_excludes: &[],
        };

        let err = g.transition("orm", SliceStatus::Done, &guards).unwrap_err();
        assert!(err.to_string().contains("app/models.py"));

        std::fs::write(dir.path().join("app/models.py"), "Model.objects.filter()\n").unwrap();
        g.transition("orm", SliceStatus::Done, &guards).unwrap();
    }

    #[test]
    fn transition_slice_persists_only_on_success() {
        let dir = TempDir::new().unwrap();
        graph(vec![Slice::new("a", "A"), Slice::new("b", "B").depends_on(&["a"])])
            .save(dir.path())
            .unwrap();

        assert!(transition_slice(dir.path(), "b", SliceStatus::InProgress, &NoGuards).is_err());
        let updated = transition_slice(dir.path(), "a", SliceStatus::InProgress, &NoGuards).unwrap();
        assert_eq!(updated.status, SliceStatus::InProgress);

        let reloaded = SliceGraph::load(dir.path()).unwrap();
        assert_eq!(reloaded.get("a").unwrap().status, SliceStatus::InProgress);
        assert_eq!(reloaded.get("b").unwrap().status, SliceStatus::Proposed);
    }

    #[test]
    fn status_parses_cli_spellings() {
        assert_eq!("in_progress".parse::<SliceStatus>().unwrap(), SliceStatus::InProgress);
        assert_eq!("in-progress".parse::<SliceStatus>().unwrap(), SliceStatus::InProgress);
        assert!("finished".parse::<SliceStatus>().is_err());
    }

    #[test]
    fn summary_counts_and_blockers() {
        let mut g = graph(vec![
            Slice::new("a", "A"),
            Slice::new("b", "B").depends_on(&["a"]),
        ]);
        g.transition("a", SliceStatus::InProgress, &NoGuards).unwrap();
        let summary = g.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.proposed, 1);
        assert!(summary.eligible.is_empty());
        assert_eq!(
            summary.blocked,
            vec![BlockedSlice {
                id: "b".into(),
                waiting_on: vec!["a".into()]
            }]
        );
    }
}
