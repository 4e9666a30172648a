//! GuardRunner: one synchronous pass over every check.
//!
//! Scans and filesystem probes have no shared mutable state, so they run as
//! blocking jobs on a private runtime whose blocking pool is capped at the
//! configured parallelism. The whole batch sits under one deadline; a run
//! that misses it fails closed and nothing it computed is kept.

use crate::config::GuardConfig;
use crate::control::{CompiledCheck, ControlPlane};
use crate::deletion::DeletionResult;
use crate::denylist::DenylistResult;
use crate::error::{GuardError, Result};
use crate::io;
use crate::map::check_map_with;
use crate::paths;
use crate::ratchet::RatchetResult;
use crate::report::GuardReport;
use crate::scanner::{RegexScanner, ScanOutcome, Scanner};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// GuardOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GuardOptions {
    pub parallelism: usize,
    pub timeout: Duration,
    /// Count environment warnings as violations.
    pub strict: bool,
}

impl GuardOptions {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            parallelism: config.effective_parallelism(),
            timeout: Duration::from_secs(config.timeout_seconds),
            strict: config.strict,
        }
    }
}

// ---------------------------------------------------------------------------
// GuardRunner
// ---------------------------------------------------------------------------

pub struct GuardRunner {
    scanner: Arc<dyn Scanner>,
    options: GuardOptions,
}

/// Raw job output, in submission order.
struct Probes {
    scans: Vec<ScanOutcome>,
    present: Vec<bool>,
}

impl GuardRunner {
    pub fn new(scanner: Arc<dyn Scanner>, options: GuardOptions) -> Self {
        Self { scanner, options }
    }

    /// Regex scanner rooted at the plane's project root, options from config.
    pub fn for_plane(plane: &ControlPlane) -> Self {
        Self::new(
            Arc::new(RegexScanner::new(&plane.root)),
            GuardOptions::from_config(&plane.config),
        )
    }

    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut GuardOptions {
        &mut self.options
    }

    /// Run every check and aggregate. Guard violations are counted in the
    /// report; only a timeout or a crashed worker makes this return `Err`.
    pub fn run(&self, plane: &ControlPlane) -> Result<GuardReport> {
        let checks: Vec<CompiledCheck> = plane
            .ratchet_checks()
            .iter()
            .chain(plane.denylist_checks())
            .chain(plane.slice_rule_checks().iter().map(|s| &s.check))
            .cloned()
            .collect();

        let mut probe_paths: Vec<PathBuf> = Vec::new();
        for slice in plane.slices.slices() {
            for target in &slice.deletion_targets {
                probe_paths.push(plane.root.join(paths::normalize_record_path(&target.path)));
            }
        }
        for slice in plane.slices.slices() {
            for touched in &slice.touched_paths {
                probe_paths.push(plane.root.join(paths::normalize_record_path(touched)));
            }
        }
        for rel in plane.map.existence_probes() {
            probe_paths.push(plane.root.join(rel));
        }

        tracing::debug!(
            scans = checks.len(),
            probes = probe_paths.len(),
            parallelism = self.options.parallelism,
            "starting guard run"
        );
        let probes = self.execute(checks, probe_paths)?;
        let report = self.assemble(plane, probes);
        tracing::info!(
            errors = report.error_count,
            warnings = report.warnings.len(),
            "guard run complete"
        );
        Ok(report)
    }

    fn execute(&self, checks: Vec<CompiledCheck>, probe_paths: Vec<PathBuf>) -> Result<Probes> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.options.parallelism.max(1))
            .thread_name("guard-worker")
            .enable_time()
            .build()?;

        let scanner = Arc::clone(&self.scanner);
        let deadline = self.options.timeout;
        let joined = runtime.block_on(async move {
            let scans: Vec<_> = checks
                .into_iter()
                .map(|check| {
                    let scanner = Arc::clone(&scanner);
                    tokio::task::spawn_blocking(move || check.scan(scanner.as_ref()))
                })
                .collect();
            let probes: Vec<_> = probe_paths
                .into_iter()
                .map(|path| tokio::task::spawn_blocking(move || io::path_present(&path)))
                .collect();
            tokio::time::timeout(deadline, futures::future::join(join_all(scans), join_all(probes)))
                .await
        });

        let (scans, present) = match joined {
            Ok(done) => done,
            Err(_) => {
                runtime.shutdown_background();
                tracing::warn!(timeout = ?deadline, "guard run timed out");
                return Err(GuardError::Timeout {
                    seconds: deadline.as_secs_f64(),
                });
            }
        };

        let scans = scans
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GuardError::Worker(format!("scan job failed: {e}")))?;
        let present = present
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GuardError::Worker(format!("probe job failed: {e}")))?;
        Ok(Probes { scans, present })
    }

    fn assemble(&self, plane: &ControlPlane, probes: Probes) -> GuardReport {
        let mut scans = probes.scans.into_iter();
        let mut present = probes.present.into_iter();
        let mut warnings = Vec::new();

        let ratchet_results: Vec<RatchetResult> = plane
            .ratchets
            .ratchets
            .iter()
            .zip(scans.by_ref())
            .map(|(r, outcome)| r.evaluate(outcome))
            .collect();

        let mut denylist_results: Vec<DenylistResult> = plane
            .denylist
            .rules
            .iter()
            .zip(scans.by_ref())
            .map(|(rule, outcome)| rule.evaluate(outcome))
            .collect();
        denylist_results.extend(plane.slice_rule_checks().iter().zip(scans.by_ref()).map(
            |(check, outcome)| {
                check.rule.evaluate_for_slice(
                    outcome,
                    &check.slice_id,
                    plane.slices.is_done(&check.slice_id),
                )
            },
        ));

        let mut governed = BTreeSet::new();
        let mut deletion_results: Vec<DeletionResult> = Vec::new();
        for slice in plane.slices.slices() {
            for target in &slice.deletion_targets {
                let exists = present.next().unwrap_or(false);
                let result = target.result(exists, slice.is_done());
                if exists {
                    governed.insert(result.path.clone());
                }
                deletion_results.push(result);
            }
        }
        for slice in plane.slices.slices() {
            for touched in &slice.touched_paths {
                if present.next().unwrap_or(false) {
                    governed.insert(paths::normalize_record_path(touched));
                }
            }
        }

        for r in &ratchet_results {
            governed.extend(r.matched_files.iter().cloned());
            warnings.extend(r.warnings.iter().map(|w| format!("ratchet '{}': {w}", r.id)));
        }
        for d in &denylist_results {
            governed.extend(d.matched_files.iter().cloned());
            warnings.extend(d.warnings.iter().map(|w| format!("denylist '{}': {w}", d.id)));
        }

        let map_present: HashMap<String, bool> = plane
            .map
            .existence_probes()
            .into_iter()
            .zip(present)
            .collect();
        let map_results = check_map_with(&plane.map, &governed, &plane.config.roots, &|rel: &str| {
            map_present.get(rel).copied().unwrap_or(false)
        });

        let mut error_count = ratchet_results
            .iter()
            .map(RatchetResult::violation_count)
            .sum::<usize>()
            + denylist_results.iter().filter(|d| !d.ok).count()
            + deletion_results.iter().filter(|d| !d.ok).count()
            + map_results.violation_count();
        if self.options.strict {
            error_count += warnings.len();
        }

        GuardReport {
            ratchet_results,
            denylist_results,
            deletion_results,
            map_results,
            slice_graph_results: plane.slices.summary(),
            warnings,
            strict: self.options.strict,
            error_count,
            generated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
