use crate::output::{print_json, print_table, status_word};
use anyhow::Context;
use clap::Args;
use guard_core::{
    control::ControlPlane, guard::GuardRunner, report::GuardReport, slice::format_cycle,
    GuardError,
};
use std::path::Path;
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Report findings without failing (always exits 0)
    #[arg(long)]
    status: bool,

    /// Treat unreadable files and missing scope roots as violations
    #[arg(long)]
    strict: bool,

    /// Maximum concurrent scans (default: config, then CPU count)
    #[arg(long)]
    parallelism: Option<usize>,

    /// Abort the run after this many seconds (default: config, then 60)
    #[arg(long)]
    timeout: Option<u64>,
}

pub fn run(root: &Path, config: Option<&Path>, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let plane = ControlPlane::load(root, config).context("failed to load control plane")?;

    let mut runner = GuardRunner::for_plane(&plane);
    let options = runner.options_mut();
    if let Some(n) = args.parallelism {
        options.parallelism = n.max(1);
    }
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    options.strict |= args.strict;

    let report = runner.run(&plane).context("guard run failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report, args.status);
    }

    if !args.status && report.error_count > 0 {
        return Err(GuardError::Violations(report.error_count).into());
    }
    Ok(())
}

fn print_report(report: &GuardReport, status_mode: bool) {
    if !report.ratchet_results.is_empty() {
        println!("Ratchets");
        let rows: Vec<Vec<String>> = report
            .ratchet_results
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.label.clone(),
                    r.unit.to_string(),
                    r.count.to_string(),
                    r.budget.to_string(),
                    status_word(r.ok).to_string(),
                ]
            })
            .collect();
        print_table(&["ID", "LABEL", "UNIT", "COUNT", "BUDGET", "STATUS"], &rows);
        println!();
    }

    if !report.denylist_results.is_empty() {
        println!("Denylist");
        let rows: Vec<Vec<String>> = report
            .denylist_results
            .iter()
            .map(|d| {
                let status = if d.enforced {
                    status_word(d.ok)
                } else {
                    "pending"
                };
                vec![
                    d.id.clone(),
                    d.label.clone(),
                    d.owning_slice.clone().unwrap_or_else(|| "-".to_string()),
                    d.count.to_string(),
                    status.to_string(),
                ]
            })
            .collect();
        print_table(&["ID", "LABEL", "SLICE", "COUNT", "STATUS"], &rows);
        println!();
    }

    if !report.deletion_results.is_empty() {
        println!("Deletion targets");
        let rows: Vec<Vec<String>> = report
            .deletion_results
            .iter()
            .map(|t| {
                let status = if t.enforced {
                    status_word(t.ok)
                } else {
                    "pending"
                };
                vec![
                    t.path.clone(),
                    t.owning_slice_id.clone(),
                    if t.exists { "present" } else { "absent" }.to_string(),
                    status.to_string(),
                ]
            })
            .collect();
        print_table(&["PATH", "SLICE", "STATE", "STATUS"], &rows);
        println!();
    }

    let map = &report.map_results;
    println!(
        "Map: {} governed file(s), {} unmapped, {} stale",
        map.governed_files,
        map.unmapped_files.len(),
        map.stale_entries.len()
    );

    let graph = &report.slice_graph_results;
    println!(
        "Slices: {} total, {} proposed, {} in progress, {} done",
        graph.total, graph.proposed, graph.in_progress, graph.done
    );
    if !graph.eligible.is_empty() {
        println!("  eligible: {}", graph.eligible.join(", "));
    }
    for cycle in &graph.cycles {
        println!("  cycle: {}", format_cycle(cycle));
    }

    for (id, budget, live) in report.decrease_suggestions() {
        println!("suggestion: ratchet '{id}' is at {live} (budget {budget}); run `guard ratchets decrease {id} {live}`");
    }
    for id in report.promotion_candidates() {
        println!("suggestion: ratchet '{id}' reached 0; run `guard ratchets promote {id} --rationale ...`");
    }
    for w in &report.warnings {
        println!("warning: {w}");
    }

    let violations = report.violations();
    println!();
    if violations.is_empty() {
        println!("PASS: no guard violations");
        return;
    }
    for v in &violations {
        println!("FAIL: {v}");
    }
    if status_mode {
        println!(
            "status mode: {} violation(s) reported, not enforced",
            report.error_count
        );
    }
}
