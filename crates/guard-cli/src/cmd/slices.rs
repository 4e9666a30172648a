use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use guard_core::{
    control::ControlPlane,
    scanner::RegexScanner,
    slice::{self, FilesystemGuards, SliceStatus},
};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct DecreaseSuggestion {
    ratchet: String,
    budget: u64,
    count: u64,
}

#[derive(Subcommand)]
pub enum SliceSubcommand {
    /// List every slice with its status and blockers
    List,
    /// Show full details for one slice
    Show { id: String },
    /// List proposed slices whose dependencies are all done
    Eligible,
    /// Move a slice forward: proposed -> in_progress -> done
    Transition {
        id: String,
        /// Target status: in_progress or done
        status: String,
    },
}

pub fn run(
    root: &Path,
    config: Option<&Path>,
    subcmd: SliceSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let plane = ControlPlane::load(root, config).context("failed to load control plane")?;
    match subcmd {
        SliceSubcommand::List => list(&plane, json),
        SliceSubcommand::Show { id } => show(&plane, &id, json),
        SliceSubcommand::Eligible => eligible(&plane, json),
        SliceSubcommand::Transition { id, status } => transition(&plane, &id, &status, json),
    }
}

fn list(plane: &ControlPlane, json: bool) -> anyhow::Result<()> {
    let graph = &plane.slices;
    if json {
        return print_json(&serde_json::json!({
            "slices": graph.slices(),
            "summary": graph.summary(),
        }));
    }
    if graph.is_empty() {
        println!("No slices.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = graph
        .slices()
        .iter()
        .map(|s| {
            let waiting = graph.pending_dependencies(&s.id).unwrap_or_default();
            vec![
                s.id.clone(),
                s.name.clone(),
                s.status.to_string(),
                s.dependencies.join(","),
                if s.status == SliceStatus::Proposed && !waiting.is_empty() {
                    waiting.join(",")
                } else {
                    "-".to_string()
                },
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "STATUS", "DEPENDS", "WAITING ON"], &rows);
    Ok(())
}

fn show(plane: &ControlPlane, id: &str, json: bool) -> anyhow::Result<()> {
    let s = plane.slices.get(id)?;
    let pending = plane.slices.pending_dependencies(id)?;
    if json {
        return print_json(&serde_json::json!({
            "slice": s,
            "pending_dependencies": pending,
        }));
    }

    println!("{}: {}", s.id, s.name);
    println!("status:       {}", s.status);
    if !s.dependencies.is_empty() {
        println!("dependencies: {}", s.dependencies.join(", "));
    }
    if !pending.is_empty() {
        println!("waiting on:   {}", pending.join(", "));
    }
    if !s.ratchets.is_empty() {
        println!("ratchets:     {}", s.ratchets.join(", "));
    }
    if !s.touched_paths.is_empty() {
        println!("touches:");
        for p in &s.touched_paths {
            println!("  {p}");
        }
    }
    if !s.deletion_targets.is_empty() {
        println!("deletes:");
        for t in &s.deletion_targets {
            let state = if t.exists_under(&plane.root) { "present" } else { "gone" };
            println!("  {} [{state}]", t.path);
        }
    }
    if !s.denylist_patterns.is_empty() {
        println!("denies on completion:");
        for r in &s.denylist_patterns {
            println!("  {} ({}): {}", r.id, r.label, r.pattern);
        }
    }
    for risk in &s.risks {
        println!("risk: {risk}");
    }
    if let Some(notes) = &s.notes {
        println!("notes: {notes}");
    }
    Ok(())
}

fn eligible(plane: &ControlPlane, json: bool) -> anyhow::Result<()> {
    let ids = plane.slices.eligible();
    if json {
        return print_json(&serde_json::json!({ "eligible": ids }));
    }
    if ids.is_empty() {
        println!("No eligible slices.");
    }
    for id in &ids {
        let s = plane.slices.get(id)?;
        println!("{id}  {}", s.name);
    }
    Ok(())
}

fn transition(plane: &ControlPlane, id: &str, status: &str, json: bool) -> anyhow::Result<()> {
    let target: SliceStatus = status.parse()?;
    let scanner = RegexScanner::new(&plane.root);
    let guards = FilesystemGuards {
        root: &plane.root,
        scanner: &scanner,
        extra_excludes: &plane.config.exclude_dirs,
    };
    let updated = slice::transition_slice(&plane.dir, id, target, &guards)
        .with_context(|| format!("cannot move slice '{id}' to {target}"))?;

    // Budgets are never lowered automatically; closing a slice only suggests.
    let mut suggestions = Vec::new();
    if target == SliceStatus::Done {
        for ratchet_id in &updated.ratchets {
            let Ok((ratchet, check)) = plane.ratchet(ratchet_id) else {
                continue;
            };
            let result = ratchet.evaluate(check.scan(&scanner));
            if let Some(live) = result.suggested_budget {
                suggestions.push(DecreaseSuggestion {
                    ratchet: ratchet.id.clone(),
                    budget: ratchet.budget,
                    count: live,
                });
            }
        }
    }

    if json {
        print_json(&serde_json::json!({
            "slice": updated.id,
            "status": updated.status,
            "decrease_suggestions": suggestions,
        }))?;
    } else {
        println!("Slice '{}' is now {}", updated.id, updated.status);
        for s in &suggestions {
            println!(
                "suggestion: ratchet '{0}' is at {1} (budget {2}); run `guard ratchets decrease {0} {1}`",
                s.ratchet, s.count, s.budget
            );
        }
    }
    Ok(())
}
