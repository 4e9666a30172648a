use crate::output::{print_json, print_table, status_word};
use anyhow::Context;
use clap::Subcommand;
use guard_core::{
    control::ControlPlane, decision, ratchet, ratchet::RatchetResult, scanner::RegexScanner,
    GuardError,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum RatchetSubcommand {
    /// List every ratchet with its budget and unit
    List,
    /// Scan now and compare against budgets
    Check {
        /// Check a single ratchet (default: all)
        id: Option<String>,
    },
    /// Show every budget a ratchet has held
    History { id: String },
    /// Lower a budget. Raising one is always refused
    Decrease {
        id: String,
        new_budget: u64,
        /// Reason recorded in the budget history
        #[arg(long)]
        note: Option<String>,
    },
    /// Convert a ratchet at zero into a denylist rule
    Promote {
        id: String,
        #[arg(long)]
        rationale: String,
    },
}

pub fn run(
    root: &Path,
    config: Option<&Path>,
    subcmd: RatchetSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let plane = ControlPlane::load(root, config).context("failed to load control plane")?;
    match subcmd {
        RatchetSubcommand::List => list(&plane, json),
        RatchetSubcommand::Check { id } => check(&plane, id.as_deref(), json),
        RatchetSubcommand::History { id } => history(&plane, &id, json),
        RatchetSubcommand::Decrease {
            id,
            new_budget,
            note,
        } => decrease(&plane, &id, new_budget, note, json),
        RatchetSubcommand::Promote { id, rationale } => promote(&plane, &id, &rationale, json),
    }
}

fn list(plane: &ControlPlane, json: bool) -> anyhow::Result<()> {
    let ratchets = &plane.ratchets.ratchets;
    if json {
        return print_json(&serde_json::json!({ "ratchets": ratchets }));
    }
    if ratchets.is_empty() {
        println!("No ratchets.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = ratchets
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.label.clone(),
                r.unit.to_string(),
                r.budget.to_string(),
                r.promoted_to.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "LABEL", "UNIT", "BUDGET", "PROMOTED TO"], &rows);
    Ok(())
}

fn check(plane: &ControlPlane, id: Option<&str>, json: bool) -> anyhow::Result<()> {
    let scanner = RegexScanner::new(&plane.root);
    let results: Vec<RatchetResult> = match id {
        Some(id) => {
            let (r, c) = plane.ratchet(id)?;
            vec![r.evaluate(c.scan(&scanner))]
        }
        None => plane
            .ratchets
            .ratchets
            .iter()
            .zip(plane.ratchet_checks())
            .map(|(r, c)| r.evaluate(c.scan(&scanner)))
            .collect(),
    };

    if json {
        print_json(&serde_json::json!({ "results": results }))?;
    } else {
        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.count.to_string(),
                    r.budget.to_string(),
                    r.unit.to_string(),
                    r.suggested_budget
                        .map(|s| format!("decrease to {s}"))
                        .unwrap_or_else(|| "-".to_string()),
                    status_word(r.ok).to_string(),
                ]
            })
            .collect();
        print_table(&["ID", "COUNT", "BUDGET", "UNIT", "SUGGESTION", "STATUS"], &rows);
        for r in &results {
            if r.over_budget() {
                println!("FAIL: {} ({}): {}", r.id, r.label, r.matched_files.join(", "));
            }
            if let Some(held) = &r.history_regression {
                println!("FAIL: {} ({}): budget history increases {held:?}", r.id, r.label);
            }
        }
    }

    let failing: usize = results.iter().map(RatchetResult::violation_count).sum();
    if failing > 0 {
        return Err(GuardError::Violations(failing).into());
    }
    Ok(())
}

fn history(plane: &ControlPlane, id: &str, json: bool) -> anyhow::Result<()> {
    let r = plane.ratchets.get(id)?;
    if json {
        return print_json(&serde_json::json!({
            "id": r.id,
            "budget": r.budget,
            "history": r.budget_history,
            "monotonic": r.history_is_monotonic(),
        }));
    }
    let rows: Vec<Vec<String>> = r
        .budget_history
        .iter()
        .map(|c| {
            vec![
                c.changed_at.to_rfc3339(),
                c.budget.to_string(),
                c.note.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["CHANGED AT", "BUDGET", "NOTE"], &rows);
    println!("current budget: {}", r.budget);
    if !r.history_is_monotonic() {
        println!("warning: budget history increases: {:?}", r.budgets_held());
    }
    Ok(())
}

fn decrease(
    plane: &ControlPlane,
    id: &str,
    new_budget: u64,
    note: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let previous = plane.ratchets.get(id)?.budget;
    let updated = ratchet::decrease_budget(&plane.dir, id, new_budget, note)
        .with_context(|| format!("cannot lower ratchet '{id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "id": updated.id,
            "previous": previous,
            "budget": updated.budget,
        }))?;
    } else if previous == updated.budget {
        println!("Ratchet '{id}' already at {}", updated.budget);
    } else {
        println!("Ratchet '{id}': {previous} -> {}", updated.budget);
    }
    Ok(())
}

fn promote(plane: &ControlPlane, id: &str, rationale: &str, json: bool) -> anyhow::Result<()> {
    let (_, check) = plane.ratchet(id)?;
    let live = check.scan(&RegexScanner::new(&plane.root)).count;
    let (rule, decision) = decision::promote_ratchet(&plane.dir, id, live, rationale)
        .with_context(|| format!("cannot promote ratchet '{id}'"))?;

    if json {
        print_json(&serde_json::json!({ "rule": rule, "decision": decision }))?;
    } else {
        println!(
            "Ratchet '{id}' promoted to denylist rule '{}' ({})",
            rule.id, decision.id
        );
    }
    Ok(())
}
