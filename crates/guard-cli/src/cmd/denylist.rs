use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use guard_core::{control::ControlPlane, decision};
use std::path::Path;

#[derive(Subcommand)]
pub enum DenylistSubcommand {
    /// List global rules and the rules slices enforce once done
    List,
    /// Remove a global rule, recording the decision
    Retire {
        id: String,
        #[arg(long)]
        rationale: String,
    },
}

pub fn run(
    root: &Path,
    config: Option<&Path>,
    subcmd: DenylistSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let plane = ControlPlane::load(root, config).context("failed to load control plane")?;
    match subcmd {
        DenylistSubcommand::List => list(&plane, json),
        DenylistSubcommand::Retire { id, rationale } => retire(&plane, &id, &rationale, json),
    }
}

fn list(plane: &ControlPlane, json: bool) -> anyhow::Result<()> {
    let scoped: Vec<serde_json::Value> = plane
        .slice_rule_checks()
        .iter()
        .map(|c| {
            serde_json::json!({
                "slice": c.slice_id,
                "enforced": plane.slices.is_done(&c.slice_id),
                "rule": c.rule,
            })
        })
        .collect();
    if json {
        return print_json(&serde_json::json!({
            "rules": plane.denylist.rules,
            "slice_rules": scoped,
        }));
    }

    let mut rows: Vec<Vec<String>> = plane
        .denylist
        .rules
        .iter()
        .map(|r| vec![r.id.clone(), r.label.clone(), "-".to_string(), "enforced".to_string()])
        .collect();
    rows.extend(plane.slice_rule_checks().iter().map(|c| {
        let state = if plane.slices.is_done(&c.slice_id) {
            "enforced"
        } else {
            "pending"
        };
        vec![
            c.rule.id.clone(),
            c.rule.label.clone(),
            c.slice_id.clone(),
            state.to_string(),
        ]
    }));
    if rows.is_empty() {
        println!("No denylist rules.");
        return Ok(());
    }
    print_table(&["ID", "LABEL", "SLICE", "STATE"], &rows);
    Ok(())
}

fn retire(plane: &ControlPlane, id: &str, rationale: &str, json: bool) -> anyhow::Result<()> {
    let (rule, decision) = decision::retire_denylist_rule(&plane.dir, id, rationale)
        .with_context(|| format!("cannot retire denylist rule '{id}'"))?;
    if json {
        print_json(&serde_json::json!({ "rule": rule, "decision": decision }))?;
    } else {
        println!("Retired denylist rule '{}' ({})", rule.id, decision.id);
    }
    Ok(())
}
