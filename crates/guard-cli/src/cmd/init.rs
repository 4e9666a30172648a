use crate::output::print_json;
use anyhow::Context;
use guard_core::{config::GuardConfig, io, paths};
use std::path::Path;

const EMPTY_RECORDS: &[(&str, &str)] = &[
    (paths::RATCHETS_FILE, "ratchets: []\n"),
    (paths::DENYLIST_FILE, "rules: []\n"),
    (paths::SLICES_FILE, "slices: []\n"),
    (paths::MAP_FILE, "entries: []\n"),
    (paths::DECISIONS_FILE, "decisions: []\n"),
];

/// Idempotent: existing records are never touched.
pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    let dir = paths::control_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut created = Vec::new();
    let mut existing = Vec::new();

    let config_path = paths::config_path(&dir);
    if config_path.exists() {
        existing.push(paths::CONFIG_FILE);
    } else {
        GuardConfig::new(&project_name)
            .save(&dir)
            .context("failed to write config.yaml")?;
        created.push(paths::CONFIG_FILE);
    }

    for (file, body) in EMPTY_RECORDS {
        let path = dir.join(file);
        let written = io::write_if_missing(&path, body.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        if written {
            created.push(*file);
        } else {
            existing.push(*file);
        }
    }

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "project": project_name,
            "created": created,
            "existing": existing,
        }))?;
    } else {
        println!("Initializing migration guard in: {}", root.display());
        for file in &created {
            println!("  created: {}/{file}", paths::CONTROL_DIR);
        }
        for file in &existing {
            println!("  exists:  {}/{file}", paths::CONTROL_DIR);
        }
    }
    Ok(())
}
