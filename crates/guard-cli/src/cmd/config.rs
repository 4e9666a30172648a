use crate::output::print_json;
use crate::root::record_dir;
use anyhow::Context;
use clap::Subcommand;
use guard_core::{
    config::{GuardConfig, WarnLevel},
    control::ControlPlane,
    paths,
};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Load every record and lint it for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    config: Option<&Path>,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, config, json),
        ConfigSubcommand::Validate => validate(root, config, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let dir = record_dir(root, config);
    let file = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::config_path(&dir));
    let cfg = GuardConfig::load_file(&file).context("failed to load config")?;

    if json {
        return print_json(&serde_json::json!({
            "root": root,
            "records": dir,
            "config": cfg,
            "effective_parallelism": cfg.effective_parallelism(),
        }));
    }
    println!("root:    {}", root.display());
    println!("records: {}", dir.display());
    print!("{}", serde_yaml::to_string(&cfg).context("failed to render config")?);
    println!("# effective parallelism: {}", cfg.effective_parallelism());
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let plane = ControlPlane::load(root, config).context("failed to load control plane")?;
    let warnings = plane.validate_warnings();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Control plane is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
