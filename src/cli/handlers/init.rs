use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io::CONFIG_FILE;
use crate::model::config::VaultConfig;

const CONFIG_TEMPLATE: &str = r##"[schedule]
# Passed through to the scheduler as a hint. Packing does not use it yet.
high_pressure = false

[vault]
# Task vault, relative to this directory
file = "{vault}"
"##;

const VAULT_TEMPLATE: &str = r##"# Top-level tasks, in order. Add with: tb add "title"
roots = []

# Each task is keyed by id. children lists ids, so a task can sit under
# several parents.
#
# [tasks."standup.md"]
# title = "Standup"
# duration = 15
# anchored = true
# start = "2026-01-05T09:30:00"
#
# [tasks."write-report.md"]
# title = "Write report"
# duration = 90
# children = ["outline.md"]
"##;

fn render_config(vault_file: &str) -> String {
    CONFIG_TEMPLATE.replace("{vault}", vault_file)
}

pub fn cmd_init(dir: &Path, args: &InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = dir.join(CONFIG_FILE);
    let vault_file = VaultConfig::default().file;
    let vault_path = dir.join(&vault_file);

    if !args.force {
        for path in [&config_path, &vault_path] {
            if path.exists() {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
        }
    }

    fs::write(&config_path, render_config(&vault_file))?;
    fs::write(&vault_path, VAULT_TEMPLATE)?;
    tracing::info!(dir = %dir.display(), "initialized vault");

    println!("Initialized timeblock in {}", dir.display());
    println!("  config: {}", CONFIG_FILE);
    println!("  vault:  {}", vault_file);
    Ok(())
}
