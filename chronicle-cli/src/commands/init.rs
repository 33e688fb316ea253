//! `chronicle init [--create-archive]`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use chronicle_core::config;
use chronicle_core::LedgerStore;

use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Also create the archive branch at HEAD if it does not exist.
    #[arg(long)]
    pub create_archive: bool,
}

impl InitArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let git = global.open_repo()?;
        let root = git.root().to_path_buf();

        let (mut cfg, created) =
            config::init_at(&root).context("failed to write .chronicle.yaml")?;
        let before = cfg.clone();
        global.apply_overrides(&mut cfg);
        let path = config::repo_config_path(&root);
        if cfg != before {
            config::save_at(&root, &cfg).context("failed to update .chronicle.yaml")?;
            println!("{} Updated {}", "✓".green(), path.display());
        } else if created {
            println!("{} Wrote {}", "✓".green(), path.display());
        } else {
            println!("· {} already exists", path.display());
        }

        let ledger = LedgerStore::new(cfg.ledger_path_in(&root), cfg.ledger_title.clone());
        if ledger.init().context("failed to create ledger")? {
            println!("{} Created {}", "✓".green(), ledger.path().display());
        } else {
            println!("· {} already exists", ledger.path().display());
        }

        if self.create_archive {
            if !git.has_commits()? {
                anyhow::bail!("cannot create '{}' before the first commit", cfg.archive_branch);
            }
            if git.branch_exists(&cfg.archive_branch)? {
                println!("· branch '{}' already exists", cfg.archive_branch);
            } else {
                git.create_branch(&cfg.archive_branch)
                    .with_context(|| format!("failed to create '{}'", cfg.archive_branch))?;
                println!("{} Created branch '{}'", "✓".green(), cfg.archive_branch);
            }
        }

        println!("  Run `chronicle commit` to record the first entry.");
        Ok(ExitCode::SUCCESS)
    }
}
