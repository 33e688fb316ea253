//! `chronicle verify`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use chronicle_sync::verify::verify;

use super::report;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl VerifyArgs {
    /// Exits 1 when there are findings.
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let git = global.open_repo()?;
        let (config, _) = global.load_config(&git)?;
        let result = verify(&git, &config).context("ledger verification failed")?;

        if self.json {
            report::print_json(&result)?;
        } else if result.is_clean() {
            let pending = if result.pending_hash {
                " (newest entry waiting for its hash)"
            } else {
                ""
            };
            println!(
                "{} {} entries OK{pending}",
                "✓".green(),
                result.entries
            );
        } else {
            println!(
                "{} {} problem(s) in {} entries:",
                "✗".red(),
                result.findings.len(),
                result.entries
            );
            for finding in &result.findings {
                println!("  - {finding}");
            }
        }

        Ok(if result.is_clean() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}
