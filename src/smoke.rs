//! Post-install verification: run the installed wrappers and expect success.

use anyhow::{Context, Result};
use log::info;

use crate::error::InstallError;
use crate::formula::Formula;
use crate::layout::InstallLayout;
use crate::receipt::Receipt;
use crate::runtime::Runtime;

/// Run every test command the formula declares against the installed
/// wrappers. Fails on the first non-zero exit.
#[tracing::instrument(skip(runtime, formula, layout))]
pub fn run_tests<R: Runtime>(runtime: &R, formula: &Formula, layout: &InstallLayout) -> Result<()> {
    if Receipt::load_if_exists(runtime, &layout.receipt_path())?.is_none() {
        return Err(InstallError::NotInstalled {
            formula: formula.name.clone(),
            prefix: layout.prefix.clone(),
        }
        .into());
    }

    for command in &formula.test {
        let program = layout.wrapper_path(&command.bin);
        info!("Running {:?} {:?}", program, command.args);
        let status = runtime
            .run_command(&program, &command.args)
            .with_context(|| format!("Failed to run `{}`", command))?;
        if status != 0 {
            return Err(InstallError::SmokeTestFailed {
                command: command.to_string(),
                status,
            }
            .into());
        }
        println!("   ok {}", command);
    }
    Ok(())
}
