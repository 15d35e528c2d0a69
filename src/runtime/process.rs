//! Process execution for installed executables.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::Command;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_command_impl(&self, program: &Path, args: &[String]) -> Result<i32> {
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to execute {:?}", program))?;

        debug!("{:?} {:?} exited with {}", program, args, status);
        Ok(status.code().unwrap_or(-1))
    }
}
