//! Environment wrapper scripts for installed drivers.
//!
//! A wrapper prepends directories to environment variables and then `exec`s
//! the runtime interpreter on a libexec driver with `"$@"`. Because of the
//! `exec`, the driver's exit status is the wrapper's exit status.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::dependency::ResolvedRuntime;
use crate::runtime::Runtime;

const WRAPPER_MODE: u32 = 0o755;

/// Prepend `value` to the colon-separated variable `var`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvPrepend {
    pub var: String,
    pub value: PathBuf,
}

/// Everything needed to render one wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvScript {
    pub interpreter: PathBuf,
    pub target: PathBuf,
    pub env: Vec<EnvPrepend>,
}

impl EnvScript {
    /// Wrapper for `target` run by `runtime`, with the runtime's bin directory
    /// on `PATH` and `libexec` on the module search path.
    pub fn for_driver(
        runtime: &ResolvedRuntime,
        module_path_var: &str,
        libexec: &Path,
        target: &Path,
    ) -> Self {
        let mut env = Vec::new();
        if !runtime.bin_dir.as_os_str().is_empty() {
            env.push(EnvPrepend {
                var: "PATH".into(),
                value: runtime.bin_dir.clone(),
            });
        }
        env.push(EnvPrepend {
            var: module_path_var.to_string(),
            value: libexec.to_path_buf(),
        });
        Self {
            interpreter: runtime.interpreter.clone(),
            target: target.to_path_buf(),
            env,
        }
    }

    pub fn render(&self) -> String {
        let mut script = String::from("#!/bin/sh\n");
        script.push_str("# Generated by privvy-formula. Reinstalling overwrites this file.\n");
        for rule in &self.env {
            script.push_str(&format!(
                "{var}={value}\"${{{var}:+:${{{var}}}}}\"\nexport {var}\n",
                var = rule.var,
                value = shell_quote(&rule.value.to_string_lossy()),
            ));
        }
        script.push_str(&format!(
            "exec {} {} \"$@\"\n",
            shell_quote(&self.interpreter.to_string_lossy()),
            shell_quote(&self.target.to_string_lossy()),
        ));
        script
    }
}

/// Single-quote `value` for POSIX sh.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Write a wrapper to `path`, replacing any previous one, and mark it executable.
#[tracing::instrument(skip(runtime, script))]
pub fn write_wrapper<R: Runtime>(runtime: &R, path: &Path, script: &EnvScript) -> Result<()> {
    debug!("Writing wrapper {:?} -> {:?}", path, script.target);
    if runtime.exists(path) {
        runtime
            .remove_file(path)
            .with_context(|| format!("Failed to replace existing wrapper {:?}", path))?;
    }
    runtime
        .write(path, script.render().as_bytes())
        .with_context(|| format!("Failed to write wrapper {:?}", path))?;
    runtime
        .set_permissions(path, WRAPPER_MODE)
        .with_context(|| format!("Failed to make wrapper {:?} executable", path))?;
    Ok(())
}
