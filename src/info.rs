use anyhow::Result;
use log::debug;
use std::fmt::Write;

use crate::{formula::Formula, layout::InstallLayout, receipt::Receipt, runtime::Runtime};

/// Print what the formula installs and, if present, the installed version.
#[tracing::instrument(skip(runtime, formula, layout))]
pub fn info<R: Runtime>(runtime: &R, formula: &Formula, layout: &InstallLayout) -> Result<()> {
    debug!("Showing info for {}", formula.name);
    let receipt = Receipt::load_if_exists(runtime, &layout.receipt_path())?;
    print!("{}", describe(formula, layout, receipt.as_ref()));
    Ok(())
}

pub fn describe(formula: &Formula, layout: &InstallLayout, receipt: Option<&Receipt>) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{}: {}", formula.name, formula.desc);
    let _ = writeln!(out, "Homepage: {}", formula.homepage);
    let _ = writeln!(out, "License: {}", formula.license);
    let _ = writeln!(out, "Version: {}", formula.version);
    let _ = writeln!(out, "Source: {}", formula.url);
    if !formula.sha256.is_empty() {
        let _ = writeln!(out, "SHA-256: {}", formula.sha256);
    }
    let _ = writeln!(out, "Depends on: {}", formula.runtime);

    let manifest = &formula.manifest;
    let _ = writeln!(out, "\nInstalls:");
    let _ = writeln!(
        out,
        "  {} file(s) into {}",
        manifest.libexec.len(),
        layout.libexec.display()
    );
    let _ = writeln!(
        out,
        "  {} doc(s) into {}",
        manifest.doc.len(),
        layout.doc.display()
    );
    for asset in &manifest.share {
        let _ = writeln!(
            out,
            "  {}/ into {}",
            asset.from,
            layout.share_pkg().join(asset.dest_name()).display()
        );
    }
    for wrapper in &formula.wrappers {
        let _ = writeln!(
            out,
            "  {} -> {}",
            layout.wrapper_path(&wrapper.name).display(),
            wrapper.script
        );
    }

    match receipt {
        Some(r) => {
            let _ = writeln!(
                out,
                "\nInstalled: {} ({} files, interpreter {})",
                r.version,
                r.files.len(),
                r.interpreter.display()
            );
        }
        None => {
            let _ = writeln!(out, "\nNot installed under {}", layout.prefix.display());
        }
    }
    out
}
