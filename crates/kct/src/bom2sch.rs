use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use kct_bom::{apply_to_schematic, Bom};

#[derive(Args)]
pub struct Bom2schArgs {
    /// CSV BOM with the values to write back
    pub bom: PathBuf,

    /// Root schematic; defaults to the BOM's `Source:` meta row, resolved
    /// against the CSV's directory
    pub sch: Option<PathBuf>,
}

pub fn execute(args: Bom2schArgs) -> Result<()> {
    log::info!("reading {}", args.bom.display());
    let mut bom = Bom::from_csv_path(&args.bom)
        .with_context(|| format!("cannot read {}", args.bom.display()))?;

    let bom_dir = args
        .bom
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let sch = match (&args.sch, bom.sch_file()) {
        (Some(path), _) => path.clone(),
        (None, Some(source)) => kct_sch::paths::norm_path(source, &bom_dir),
        (None, None) => bail!("no schematic given and the BOM has no Source: row"),
    };
    log::info!("master schematic file is {}", sch.display());

    let report = apply_to_schematic(&mut bom, &sch)?;

    println!(
        "{} component(s) updated across {} file(s)",
        report.components,
        report.files.len()
    );
    for file in &report.files {
        println!("  {} (backup {}.bak)", file.display(), file.display());
    }
    if !report.joined.is_empty() {
        println!(
            "{} divergent values were combined for: {}",
            "warning:".yellow().bold(),
            report.joined.join(", ")
        );
    }
    Ok(())
}
