use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use kct_bom::{write_tables, Bom, WriteOptions};

#[derive(Args)]
pub struct Bom2csvArgs {
    /// Root schematic (.sch) or an existing BOM (.csv) to re-shape
    pub input: PathBuf,

    /// Output CSV; defaults to the input name with a .csv extension
    pub output: Option<PathBuf>,

    /// Prefix the output with a UTF-8 byte-order mark
    #[arg(long)]
    pub utf8: bool,

    /// Generate the grouped BOM table
    #[arg(short = 'g', long)]
    pub group: bool,

    /// Generate the per-reference BOM table
    #[arg(short = 'i', long)]
    pub individual: bool,

    /// Do not open the generated file afterwards
    #[arg(long = "no-open")]
    pub no_open: bool,
}

pub fn execute(args: Bom2csvArgs) -> Result<()> {
    let mut output = args
        .output
        .unwrap_or_else(|| args.input.with_extension(""));
    if output.extension().map(|e| e != "csv").unwrap_or(true) {
        let mut name = output.as_os_str().to_owned();
        name.push(".csv");
        output = PathBuf::from(name);
    }

    let extension = args
        .input
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let bom = match extension.as_str() {
        "sch" => Bom::from_schematic(&args.input)?,
        "csv" => Bom::from_csv_path(&args.input)?,
        "xml" => bail!(
            "XML netlists are not supported; pass the root schematic or a CSV export instead"
        ),
        other => bail!("unsupported input type: .{other}"),
    };
    log::info!("{} reference(s) read from {}", bom.rows.len(), args.input.display());

    // Both tables unless the user picked explicitly.
    let (individual, grouped) = if args.individual || args.group {
        (args.individual, args.group)
    } else {
        (true, true)
    };

    let options = WriteOptions {
        individual,
        grouped,
        utf8_bom: args.utf8,
        generator: "kct bom2csv".to_string(),
        out_dir: output.parent().map(|p| p.to_path_buf()),
    };
    let file = File::create(&output)
        .with_context(|| format!("cannot open {} for writing", output.display()))?;
    write_tables(&bom, BufWriter::new(file), &options)?;
    log::info!("wrote {}", output.display());

    if !args.no_open {
        let _ = open::that(&output);
    }
    Ok(())
}
