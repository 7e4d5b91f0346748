use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use kct_sch::{ArTree, RefIndex, SheetGraph};

#[derive(Args)]
pub struct ChannelsArgs {
    /// Root schematic of the hierarchy
    pub root: PathBuf,

    /// Seed references (space or comma separated)
    #[arg(required = true)]
    pub refs: Vec<String>,

    /// Print the resolver output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ChannelsArgs) -> Result<()> {
    let graph = SheetGraph::load_from_path(&args.root)
        .with_context(|| format!("cannot load {}", args.root.display()))?;
    let index = RefIndex::build(&graph);

    let seed: Vec<String> = args
        .refs
        .iter()
        .flat_map(|r| r.split(','))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();

    let tree = ArTree::build(&index, seed.iter().map(String::as_str))?;
    let channels = tree.group_by_channel(seed.iter().map(String::as_str));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&channels)?);
        return Ok(());
    }

    if channels.complete.is_empty() {
        println!("no complete channels cover {}", seed.join(", "));
    }
    for (path, map) in &channels.complete {
        let name = graph.user_path(path);
        let display = if name.is_empty() { path.as_str() } else { name.as_str() };
        println!("{} ({} reference(s))", display.bold(), map.len());
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (source, equivalent) in entries {
            println!("  {source} -> {equivalent}");
        }
    }
    for (path, message) in &channels.warnings {
        let name = graph.user_path(path);
        let display = if name.is_empty() { path.as_str() } else { name.as_str() };
        println!("{} {display}: {message}", "warning:".yellow().bold());
    }
    Ok(())
}
