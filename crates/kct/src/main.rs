use clap::{Parser, Subcommand};
use env_logger::Env;

mod bom2csv;
mod bom2sch;
mod channels;

#[derive(Parser)]
#[command(name = "kct")]
#[command(about = "Channel tooling for legacy KiCad schematics and boards", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true, hide = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate individual/grouped BOM tables from a schematic or CSV
    Bom2csv(bom2csv::Bom2csvArgs),

    /// Update schematic fields from a CSV BOM
    Bom2sch(bom2sch::Bom2schArgs),

    /// Resolve repeated sub-circuit channels for a seed reference set
    Channels(channels::ChannelsArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Bom2csv(args) => bom2csv::execute(args),
        Commands::Bom2sch(args) => bom2sch::execute(args),
        Commands::Channels(args) => channels::execute(args),
    };

    if let Err(error) = result {
        log::error!("{error:#}");
        std::process::exit(1);
    }
}
