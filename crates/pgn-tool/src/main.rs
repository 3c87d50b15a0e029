//! PGN tool - loads, merges and exports chess game trees.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::ToolConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pgn-tool")]
#[command(about = "Loads, merges and exports PGN game trees")]
struct Cli {
    /// Configuration file (default: pgn-tool.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a game as PGN
    Export {
        /// PGN file or saved graph (.pgg)
        input: PathBuf,
        /// Index of the game in a PGN file
        #[arg(short, long, default_value = "0")]
        game: usize,
        /// Write to this file instead of standard output; a .pgg extension
        /// selects the binary format
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the FEN at the end of the main line, or after the given moves
    Fen {
        input: PathBuf,
        #[arg(short, long, default_value = "0")]
        game: usize,
        /// Moves from the start in coordinate notation, e.g. e2e4 e7e5
        moves: Vec<String>,
    },
    /// Merge games into one tree
    Merge {
        /// Game providing the root and the main line
        base: PathBuf,
        /// PGN files whose games are merged in
        sources: Vec<PathBuf>,
        #[arg(short, long, default_value = "0")]
        game: usize,
        /// Import at most this many plies of each game
        #[arg(long)]
        max_ply: Option<u32>,
        /// Follow only main lines of the merged games
        #[arg(long)]
        main_line_only: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the position key of a FEN
    Pack { fen: String },
    /// Print the FEN of a position key
    Unpack {
        /// The three hex words printed by `pack`
        words: Vec<String>,
    },
}

fn init_logging(config: &ToolConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ToolConfig::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Export {
            input,
            game,
            output,
        } => match output {
            Some(output) => {
                let graph = commands::load_graph(&input, game)?;
                commands::save_graph(&graph, &output, &config.notation)?;
            }
            None => print!("{}", commands::export(&input, game, &config.notation)?),
        },
        Commands::Fen { input, game, moves } => {
            println!("{}", commands::fen_at(&input, game, &moves)?);
        }
        Commands::Merge {
            base,
            sources,
            game,
            max_ply,
            main_line_only,
            output,
        } => {
            let mut options = config.merge.clone();
            options.max_ply = max_ply.or(options.max_ply);
            options.main_line_only |= main_line_only;

            let (graph, summary) = commands::merge(&base, game, &sources, &options)?;
            tracing::info!(
                merged = summary.games_merged,
                skipped = summary.games_skipped,
                added = summary.positions_added,
                "merge complete"
            );
            match output {
                Some(output) => commands::save_graph(&graph, &output, &config.notation)?,
                None => print!("{}", graph.to_record(&config.notation)),
            }
        }
        Commands::Pack { fen } => println!("{}", commands::pack(&fen)?),
        Commands::Unpack { words } => println!("{}", commands::unpack(&words)?),
    }
    Ok(())
}
