//! Rill CLI - run, watch, serve and share Rill playground programs.

mod colors;
mod output;
mod run;
mod serve;
mod share;
mod watch;
mod watcher;

use clap::{Parser, Subcommand};
use rill_engine::PipelineStage;
use rill_playground::Cursor;

#[derive(Parser)]
#[command(name = "rill")]
#[command(about = "Playground compiler for the Rill language")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program once and print the result
    Run {
        /// Path to the program
        file: String,

        /// How far to run the pipeline (syntax, validated, bir, execute)
        #[arg(long, default_value = "execute")]
        stage: PipelineStage,

        /// Cursor position ROW:COL selecting the breakpoint (1-based; 0:0 means none)
        #[arg(long, value_parser = parse_cursor)]
        breakpoint: Option<Cursor>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompile a program whenever it changes
    Watch {
        /// Path to the program
        file: String,

        /// How far to run the pipeline (syntax, validated, bir, execute)
        #[arg(long, default_value = "execute")]
        stage: PipelineStage,

        /// Cursor position ROW:COL selecting the breakpoint (1-based; 0:0 means none)
        #[arg(long, value_parser = parse_cursor)]
        breakpoint: Option<Cursor>,

        /// Clear screen before each result
        #[arg(long)]
        clear: bool,
    },

    /// Start the playground WebSocket server
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Print a share link for a program
    Share {
        /// Path to the program
        file: String,

        /// Skip the link shortener
        #[arg(long)]
        no_shorten: bool,
    },
}

/// Parse `ROW:COL` as 1-based editor coordinates.
fn parse_cursor(s: &str) -> Result<Cursor, String> {
    let (row, column) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ROW:COL, found '{}'", s))?;
    let row = row
        .trim()
        .parse()
        .map_err(|_| format!("invalid row '{}'", row))?;
    let column = column
        .trim()
        .parse()
        .map_err(|_| format!("invalid column '{}'", column))?;
    Ok(Cursor::new(row, column))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            file,
            stage,
            breakpoint,
            json,
        } => run::execute(&file, stage, breakpoint.unwrap_or_default(), json).await?,

        Commands::Watch {
            file,
            stage,
            breakpoint,
            clear,
        } => watch::execute(&file, stage, breakpoint.unwrap_or_default(), clear).await?,

        Commands::Serve { host, port } => serve::execute(host, port).await?,

        Commands::Share { file, no_shorten } => share::execute(&file, no_shorten).await?,
    }

    Ok(())
}
