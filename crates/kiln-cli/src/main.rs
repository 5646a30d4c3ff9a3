//! Kiln CLI - out-of-process compilation of hot-reloadable modules.

mod compile;
mod console;
mod watch;
mod watcher;

use clap::{Parser, Subcommand};

use crate::compile::CompileArgs;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Compile hot-reloadable native modules")]
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
    /// Compile sources into a module once
    Compile {
        #[command(flatten)]
        args: CompileArgs,

        /// Print the toolchain command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Compile, then recompile whenever a source changes
    Watch {
        #[command(flatten)]
        args: CompileArgs,

        /// Keep one shell alive between compiles
        #[arg(long)]
        fast: bool,
    },
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
        Commands::Compile { args, dry_run } => compile::execute(&args, dry_run).await?,
        Commands::Watch { args, fast } => watch::execute(&args, fast).await?,
    }

    Ok(())
}
