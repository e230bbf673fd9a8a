use anyhow::Result;
use clap::Parser;
use memorypack::cli::{AppContext, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    memorypack::infra::logging::init(cli.verbose, cli.quiet, cli.log_json)?;

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        log_json: cli.log_json,
    };

    match cli.command {
        Commands::Compress(args) => memorypack::compress_run(args, &ctx),
        Commands::Prune(args) => memorypack::prune_run(args, &ctx),
        Commands::Watch(args) => memorypack::watch_run(args, &ctx),
        Commands::Init(args) => memorypack::infra::config::init(args, &ctx),
        Commands::Completions(args) => memorypack::completion::run(args, &ctx),
    }
}
