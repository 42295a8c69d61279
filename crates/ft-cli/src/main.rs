use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ft_cli::commands::{attach, category, edit, file, list, slot, tracks};
use ft_cli::{CategoryAction, Cli, Commands, Config, FileAction};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();
    match command {
        Commands::File(FileAction::Add(args)) => file::add(&mut stdout, args, &config),
        Commands::File(FileAction::List { json }) => file::list(&mut stdout, *json, &config),
        Commands::Category(CategoryAction::Add(args)) => category::add(&mut stdout, args, &config),
        Commands::Category(CategoryAction::List) => category::list(&mut stdout, &config),
        Commands::Attach(args) => attach::run(&mut stdout, args, &config),
        Commands::Update(args) => edit::update(&mut stdout, args, &config),
        Commands::Detach(args) => edit::detach(&mut stdout, args, &config),
        Commands::List(args) => list::run(&mut stdout, args, &config),
        Commands::Slot(args) => slot::run(&mut stdout, args, &config),
        Commands::Tracks(args) => tracks::run(&mut stdout, args, &config),
    }
}
