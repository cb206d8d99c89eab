use anyhow::Result;
use clap::Parser;
mod cli;
mod commands;
mod config;
mod dialect;
mod driver;
mod engine;
mod environment;
mod error;
mod namer;
mod orchestrator;
mod source;

use cli::{Cli, Commands};
use engine::Direction;

fn main() {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Cli) -> Result<()> {
    match args.command {
        Commands::Up { config, run } => commands::migrate(&config, run, Direction::Up)?,
        Commands::Down { config, run } => commands::migrate(&config, run, Direction::Down)?,
        Commands::Status { config, json } => commands::status(&config, json)?,
        Commands::New { config, name } => commands::new_migration(&config, name.as_deref())?,
    }
    Ok(())
}
