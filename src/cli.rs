use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sqlmig", author, version, about = "SQL schema migrations per environment")]
pub struct Cli {
    /// Log engine activity (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Migrate the database to the most recent version available
    Up {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Undo a database migration
    Down {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Show which migrations have been applied
    Status {
        #[command(flatten)]
        config: ConfigArgs,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new migration file in the environment's directory
    New {
        #[command(flatten)]
        config: ConfigArgs,
        /// The name of the migration
        name: Option<String>,
    },
}

/// Environment selection; the `config.*` flags bypass the config file.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file to use
    #[arg(long, default_value = "dbconfig.yml")]
    pub config: PathBuf,
    /// Environment to use
    #[arg(long, default_value = "development")]
    pub env: String,
    /// Dialect to use
    #[arg(long = "config.dialect", default_value = "")]
    pub dialect: String,
    /// Data source to use
    #[arg(long = "config.data_source", default_value = "")]
    pub data_source: String,
    /// Directory to use
    #[arg(long = "config.dir", default_value = "db/migrations")]
    pub dir: String,
    /// Table to use
    #[arg(long = "config.table", default_value = "")]
    pub table: String,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct RunArgs {
    /// Limit the number of migrations (0 = unlimited) [default: 0 for up, 1 for down]
    #[arg(long)]
    pub limit: Option<usize>,
    /// Don't apply migrations, just print them
    #[arg(long)]
    pub dryrun: bool,
}
