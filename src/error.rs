use std::path::PathBuf;

use thiserror::Error;

use crate::config::Origin;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: cannot read {}: {source}", Origin::File, .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: cannot parse {}: {message}", Origin::File, .path.display())]
    ConfigParse { path: PathBuf, message: String },
    #[error("{origin}: No Environment: {name}")]
    UnknownEnvironment { origin: Origin, name: String },
    #[error("{0}: No dialect specified")]
    MissingDialect(Origin),
    #[error("{0}: No data source specified")]
    MissingDataSource(Origin),
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),
    #[error("Cannot connect to database: {0}")]
    Connection(String),
    #[error("Migration directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("Cannot read migrations from {}: {message}", .path.display())]
    MigrationSourceScan { path: PathBuf, message: String },
    #[error("Cannot create migration {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Migration failed: {0}")]
    EngineExecution(String),
    #[error("Invalid migration name: {0:?}")]
    InvalidMigrationName(String),
    #[error("Unknown migration in database: {0}")]
    UnknownMigration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn scan(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::MigrationSourceScan {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<mysql::Error> for Error {
    fn from(err: mysql::Error) -> Self {
        Error::EngineExecution(err.to_string())
    }
}

impl From<postgres::Error> for Error {
    fn from(err: postgres::Error) -> Self {
        Error::EngineExecution(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::EngineExecution(err.to_string())
    }
}
