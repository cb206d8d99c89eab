use crate::cli::ConfigArgs;
use crate::config;
use crate::dialect::Dialect;
use crate::driver;
use crate::engine::{self, Database, ExecutionReport, ExecutionRequest, StatusRow};
use crate::environment::{self, ResolvedEnvironment};
use crate::error::{Error, Result};
use crate::source::FileMigrationSource;

/// Load the config selected by `args` and resolve the active environment.
pub fn active_environment(args: &ConfigArgs) -> Result<ResolvedEnvironment> {
    let loaded = config::load(args)?;
    let env = environment::resolve(&loaded, &args.env)?;
    log::debug!(
        "environment '{}' from {}: dialect {}, dir {}",
        env.name,
        env.origin,
        env.dialect,
        env.dir.display()
    );
    Ok(env)
}

/// Open a handle for the environment, then insist the dialect is one the
/// engine has SQL for.
pub fn connect<F>(env: &ResolvedEnvironment, open: F) -> Result<Box<dyn Database>>
where
    F: FnOnce(&str, &str) -> Result<Box<dyn Database>>,
{
    let db = open(&env.dialect, &env.data_source)?;
    if Dialect::from_name(&env.dialect).is_none() {
        return Err(Error::UnsupportedDialect(env.dialect.clone()));
    }
    Ok(db)
}

pub fn apply_migrations(args: &ConfigArgs, request: ExecutionRequest) -> Result<ExecutionReport> {
    let env = active_environment(args)?;
    apply_with(&env, driver::open, request)
}

pub fn apply_with<F>(
    env: &ResolvedEnvironment,
    open: F,
    request: ExecutionRequest,
) -> Result<ExecutionReport>
where
    F: FnOnce(&str, &str) -> Result<Box<dyn Database>>,
{
    let mut db = connect(env, open)?;
    let source = FileMigrationSource::new(&env.dir);
    engine::execute(db.as_mut(), &source, &env.tracking, &request)
}

pub fn migration_status(args: &ConfigArgs) -> Result<Vec<StatusRow>> {
    let env = active_environment(args)?;
    let mut db = connect(&env, driver::open)?;
    let source = FileMigrationSource::new(&env.dir);
    engine::status(db.as_mut(), &source, &env.tracking)
}
