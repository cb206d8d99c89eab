use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::{LoadedConfig, Origin};
use crate::error::{Error, Result};

pub const DEFAULT_DIR: &str = "migrations";
pub const DEFAULT_TABLE: &str = "schema_migrations";

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagStrategy {
    #[default]
    Epoch,
    Count,
}

impl TagStrategy {
    /// Unknown strategies fall back to `Epoch`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "count" => TagStrategy::Count,
            "epoch" | "" => TagStrategy::Epoch,
            other => {
                log::warn!("unknown tag strategy '{}', using epoch", other);
                TagStrategy::Epoch
            }
        }
    }
}

/// Table that records applied migrations, optionally inside a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingTable {
    pub schema: Option<String>,
    pub table: String,
}

impl Default for TrackingTable {
    fn default() -> Self {
        Self {
            schema: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

/// A validated environment. Built once per invocation and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub name: String,
    pub origin: Origin,
    pub dialect: String,
    pub data_source: String,
    pub dir: PathBuf,
    pub tracking: TrackingTable,
    pub tag: TagStrategy,
}

pub fn resolve(config: &LoadedConfig, name: &str) -> Result<ResolvedEnvironment> {
    let origin = config.origin.clone();
    let env = config
        .environments
        .get(name)
        .ok_or_else(|| Error::UnknownEnvironment {
            origin: origin.clone(),
            name: name.to_string(),
        })?;

    if env.dialect.is_empty() {
        return Err(Error::MissingDialect(origin));
    }
    if env.datasource.is_empty() {
        return Err(Error::MissingDataSource(origin));
    }

    let dir = if env.dir.is_empty() {
        PathBuf::from(DEFAULT_DIR)
    } else {
        PathBuf::from(&env.dir)
    };

    let mut tracking = TrackingTable::default();
    if !env.table.is_empty() {
        tracking.table = env.table.clone();
    }
    if !env.schema.is_empty() {
        tracking.schema = Some(env.schema.clone());
    }

    Ok(ResolvedEnvironment {
        name: name.to_string(),
        origin,
        dialect: env.dialect.clone(),
        data_source: expand_env(&env.datasource),
        dir,
        tracking,
        tag: TagStrategy::from_name(&env.tag),
    })
}

/// Replace `$VAR` and `${VAR}` with values from the process environment.
/// Unset variables become empty strings.
pub fn expand_env(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &Captures| {
            let var = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            std::env::var(var).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigMapping, Environment};

    fn config(origin: Origin, name: &str, env: Environment) -> LoadedConfig {
        let mut environments = ConfigMapping::new();
        environments.insert(name.to_string(), env);
        LoadedConfig {
            origin,
            environments,
        }
    }

    fn mysql_env() -> Environment {
        Environment {
            dialect: "mysql".into(),
            datasource: "mysql://root@localhost/app".into(),
            ..Environment::default()
        }
    }

    #[test]
    fn unknown_environment_names_origin() {
        let cfg = config(Origin::File, "development", mysql_env());
        let err = resolve(&cfg, "production").unwrap_err();
        assert!(matches!(err, Error::UnknownEnvironment { .. }));
        assert_eq!(err.to_string(), "configuration file: No Environment: production");

        let cfg = config(Origin::Inline, "development", mysql_env());
        let err = resolve(&cfg, "production").unwrap_err();
        assert_eq!(err.to_string(), "inline parameters: No Environment: production");
    }

    #[test]
    fn missing_dialect_and_data_source_are_specific() {
        let mut env = mysql_env();
        env.dialect.clear();
        let err = resolve(&config(Origin::Inline, "dev", env), "dev").unwrap_err();
        assert!(matches!(err, Error::MissingDialect(Origin::Inline)));

        let mut env = mysql_env();
        env.datasource.clear();
        let err = resolve(&config(Origin::Inline, "dev", env), "dev").unwrap_err();
        assert!(matches!(err, Error::MissingDataSource(Origin::Inline)));
        assert_eq!(err.to_string(), "inline parameters: No data source specified");
    }

    #[test]
    fn dir_defaults_only_when_empty() {
        let resolved = resolve(&config(Origin::Inline, "dev", mysql_env()), "dev").unwrap();
        assert_eq!(resolved.dir, PathBuf::from(DEFAULT_DIR));

        let mut env = mysql_env();
        env.dir = "custom".into();
        let resolved = resolve(&config(Origin::Inline, "dev", env), "dev").unwrap();
        assert_eq!(resolved.dir, PathBuf::from("custom"));
    }

    #[test]
    fn tracking_table_overrides() {
        let resolved = resolve(&config(Origin::Inline, "dev", mysql_env()), "dev").unwrap();
        assert_eq!(resolved.tracking, TrackingTable::default());

        let mut env = mysql_env();
        env.table = "applied".into();
        env.schema = "ops".into();
        let resolved = resolve(&config(Origin::Inline, "dev", env), "dev").unwrap();
        assert_eq!(resolved.tracking.table, "applied");
        assert_eq!(resolved.tracking.schema.as_deref(), Some("ops"));
    }

    #[test]
    fn expands_environment_variables() {
        std::env::set_var("SQLMIG_TEST_PASSWORD", "s3cret");
        std::env::remove_var("SQLMIG_TEST_UNSET");

        assert_eq!(
            expand_env("mysql://root:${SQLMIG_TEST_PASSWORD}@db/app"),
            "mysql://root:s3cret@db/app"
        );
        assert_eq!(expand_env("$SQLMIG_TEST_PASSWORD/x"), "s3cret/x");
        assert_eq!(expand_env("a${SQLMIG_TEST_UNSET}b"), "ab");
        assert_eq!(expand_env("no variables here"), "no variables here");
    }

    #[test]
    fn resolve_expands_data_source_variables() {
        std::env::set_var("SQLMIG_RESOLVE_HOST", "db.internal");
        let mut env = mysql_env();
        env.datasource = "mysql://root@${SQLMIG_RESOLVE_HOST}:3306/app".into();
        let cfg = config(Origin::File, "dev", env);

        let resolved = resolve(&cfg, "dev").unwrap();
        assert_eq!(resolved.data_source, "mysql://root@db.internal:3306/app");
        assert_eq!(
            cfg.environments["dev"].datasource,
            "mysql://root@${SQLMIG_RESOLVE_HOST}:3306/app"
        );
    }

    #[test]
    fn tag_strategy_names() {
        assert_eq!(TagStrategy::from_name("count"), TagStrategy::Count);
        assert_eq!(TagStrategy::from_name("epoch"), TagStrategy::Epoch);
        assert_eq!(TagStrategy::from_name(""), TagStrategy::Epoch);
        assert_eq!(TagStrategy::from_name("sequence"), TagStrategy::Epoch);
    }
}
