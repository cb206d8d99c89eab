use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::cli::ConfigArgs;
use crate::error::{Error, Result};

/// One named deployment target, as written in the config file or assembled
/// from the `--config.*` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub dialect: String,
    pub datasource: String,
    pub dir: String,
    pub table: String,
    pub schema: String,
    pub tag: String,
}

pub type ConfigMapping = HashMap<String, Environment>;

/// Where the environment mapping came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Inline,
    File,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Inline => f.write_str("inline parameters"),
            Origin::File => f.write_str("configuration file"),
        }
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub origin: Origin,
    pub environments: ConfigMapping,
}

/// Inline flags win unconditionally: if any of them is set the file is not
/// consulted at all.
pub fn load(args: &ConfigArgs) -> Result<LoadedConfig> {
    if has_inline_params(args) {
        let env = Environment {
            dialect: args.dialect.clone(),
            datasource: args.data_source.clone(),
            dir: args.dir.clone(),
            table: args.table.clone(),
            ..Environment::default()
        };
        log::debug!("using inline parameters for environment '{}'", args.env);
        let mut environments = ConfigMapping::new();
        environments.insert(args.env.clone(), env);
        return Ok(LoadedConfig {
            origin: Origin::Inline,
            environments,
        });
    }

    let path = expand_home(&args.config);
    let environments = read_file(&path)?;
    log::debug!(
        "loaded {} environment(s) from {}",
        environments.len(),
        path.display()
    );
    Ok(LoadedConfig {
        origin: Origin::File,
        environments,
    })
}

fn has_inline_params(args: &ConfigArgs) -> bool {
    !args.dialect.is_empty() || !args.data_source.is_empty() || !args.table.is_empty()
}

/// Read and decode a config file; `.toml` files are parsed as TOML, anything
/// else as YAML.
pub fn read_file(path: &Path) -> Result<ConfigMapping> {
    let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str::<ConfigMapping>(&content).map_err(|e| e.to_string())
    } else if content.trim().is_empty() {
        Ok(ConfigMapping::new())
    } else {
        serde_yaml::from_str::<ConfigMapping>(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| Error::ConfigParse {
        path: path.to_path_buf(),
        message,
    })
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(config: &Path) -> ConfigArgs {
        ConfigArgs {
            config: config.to_path_buf(),
            env: "development".into(),
            dialect: String::new(),
            data_source: String::new(),
            dir: "db/migrations".into(),
            table: String::new(),
        }
    }

    const YAML: &str = "
development:
  dialect: mysql
  datasource: mysql://root@localhost/dev
  dir: db/dev
production:
  dialect: mysql
  datasource: ${DATABASE_URL}
  table: applied
  schema: ops
  tag: count
";

    #[test]
    fn reads_yaml_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("dbconfig.yml");
        fs::write(&path, YAML).unwrap();

        let loaded = load(&args(&path)).unwrap();
        assert_eq!(loaded.origin, Origin::File);
        assert_eq!(loaded.environments.len(), 2);
        let prod = &loaded.environments["production"];
        assert_eq!(prod.datasource, "${DATABASE_URL}");
        assert_eq!(prod.schema, "ops");
        assert_eq!(prod.tag, "count");
        assert!(prod.dir.is_empty());
    }

    #[test]
    fn reads_toml_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("dbconfig.toml");
        fs::write(
            &path,
            "[staging]\ndialect = \"mysql\"\ndatasource = \"mysql://u@h/db\"\n",
        )
        .unwrap();

        let loaded = load(&args(&path)).unwrap();
        assert_eq!(loaded.environments["staging"].dialect, "mysql");
    }

    #[test]
    fn inline_params_ignore_existing_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("dbconfig.yml");
        fs::write(&path, YAML).unwrap();

        for (dialect, data_source, table) in [
            ("mysql", "", ""),
            ("", "mysql://x@y/z", ""),
            ("", "", "applied"),
        ] {
            let mut a = args(&path);
            a.env = "production".into();
            a.dialect = dialect.into();
            a.data_source = data_source.into();
            a.table = table.into();

            let loaded = load(&a).unwrap();
            assert_eq!(loaded.origin, Origin::Inline);
            assert_eq!(loaded.origin.to_string(), "inline parameters");
            assert_eq!(loaded.environments.len(), 1);
            let env = &loaded.environments["production"];
            assert_eq!(env.dialect, dialect);
            assert_eq!(env.datasource, data_source);
            assert_eq!(env.table, table);
            assert_eq!(env.dir, "db/migrations");
            assert!(env.schema.is_empty());
        }
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = tempdir().unwrap();
        let err = load(&args(&tmp.path().join("nope.yml"))).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
        assert!(err.to_string().starts_with("configuration file: cannot read"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("dbconfig.yml");
        fs::write(&path, "- just\n- a list\n").unwrap();
        let err = load(&args(&path)).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err
            .to_string()
            .starts_with(&format!("configuration file: cannot parse {}", path.display())));
    }
}
