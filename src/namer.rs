use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};

use crate::environment::{ResolvedEnvironment, TagStrategy};
use crate::error::{Error, Result};
use crate::source::FileMigrationSource;

pub const TEMPLATE: &str = "\n-- +migrate Up\n\n-- +migrate Down\n";
const EPOCH_FORMAT: &str = "%Y%m%d%H%M%S";

pub fn epoch_tag(now: DateTime<Local>) -> String {
    now.format(EPOCH_FORMAT).to_string()
}

/// Next free numeric tag: one past the number of migrations, bumped while
/// a file already uses it.
pub fn count_tag(dir: &Path) -> Result<String> {
    let source = FileMigrationSource::new(dir);
    let mut next = source.count()? + 1;
    let taken = source.file_names()?;
    while taken.iter().any(|name| name.starts_with(&format!("{}-", next))) {
        next += 1;
    }
    Ok(next.to_string())
}

pub fn file_name(tag: &str, name: &str) -> String {
    format!("{}-{}.sql", tag, name.trim())
}

pub fn create_migration(env: &ResolvedEnvironment, name: &str) -> Result<PathBuf> {
    create_migration_at(env, name, Local::now())
}

/// Write an empty migration skeleton into the environment's directory.
/// Never overwrites an existing file.
pub fn create_migration_at(
    env: &ResolvedEnvironment,
    name: &str,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    if name.trim().is_empty() {
        return Err(Error::InvalidMigrationName(name.to_string()));
    }
    if !env.dir.is_dir() {
        return Err(Error::DirectoryNotFound(env.dir.clone()));
    }

    let tag = match env.tag {
        TagStrategy::Count => count_tag(&env.dir)?,
        TagStrategy::Epoch => epoch_tag(now),
    };
    let path = env.dir.join(file_name(&tag, name));
    log::debug!("writing migration skeleton to {}", path.display());

    let write_err = |source: std::io::Error| Error::Write {
        path: path.clone(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(write_err)?;
    file.write_all(TEMPLATE.as_bytes()).map_err(write_err)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Origin;
    use crate::environment::TrackingTable;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    fn env(dir: &Path, tag: TagStrategy) -> ResolvedEnvironment {
        ResolvedEnvironment {
            name: "development".into(),
            origin: Origin::Inline,
            dialect: "mysql".into(),
            data_source: "mysql://root@localhost/app".into(),
            dir: dir.to_path_buf(),
            tracking: TrackingTable::default(),
            tag,
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap()
    }

    #[test]
    fn epoch_tag_is_fixed_width() {
        assert_eq!(epoch_tag(fixed_time()), "20240309070502");
    }

    #[test]
    fn trims_only_surrounding_whitespace() {
        let tmp = tempdir().unwrap();
        let path =
            create_migration_at(&env(tmp.path(), TagStrategy::Epoch), " spaced name ", fixed_time())
                .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "20240309070502-spaced name.sql"
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), TEMPLATE);
    }

    #[test]
    fn same_tick_does_not_overwrite() {
        let tmp = tempdir().unwrap();
        let env = env(tmp.path(), TagStrategy::Epoch);
        let path = create_migration_at(&env, "foo", fixed_time()).unwrap();
        fs::write(&path, "-- +migrate Up\nSELECT 1;\n").unwrap();

        let err = create_migration_at(&env, "foo", fixed_time()).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "-- +migrate Up\nSELECT 1;\n");

        let later = fixed_time() + chrono::Duration::seconds(1);
        let second = create_migration_at(&env, "foo", later).unwrap();
        assert!(second.file_name() > path.file_name());
    }

    #[test]
    fn count_strategy_follows_existing_files() {
        let tmp = tempdir().unwrap();
        for name in ["1-a.sql", "2-b.sql", "3-c.sql"] {
            fs::write(tmp.path().join(name), TEMPLATE).unwrap();
        }
        let env = env(tmp.path(), TagStrategy::Count);

        let first = create_migration_at(&env, "next", fixed_time()).unwrap();
        assert!(first.ends_with("4-next.sql"));
        let second = create_migration_at(&env, "next", fixed_time()).unwrap();
        assert!(second.ends_with("5-next.sql"));
    }

    #[test]
    fn count_strategy_skips_taken_tags() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("2-b.sql"), TEMPLATE).unwrap();
        assert_eq!(count_tag(tmp.path()).unwrap(), "3");

        fs::write(tmp.path().join("3-c.sql"), TEMPLATE).unwrap();
        fs::remove_file(tmp.path().join("2-b.sql")).unwrap();
        assert_eq!(count_tag(tmp.path()).unwrap(), "2");
        fs::write(tmp.path().join("2-x.sql"), TEMPLATE).unwrap();
        assert_eq!(count_tag(tmp.path()).unwrap(), "4");
    }

    #[test]
    fn missing_directory_fails_before_writing() {
        let tmp = tempdir().unwrap();
        let gone = tmp.path().join("missing");
        let err = create_migration_at(&env(&gone, TagStrategy::Epoch), "foo", fixed_time())
            .unwrap_err();
        assert!(matches!(err, Error::DirectoryNotFound(_)));
        assert!(!gone.exists());
    }

    #[test]
    fn blank_name_is_rejected() {
        let tmp = tempdir().unwrap();
        let err = create_migration_at(&env(tmp.path(), TagStrategy::Epoch), "   ", fixed_time())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMigrationName(_)));
    }

    #[test]
    fn count_strategy_reports_scan_errors() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("1-broken.sql"), "no markers here").unwrap();
        let err = create_migration_at(&env(tmp.path(), TagStrategy::Count), "foo", fixed_time())
            .unwrap_err();
        assert!(matches!(err, Error::MigrationSourceScan { .. }));
    }
}
