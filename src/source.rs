use std::{
    cmp::Ordering,
    fs,
    path::PathBuf,
};

use crate::error::{Error, Result};

const MARKER: &str = "-- +migrate";

/// A parsed migration file. `id` is the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl Migration {
    /// Leading digits of the id, used for numeric ordering.
    fn version(&self) -> Option<u64> {
        let digits: String = self.id.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

impl Ord for Migration {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.version(), other.version()) {
            (Some(a), Some(b)) if a != b => a.cmp(&b),
            _ => self.id.cmp(&other.id),
        }
    }
}

impl PartialOrd for Migration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `*.sql` files in a single directory.
#[derive(Debug, Clone)]
pub struct FileMigrationSource {
    pub dir: PathBuf,
}

impl FileMigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File names ending in `.sql`, unsorted.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::scan(&self.dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::scan(&self.dir, e))?;
            if !entry.file_type().map_err(|e| Error::scan(&self.dir, e))?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".sql") {
                    names.push(name.to_owned());
                }
            }
        }
        Ok(names)
    }

    /// Parse every migration in the directory, sorted in apply order.
    pub fn find(&self) -> Result<Vec<Migration>> {
        let mut migrations = self
            .file_names()?
            .into_iter()
            .map(|name| {
                let path = self.dir.join(&name);
                let content = fs::read_to_string(&path).map_err(|e| Error::scan(&path, e))?;
                parse_migration(&name, &content).map_err(|message| Error::scan(&path, message))
            })
            .collect::<Result<Vec<_>>>()?;
        migrations.sort();
        log::debug!(
            "found {} migration(s) in {}",
            migrations.len(),
            self.dir.display()
        );
        Ok(migrations)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.find()?.len())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Up,
    Down,
}

pub fn parse_migration(id: &str, content: &str) -> std::result::Result<Migration, String> {
    let mut migration = Migration {
        id: id.to_string(),
        up: Vec::new(),
        down: Vec::new(),
    };
    let mut section = Section::None;
    let mut seen_up = false;
    let mut in_block = false;
    let mut buf = String::new();

    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if let Some(command) = trimmed.strip_prefix(MARKER) {
            let command = command.split_whitespace().next().unwrap_or("");
            match command {
                "Up" | "Down" => {
                    if in_block {
                        return Err(format!(
                            "line {}: section marker inside StatementBegin block",
                            lineno + 1
                        ));
                    }
                    flush(&mut buf, section, &mut migration);
                    section = if command == "Up" {
                        seen_up = true;
                        Section::Up
                    } else {
                        Section::Down
                    };
                }
                "StatementBegin" => {
                    flush(&mut buf, section, &mut migration);
                    in_block = true;
                }
                "StatementEnd" => {
                    if !in_block {
                        return Err(format!("line {}: StatementEnd without StatementBegin", lineno + 1));
                    }
                    in_block = false;
                    flush(&mut buf, section, &mut migration);
                }
                other => return Err(format!("line {}: unknown command '{}'", lineno + 1, other)),
            }
            continue;
        }

        if section == Section::None {
            continue;
        }
        if !in_block && trimmed.starts_with("--") && buf.trim().is_empty() {
            continue;
        }

        buf.push_str(line);
        buf.push('\n');
        if !in_block && trimmed.ends_with(';') {
            flush(&mut buf, section, &mut migration);
        }
    }

    if in_block {
        return Err("StatementBegin block is never closed".to_string());
    }
    if !seen_up {
        return Err("no '-- +migrate Up' section".to_string());
    }
    flush(&mut buf, section, &mut migration);
    Ok(migration)
}

fn flush(buf: &mut String, section: Section, migration: &mut Migration) {
    let statement = buf.trim();
    if !statement.is_empty() {
        match section {
            Section::Up => migration.up.push(statement.to_string()),
            Section::Down => migration.down.push(statement.to_string()),
            Section::None => {}
        }
    }
    buf.clear();
}
