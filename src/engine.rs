use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::environment::TrackingTable;
use crate::error::{Error, Result};
use crate::source::{FileMigrationSource, Migration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub direction: Direction,
    pub dry_run: bool,
    /// 0 means no limit.
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub id: String,
    pub applied_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    pub migration: Migration,
    pub direction: Direction,
}

impl PlannedMigration {
    pub fn id(&self) -> &str {
        &self.migration.id
    }

    pub fn statements(&self) -> &[String] {
        match self.direction {
            Direction::Up => &self.migration.up,
            Direction::Down => &self.migration.down,
        }
    }
}

#[derive(Debug)]
pub struct ExecutionReport {
    pub dry_run: bool,
    pub steps: Vec<PlannedMigration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub id: String,
    pub applied_at: Option<String>,
    /// Recorded in the database but no longer present on disk.
    pub missing: bool,
}

/// Connection to a database holding the tracking table.
pub trait Database {
    fn has_tracking_table(&mut self, tracking: &TrackingTable) -> Result<bool>;
    fn create_tracking_table(&mut self, tracking: &TrackingTable) -> Result<()>;
    fn applied(&mut self, tracking: &TrackingTable) -> Result<Vec<AppliedMigration>>;
    /// Run the step's statements and update the tracking table atomically.
    fn apply(&mut self, tracking: &TrackingTable, step: &PlannedMigration) -> Result<()>;
}

/// Work out which migrations a request touches, in execution order.
pub fn plan(
    migrations: &[Migration],
    applied: &[AppliedMigration],
    request: &ExecutionRequest,
) -> Result<Vec<PlannedMigration>> {
    let known: HashSet<&str> = migrations.iter().map(|m| m.id.as_str()).collect();
    if let Some(unknown) = applied.iter().find(|a| !known.contains(a.id.as_str())) {
        return Err(Error::UnknownMigration(unknown.id.clone()));
    }
    let done: HashSet<&str> = applied.iter().map(|a| a.id.as_str()).collect();

    let candidates: Vec<&Migration> = match request.direction {
        Direction::Up => migrations
            .iter()
            .filter(|m| !done.contains(m.id.as_str()))
            .collect(),
        Direction::Down => migrations
            .iter()
            .rev()
            .filter(|m| done.contains(m.id.as_str()))
            .collect(),
    };

    let take = if request.limit == 0 {
        candidates.len()
    } else {
        request.limit
    };
    Ok(candidates
        .into_iter()
        .take(take)
        .map(|m| PlannedMigration {
            migration: m.clone(),
            direction: request.direction,
        })
        .collect())
}

pub fn execute(
    db: &mut dyn Database,
    source: &FileMigrationSource,
    tracking: &TrackingTable,
    request: &ExecutionRequest,
) -> Result<ExecutionReport> {
    let migrations = source.find()?;
    let has_table = db.has_tracking_table(tracking)?;
    let applied = if has_table {
        db.applied(tracking)?
    } else {
        Vec::new()
    };
    let steps = plan(&migrations, &applied, request)?;
    log::debug!(
        "{} migration(s) planned {} (limit {}, dry run {})",
        steps.len(),
        request.direction,
        request.limit,
        request.dry_run
    );

    if request.dry_run {
        return Ok(ExecutionReport {
            dry_run: true,
            steps,
        });
    }

    if !has_table {
        log::info!("creating tracking table {}", tracking.table);
        db.create_tracking_table(tracking)?;
    }
    for step in &steps {
        log::info!("applying {} ({})", step.id(), step.direction);
        db.apply(tracking, step)?;
    }
    Ok(ExecutionReport {
        dry_run: false,
        steps,
    })
}

pub fn status(
    db: &mut dyn Database,
    source: &FileMigrationSource,
    tracking: &TrackingTable,
) -> Result<Vec<StatusRow>> {
    let migrations = source.find()?;
    let applied = if db.has_tracking_table(tracking)? {
        db.applied(tracking)?
    } else {
        Vec::new()
    };

    let mut recorded: HashMap<&str, &AppliedMigration> =
        applied.iter().map(|a| (a.id.as_str(), a)).collect();
    let mut rows: Vec<StatusRow> = migrations
        .iter()
        .map(|m| StatusRow {
            id: m.id.clone(),
            applied_at: recorded
                .remove(m.id.as_str())
                .map(|a| a.applied_at.clone().unwrap_or_default()),
            missing: false,
        })
        .collect();
    let mut orphans: Vec<StatusRow> = recorded
        .into_values()
        .map(|a| StatusRow {
            id: a.id.clone(),
            applied_at: Some(a.applied_at.clone().unwrap_or_default()),
            missing: true,
        })
        .collect();
    orphans.sort_by(|a, b| a.id.cmp(&b.id));
    rows.extend(orphans);
    Ok(rows)
}
