use anyhow::{anyhow, Result};

use crate::cli::{ConfigArgs, RunArgs};
use crate::engine::{Direction, ExecutionReport, ExecutionRequest, StatusRow};
use crate::{namer, orchestrator};

/// `down` reverts one migration unless told otherwise; `up` applies all.
pub fn execution_request(run: RunArgs, direction: Direction) -> ExecutionRequest {
    let default_limit = match direction {
        Direction::Up => 0,
        Direction::Down => 1,
    };
    ExecutionRequest {
        direction,
        dry_run: run.dryrun,
        limit: run.limit.unwrap_or(default_limit),
    }
}

pub fn migrate(config: &ConfigArgs, run: RunArgs, direction: Direction) -> Result<()> {
    let report = orchestrator::apply_migrations(config, execution_request(run, direction))?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ExecutionReport) {
    if report.dry_run {
        for step in &report.steps {
            println!("==> Would apply migration {} ({})", step.id(), step.direction);
            for statement in step.statements() {
                println!("{}", statement);
            }
        }
        return;
    }
    for step in &report.steps {
        println!("Applied {} ({})", step.id(), step.direction);
    }
    println!("Applied {} migration(s)", report.steps.len());
}

pub fn status(config: &ConfigArgs, json: bool) -> Result<()> {
    let rows = orchestrator::migration_status(config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_status(&rows);
    }
    Ok(())
}

fn print_status(rows: &[StatusRow]) {
    let width = rows
        .iter()
        .map(|r| r.id.len())
        .max()
        .unwrap_or(0)
        .max("Migration".len());
    println!("{:<width$}  Applied", "Migration", width = width);
    for row in rows {
        let applied = match (&row.applied_at, row.missing) {
            (Some(at), true) => format!("{} (missing from disk)", at),
            (Some(at), false) => at.clone(),
            (None, _) => "no".to_string(),
        };
        println!("{:<width$}  {}", row.id, applied, width = width);
    }
}

pub fn new_migration(config: &ConfigArgs, name: Option<&str>) -> Result<()> {
    let name = name.ok_or_else(|| anyhow!("A name for the migration is needed"))?;
    let env = orchestrator::active_environment(config)?;
    let path = namer::create_migration(&env, name)?;
    println!("Created migration {}", path.display());
    Ok(())
}
