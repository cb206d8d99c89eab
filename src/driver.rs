use mysql::prelude::*;
use mysql::{Conn, Opts, TxOpts};
use rusqlite::params;

use crate::dialect::Dialect;
use crate::engine::{AppliedMigration, Database, Direction, PlannedMigration};
use crate::environment::TrackingTable;
use crate::error::{Error, Result};

/// Driver names with a compiled-in implementation. `mariadb` speaks the MySQL
/// protocol but has no dialect of its own.
pub const DRIVERS: [&str; 4] = ["mysql", "mariadb", "postgres", "sqlite3"];

/// Open a handle for `driver`. This only validates the data source; the
/// server (or database file) is touched on first use.
pub fn open(driver: &str, data_source: &str) -> Result<Box<dyn Database>> {
    match driver {
        "mysql" | "mariadb" => Ok(Box::new(MySqlDatabase::open(data_source)?)),
        "postgres" => Ok(Box::new(PostgresDatabase::open(data_source)?)),
        "sqlite3" => Ok(Box::new(SqliteDatabase::open(data_source)?)),
        other => Err(Error::Connection(format!(
            "unknown driver {:?} (available: {})",
            other,
            DRIVERS.join(", ")
        ))),
    }
}

fn unreachable_db(e: impl std::fmt::Display) -> Error {
    Error::EngineExecution(format!("cannot reach database: {}", e))
}

fn record_sql(dialect: Dialect, tracking: &TrackingTable, direction: Direction) -> String {
    match direction {
        Direction::Up => dialect.insert_sql(tracking),
        Direction::Down => dialect.delete_sql(tracking),
    }
}

pub struct MySqlDatabase {
    opts: Opts,
    conn: Option<Conn>,
}

impl MySqlDatabase {
    pub fn open(data_source: &str) -> Result<Self> {
        let opts = Opts::from_url(data_source).map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self { opts, conn: None })
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        if self.conn.is_none() {
            log::debug!(
                "connecting to mysql at {}:{}",
                self.opts.get_ip_or_hostname(),
                self.opts.get_tcp_port()
            );
            self.conn = Some(Conn::new(self.opts.clone()).map_err(unreachable_db)?);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| Error::EngineExecution("connection unavailable".into()))
    }
}

impl Database for MySqlDatabase {
    fn has_tracking_table(&mut self, tracking: &TrackingTable) -> Result<bool> {
        let schema = tracking.schema.clone();
        let table = tracking.table.clone();
        let count: Option<u64> = self.conn()?.exec_first(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?",
            (schema, table),
        )?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn create_tracking_table(&mut self, tracking: &TrackingTable) -> Result<()> {
        let sql = Dialect::Mysql.create_table_sql(tracking);
        self.conn()?.query_drop(sql)?;
        Ok(())
    }

    fn applied(&mut self, tracking: &TrackingTable) -> Result<Vec<AppliedMigration>> {
        let sql = Dialect::Mysql.select_applied_sql(tracking);
        let rows = self
            .conn()?
            .query_map(sql, |(id, applied_at): (String, Option<String>)| {
                AppliedMigration { id, applied_at }
            })?;
        Ok(rows)
    }

    fn apply(&mut self, tracking: &TrackingTable, step: &PlannedMigration) -> Result<()> {
        let record = record_sql(Dialect::Mysql, tracking, step.direction);
        let id = step.id().to_string();
        let failed = |e: mysql::Error| Error::EngineExecution(format!("{}: {}", id, e));

        let mut tx = self.conn()?.start_transaction(TxOpts::default())?;
        for statement in step.statements() {
            tx.query_drop(statement).map_err(failed)?;
        }
        tx.exec_drop(record, (id.clone(),)).map_err(failed)?;
        tx.commit().map_err(failed)?;
        Ok(())
    }
}

/// Accepts both URL (`postgres://user@host/db`) and key-value
/// (`host=localhost dbname=app`) data sources.
pub struct PostgresDatabase {
    config: postgres::Config,
    client: Option<postgres::Client>,
}

impl PostgresDatabase {
    pub fn open(data_source: &str) -> Result<Self> {
        let config = data_source
            .parse::<postgres::Config>()
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self {
            config,
            client: None,
        })
    }

    fn client(&mut self) -> Result<&mut postgres::Client> {
        if self.client.is_none() {
            log::debug!("connecting to postgres at {:?}", self.config.get_hosts());
            let client = self
                .config
                .connect(postgres::NoTls)
                .map_err(unreachable_db)?;
            self.client = Some(client);
        }
        self.client
            .as_mut()
            .ok_or_else(|| Error::EngineExecution("connection unavailable".into()))
    }
}

impl Database for PostgresDatabase {
    fn has_tracking_table(&mut self, tracking: &TrackingTable) -> Result<bool> {
        let row = self.client()?.query_one(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema::text = COALESCE($1::text, current_schema()::text) \
             AND table_name::text = $2::text",
            &[&tracking.schema, &tracking.table],
        )?;
        let count: i64 = row.get(0);
        Ok(count > 0)
    }

    fn create_tracking_table(&mut self, tracking: &TrackingTable) -> Result<()> {
        let sql = Dialect::Postgres.create_table_sql(tracking);
        self.client()?.batch_execute(&sql)?;
        Ok(())
    }

    fn applied(&mut self, tracking: &TrackingTable) -> Result<Vec<AppliedMigration>> {
        let sql = Dialect::Postgres.select_applied_sql(tracking);
        let rows = self.client()?.query(sql.as_str(), &[])?;
        Ok(rows
            .iter()
            .map(|row| AppliedMigration {
                id: row.get(0),
                applied_at: row.get(1),
            })
            .collect())
    }

    fn apply(&mut self, tracking: &TrackingTable, step: &PlannedMigration) -> Result<()> {
        let record = record_sql(Dialect::Postgres, tracking, step.direction);
        let id = step.id().to_string();
        let failed = |e: postgres::Error| Error::EngineExecution(format!("{}: {}", id, e));

        let mut tx = self.client()?.transaction()?;
        for statement in step.statements() {
            tx.batch_execute(statement).map_err(failed)?;
        }
        tx.execute(record.as_str(), &[&id]).map_err(failed)?;
        tx.commit().map_err(failed)?;
        Ok(())
    }
}

/// The data source is a database file path. A schema on the tracking table
/// names an attached database.
pub struct SqliteDatabase {
    path: String,
    conn: Option<rusqlite::Connection>,
}

impl SqliteDatabase {
    pub fn open(data_source: &str) -> Result<Self> {
        if data_source.trim().is_empty() {
            return Err(Error::Connection("empty sqlite3 database path".into()));
        }
        Ok(Self {
            path: data_source.to_string(),
            conn: None,
        })
    }

    fn conn(&mut self) -> Result<&mut rusqlite::Connection> {
        if self.conn.is_none() {
            log::debug!("opening sqlite3 database {}", self.path);
            self.conn = Some(rusqlite::Connection::open(&self.path).map_err(unreachable_db)?);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| Error::EngineExecution("connection unavailable".into()))
    }
}

impl Database for SqliteDatabase {
    fn has_tracking_table(&mut self, tracking: &TrackingTable) -> Result<bool> {
        let master = match &tracking.schema {
            Some(schema) => format!("{}.sqlite_master", Dialect::Sqlite3.quote_ident(schema)),
            None => "sqlite_master".to_string(),
        };
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE type = 'table' AND name = ?",
            master
        );
        let count: i64 = self
            .conn()?
            .query_row(&sql, params![tracking.table], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn create_tracking_table(&mut self, tracking: &TrackingTable) -> Result<()> {
        let sql = Dialect::Sqlite3.create_table_sql(tracking);
        self.conn()?.execute_batch(&sql)?;
        Ok(())
    }

    fn applied(&mut self, tracking: &TrackingTable) -> Result<Vec<AppliedMigration>> {
        let sql = Dialect::Sqlite3.select_applied_sql(tracking);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(AppliedMigration {
                id: row.get(0)?,
                applied_at: row.get(1)?,
            })
        })?;
        let applied = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(applied)
    }

    fn apply(&mut self, tracking: &TrackingTable, step: &PlannedMigration) -> Result<()> {
        let record = record_sql(Dialect::Sqlite3, tracking, step.direction);
        let id = step.id().to_string();
        let failed = |e: rusqlite::Error| Error::EngineExecution(format!("{}: {}", id, e));

        let tx = self.conn()?.transaction()?;
        for statement in step.statements() {
            tx.execute_batch(statement).map_err(failed)?;
        }
        tx.execute(&record, params![id]).map_err(failed)?;
        tx.commit().map_err(failed)?;
        Ok(())
    }
}
