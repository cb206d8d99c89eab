use crate::environment::TrackingTable;

/// SQL dialects the engine knows how to talk to. A driver may open a
/// connection for a name that is not listed here; such environments are
/// rejected before any migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Mysql,
    Postgres,
    Sqlite3,
}

impl Dialect {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mysql" => Some(Dialect::Mysql),
            "postgres" => Some(Dialect::Postgres),
            "sqlite3" => Some(Dialect::Sqlite3),
            _ => None,
        }
    }

    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite3 => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    pub fn qualified_table(self, tracking: &TrackingTable) -> String {
        match &tracking.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_ident(schema),
                self.quote_ident(&tracking.table)
            ),
            None => self.quote_ident(&tracking.table),
        }
    }

    /// Bind placeholder for the n-th (1-based) parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Mysql | Dialect::Sqlite3 => "?".to_string(),
        }
    }

    pub fn create_table_sql(self, tracking: &TrackingTable) -> String {
        let timestamp = match self {
            Dialect::Mysql => "DATETIME",
            Dialect::Postgres => "TIMESTAMP WITH TIME ZONE",
            Dialect::Sqlite3 => "DATETIME",
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id VARCHAR(255) NOT NULL PRIMARY KEY, applied_at {} NULL)",
            self.qualified_table(tracking),
            timestamp
        )
    }

    /// `applied_at` comes back as text so every driver reads it the same way.
    pub fn select_applied_sql(self, tracking: &TrackingTable) -> String {
        let text = match self {
            Dialect::Mysql => "CHAR",
            Dialect::Postgres | Dialect::Sqlite3 => "TEXT",
        };
        format!(
            "SELECT id, CAST(applied_at AS {}) FROM {} ORDER BY id",
            text,
            self.qualified_table(tracking)
        )
    }

    pub fn insert_sql(self, tracking: &TrackingTable) -> String {
        format!(
            "INSERT INTO {} (id, applied_at) VALUES ({}, CURRENT_TIMESTAMP)",
            self.qualified_table(tracking),
            self.placeholder(1)
        )
    }

    pub fn delete_sql(self, tracking: &TrackingTable) -> String {
        format!(
            "DELETE FROM {} WHERE id = {}",
            self.qualified_table(tracking),
            self.placeholder(1)
        )
    }
}
