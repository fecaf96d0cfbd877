use crate::error::Result;
use crate::types::{RecordBatch, Scalar};
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Column of a table this crate writes.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub primary_key: bool,
}

impl ColumnDef {
    pub const fn text(name: &'static str) -> Self {
        Self { name, sql_type: "TEXT", primary_key: false }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self { name, sql_type: "INTEGER", primary_key: false }
    }

    pub const fn key(self) -> Self {
        Self { primary_key: true, ..self }
    }
}

/// Name and column layout of a derived table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    Insert,
    Replace,
}

impl TableSpec {
    pub fn create_sql(&self, if_not_exists: bool) -> String {
        let cols = self
            .columns
            .iter()
            .map(|c| {
                if c.primary_key {
                    format!("{} {} PRIMARY KEY", c.name, c.sql_type)
                } else {
                    format!("{} {}", c.name, c.sql_type)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
        format!("CREATE TABLE {guard}{} ({cols})", self.name)
    }

    pub fn insert_sql(&self, mode: InsertMode) -> String {
        let verb = match mode {
            InsertMode::Insert => "INSERT",
            InsertMode::Replace => "INSERT OR REPLACE",
        };
        let names = self.columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{verb} INTO {} ({names}) VALUES ({placeholders})", self.name)
    }
}

/// Owns the one SQLite connection a job uses; closed when dropped.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!("Opened database {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run `sql` and collect every row, keeping the statement's column names.
    pub fn query_batch(&self, sql: &str) -> Result<RecordBatch> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut batch = RecordBatch::new(columns.clone());

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                values.push(Scalar::from_sql_ref(row.get_ref(i)?, name)?);
            }
            batch.push_row(values)?;
        }
        debug!("Query returned {} rows", batch.len());
        Ok(batch)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn create_table_if_missing(&self, table: &TableSpec) -> Result<()> {
        self.conn.execute_batch(&table.create_sql(true))?;
        Ok(())
    }

    /// Drop `table`, recreate it and fill it with `rows`, all in one transaction.
    pub fn rebuild_table<I>(&mut self, table: &TableSpec, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Vec<Scalar>>,
    {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.name))?;
        tx.execute_batch(&table.create_sql(false))?;
        let written = {
            let mut stmt = tx.prepare(&table.insert_sql(InsertMode::Insert))?;
            let mut written = 0;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
                written += 1;
            }
            written
        };
        tx.commit()?;
        info!("Rebuilt table {} with {} rows", table.name, written);
        Ok(written)
    }

    /// Insert `rows` into an existing table in one transaction.
    pub fn append_rows<I>(&mut self, table: &TableSpec, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Vec<Scalar>>,
    {
        let tx = self.conn.transaction()?;
        let written = {
            let mut stmt = tx.prepare(&table.insert_sql(InsertMode::Insert))?;
            let mut written = 0;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
                written += 1;
            }
            written
        };
        tx.commit()?;
        info!("Appended {} rows to {}", written, table.name);
        Ok(written)
    }

    /// Insert one row outside any transaction, so it is committed immediately.
    pub fn insert_row(&self, table: &TableSpec, mode: InsertMode, row: &[Scalar]) -> Result<()> {
        self.conn
            .execute(&table.insert_sql(mode), params_from_iter(row.iter()))?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}
