use rusqlite::{Connection, OptionalExtension};

/// Row-level primitives the cascade validator is built on.
///
/// Table and column names are interpolated into SQL, so callers only pass
/// identifiers that went through `entities::validate_rule` or come from
/// the static entity tables.
pub trait RecordStore {
    fn find_one(&self, table: &str, id: i64) -> rusqlite::Result<bool>;
    fn count(&self, table: &str, column: &str, id: i64) -> rusqlite::Result<i64>;
    fn delete_where(&self, table: &str, column: &str, id: i64) -> rusqlite::Result<usize>;
    fn delete_by_id(&self, table: &str, id: i64) -> rusqlite::Result<usize>;
}

// `Transaction` derefs to `Connection`, so `&*tx` runs these inside the open transaction.
impl RecordStore for Connection {
    fn find_one(&self, table: &str, id: i64) -> rusqlite::Result<bool> {
        let sql = format!("SELECT 1 FROM \"{}\" WHERE id = ?", table);
        let found: Option<i64> = self.query_row(&sql, [id], |r| r.get(0)).optional()?;
        Ok(found.is_some())
    }

    fn count(&self, table: &str, column: &str, id: i64) -> rusqlite::Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\" WHERE \"{}\" = ?", table, column);
        self.query_row(&sql, [id], |r| r.get(0))
    }

    fn delete_where(&self, table: &str, column: &str, id: i64) -> rusqlite::Result<usize> {
        let sql = format!("DELETE FROM \"{}\" WHERE \"{}\" = ?", table, column);
        self.execute(&sql, [id])
    }

    fn delete_by_id(&self, table: &str, id: i64) -> rusqlite::Result<usize> {
        let sql = format!("DELETE FROM \"{}\" WHERE id = ?", table);
        self.execute(&sql, [id])
    }
}
