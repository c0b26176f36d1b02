//! Per-kind table naming and provisioning

use rusqlite::Connection;
use tracing::{debug, info};

const TABLE_PREFIX: &str = "resource_";
const MAX_KIND_LEN: usize = 64;

/// Table name for `kind`, or `None` if `kind` is not a valid identifier.
///
/// Kinds are interpolated into SQL, so only `[a-z0-9_]{1,64}` is accepted.
pub fn table_name(kind: &str) -> Option<String> {
    let valid = !kind.is_empty()
        && kind.len() <= MAX_KIND_LEN
        && kind
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    valid.then(|| format!("{TABLE_PREFIX}{kind}"))
}

/// Kind name for a resource table created by [`create_table`]
pub fn kind_of(table: &str) -> Option<&str> {
    table.strip_prefix(TABLE_PREFIX)
}

pub fn create_table(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    let exists = table_exists(conn, table)?;
    if exists {
        debug!(table = %table, "Resource table already exists");
        return Ok(());
    }

    info!(table = %table, "Creating resource table");
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL,
            collected_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS "idx_{table}_collected_at" ON "{table}"(collected_at);
        "#
    ))
}

pub fn drop_table(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    if table_exists(conn, table)? {
        info!(table = %table, "Dropping resource table");
    }
    conn.execute_batch(&format!(r#"DROP TABLE IF EXISTS "{table}";"#))
}

pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
        [table],
        |row| row.get(0),
    )
}

/// All resource tables, ordered by name
pub fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r"SELECT name FROM sqlite_master
          WHERE type='table' AND name LIKE 'resource\_%' ESCAPE '\'
          ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_valid() {
        assert_eq!(table_name("ec2").as_deref(), Some("resource_ec2"));
        assert_eq!(table_name("elb_v2").as_deref(), Some("resource_elb_v2"));
    }

    #[test]
    fn test_table_name_rejects_unsafe_identifiers() {
        assert!(table_name("").is_none());
        assert!(table_name("EC2").is_none());
        assert!(table_name("ec2\"; DROP TABLE x; --").is_none());
        assert!(table_name("../etc").is_none());
        assert!(table_name(&"a".repeat(65)).is_none());
    }

    #[test]
    fn test_kind_of() {
        assert_eq!(kind_of("resource_rds"), Some("rds"));
        assert_eq!(kind_of("sqlite_sequence"), None);
    }

    #[test]
    fn test_create_and_drop_table() {
        let conn = Connection::open_in_memory().expect("open");
        create_table(&conn, "resource_ec2").expect("create");
        create_table(&conn, "resource_ec2").expect("create again");
        assert_eq!(list_tables(&conn).expect("list"), vec!["resource_ec2"]);

        drop_table(&conn, "resource_ec2").expect("drop");
        drop_table(&conn, "resource_ec2").expect("drop again");
        assert!(list_tables(&conn).expect("list").is_empty());
    }
}
