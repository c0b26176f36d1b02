//! `Storage` implementation for SQLite

use rusqlite::params;
use tracing::debug;

use crate::error::StorageError;

use super::database::SqliteStorage;
use super::models::{Record, ResourceRow, Summary, SummaryMap};
use super::port::Storage;
use super::schema::{create_table, drop_table, kind_of, list_tables, table_exists, table_name};

impl Storage for SqliteStorage {
    fn create(&self, record: &Record) -> Result<(), StorageError> {
        let table = table_name(&record.kind).ok_or_else(|| {
            StorageError::Persistence(format!("invalid resource kind '{}'", record.kind))
        })?;
        let data = serde_json::to_string(&record.fields).map_err(StorageError::persistence)?;
        let collected_at = chrono::Utc::now().to_rfc3339();

        let conn = self.conn()?;
        conn.execute(
            &format!(r#"INSERT INTO "{table}" (data, collected_at) VALUES (?1, ?2)"#),
            params![data, collected_at],
        )
        .map_err(StorageError::persistence)?;

        debug!(kind = %record.kind, "Record stored");
        Ok(())
    }

    fn ensure_schema(&self, kind: &str) -> Result<(), StorageError> {
        let table = table_name(kind)
            .ok_or_else(|| StorageError::schema(kind, "kind must match [a-z0-9_]{1,64}"))?;
        let conn = self.conn()?;
        create_table(&conn, &table).map_err(|e| StorageError::schema(kind, e))
    }

    fn drop_schema(&self, kind: &str) -> Result<(), StorageError> {
        // An invalid kind can never have a table
        let Some(table) = table_name(kind) else {
            return Ok(());
        };
        let conn = self.conn()?;
        drop_table(&conn, &table).map_err(|e| StorageError::schema(kind, e))
    }

    fn get_summary(&self) -> Result<SummaryMap, StorageError> {
        let conn = self.conn()?;
        let tables = list_tables(&conn).map_err(StorageError::persistence)?;

        let mut summary = SummaryMap::new();
        for table in tables {
            let Some(kind) = kind_of(&table) else {
                continue;
            };
            let entry = conn
                .query_row(
                    &format!(
                        r#"SELECT COUNT(*), TOTAL(json_extract(data, '$.price_per_month')), MAX(collected_at)
                           FROM "{table}""#
                    ),
                    [],
                    |row| {
                        Ok(Summary {
                            resource_count: row.get(0)?,
                            total_spent: row.get(1)?,
                            last_collected_at: row.get(2)?,
                        })
                    },
                )
                .map_err(StorageError::persistence)?;
            summary.insert(kind.to_string(), entry);
        }

        debug!(kinds = summary.len(), "Summary computed");
        Ok(summary)
    }

    fn get_resource_rows(&self, kind: &str) -> Result<Vec<ResourceRow>, StorageError> {
        let Some(table) = table_name(kind) else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        if !table_exists(&conn, &table).map_err(StorageError::persistence)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn
            .prepare(&format!(r#"SELECT data FROM "{table}" ORDER BY id"#))
            .map_err(StorageError::persistence)?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StorageError::persistence)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::persistence)?;

        raw.iter()
            .map(|data| serde_json::from_str::<ResourceRow>(data).map_err(StorageError::persistence))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(kind: &str, fields: serde_json::Value) -> Record {
        Record::new(kind, fields.as_object().cloned().unwrap_or_default())
    }

    fn storage() -> SqliteStorage {
        SqliteStorage::open(":memory:").expect("Failed to open database")
    }

    #[test]
    fn test_rows_for_unknown_kind_are_empty() {
        let storage = storage();
        assert!(storage.get_resource_rows("ec2").expect("rows").is_empty());
        assert!(storage.get_resource_rows("NOT VALID").expect("rows").is_empty());
    }

    #[test]
    fn test_summary_empty_dataset() {
        let storage = storage();
        assert!(storage.get_summary().expect("summary").is_empty());
    }

    #[test]
    fn test_create_and_read_rows_in_insertion_order() {
        let storage = storage();
        storage.ensure_schema("ec2").expect("ensure");
        storage
            .create(&record("ec2", json!({"instance_id": "i-1", "price_per_month": 10})))
            .expect("create");
        storage
            .create(&record("ec2", json!({"instance_id": "i-2", "price_per_month": 2.5})))
            .expect("create");

        let rows = storage.get_resource_rows("ec2").expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["instance_id"], "i-1");
        assert_eq!(rows[1]["instance_id"], "i-2");
    }

    #[test]
    fn test_summary_aggregates_per_kind() {
        let storage = storage();
        storage.ensure_schema("ec2").expect("ensure");
        storage.ensure_schema("rds").expect("ensure");
        storage
            .create(&record("ec2", json!({"price_per_month": 10})))
            .expect("create");
        storage
            .create(&record("ec2", json!({"price_per_month": 2.5})))
            .expect("create");
        storage
            .create(&record("ec2", json!({"name": "no price"})))
            .expect("create");

        let summary = storage.get_summary().expect("summary");
        assert_eq!(summary.len(), 2);

        let ec2 = &summary["ec2"];
        assert_eq!(ec2.resource_count, 3);
        assert!((ec2.total_spent - 12.5).abs() < f64::EPSILON);
        assert!(ec2.last_collected_at.is_some());

        let rds = &summary["rds"];
        assert_eq!(rds.resource_count, 0);
        assert_eq!(rds.total_spent, 0.0);
        assert!(rds.last_collected_at.is_none());
    }

    #[test]
    fn test_ensure_schema_twice_keeps_data() {
        let storage = storage();
        storage.ensure_schema("ec2").expect("ensure");
        storage.create(&record("ec2", json!({"id": 1}))).expect("create");
        storage.ensure_schema("ec2").expect("ensure again");

        assert_eq!(storage.get_resource_rows("ec2").expect("rows").len(), 1);
    }

    #[test]
    fn test_drop_schema_is_idempotent() {
        let storage = storage();
        storage.drop_schema("ec2").expect("drop absent");
        storage.drop_schema("Not Valid").expect("drop invalid");

        storage.ensure_schema("ec2").expect("ensure");
        storage.drop_schema("ec2").expect("drop");
        assert!(storage.get_summary().expect("summary").is_empty());
    }

    #[test]
    fn test_create_without_schema_fails() {
        let storage = storage();
        let err = storage
            .create(&record("ec2", json!({"id": 1})))
            .expect_err("missing table");
        assert!(matches!(err, StorageError::Persistence(_)));
    }

    #[test]
    fn test_invalid_kind_errors() {
        let storage = storage();
        assert!(matches!(
            storage.ensure_schema("bad-kind"),
            Err(StorageError::Schema { .. })
        ));
        assert!(matches!(
            storage.create(&record("bad-kind", json!({}))),
            Err(StorageError::Persistence(_))
        ));
    }
}
