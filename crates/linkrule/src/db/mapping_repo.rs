//! Mapping repository: per-rule source → target records.

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{now, Database, DatabaseError};

/// A raw mapping row from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRow {
    pub id: i64,
    pub rule_id: i64,
    pub source_name: String,
    pub target_name: String,
    pub processed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl MappingRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            rule_id: row.get("rule_id")?,
            source_name: row.get("source_name")?,
            target_name: row.get("target_name")?,
            processed: row.get("processed")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// A mapping joined with the directories of its owning rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWithRule {
    pub mapping: MappingRow,
    pub source_dir: String,
    pub target_dir: String,
}

impl MappingWithRule {
    pub fn source_path(&self) -> String {
        format!("{}{}", self.source_dir, self.mapping.source_name)
    }

    pub fn target_path(&self) -> String {
        format!("{}{}", self.target_dir, self.mapping.target_name)
    }
}

/// Finds the mapping of `source_name` under a rule.
pub fn find(
    db: &Database,
    rule_id: i64,
    source_name: &str,
) -> Result<Option<MappingRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM mappings WHERE rule_id = ?1 AND source_name = ?2",
                params![rule_id, source_name],
                MappingRow::from_row,
            )
            .optional()?)
    })
}

/// Finds a mapping only if it still records exactly `target_name`.
pub fn find_exact(
    db: &Database,
    rule_id: i64,
    source_name: &str,
    target_name: &str,
) -> Result<Option<MappingRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM mappings WHERE rule_id = ?1 AND source_name = ?2 AND target_name = ?3",
                params![rule_id, source_name, target_name],
                MappingRow::from_row,
            )
            .optional()?)
    })
}

/// Creates an unprocessed mapping.
pub fn insert(
    db: &Database,
    rule_id: i64,
    source_name: &str,
    target_name: &str,
) -> Result<MappingRow, DatabaseError> {
    db.with_conn(|conn| {
        let timestamp = now();
        conn.execute(
            "INSERT INTO mappings (rule_id, source_name, target_name, processed, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![rule_id, source_name, target_name, timestamp],
        )
        .map_err(|e| DatabaseError::from_write(e, &format!("mapping for {}", source_name)))?;
        Ok(MappingRow {
            id: conn.last_insert_rowid(),
            rule_id,
            source_name: source_name.to_string(),
            target_name: target_name.to_string(),
            processed: false,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        })
    })
}

/// Update-or-create by `(rule_id, source_name)`. A changed `target_name`
/// resets `processed`; an unchanged one keeps it.
pub fn upsert(
    db: &Database,
    rule_id: i64,
    source_name: &str,
    target_name: &str,
) -> Result<MappingRow, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO mappings (rule_id, source_name, target_name, processed, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)
             ON CONFLICT(rule_id, source_name) DO UPDATE SET
               processed = CASE WHEN target_name = excluded.target_name THEN processed ELSE 0 END,
               target_name = excluded.target_name,
               updated_at = excluded.updated_at",
            params![rule_id, source_name, target_name, now()],
        )?;
        Ok(())
    })?;
    find(db, rule_id, source_name)?
        .ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
}

/// Records a new target name and marks the mapping unprocessed.
pub fn update_target(db: &Database, id: i64, target_name: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE mappings SET target_name = ?2, processed = 0, updated_at = ?3 WHERE id = ?1",
            params![id, target_name, now()],
        )?;
        Ok(())
    })
}

pub fn set_processed(db: &Database, id: i64, processed: bool) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE mappings SET processed = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, processed, now()],
        )?;
        Ok(())
    })
}

/// Every mapping of a rule, ordered by source name.
pub fn list_for_rule(db: &Database, rule_id: i64) -> Result<Vec<MappingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM mappings WHERE rule_id = ?1 ORDER BY source_name")?;
        let rows = stmt
            .query_map(params![rule_id], MappingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Mappings of a rule whose source name is not in `current`.
///
/// The live names are staged in a temporary table so the difference is
/// computed by SQLite rather than by loading every mapping.
pub fn find_stale(
    db: &Database,
    rule_id: i64,
    current: &HashSet<String>,
) -> Result<Vec<MappingRow>, DatabaseError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS current_sources (source_name TEXT PRIMARY KEY);
             DELETE FROM current_sources;",
        )?;
        {
            let mut insert = tx.prepare("INSERT OR IGNORE INTO current_sources VALUES (?1)")?;
            for name in current {
                insert.execute(params![name])?;
            }
        }
        let rows = {
            let mut stmt = tx.prepare(
                "SELECT * FROM mappings WHERE rule_id = ?1
                 AND source_name NOT IN (SELECT source_name FROM current_sources)
                 ORDER BY source_name",
            )?;
            let rows = stmt
                .query_map(params![rule_id], MappingRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        tx.execute_batch("DELETE FROM current_sources;")?;
        tx.commit()?;
        Ok(rows)
    })
}

pub fn delete(db: &Database, id: i64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("DELETE FROM mappings WHERE id = ?1", params![id])?;
        Ok(())
    })
}

pub fn delete_for_rule(db: &Database, rule_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM mappings WHERE rule_id = ?1", params![rule_id])?;
        Ok(changed as u64)
    })
}

pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM mappings", [], |r| r.get(0))?;
        Ok(total)
    })
}

/// Up to `limit` mappings with an id greater than `after_id`, joined with
/// their rule. Keyset pagination keeps pages stable while rows change.
pub fn page_after(
    db: &Database,
    after_id: i64,
    limit: usize,
) -> Result<Vec<MappingWithRule>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT m.*, r.source_dir, r.target_dir
             FROM mappings m JOIN rules r ON r.id = m.rule_id
             WHERE m.id > ?1 ORDER BY m.id LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after_id, limit as i64], |row| {
                Ok(MappingWithRule {
                    mapping: MappingRow::from_row(row)?,
                    source_dir: row.get("source_dir")?,
                    target_dir: row.get("target_dir")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::rule_repo::{self, NewRule};

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let rule = rule_repo::insert(
            &db,
            &NewRule {
                source_dir: "/src/".to_string(),
                target_dir: "/dst/".to_string(),
                include_pattern: r"/^(.+)\.txt$/".to_string(),
                exclude_pattern: None,
                target_template: "$1.bak".to_string(),
                link_mode: "hardlink".to_string(),
            },
        )
        .unwrap();
        (db, rule.id)
    }

    #[test]
    fn test_insert_and_find() {
        let (db, rule_id) = setup();
        let created = insert(&db, rule_id, "a.txt", "a.bak").unwrap();

        let found = find(&db, rule_id, "a.txt").unwrap().unwrap();
        assert_eq!(found, created);
        assert!(!found.processed);
        assert!(find(&db, rule_id, "b.txt").unwrap().is_none());
    }

    #[test]
    fn test_unique_source_per_rule() {
        let (db, rule_id) = setup();
        insert(&db, rule_id, "a.txt", "a.bak").unwrap();
        let err = insert(&db, rule_id, "a.txt", "other").unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
    }

    #[test]
    fn test_find_exact() {
        let (db, rule_id) = setup();
        insert(&db, rule_id, "a.txt", "a.bak").unwrap();

        assert!(find_exact(&db, rule_id, "a.txt", "a.bak").unwrap().is_some());
        assert!(find_exact(&db, rule_id, "a.txt", "a.old").unwrap().is_none());
    }

    #[test]
    fn test_upsert_keeps_processed_for_same_target() {
        let (db, rule_id) = setup();
        let created = upsert(&db, rule_id, "a.txt", "a.bak").unwrap();
        set_processed(&db, created.id, true).unwrap();

        let again = upsert(&db, rule_id, "a.txt", "a.bak").unwrap();
        assert_eq!(again.id, created.id);
        assert!(again.processed);

        let renamed = upsert(&db, rule_id, "a.txt", "a.old").unwrap();
        assert_eq!(renamed.target_name, "a.old");
        assert!(!renamed.processed);
    }

    #[test]
    fn test_update_target_resets_processed() {
        let (db, rule_id) = setup();
        let mapping = insert(&db, rule_id, "a.txt", "a.bak").unwrap();
        set_processed(&db, mapping.id, true).unwrap();

        update_target(&db, mapping.id, "a.old").unwrap();

        let found = find(&db, rule_id, "a.txt").unwrap().unwrap();
        assert_eq!(found.target_name, "a.old");
        assert!(!found.processed);
    }

    #[test]
    fn test_find_stale() {
        let (db, rule_id) = setup();
        insert(&db, rule_id, "a.txt", "a.bak").unwrap();
        insert(&db, rule_id, "b.txt", "b.bak").unwrap();
        insert(&db, rule_id, "c.txt", "c.bak").unwrap();

        let current: HashSet<String> = ["a.txt".to_string()].into_iter().collect();
        let stale = find_stale(&db, rule_id, &current).unwrap();
        let names: Vec<_> = stale.iter().map(|m| m.source_name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "c.txt"]);

        // The staging table does not leak into the next call.
        let all: HashSet<String> = ["a.txt", "b.txt", "c.txt"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(find_stale(&db, rule_id, &all).unwrap().is_empty());
        assert_eq!(find_stale(&db, rule_id, &HashSet::new()).unwrap().len(), 3);
    }

    #[test]
    fn test_delete_and_count() {
        let (db, rule_id) = setup();
        let a = insert(&db, rule_id, "a.txt", "a.bak").unwrap();
        insert(&db, rule_id, "b.txt", "b.bak").unwrap();
        assert_eq!(count(&db).unwrap(), 2);

        delete(&db, a.id).unwrap();
        assert_eq!(count(&db).unwrap(), 1);

        assert_eq!(delete_for_rule(&db, rule_id).unwrap(), 1);
        assert!(list_for_rule(&db, rule_id).unwrap().is_empty());
    }

    #[test]
    fn test_page_after() {
        let (db, rule_id) = setup();
        for i in 0..5 {
            insert(&db, rule_id, &format!("f{}.txt", i), &format!("f{}.bak", i)).unwrap();
        }

        let first = page_after(&db, 0, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].target_path(), "/dst/f0.bak");
        assert_eq!(first[0].source_path(), "/src/f0.txt");

        let last_id = first[1].mapping.id;
        let second = page_after(&db, last_id, 10).unwrap();
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|m| m.mapping.id > last_id));
    }
}
