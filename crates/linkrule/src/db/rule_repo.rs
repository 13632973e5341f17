//! Rule repository: CRUD operations for the `rules` table.

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{now, Database, DatabaseError};

/// A raw rule row from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRow {
    pub id: i64,
    pub source_dir: String,
    pub target_dir: String,
    pub include_pattern: String,
    pub exclude_pattern: Option<String>,
    pub target_template: String,
    pub link_mode: String,
    pub created_at: String,
    pub updated_at: String,
}

impl RuleRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source_dir: row.get("source_dir")?,
            target_dir: row.get("target_dir")?,
            include_pattern: row.get("include_pattern")?,
            exclude_pattern: row.get("exclude_pattern")?,
            target_template: row.get("target_template")?,
            link_mode: row.get("link_mode")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields needed to create a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRule {
    pub source_dir: String,
    pub target_dir: String,
    pub include_pattern: String,
    pub exclude_pattern: Option<String>,
    pub target_template: String,
    pub link_mode: String,
}

/// A rule with its mapping counts, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    #[serde(flatten)]
    pub rule: RuleRow,
    pub mapping_count: u64,
    pub processed_count: u64,
}

/// Inserts a new rule and returns the stored row.
pub fn insert(db: &Database, rule: &NewRule) -> Result<RuleRow, DatabaseError> {
    let id = db.with_conn(|conn| {
        let timestamp = now();
        conn.execute(
            "INSERT INTO rules (source_dir, target_dir, include_pattern, exclude_pattern,
             target_template, link_mode, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                rule.source_dir,
                rule.target_dir,
                rule.include_pattern,
                rule.exclude_pattern,
                rule.target_template,
                rule.link_mode,
                timestamp,
            ],
        )
        .map_err(|e| {
            DatabaseError::from_write(
                e,
                &format!("rule for {} -> {}", rule.source_dir, rule.target_dir),
            )
        })?;
        Ok(conn.last_insert_rowid())
    })?;

    find_by_id(db, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
}

/// Overwrites every mutable field of a rule and bumps `updated_at`.
pub fn update(db: &Database, rule: &RuleRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE rules SET source_dir=?2, target_dir=?3, include_pattern=?4,
             exclude_pattern=?5, target_template=?6, link_mode=?7, updated_at=?8
             WHERE id=?1",
            params![
                rule.id,
                rule.source_dir,
                rule.target_dir,
                rule.include_pattern,
                rule.exclude_pattern,
                rule.target_template,
                rule.link_mode,
                now(),
            ],
        )
        .map_err(|e| {
            DatabaseError::from_write(
                e,
                &format!("rule for {} -> {}", rule.source_dir, rule.target_dir),
            )
        })?;
        Ok(())
    })
}

/// Finds a rule by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<RuleRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM rules WHERE id = ?1",
                params![id],
                RuleRow::from_row,
            )
            .optional()?)
    })
}

/// Finds a rule by its natural key.
pub fn find_by_dirs(
    db: &Database,
    source_dir: &str,
    target_dir: &str,
) -> Result<Option<RuleRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM rules WHERE source_dir = ?1 AND target_dir = ?2",
                params![source_dir, target_dir],
                RuleRow::from_row,
            )
            .optional()?)
    })
}

/// All rules, oldest first.
pub fn list(db: &Database) -> Result<Vec<RuleRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM rules ORDER BY id")?;
        let rows = stmt
            .query_map([], RuleRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// All rules with their mapping counts.
pub fn list_with_counts(db: &Database) -> Result<Vec<RuleSummary>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT r.*, COUNT(m.id) AS mapping_count,
             COALESCE(SUM(m.processed), 0) AS processed_count
             FROM rules r LEFT JOIN mappings m ON m.rule_id = r.id
             GROUP BY r.id ORDER BY r.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RuleSummary {
                    rule: RuleRow::from_row(row)?,
                    mapping_count: row.get("mapping_count")?,
                    processed_count: row.get("processed_count")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a rule; its mappings go with it (`ON DELETE CASCADE`).
pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM rules WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_rule(source: &str, target: &str) -> NewRule {
        NewRule {
            source_dir: source.to_string(),
            target_dir: target.to_string(),
            include_pattern: r"/^(.+)\.txt$/".to_string(),
            exclude_pattern: None,
            target_template: "$1.bak".to_string(),
            link_mode: "hardlink".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let rule = insert(&db, &sample_rule("/src/", "/dst/")).unwrap();

        let found = find_by_id(&db, rule.id).unwrap().unwrap();
        assert_eq!(found, rule);
        assert_eq!(found.link_mode, "hardlink");
        assert_eq!(found.target_template, "$1.bak");
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, 42).unwrap().is_none());
        assert!(find_by_dirs(&db, "/a/", "/b/").unwrap().is_none());
    }

    #[test]
    fn test_find_by_dirs() {
        let db = test_db();
        insert(&db, &sample_rule("/src/", "/dst/")).unwrap();
        let other = insert(&db, &sample_rule("/src/", "/other/")).unwrap();

        let found = find_by_dirs(&db, "/src/", "/other/").unwrap().unwrap();
        assert_eq!(found.id, other.id);
    }

    #[test]
    fn test_duplicate_natural_key() {
        let db = test_db();
        insert(&db, &sample_rule("/src/", "/dst/")).unwrap();
        let err = insert(&db, &sample_rule("/src/", "/dst/")).unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
    }

    #[test]
    fn test_update() {
        let db = test_db();
        let mut rule = insert(&db, &sample_rule("/src/", "/dst/")).unwrap();

        rule.target_template = "$1.old".to_string();
        rule.exclude_pattern = Some("/skip/".to_string());
        rule.link_mode = "symlink".to_string();
        update(&db, &rule).unwrap();

        let found = find_by_id(&db, rule.id).unwrap().unwrap();
        assert_eq!(found.target_template, "$1.old");
        assert_eq!(found.exclude_pattern.as_deref(), Some("/skip/"));
        assert_eq!(found.link_mode, "symlink");
    }

    #[test]
    fn test_list_with_counts() {
        let db = test_db();
        let rule = insert(&db, &sample_rule("/src/", "/dst/")).unwrap();
        insert(&db, &sample_rule("/src2/", "/dst2/")).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mappings (rule_id, source_name, target_name, processed, created_at, updated_at)
                 VALUES (?1, 'a.txt', 'a.bak', 1, 'now', 'now'), (?1, 'b.txt', 'b.bak', 0, 'now', 'now')",
                params![rule.id],
            )?;
            Ok(())
        })
        .unwrap();

        let summaries = list_with_counts(&db).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].mapping_count, 2);
        assert_eq!(summaries[0].processed_count, 1);
        assert_eq!(summaries[1].mapping_count, 0);
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        let rule = insert(&db, &sample_rule("/src/", "/dst/")).unwrap();

        assert!(delete(&db, rule.id).unwrap());
        assert!(!delete(&db, rule.id).unwrap());
        assert!(list(&db).unwrap().is_empty());
    }
}
