//! The audit-log table: one row per completed `audit_node` task,
//! retained for 6 hours and then pruned in batches. Backed by `redb`,
//! synchronous like the Block Store and the Node Registry's own tables.

use chronicle_types::{AuditLogRow, RegistryError};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;

/// `auditedAtMs(8 bytes be) ++ tntAddr -> row`, so pruning-by-age and
/// "most recent row" both work as ordered scans rather than full-table ones.
const LOG: TableDefinition<&[u8], &str> = TableDefinition::new("AUDIT_LOG");
/// `tntAddr -> auditedAtMs(8 bytes be) ++ tntAddr`, the secondary index
/// that makes "last row for this Node" an O(1) lookup into LOG.
const LAST_BY_NODE: TableDefinition<&str, &[u8]> = TableDefinition::new("AUDIT_LOG_LAST");

fn backend(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Internal(e.to_string())
}

fn log_key(audited_at_ms: i64, tnt_addr: &str) -> Vec<u8> {
    let mut key = (audited_at_ms as u64).to_be_bytes().to_vec();
    key.extend_from_slice(tnt_addr.as_bytes());
    key
}

/// A handle to the persisted audit log.
pub struct AuditLogStore {
    db: Database,
}

impl AuditLogStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        let w = db.begin_write().map_err(backend)?;
        {
            w.open_table(LOG).map_err(backend)?;
            w.open_table(LAST_BY_NODE).map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        Ok(Self { db })
    }

    /// Appends one audit result row and updates the per-Node "last row"
    /// index.
    pub fn insert(&self, row: &AuditLogRow) -> Result<(), RegistryError> {
        let key = log_key(row.audited_at_ms, &row.tnt_addr);
        let value = serde_json::to_string(row)
        .map_err(|e| RegistryError::Internal(format!("encode audit row: {e}")))?;
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut log = w.open_table(LOG).map_err(backend)?;
            log.insert(key.as_slice(), value.as_str()).map_err(backend)?;
            let mut last = w.open_table(LAST_BY_NODE).map_err(backend)?;
            last.insert(row.tnt_addr.as_str(), key.as_slice())
            .map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        Ok(())
    }

    /// The most recent row recorded for `tnt_addr`, if any.
    pub fn last_for(&self, tnt_addr: &str) -> Result<Option<AuditLogRow>, RegistryError> {
        let r = self.db.begin_read().map_err(backend)?;
        let last = r.open_table(LAST_BY_NODE).map_err(backend)?;
        let key = match last.get(tnt_addr).map_err(backend)? {
            Some(v) => v.value().to_vec(),
            None => return Ok(None),
        };
        drop(last);
        let log = r.open_table(LOG).map_err(backend)?;
        match log.get(key.as_slice()).map_err(backend)? {
            Some(v) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }

    /// Deletes up to `batch_size` rows audited before `older_than_ms`,
    /// returning the number actually removed.
    pub fn prune_older_than(
        &self,
        older_than_ms: i64,
        batch_size: u32,
    ) -> Result<u32, RegistryError> {
        let lower_bound: Vec<u8> = Vec::new();
        let cutoff = log_key(older_than_ms, "");
        let w = self.db.begin_write().map_err(backend)?;
        let mut deleted = 0u32;
        {
            let mut log = w.open_table(LOG).map_err(backend)?;
            let keys: Vec<Vec<u8>> = log
            .range(lower_bound.as_slice()..cutoff.as_slice())
            .map_err(backend)?
            .take(batch_size as usize)
            .filter_map(|entry| entry.ok().map(|(k, _)| k.value().to_vec()))
            .collect();
            for key in &keys {
                log.remove(key.as_slice()).map_err(backend)?;
                deleted += 1;
            }
        }
        w.commit().map_err(backend)?;
        Ok(deleted)
    }
}

fn decode(s: &str) -> Result<AuditLogRow, RegistryError> {
    serde_json::from_str(s).map_err(|e| RegistryError::Internal(format!("decode audit row: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(addr: &str, audited_at_ms: i64, passed: bool) -> AuditLogRow {
        AuditLogRow {
            tnt_addr: addr.to_string(),
            audited_at_ms,
            passed,
            failed_predicates: if passed { vec![] } else { vec!["solution".into()] },
        }
    }

    #[test]
    fn insert_then_last_for_round_trips() {
        let dir = tempdir().unwrap();
        let store = AuditLogStore::open(dir.path().join("audit_log.redb")).unwrap();
        store.insert(&row("a", 100, true)).unwrap();
        store.insert(&row("a", 200, false)).unwrap();
        let last = store.last_for("a").unwrap().unwrap();
        assert_eq!(last.audited_at_ms, 200);
        assert!(!last.passed);
    }

    #[test]
    fn last_for_unknown_node_is_none() {
        let dir = tempdir().unwrap();
        let store = AuditLogStore::open(dir.path().join("audit_log.redb")).unwrap();
        assert!(store.last_for("nobody").unwrap().is_none());
    }

    #[test]
    fn prune_removes_only_rows_older_than_cutoff() {
        let dir = tempdir().unwrap();
        let store = AuditLogStore::open(dir.path().join("audit_log.redb")).unwrap();
        store.insert(&row("a", 100, true)).unwrap();
        store.insert(&row("b", 500, true)).unwrap();

        let deleted = store.prune_older_than(300, 500).unwrap();
        assert_eq!(deleted, 1);
        assert!(store.last_for("a").unwrap().is_none());
        assert!(store.last_for("b").unwrap().is_some());
    }

    #[test]
    fn prune_respects_the_batch_size() {
        let dir = tempdir().unwrap();
        let store = AuditLogStore::open(dir.path().join("audit_log.redb")).unwrap();
        for i in 0..5i64 {
            store.insert(&row(&format!("n{i}"), 100 + i, true)).unwrap();
        }
        let deleted = store.prune_older_than(1000, 2).unwrap();
        assert_eq!(deleted, 2);
    }
}
