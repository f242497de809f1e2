//! Durable table of Registered Nodes, keyed by `tntAddr`, backed
//! by `redb`. Mirrors the Block Store's synchronous-commit idiom: every
//! mutation is durable before the caller is told it landed.

use crate::error::backend;
use chronicle_types::{RegisteredNode, RegistryError};
use rand::seq::SliceRandom;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;

const NODES: TableDefinition<&str, &str> = TableDefinition::new("NODES");
/// `publicUri -> tntAddr`, enforcing public-URI uniqueness without a
/// full-table scan on every `create`/`update`.
const URI_INDEX: TableDefinition<&str, &str> = TableDefinition::new("URI_INDEX");
/// Set of blacklisted IPs, stored as `ip -> ""`.
const BLACKLIST: TableDefinition<&str, &str> = TableDefinition::new("BLACKLIST");

/// A handle to the Node Registry's persisted state.
pub struct NodeStore {
    db: Database,
}

impl NodeStore {
    /// Opens (creating if absent) the registry database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        let w = db.begin_write().map_err(backend)?;
        {
            w.open_table(NODES).map_err(backend)?;
            w.open_table(URI_INDEX).map_err(backend)?;
            w.open_table(BLACKLIST).map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        Ok(Self { db })
    }

    /// The total count of registered Nodes, for cap enforcement.
    pub fn count(&self) -> Result<u64, RegistryError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(NODES).map_err(backend)?;
        Ok(table.len().map_err(backend)?)
    }

    /// Fetches a single Node by address.
    pub fn get(&self, tnt_addr: &str) -> Result<Option<RegisteredNode>, RegistryError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(NODES).map_err(backend)?;
        match table.get(tnt_addr).map_err(backend)? {
            Some(v) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }

    /// Inserts a brand-new Node, rejecting a duplicate `tntAddr` or
    /// `publicUri`.
    pub fn insert(&self, node: &RegisteredNode) -> Result<(), RegistryError> {
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut nodes = w.open_table(NODES).map_err(backend)?;
            if nodes.get(node.tnt_addr.as_str()).map_err(backend)?.is_some() {
                return Err(RegistryError::Conflict(format!(
                            "tnt address already registered: {}",
                            node.tnt_addr
                )));
            }
            let mut uris = w.open_table(URI_INDEX).map_err(backend)?;
            if let Some(uri) = &node.public_uri {
                if uris.get(uri.as_str()).map_err(backend)?.is_some() {
                    return Err(RegistryError::Conflict(format!(
                                "public uri already registered: {uri}"
                    )));
                }
                uris.insert(uri.as_str(), node.tnt_addr.as_str())
                .map_err(backend)?;
            }
            nodes
            .insert(node.tnt_addr.as_str(), encode(node)?.as_str())
            .map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        tracing::info!(tnt_addr = %node.tnt_addr, "registered node");
        Ok(())
    }

    /// Replaces an existing Node's record, re-indexing its `publicUri` if it
    /// changed.
    pub fn update(&self, node: &RegisteredNode) -> Result<(), RegistryError> {
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut nodes = w.open_table(NODES).map_err(backend)?;
            let existing = nodes
            .get(node.tnt_addr.as_str())
            .map_err(backend)?
            .map(|v| decode(v.value()))
            .transpose()?
            .ok_or_else(|| {
                    RegistryError::NotFound(format!("no node registered at {}", node.tnt_addr))
            })?;

            let mut uris = w.open_table(URI_INDEX).map_err(backend)?;
            if existing.public_uri != node.public_uri {
                if let Some(old) = &existing.public_uri {
                    uris.remove(old.as_str()).map_err(backend)?;
                }
                if let Some(new) = &node.public_uri {
                    if uris.get(new.as_str()).map_err(backend)?.is_some() {
                        return Err(RegistryError::Conflict(format!(
                                    "public uri already registered: {new}"
                        )));
                    }
                    uris.insert(new.as_str(), node.tnt_addr.as_str())
                    .map_err(backend)?;
                }
            }
            nodes
            .insert(node.tnt_addr.as_str(), encode(node)?.as_str())
            .map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        tracing::info!(tnt_addr = %node.tnt_addr, "updated node");
        Ok(())
    }

    /// Every registered Node, in no particular order. Used by the Audit
    /// Engine's round scheduling, which must see the whole population.
    pub fn list_all(&self) -> Result<Vec<RegisteredNode>, RegistryError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(NODES).map_err(backend)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (_, v) = entry.map_err(backend)?;
            out.push(decode(v.value())?);
        }
        Ok(out)
    }

    /// A uniform sample of up to `n` Nodes with `consecutivePasses > 0`,
    /// excluding blacklisted Nodes.
    pub fn random_healthy(&self, n: usize) -> Result<Vec<RegisteredNode>, RegistryError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(NODES).map_err(backend)?;
        let mut candidates = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (_, v) = entry.map_err(backend)?;
            let node = decode(v.value())?;
            if node.is_healthy() && !node.blacklisted {
                candidates.push(node);
            }
        }
        let mut rng = rand::thread_rng();
        candidates.shuffle(&mut rng);
        candidates.truncate(n);
        Ok(candidates)
    }

    /// The current set of blacklisted IPs.
    pub fn blacklist(&self) -> Result<Vec<String>, RegistryError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(BLACKLIST).map_err(backend)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (k, _) = entry.map_err(backend)?;
            out.push(k.value().to_string());
        }
        Ok(out)
    }
}

fn encode(node: &RegisteredNode) -> Result<String, RegistryError> {
    serde_json::to_string(node).map_err(|e| RegistryError::Internal(format!("encode node: {e}")))
}

fn decode(s: &str) -> Result<RegisteredNode, RegistryError> {
    serde_json::from_str(s).map_err(|e| RegistryError::Internal(format!("decode node: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn node(addr: &str, uri: Option<&str>) -> RegisteredNode {
        RegisteredNode::new(
            addr.to_string(),
            uri.map(|s| s.to_string()),
            "f".repeat(64),
            "1.0.0".into(),
        )
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("registry.redb")).unwrap();
        let n = node(&"a".repeat(40), Some("https://203.0.113.10/"));
        store.insert(&n).unwrap();
        assert_eq!(store.get(&n.tnt_addr).unwrap().unwrap(), n);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn insert_rejects_duplicate_address() {
        let dir = tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("registry.redb")).unwrap();
        let n = node(&"a".repeat(40), None);
        store.insert(&n).unwrap();
        assert!(matches!(
                store.insert(&n),
                Err(RegistryError::Conflict(_))
        ));
    }

    #[test]
    fn insert_rejects_duplicate_uri() {
        let dir = tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("registry.redb")).unwrap();
        let uri = "https://203.0.113.10/";
        store.insert(&node(&"a".repeat(40), Some(uri))).unwrap();
        assert!(matches!(
                store.insert(&node(&"b".repeat(40), Some(uri))),
                Err(RegistryError::Conflict(_))
        ));
    }

    #[test]
    fn update_rejects_unknown_address() {
        let dir = tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("registry.redb")).unwrap();
        assert!(matches!(
                store.update(&node(&"a".repeat(40), None)),
                Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn random_healthy_excludes_unhealthy_and_blacklisted() {
        let dir = tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("registry.redb")).unwrap();
        let mut healthy = node(&"a".repeat(40), None);
        healthy.consecutive_passes = 3;
        store.insert(&healthy).unwrap();

        let mut blacklisted = node(&"b".repeat(40), None);
        blacklisted.consecutive_passes = 3;
        blacklisted.blacklisted = true;
        store.insert(&blacklisted).unwrap();

        let unhealthy = node(&"c".repeat(40), None);
        store.insert(&unhealthy).unwrap();

        let sample = store.random_healthy(25).unwrap();
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].tnt_addr, healthy.tnt_addr);
    }
}
