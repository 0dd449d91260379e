// ============================================
// File: crates/rootlink-core/src/trust/store.rs
// ============================================
//! # Cadastre Store
//!
//! ## Creation Reason
//! The trust engine persists what it validated so a peer's chain is only
//! walked once. This module defines the lookup/insert contract of that
//! persistence and two implementations.
//!
//! ## Main Functionality
//! - `CadastreStore`: trait consumed by the trust engine
//! - `MemoryStore`: process-local, for tests and ephemeral nodes
//! - `JsonFileStore`: one JSON document, rewritten atomically on change
//!
//! ## ⚠️ Important Note for Next Developer
//! - Inserts never overwrite: the first record for an alias wins
//! - `update_salt` is the only mutation of an existing cadastre
//! - Implementations must be safe to call from many sessions at once
//!
//! ## Last Modified
//! v0.1.0 - Initial store implementations

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rootlink_common::Alias;

use super::cadastre::{Cadastre, IssuerRecord};
use crate::crypto::Salt;
use crate::error::{CoreError, Result};

// ============================================
// CadastreStore Trait
// ============================================

/// Persistence contract of the trust cache.
pub trait CadastreStore: Send + Sync {
    /// Looks up the cadastre of a peer.
    ///
    /// # Errors
    /// `Store` on backend failure.
    fn cadastre(&self, alias: &Alias) -> Result<Option<Cadastre>>;

    /// Inserts a cadastre unless one exists for the alias.
    /// Returns the record now stored.
    ///
    /// # Errors
    /// `Store` on backend failure.
    fn insert_cadastre(&self, record: Cadastre) -> Result<Cadastre>;

    /// Replaces the salts of an existing cadastre.
    ///
    /// # Errors
    /// `Store` if no cadastre exists for the alias.
    fn update_salt(&self, alias: &Alias, salt_in: Salt, salt_out: Salt) -> Result<()>;

    /// Looks up an authority record.
    ///
    /// # Errors
    /// `Store` on backend failure.
    fn issuer(&self, alias: &Alias) -> Result<Option<IssuerRecord>>;

    /// Inserts an authority record unless one exists. Returns `true` if inserted.
    ///
    /// # Errors
    /// `Store` on backend failure.
    fn insert_issuer(&self, record: IssuerRecord) -> Result<bool>;

    /// Removes an authority record. Returns `true` if it existed.
    ///
    /// # Errors
    /// `Store` on backend failure.
    fn remove_issuer(&self, alias: &Alias) -> Result<bool>;

    /// Number of stored cadastres.
    fn cadastre_count(&self) -> usize;
}

// ============================================
// Document
// ============================================

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    cadastres: BTreeMap<Alias, Cadastre>,
    #[serde(default)]
    issuers: BTreeMap<Alias, IssuerRecord>,
}

impl Document {
    fn insert_cadastre(&mut self, record: Cadastre) -> (Cadastre, bool) {
        match self.cadastres.get(&record.alias) {
            Some(existing) => (existing.clone(), false),
            None => {
                self.cadastres.insert(record.alias, record.clone());
                (record, true)
            }
        }
    }

    fn update_salt(&mut self, alias: &Alias, salt_in: Salt, salt_out: Salt) -> Result<()> {
        let record = self
            .cadastres
            .get_mut(alias)
            .ok_or_else(|| CoreError::store(format!("no cadastre for {alias:?}")))?;
        record.salt_in = salt_in;
        record.salt_out = salt_out;
        Ok(())
    }

    fn insert_issuer(&mut self, record: IssuerRecord) -> bool {
        if self.issuers.contains_key(&record.alias) {
            return false;
        }
        self.issuers.insert(record.alias, record);
        true
    }
}

// ============================================
// MemoryStore
// ============================================

/// Process-local store; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: RwLock<Document>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CadastreStore for MemoryStore {
    fn cadastre(&self, alias: &Alias) -> Result<Option<Cadastre>> {
        Ok(self.doc.read().cadastres.get(alias).cloned())
    }

    fn insert_cadastre(&self, record: Cadastre) -> Result<Cadastre> {
        Ok(self.doc.write().insert_cadastre(record).0)
    }

    fn update_salt(&self, alias: &Alias, salt_in: Salt, salt_out: Salt) -> Result<()> {
        self.doc.write().update_salt(alias, salt_in, salt_out)
    }

    fn issuer(&self, alias: &Alias) -> Result<Option<IssuerRecord>> {
        Ok(self.doc.read().issuers.get(alias).cloned())
    }

    fn insert_issuer(&self, record: IssuerRecord) -> Result<bool> {
        Ok(self.doc.write().insert_issuer(record))
    }

    fn remove_issuer(&self, alias: &Alias) -> Result<bool> {
        Ok(self.doc.write().issuers.remove(alias).is_some())
    }

    fn cadastre_count(&self) -> usize {
        self.doc.read().cadastres.len()
    }
}

// ============================================
// JsonFileStore
// ============================================

/// Store backed by a single JSON file.
///
/// Every mutation rewrites the whole document to a sibling temporary file
/// and renames it over the original, so readers of the file never see a
/// partial write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    doc: RwLock<Document>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    /// `Store` if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                CoreError::store(format!("parsing {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => {
                return Err(CoreError::store(format!("reading {}: {e}", path.display())));
            }
        };
        debug!(
            path = %path.display(),
            cadastres = doc.cadastres.len(),
            issuers = doc.issuers.len(),
            "Opened cadastre store"
        );
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, doc: &Document) -> Result<()> {
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| CoreError::store(format!("encoding: {e}")))?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let write = || -> std::io::Result<()> {
            if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| CoreError::store(format!("writing {}: {e}", self.path.display())))
    }

    /// Applies `change` to the document and persists it if `change`
    /// reports a modification. The in-memory document is only updated once
    /// the file write succeeded.
    fn mutate<T>(&self, change: impl FnOnce(&mut Document) -> Result<(T, bool)>) -> Result<T> {
        let mut guard = self.doc.write();
        let mut next = guard.clone();
        let (out, changed) = change(&mut next)?;
        if changed {
            self.persist(&next)?;
            *guard = next;
        }
        Ok(out)
    }
}

impl CadastreStore for JsonFileStore {
    fn cadastre(&self, alias: &Alias) -> Result<Option<Cadastre>> {
        Ok(self.doc.read().cadastres.get(alias).cloned())
    }

    fn insert_cadastre(&self, record: Cadastre) -> Result<Cadastre> {
        self.mutate(|doc| Ok(doc.insert_cadastre(record)))
    }

    fn update_salt(&self, alias: &Alias, salt_in: Salt, salt_out: Salt) -> Result<()> {
        self.mutate(|doc| doc.update_salt(alias, salt_in, salt_out).map(|()| ((), true)))
    }

    fn issuer(&self, alias: &Alias) -> Result<Option<IssuerRecord>> {
        Ok(self.doc.read().issuers.get(alias).cloned())
    }

    fn insert_issuer(&self, record: IssuerRecord) -> Result<bool> {
        self.mutate(|doc| {
            let inserted = doc.insert_issuer(record);
            Ok((inserted, inserted))
        })
    }

    fn remove_issuer(&self, alias: &Alias) -> Result<bool> {
        self.mutate(|doc| {
            let removed = doc.issuers.remove(alias).is_some();
            Ok((removed, removed))
        })
    }

    fn cadastre_count(&self) -> usize {
        self.doc.read().cadastres.len()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(byte: u8) -> Alias {
        Alias::from_digest([byte; 32])
    }

    fn exercise(store: &dyn CadastreStore) {
        let first = store
            .insert_cadastre(Cadastre::new(alias(1), alias(2)))
            .unwrap();
        let second = store
            .insert_cadastre(Cadastre::new(alias(1), alias(9)))
            .unwrap();
        assert_eq!(second.issuer, first.issuer);
        assert_eq!(store.cadastre_count(), 1);

        store
            .update_salt(&alias(1), Salt::from_bytes([1; 48]), Salt::from_bytes([2; 48]))
            .unwrap();
        let updated = store.cadastre(&alias(1)).unwrap().unwrap();
        assert_eq!(updated.salt_in, Salt::from_bytes([1; 48]));
        assert_eq!(updated.issuer, alias(2));

        assert!(store.update_salt(&alias(7), Salt::zero(), Salt::zero()).is_err());

        let record = IssuerRecord {
            alias: alias(2),
            certificate: vec![0x30, 0x00],
            issuer: None,
        };
        assert!(store.insert_issuer(record.clone()).unwrap());
        assert!(!store.insert_issuer(record).unwrap());
        assert!(store.issuer(&alias(2)).unwrap().is_some());
        assert!(store.remove_issuer(&alias(2)).unwrap());
        assert!(store.issuer(&alias(2)).unwrap().is_none());
    }

    #[test]
    fn test_memory_store_contract() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_json_store_contract_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust").join("cadastre.json");

        exercise(&JsonFileStore::open(&path).unwrap());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.cadastre_count(), 1);
        let record = reopened.cadastre(&alias(1)).unwrap().unwrap();
        assert_eq!(record.salt_out, Salt::from_bytes([2; 48]));
        assert!(reopened.issuer(&alias(2)).unwrap().is_none());
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadastre.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(CoreError::Store { .. })
        ));
    }
}
