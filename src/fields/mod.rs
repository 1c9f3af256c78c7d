//! # Indexed-Field Maintenance
//!
//! This module keeps secondary field indexes in step with object state.
//! When an object commits, the values of its indexed fields are converted
//! to sortable 64-bit keys and the per-field indexes are updated: stale
//! `(key, oid)` entries removed, fresh ones inserted.
//!
//! ## Backup Arrays
//!
//! Field indexes can only be cleaned up if the *previous* key of each
//! indexed field is known at update time - the object itself only carries
//! the new values. [`FieldIndexUpdater::backup`] captures the sortable
//! keys of the indexed fields before an object is modified; the resulting
//! array is handed back on commit so the old entries can be located and
//! removed.
//!
//! ## Stale Entries
//!
//! Entries can outlive their objects: indexes are not rewritten when an
//! object changes shape elsewhere, only when the change flows through this
//! path. A scan that hits an entry whose object no longer matches purges
//! it through [`FieldIndexRegistry::purge_stale`], which logs the cleanup
//! and removes the entry - stale data is never silently skipped.

use eyre::{bail, ensure, Result};
use hashbrown::HashMap;
use tracing::debug;

use crate::encoding::sortable;
use crate::index::PagedIndex;
use crate::util::PrimLongSet;

/// A field value as extracted from an object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Long(i64),
    Double(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    /// Order-preserving 64-bit encoding of the value.
    pub fn to_sortable(&self) -> i64 {
        match self {
            FieldValue::Long(v) => *v,
            FieldValue::Double(v) => sortable::double_to_sortable(*v),
            FieldValue::Text(v) => sortable::string_to_sortable(v),
            FieldValue::Bool(v) => sortable::bool_to_sortable(*v),
        }
    }
}

/// Schema-level description of one object field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub indexed: bool,
}

impl FieldDef {
    pub fn indexed(name: &str) -> Self {
        Self { name: name.to_string(), indexed: true }
    }

    pub fn plain(name: &str) -> Self {
        Self { name: name.to_string(), indexed: false }
    }
}

#[derive(Debug)]
struct IndexedField {
    name: String,
    /// Position of the field in the object's value array.
    pos: usize,
}

/// Captures sortable keys of indexed fields so their old index entries can
/// be removed after the object changes.
#[derive(Debug)]
pub struct FieldIndexUpdater {
    fields: Vec<IndexedField>,
}

impl FieldIndexUpdater {
    /// Builds an updater from the full field schema; only indexed fields
    /// are retained.
    pub fn new(defs: &[FieldDef]) -> Self {
        let fields = defs
            .iter()
            .enumerate()
            .filter(|(_, def)| def.indexed)
            .map(|(pos, def)| IndexedField { name: def.name.clone(), pos })
            .collect();
        Self { fields }
    }

    /// Whether any field is indexed at all.
    pub fn is_indexed(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Sortable keys of the indexed fields of `values`, in schema order.
    /// Returns `None` when nothing is indexed.
    pub fn backup(&self, values: &[FieldValue]) -> Result<Option<Vec<i64>>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        let mut keys = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let Some(value) = values.get(field.pos) else {
                bail!(
                    "object has {} field values but indexed field '{}' is at position {}",
                    values.len(),
                    field.name,
                    field.pos
                );
            };
            keys.push(value.to_sortable());
        }
        Ok(Some(keys))
    }
}

/// The per-field index registry and the update path over it.
#[derive(Debug, Default)]
pub struct FieldIndexRegistry {
    indexes: HashMap<String, PagedIndex>,
    /// Object ids with uncommitted index changes.
    touched: PrimLongSet,
}

impl FieldIndexRegistry {
    pub fn new() -> Self {
        Self { indexes: HashMap::new(), touched: PrimLongSet::new() }
    }

    /// Registers the index maintained for `field`.
    pub fn register(&mut self, field: &str, index: PagedIndex) {
        self.indexes.insert(field.to_string(), index);
    }

    pub fn index(&self, field: &str) -> Option<&PagedIndex> {
        self.indexes.get(field)
    }

    pub fn index_mut(&mut self, field: &str) -> Option<&mut PagedIndex> {
        self.indexes.get_mut(field)
    }

    /// Applies an object update to every registered field index: removes
    /// the entries recorded in `old_backup`, inserts entries for
    /// `new_values`. Unchanged keys are left alone.
    pub fn apply_update(
        &mut self,
        updater: &FieldIndexUpdater,
        oid: i64,
        old_backup: Option<&[i64]>,
        new_values: &[FieldValue],
    ) -> Result<()> {
        let Some(new_keys) = updater.backup(new_values)? else {
            return Ok(());
        };
        if let Some(old) = old_backup {
            ensure!(
                old.len() == updater.fields.len(),
                "backup has {} keys but {} fields are indexed",
                old.len(),
                updater.fields.len()
            );
        }

        for (slot, field) in updater.fields.iter().enumerate() {
            let Some(index) = self.indexes.get_mut(&field.name) else {
                bail!("no index registered for field '{}'", field.name);
            };
            let new_key = new_keys[slot];

            if let Some(old) = old_backup {
                let old_key = old[slot];
                if old_key == new_key {
                    continue;
                }
                if index.remove(old_key, oid).is_err() {
                    // The entry was already purged by a scan; removal is
                    // best-effort here.
                    debug!(field = %field.name, key = old_key, oid, "old index entry already gone");
                }
            }
            index.insert(new_key, oid)?;
            self.touched.add(oid);
        }
        Ok(())
    }

    /// Removes all index entries of a deleted object, using its backup.
    pub fn apply_delete(
        &mut self,
        updater: &FieldIndexUpdater,
        oid: i64,
        backup: &[i64],
    ) -> Result<()> {
        ensure!(
            backup.len() == updater.fields.len(),
            "backup has {} keys but {} fields are indexed",
            backup.len(),
            updater.fields.len()
        );
        for (slot, field) in updater.fields.iter().enumerate() {
            let Some(index) = self.indexes.get_mut(&field.name) else {
                bail!("no index registered for field '{}'", field.name);
            };
            if index.remove(backup[slot], oid).is_err() {
                debug!(field = %field.name, key = backup[slot], oid, "index entry already gone");
            }
            self.touched.add(oid);
        }
        Ok(())
    }

    /// Purges an index entry discovered stale during a scan (the object it
    /// points at no longer matches). Returns whether an entry was removed.
    pub fn purge_stale(&mut self, field: &str, key: i64, oid: i64) -> Result<bool> {
        let Some(index) = self.indexes.get_mut(field) else {
            bail!("no index registered for field '{}'", field);
        };
        match index.remove(key, oid) {
            Ok(_) => {
                debug!(field, key, oid, "purged stale index entry");
                self.touched.add(oid);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Object ids touched since the last commit.
    pub fn touched_oids(&self) -> &PrimLongSet {
        &self.touched
    }

    /// Commits every registered index and clears the touched set.
    pub fn commit_all(&mut self) -> Result<()> {
        for index in self.indexes.values_mut() {
            index.commit()?;
        }
        self.touched.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexConfig;
    use tempfile::tempdir;

    fn schema() -> Vec<FieldDef> {
        vec![FieldDef::indexed("name"), FieldDef::plain("note"), FieldDef::indexed("age")]
    }

    fn registry(dir: &tempfile::TempDir) -> FieldIndexRegistry {
        let mut registry = FieldIndexRegistry::new();
        registry.register(
            "name",
            PagedIndex::create(dir.path().join("name.idx"), IndexConfig::non_unique(8)).unwrap(),
        );
        registry.register(
            "age",
            PagedIndex::create(dir.path().join("age.idx"), IndexConfig::non_unique(8)).unwrap(),
        );
        registry
    }

    fn values(name: &str, age: i64) -> Vec<FieldValue> {
        vec![
            FieldValue::Text(name.to_string()),
            FieldValue::Text("unindexed".to_string()),
            FieldValue::Long(age),
        ]
    }

    #[test]
    fn backup_captures_only_indexed_fields() {
        let updater = FieldIndexUpdater::new(&schema());
        assert!(updater.is_indexed());

        let backup = updater.backup(&values("alice", 30)).unwrap().unwrap();
        assert_eq!(backup.len(), 2);
        assert_eq!(backup[0], sortable::string_to_sortable("alice"));
        assert_eq!(backup[1], 30);
    }

    #[test]
    fn backup_is_none_without_indexed_fields() {
        let updater = FieldIndexUpdater::new(&[FieldDef::plain("a"), FieldDef::plain("b")]);
        assert!(!updater.is_indexed());
        assert!(updater.backup(&[FieldValue::Long(1), FieldValue::Long(2)]).unwrap().is_none());
    }

    #[test]
    fn backup_rejects_short_value_arrays() {
        let updater = FieldIndexUpdater::new(&schema());
        assert!(updater.backup(&[FieldValue::Long(1)]).is_err());
    }

    #[test]
    fn fresh_objects_land_in_every_index() {
        let dir = tempdir().unwrap();
        let updater = FieldIndexUpdater::new(&schema());
        let mut registry = registry(&dir);

        registry.apply_update(&updater, 1001, None, &values("alice", 30)).unwrap();
        registry.apply_update(&updater, 1002, None, &values("bob", 25)).unwrap();

        let name_key = sortable::string_to_sortable("alice");
        assert!(registry.index("name").unwrap().contains(name_key, 1001));
        assert!(registry.index("age").unwrap().contains(30, 1001));
        assert!(registry.index("age").unwrap().contains(25, 1002));
        assert_eq!(registry.touched_oids().len(), 2);
    }

    #[test]
    fn updates_move_entries_and_skip_unchanged_keys() {
        let dir = tempdir().unwrap();
        let updater = FieldIndexUpdater::new(&schema());
        let mut registry = registry(&dir);

        let old = values("alice", 30);
        registry.apply_update(&updater, 1001, None, &old).unwrap();
        let backup = updater.backup(&old).unwrap().unwrap();

        // Same name, new age: only the age index changes.
        registry.apply_update(&updater, 1001, Some(&backup), &values("alice", 31)).unwrap();

        let name_key = sortable::string_to_sortable("alice");
        assert!(registry.index("name").unwrap().contains(name_key, 1001));
        assert!(!registry.index("age").unwrap().contains(30, 1001));
        assert!(registry.index("age").unwrap().contains(31, 1001));
    }

    #[test]
    fn delete_removes_all_entries_of_an_object() {
        let dir = tempdir().unwrap();
        let updater = FieldIndexUpdater::new(&schema());
        let mut registry = registry(&dir);

        let vals = values("carol", 40);
        registry.apply_update(&updater, 7, None, &vals).unwrap();
        let backup = updater.backup(&vals).unwrap().unwrap();

        registry.apply_delete(&updater, 7, &backup).unwrap();

        assert!(!registry.index("name").unwrap().contains(backup[0], 7));
        assert!(!registry.index("age").unwrap().contains(40, 7));
    }

    #[test]
    fn purge_stale_removes_and_tolerates_absent_entries() {
        let dir = tempdir().unwrap();
        let updater = FieldIndexUpdater::new(&schema());
        let mut registry = registry(&dir);

        registry.apply_update(&updater, 9, None, &values("dave", 50)).unwrap();

        assert!(registry.purge_stale("age", 50, 9).unwrap());
        assert!(!registry.purge_stale("age", 50, 9).unwrap());
        assert!(registry.purge_stale("missing-field", 1, 1).is_err());
    }

    #[test]
    fn commit_all_persists_and_clears_touched() {
        let dir = tempdir().unwrap();
        let updater = FieldIndexUpdater::new(&schema());
        let mut registry = registry(&dir);

        registry.apply_update(&updater, 5, None, &values("erin", 22)).unwrap();
        assert!(registry.touched_oids().contains(5));
        registry.commit_all().unwrap();
        assert!(registry.touched_oids().is_empty());

        drop(registry);
        let index = PagedIndex::open(dir.path().join("age.idx")).unwrap();
        assert!(index.contains(22, 5));
    }
}
