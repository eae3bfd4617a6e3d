//! The storage engine: typed CRUD, list and search over named collections.
//!
//! One [`LocalStore`] wraps one redb database file and is the only copy of
//! the user's data while offline. Open it once at process startup and pass it
//! by reference to every consumer; lifecycle belongs to whoever owns the
//! handle. Migrations run inside [`LocalStore::open`], before any CRUD call
//! is accepted.
//!
//! Atomicity: a single create/update/delete is atomic with respect to its own
//! row (one write transaction). There are no multi-row transactions across
//! calls; batch operations are best-effort and re-driveable, not
//! all-or-nothing.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;
use uuid::Uuid;

use crate::collection::Collection;
use crate::entity::{self, Entity};
use crate::error::{StoreError, StoreResult};
use crate::migration::{self, Migration};
use crate::sync_queue::SyncOperationKind;

pub(crate) const SYNC_QUEUE_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("sync_queue");
pub(crate) const BLOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");
pub(crate) const BLOB_META_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("blob_meta");
pub(crate) const SCHEMA_META_TABLE: TableDefinition<&str, u32> =
    TableDefinition::new("schema_meta");

/// Sort direction for [`ListOptions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Options for [`LocalStore::list`].
///
/// Defaults: no filters, sort by `createdAt` descending, no offset, no limit.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Equality filters; a filter also matches when the row field is an
    /// array containing the filter value.
    pub filters: Vec<(String, Value)>,
    /// Field to sort by; `createdAt` when absent.
    pub sort_by: Option<String>,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.order = order;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Query for [`LocalStore::search`]: equality filters first, then a
/// case-insensitive substring match across the named text fields. Results
/// preserve the underlying scan order, with no relevance ranking.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub filters: Vec<(String, Value)>,
    pub text: String,
    /// Text fields to match against; array-of-string fields are matched
    /// element-wise.
    pub fields: Vec<String>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, fields: &[&str]) -> Self {
        SearchQuery {
            filters: Vec::new(),
            text: text.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The process-wide store handle.
#[derive(Debug)]
pub struct LocalStore {
    pub(crate) db: Database,
    schema_versions: HashMap<Collection, u32>,
}

impl LocalStore {
    /// Opens (or creates) the store at `path` and runs `migrations`.
    ///
    /// Every collection table and internal table is created up front, and all
    /// applicable migration steps are applied before this returns; a failed
    /// step fails the open entirely, so the store is never partially usable
    /// with a half-migrated collection.
    pub fn open(path: impl AsRef<Path>, migrations: &[Migration]) -> StoreResult<Self> {
        let db = Database::create(path.as_ref())?;

        let txn = db.begin_write()?;
        for collection in Collection::ALL {
            txn.open_table(Self::table(collection))?;
        }
        txn.open_table(SYNC_QUEUE_TABLE)?;
        txn.open_table(BLOBS_TABLE)?;
        txn.open_table(BLOB_META_TABLE)?;
        txn.open_table(SCHEMA_META_TABLE)?;
        txn.commit()?;

        let schema_versions = migration::run(&db, migrations)?;
        info!("store opened at {}", path.as_ref().display());
        Ok(LocalStore {
            db,
            schema_versions,
        })
    }

    /// The recorded schema version of a collection (0 when never migrated).
    pub fn schema_version(&self, collection: Collection) -> u32 {
        self.schema_versions.get(&collection).copied().unwrap_or(0)
    }

    /// Stores a new entity, generating `id` (uuid) and timestamps when
    /// absent (`createdAt == updatedAt` for a fresh row), then appends a
    /// `create` operation to the sync queue. Returns the stored value with
    /// all generated fields populated. An existing id is overwritten.
    pub fn create<T: Entity>(&self, item: T) -> StoreResult<T> {
        let row = self.build_row(&item)?;
        let id = row["id"].as_str().unwrap_or_default().to_string();
        self.write_row(T::COLLECTION, &id, &row)?;
        self.enqueue_op(
            SyncOperationKind::Create,
            T::COLLECTION,
            &id,
            Some(row.clone()),
        );
        debug!("created {}/{id}", T::COLLECTION);
        Ok(serde_json::from_value(row)?)
    }

    /// Reads an entity by id. Absence is `Ok(None)`, never an error.
    pub fn read<T: Entity>(&self, id: &str) -> StoreResult<Option<T>> {
        match self.read_row(T::COLLECTION, id)? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Merges `patch` fields onto the stored row and bumps `updatedAt`.
    ///
    /// Fails with [`StoreError::NotFound`] when the id does not exist. The
    /// patch may not overwrite `id` or `createdAt`, and `updatedAt` never
    /// regresses below the previously stored value. The sync operation
    /// carries the patch, not the full row.
    pub fn update<T: Entity>(&self, id: &str, patch: Value) -> StoreResult<T> {
        let mut row = self
            .read_row(T::COLLECTION, id)?
            .ok_or_else(|| StoreError::not_found(T::COLLECTION.table_name(), id))?;

        entity::merge_patch(&mut row, &patch);

        let previous: Option<DateTime<Utc>> = row
            .get("updatedAt")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let now = Utc::now();
        let effective = match previous {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        if let Some(obj) = row.as_object_mut() {
            obj.insert("updatedAt".into(), serde_json::to_value(effective)?);
        }

        self.write_row(T::COLLECTION, id, &row)?;
        self.enqueue_op(SyncOperationKind::Update, T::COLLECTION, id, Some(patch));
        debug!("updated {}/{id}", T::COLLECTION);
        Ok(serde_json::from_value(row)?)
    }

    /// Removes a row. Deleting a nonexistent id is not an error; every call
    /// appends a `delete` operation to the sync queue either way.
    pub fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(Self::table(collection))?;
            table.remove(id)?;
        }
        txn.commit()?;
        self.enqueue_op(SyncOperationKind::Delete, collection, id, None);
        debug!("deleted {collection}/{id}");
        Ok(())
    }

    /// Lists entities with equality/array-membership filters, single-field
    /// sort (default `createdAt` descending), offset and limit.
    pub fn list<T: Entity>(&self, options: &ListOptions) -> StoreResult<Vec<T>> {
        let mut rows = self.scan(T::COLLECTION)?;
        rows.retain(|row| {
            options
                .filters
                .iter()
                .all(|(field, value)| entity::filter_matches(row.get(field), value))
        });

        let sort_field = options.sort_by.as_deref().unwrap_or("createdAt");
        rows.sort_by(|a, b| entity::compare_values(a.get(sort_field), b.get(sort_field)));
        if options.order == SortOrder::Descending {
            rows.reverse();
        }

        rows.into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|row| Ok(serde_json::from_value(row)?))
            .collect()
    }

    /// Substring search over the query's named text fields, after equality
    /// filters. Matching is case-insensitive; results keep scan order.
    pub fn search<T: Entity>(&self, query: &SearchQuery) -> StoreResult<Vec<T>> {
        let needle = query.text.to_lowercase();
        let mut out = Vec::new();
        for row in self.scan(T::COLLECTION)? {
            let filters_pass = query
                .filters
                .iter()
                .all(|(field, value)| entity::filter_matches(row.get(field), value));
            if !filters_pass {
                continue;
            }
            let text_pass = needle.is_empty()
                || query
                    .fields
                    .iter()
                    .any(|field| entity::field_contains(row.get(field), &needle));
            if !text_pass {
                continue;
            }
            out.push(serde_json::from_value(row)?);
            if query.limit.is_some_and(|cap| out.len() >= cap) {
                break;
            }
        }
        Ok(out)
    }

    /// Batch create: all rows commit in one write transaction, but one sync
    /// operation is still emitted per item (the sync collaborator processes
    /// items individually). Semantically N sequential `create` calls.
    pub fn create_many<T: Entity>(&self, items: Vec<T>) -> StoreResult<Vec<T>> {
        let mut rows = Vec::with_capacity(items.len());
        for item in &items {
            rows.push(self.build_row(item)?);
        }

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(Self::table(T::COLLECTION))?;
            for row in &rows {
                let id = row["id"].as_str().unwrap_or_default();
                let bytes = serde_json::to_vec(row)?;
                table.insert(id, bytes.as_slice())?;
            }
        }
        txn.commit()?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row["id"].as_str().unwrap_or_default().to_string();
            self.enqueue_op(
                SyncOperationKind::Create,
                T::COLLECTION,
                &id,
                Some(row.clone()),
            );
            stored.push(serde_json::from_value(row)?);
        }
        debug!("created {} rows in {}", stored.len(), T::COLLECTION);
        Ok(stored)
    }

    /// Batch delete: one write transaction, one `delete` sync operation per
    /// id. Idempotent per id, like [`LocalStore::delete`].
    pub fn delete_many(&self, collection: Collection, ids: &[String]) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(Self::table(collection))?;
            for id in ids {
                table.remove(id.as_str())?;
            }
        }
        txn.commit()?;
        for id in ids {
            self.enqueue_op(SyncOperationKind::Delete, collection, id, None);
        }
        Ok(())
    }

    /// Number of rows in a collection.
    pub fn count(&self, collection: Collection) -> StoreResult<usize> {
        Ok(self.scan(collection)?.len())
    }

    // -- row plumbing --

    pub(crate) fn table(
        collection: Collection,
    ) -> TableDefinition<'static, &'static str, &'static [u8]> {
        TableDefinition::new(collection.table_name())
    }

    /// Serializes an entity and populates the generated header fields.
    fn build_row<T: Entity>(&self, item: &T) -> StoreResult<Value> {
        let mut row = serde_json::to_value(item)?;
        let now = Utc::now();
        let id = match item.id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let created = item.created_at().unwrap_or(now);
        let updated = item.updated_at().unwrap_or(created);
        let version = item
            .version()
            .unwrap_or_else(|| self.schema_version(T::COLLECTION));

        let obj = row
            .as_object_mut()
            .ok_or_else(|| StoreError::validation("entity must serialize to a JSON object"))?;
        obj.insert("id".into(), Value::String(id));
        obj.insert("createdAt".into(), serde_json::to_value(created)?);
        obj.insert("updatedAt".into(), serde_json::to_value(updated)?);
        obj.insert("version".into(), Value::from(version));
        Ok(row)
    }

    pub(crate) fn write_row(
        &self,
        collection: Collection,
        id: &str,
        row: &Value,
    ) -> StoreResult<()> {
        let bytes = serde_json::to_vec(row)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(Self::table(collection))?;
            table.insert(id, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub(crate) fn read_row(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(Self::table(collection))?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Full scan of a collection in key (id) order.
    pub(crate) fn scan(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(Self::table(collection))?;
        let mut rows = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            rows.push(serde_json::from_slice(value.value())?);
        }
        Ok(rows)
    }
}
