//! Per-collection schema versioning.
//!
//! Each collection carries an integer version in the `schema_meta` table,
//! starting at 0. A [`Migration`] rewrites every row of one collection from
//! `from_version` to `from_version + 1`; steps run in ascending order at
//! store open, before any CRUD call is accepted. A failing step fails the
//! open entirely.
//!
//! Each step commits its row rewrites and the version bump in a single write
//! transaction, so an interrupted step rolls back whole and re-applies
//! cleanly on the next open. The step function itself is not required to be
//! idempotent.

use std::collections::HashMap;

use log::info;
use redb::{Database, ReadableTable};
use serde_json::Value;

use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::store::{LocalStore, SCHEMA_META_TABLE};

/// One upgrade step for one collection.
pub struct Migration {
    pub collection: Collection,
    /// The version this step upgrades *from*; it records `from_version + 1`.
    pub from_version: u32,
    /// Pure row rewrite, e.g. rename a field or default a new one.
    pub apply: fn(&mut Value) -> StoreResult<()>,
}

/// Applies all pending steps and returns the resulting version of every
/// collection.
pub(crate) fn run(
    db: &Database,
    migrations: &[Migration],
) -> StoreResult<HashMap<Collection, u32>> {
    let mut versions = recorded_versions(db)?;

    for collection in Collection::ALL {
        let mut current = versions.get(&collection).copied().unwrap_or(0);

        loop {
            let step = migrations
                .iter()
                .find(|m| m.collection == collection && m.from_version == current);
            let Some(step) = step else {
                break;
            };
            apply_step(db, step)?;
            current += 1;
            info!("migrated {collection} to schema version {current}");
        }

        // A registered step the loop could not reach means the sequence has
        // a hole; refusing to open beats serving a half-understood schema.
        let unreachable = migrations
            .iter()
            .any(|m| m.collection == collection && m.from_version > current);
        if unreachable {
            return Err(StoreError::Migration(format!(
                "non-contiguous migration steps for {collection} (stuck at version {current})"
            )));
        }

        versions.insert(collection, current);
    }

    Ok(versions)
}

fn recorded_versions(db: &Database) -> StoreResult<HashMap<Collection, u32>> {
    let txn = db.begin_read()?;
    let table = txn.open_table(SCHEMA_META_TABLE)?;
    let mut versions = HashMap::new();
    for collection in Collection::ALL {
        if let Some(guard) = table.get(collection.table_name())? {
            versions.insert(collection, guard.value());
        }
    }
    Ok(versions)
}

/// Rewrites every row of the step's collection and bumps the recorded
/// version, all in one transaction.
fn apply_step(db: &Database, step: &Migration) -> StoreResult<()> {
    let txn = db.begin_write()?;
    {
        let mut table = txn.open_table(LocalStore::table(step.collection))?;

        let mut rows: Vec<(String, Value)> = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            rows.push((
                key.value().to_string(),
                serde_json::from_slice(value.value())?,
            ));
        }

        for (id, mut row) in rows {
            (step.apply)(&mut row).map_err(|err| {
                StoreError::Migration(format!(
                    "step {} -> {} on {}/{id}: {err}",
                    step.from_version,
                    step.from_version + 1,
                    step.collection
                ))
            })?;
            let bytes = serde_json::to_vec(&row)?;
            table.insert(id.as_str(), bytes.as_slice())?;
        }

        let mut meta = txn.open_table(SCHEMA_META_TABLE)?;
        meta.insert(step.collection.table_name(), step.from_version + 1)?;
    }
    txn.commit()?;
    Ok(())
}
