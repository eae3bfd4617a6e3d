//! The outbox: an append-only, ordered log of pending mutations.
//!
//! Every successful mutation on a collection appends one operation here. A
//! remote-sync collaborator drains the queue in FIFO order and acknowledges
//! each delivery with [`LocalStore::remove_sync_operation`]; retry and
//! backoff are entirely its responsibility.
//!
//! Appends are advisory by design: a failed append is logged and swallowed so
//! it can never fail the mutation it accompanies. The collaborator reconciles
//! missed operations by periodically diffing full entity state.

use chrono::{DateTime, Utc};
use log::warn;
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::collection::Collection;
use crate::error::StoreResult;
use crate::store::{LocalStore, SYNC_QUEUE_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperationKind {
    Create,
    Update,
    Delete,
}

/// One pending mutation awaiting delivery to the remote system.
///
/// `data` is the full stored row for a create, the partial patch for an
/// update, and absent for a delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SyncOperationKind,
    pub collection: Collection,
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl LocalStore {
    /// Appends an operation to the queue. Never fails: queue-append errors
    /// are logged and discarded so the triggering mutation stands.
    pub(crate) fn enqueue_op(
        &self,
        kind: SyncOperationKind,
        collection: Collection,
        item_id: &str,
        data: Option<Value>,
    ) {
        let op = SyncOperation {
            id: Uuid::new_v4().to_string(),
            kind,
            collection,
            item_id: item_id.to_string(),
            data,
            timestamp: Utc::now(),
        };
        if let Err(err) = self.append_op(&op) {
            warn!(
                "dropping sync-queue append for {}/{}: {err}",
                collection, op.item_id
            );
        }
    }

    fn append_op(&self, op: &SyncOperation) -> StoreResult<()> {
        let bytes = serde_json::to_vec(op)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SYNC_QUEUE_TABLE)?;
            // Sequence keys make iteration order identical to append order,
            // which is the FIFO contract the sync collaborator replays by.
            let next = match table.last()? {
                Some((key, _)) => key.value() + 1,
                None => 0,
            };
            table.insert(next, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// All pending operations, oldest first.
    pub fn sync_queue(&self) -> StoreResult<Vec<SyncOperation>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SYNC_QUEUE_TABLE)?;
        let mut ops = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            ops.push(serde_json::from_slice(value.value())?);
        }
        Ok(ops)
    }

    /// Acknowledges a single operation by its id. Unknown ids are ignored.
    /// Has no effect on the entity tables.
    pub fn remove_sync_operation(&self, op_id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SYNC_QUEUE_TABLE)?;
            let mut found = None;
            for item in table.iter()? {
                let (key, value) = item?;
                let op: SyncOperation = serde_json::from_slice(value.value())?;
                if op.id == op_id {
                    found = Some(key.value());
                    break;
                }
            }
            if let Some(key) = found {
                table.remove(key)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Drops every pending operation. Entity tables are untouched.
    pub fn clear_sync_queue(&self) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SYNC_QUEUE_TABLE)?;
            let keys: Vec<u64> = table
                .iter()?
                .map(|item| item.map(|(key, _)| key.value()))
                .collect::<Result<_, _>>()?;
            for key in keys {
                table.remove(key)?;
            }
        }
        txn.commit()?;
        Ok(())
    }
}
