//! Collection identifiers.
//!
//! Every domain collection is a variant here, so dispatch is checked at
//! compile time, so there is no "unknown collection" failure mode. The internal
//! tables (`sync_queue`, `blobs`, `blob_meta`, `schema_meta`) are deliberately
//! *not* variants: they cannot be reached through the CRUD surface.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "notes")]
    Notes,
    #[serde(rename = "setlists")]
    SetLists,
    #[serde(rename = "venues")]
    Venues,
    #[serde(rename = "contacts")]
    Contacts,
    #[serde(rename = "rehearsal_sessions")]
    RehearsalSessions,
    #[serde(rename = "performances")]
    Performances,
}

impl Collection {
    /// All collections, in the order they appear in the persisted layout.
    pub const ALL: [Collection; 6] = [
        Collection::Notes,
        Collection::SetLists,
        Collection::Venues,
        Collection::Contacts,
        Collection::RehearsalSessions,
        Collection::Performances,
    ];

    /// The redb table name backing this collection.
    pub const fn table_name(self) -> &'static str {
        match self {
            Collection::Notes => "notes",
            Collection::SetLists => "setlists",
            Collection::Venues => "venues",
            Collection::Contacts => "contacts",
            Collection::RehearsalSessions => "rehearsal_sessions",
            Collection::Performances => "performances",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
