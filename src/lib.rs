//! # Setlist Core
//!
//! An offline-first local storage library for performance note-taking
//! applications: short text/voice/image notes, set lists, venues, contacts,
//! rehearsal sessions and performances. Built on redb for stability and
//! crash safety; while the device is offline, this store is the only copy
//! of the user's data.
//!
//! ## Features
//!
//! - **Typed entity store**: CRUD, list and substring search over named
//!   collections, with compile-time collection dispatch
//! - **Durable sync outbox**: every mutation appends to an ordered,
//!   append-only queue that a remote-sync collaborator drains in FIFO order
//! - **Blob store**: key-addressed binary storage with bounded-growth image
//!   compression; audio stored unmodified
//! - **Schema migrations**: per-collection version counters with ordered
//!   upgrade steps, applied at open before any CRUD call
//! - **Domain services**: cascading deletes, derived set-list durations,
//!   nested contact updates and fan-out search on top of the generic store
//!
//! ## Quick Start
//!
//! ```no_run
//! use setlist_core::{DomainService, LocalStore, Note};
//!
//! let store = LocalStore::open("setlist.redb", &[])?;
//! let service = DomainService::new(&store);
//!
//! let note = service.create_note(Note::new("opener: airline food"))?;
//! assert!(note.id.is_some());
//! assert_eq!(store.sync_queue()?.len(), 1);
//! # Ok::<(), setlist_core::StoreError>(())
//! ```
//!
//! ## Ownership
//!
//! Open one [`LocalStore`] per process lifetime and pass it by reference to
//! every consumer. There is no global singleton; whoever owns the handle
//! owns the open/close lifecycle.
//!
//! ## Concurrency
//!
//! Operations are not run in parallel against the store and there is no
//! row-level locking. Two interleaved read-modify-write calls against the
//! same entity race (last write wins): a documented limitation, not a
//! guarantee to rely on.

pub mod blob_store;
pub mod collection;
pub mod entity;
pub mod error;
pub mod export;
pub mod migration;
pub mod models;
pub mod service;
pub mod store;
pub mod sync_queue;
mod test;

pub use blob_store::{generate_blob_key, BlobConfig, BlobKind, BlobRecord};
pub use collection::Collection;
pub use entity::Entity;
pub use error::{StoreError, StoreResult};
pub use export::{ImportOptions, ImportSummary, Snapshot, SNAPSHOT_VERSION};
pub use migration::Migration;
pub use models::{
    Attachment, AttachmentKind, Contact, ContactRole, Interaction, Note, NoteKind, Performance,
    RehearsalSession, Reminder, SetList, Venue,
};
pub use service::{DomainService, GlobalSearchResults};
pub use store::{ListOptions, LocalStore, SearchQuery, SortOrder};
pub use sync_queue::{SyncOperation, SyncOperationKind};
