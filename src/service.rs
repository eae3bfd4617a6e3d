//! Cross-entity invariants the generic store cannot know about.
//!
//! [`DomainService`] is thin orchestration over the entity store and blob
//! store: it validates payloads, cascades note deletion into blob cleanup,
//! recomputes derived set-list durations, appends to nested contact lists,
//! and fans a global search out across collections.
//!
//! None of the multi-step operations here are atomic with their trigger. A
//! crash between blob cleanup and the row delete can orphan a blob, and two
//! interleaved read-modify-write calls on the same contact race (last write
//! wins). Both are documented gaps, tolerated as recoverable drift and left
//! to the external consistency-repair collaborator, not hidden.

use image::GenericImageView;
use log::warn;
use serde::Serialize;
use serde_json::{json, Value};

use crate::blob_store::BlobConfig;
use crate::collection::Collection;
use crate::entity;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Attachment, AttachmentKind, Contact, Interaction, Note, Performance, Reminder, SetList, Venue,
};
use crate::store::{LocalStore, SearchQuery};

/// Merged results of a fan-out search. Each collection is searched
/// independently; there is no cross-collection relevance score.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSearchResults {
    pub notes: Vec<Note>,
    pub set_lists: Vec<SetList>,
    pub venues: Vec<Venue>,
    pub contacts: Vec<Contact>,
}

pub struct DomainService<'a> {
    store: &'a LocalStore,
    blob_config: BlobConfig,
}

impl<'a> DomainService<'a> {
    pub fn new(store: &'a LocalStore) -> Self {
        DomainService {
            store,
            blob_config: BlobConfig::default(),
        }
    }

    pub fn with_blob_config(store: &'a LocalStore, blob_config: BlobConfig) -> Self {
        DomainService { store, blob_config }
    }

    // -- notes --

    pub fn create_note(&self, note: Note) -> StoreResult<Note> {
        note.validate()?;
        self.store.create(note)
    }

    /// Validates the patched note before anything is written.
    pub fn update_note(&self, id: &str, patch: Value) -> StoreResult<Note> {
        let merged: Note = self.read_merged(id, &patch)?;
        merged.validate()?;
        self.store.update(id, patch)
    }

    /// Cascading delete: every attachment blob goes first, then the note
    /// row. A crash in between leaves orphaned blobs for the repair
    /// collaborator; it never leaves a note pointing at deleted state.
    pub fn delete_note(&self, id: &str) -> StoreResult<()> {
        if let Some(note) = self.store.read::<Note>(id)? {
            for attachment in &note.attachments {
                self.store.delete_blob(&attachment.blob_key)?;
            }
        }
        self.store.delete(Collection::Notes, id)
    }

    /// Stores an image attachment (downscaled and re-encoded by the blob
    /// store) and appends it to the note. The original pixel dimensions are
    /// recorded here, on the entity, because the blob store forgets them.
    pub fn attach_image_to_note(&self, note_id: &str, bytes: &[u8]) -> StoreResult<Note> {
        let note = self.require_note(note_id)?;
        let original_dims = image::load_from_memory(bytes)
            .map(|img| (img.width(), img.height()))
            .ok();
        let blob_key = self.store.store_image(bytes, &self.blob_config)?;
        let attachment = Attachment {
            blob_key,
            mime_type: "image/jpeg".to_string(),
            kind: AttachmentKind::Image,
            width: original_dims.map(|(w, _)| w),
            height: original_dims.map(|(_, h)| h),
        };
        self.append_attachment(note, attachment)
    }

    /// Stores an audio attachment unmodified and appends it to the note.
    pub fn attach_audio_to_note(
        &self,
        note_id: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> StoreResult<Note> {
        let note = self.require_note(note_id)?;
        let blob_key = self.store.store_audio(bytes, mime_type)?;
        let attachment = Attachment {
            blob_key,
            mime_type: mime_type.to_string(),
            kind: AttachmentKind::Audio,
            width: None,
            height: None,
        };
        self.append_attachment(note, attachment)
    }

    // -- set lists --

    /// Creates a set list with `totalDurationSeconds` recomputed from the
    /// member notes, synchronously, before the row is written.
    pub fn create_set_list(&self, mut set_list: SetList) -> StoreResult<SetList> {
        set_list.validate()?;
        set_list.total_duration_seconds = self.sum_note_durations(&set_list.note_ids)?;
        self.store.create(set_list)
    }

    /// Applies the patch and recomputes `totalDurationSeconds` from the
    /// resulting membership in the same call, never lazily.
    pub fn update_set_list(&self, id: &str, patch: Value) -> StoreResult<SetList> {
        let merged: SetList = self.read_merged(id, &patch)?;
        merged.validate()?;
        let total = self.sum_note_durations(&merged.note_ids)?;

        let mut patch = patch;
        if let Some(obj) = patch.as_object_mut() {
            obj.insert("totalDurationSeconds".into(), json!(total));
        }
        self.store.update(id, patch)
    }

    // -- contacts --

    pub fn create_contact(&self, contact: Contact) -> StoreResult<Contact> {
        contact.validate()?;
        self.store.create(contact)
    }

    /// Appends an interaction to a contact's log, preserving insertion
    /// order. Read-modify-write with no locking; see the module docs.
    pub fn add_interaction_to_contact(
        &self,
        contact_id: &str,
        interaction: Interaction,
    ) -> StoreResult<Contact> {
        let mut contact = self.require_contact(contact_id)?;
        contact.interactions.push(interaction);
        let patch = json!({ "interactions": serde_json::to_value(&contact.interactions)? });
        self.store.update(contact_id, patch)
    }

    /// Appends a reminder to a contact, preserving insertion order.
    pub fn add_reminder_to_contact(
        &self,
        contact_id: &str,
        reminder: Reminder,
    ) -> StoreResult<Contact> {
        let mut contact = self.require_contact(contact_id)?;
        contact.reminders.push(reminder);
        let patch = json!({ "reminders": serde_json::to_value(&contact.reminders)? });
        self.store.update(contact_id, patch)
    }

    // -- venues / performances --

    pub fn create_venue(&self, venue: Venue) -> StoreResult<Venue> {
        venue.validate()?;
        self.store.create(venue)
    }

    pub fn create_performance(&self, performance: Performance) -> StoreResult<Performance> {
        performance.validate()?;
        self.store.create(performance)
    }

    // -- search --

    /// One substring search per collection, merged without ranking.
    pub fn global_search(
        &self,
        text: &str,
        limit_per_collection: usize,
    ) -> StoreResult<GlobalSearchResults> {
        let capped = |fields: &[&str]| SearchQuery::new(text, fields).limit(limit_per_collection);
        Ok(GlobalSearchResults {
            notes: self.store.search(&capped(&["content", "tags"]))?,
            set_lists: self.store.search(&capped(&["name", "description"]))?,
            venues: self.store.search(&capped(&["name", "city", "notes"]))?,
            contacts: self.store.search(&capped(&["name", "email", "notes"]))?,
        })
    }

    // -- helpers --

    fn require_note(&self, id: &str) -> StoreResult<Note> {
        self.store
            .read(id)?
            .ok_or_else(|| StoreError::not_found(Collection::Notes.table_name(), id))
    }

    fn require_contact(&self, id: &str) -> StoreResult<Contact> {
        self.store
            .read(id)?
            .ok_or_else(|| StoreError::not_found(Collection::Contacts.table_name(), id))
    }

    /// The entity as it would look after the patch, for pre-write
    /// validation.
    fn read_merged<T: crate::entity::Entity>(&self, id: &str, patch: &Value) -> StoreResult<T> {
        let current = self
            .store
            .read::<T>(id)?
            .ok_or_else(|| StoreError::not_found(T::COLLECTION.table_name(), id))?;
        let mut row = serde_json::to_value(&current)?;
        entity::merge_patch(&mut row, patch);
        Ok(serde_json::from_value(row)?)
    }

    /// Sum of the member notes' durations; a missing note contributes 0
    /// (set lists may reference deleted notes).
    fn sum_note_durations(&self, note_ids: &[String]) -> StoreResult<u32> {
        let mut total = 0u32;
        for note_id in note_ids {
            match self.store.read::<Note>(note_id)? {
                Some(note) => total += note.duration_seconds.unwrap_or(0),
                None => warn!("set list references missing note {note_id}"),
            }
        }
        Ok(total)
    }

    fn append_attachment(&self, mut note: Note, attachment: Attachment) -> StoreResult<Note> {
        let note_id = note
            .id
            .clone()
            .ok_or_else(|| StoreError::validation("stored note is missing an id"))?;
        note.attachments.push(attachment);
        let patch = json!({ "attachments": serde_json::to_value(&note.attachments)? });
        self.store.update(&note_id, patch)
    }
}
