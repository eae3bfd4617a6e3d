//! Domain model definitions.
//!
//! Every model carries the common entity header (`id`, `createdAt`,
//! `updatedAt`, `version`) as explicit `Option`s; `None` means the store
//! populates the field at creation. Field names serialize in camelCase to
//! match the application's wire shape, and closed sets (note kinds, contact
//! roles, attachment kinds) are Rust enums, so membership is checked at
//! compile time rather than by a runtime schema interpreter.
//!
//! Validation is per-model `validate()` returning
//! [`StoreError::Validation`]; the domain service calls it before any write.
//!
//! The store enforces no referential integrity between collections: a
//! [`SetList`] may reference note ids that no longer exist. That gap is
//! acknowledged and left to the external consistency-repair collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::impl_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    Text,
    Voice,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
}

/// A media reference on a note. The blob itself lives in the blob store;
/// `width`/`height` are the caller-recorded original dimensions, which the
/// blob store does not retain through compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub blob_key: String,
    pub mime_type: String,
    pub kind: AttachmentKind,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A short captured idea: a bit, a joke, a lyric fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<u32>,

    pub content: String,
    #[serde(default)]
    pub kind: NoteKind,
    /// Performance length of this material, in seconds.
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Note {
    pub fn new(content: impl Into<String>) -> Self {
        Note {
            content: content.into(),
            ..Note::default()
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.content.trim().is_empty() {
            return Err(StoreError::validation("note content must not be empty"));
        }
        if self.duration_seconds.is_some_and(|d| d > 86_400) {
            return Err(StoreError::validation(
                "note duration must be at most 86400 seconds",
            ));
        }
        Ok(())
    }
}

/// An ordered selection of notes for one show. `totalDurationSeconds` is
/// derived from the member notes and recomputed by the domain service on
/// every create/update, never trusted from the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetList {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<u32>,

    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub note_ids: Vec<String>,
    #[serde(default)]
    pub total_duration_seconds: u32,
}

impl SetList {
    pub fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation("set list name must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<u32>,

    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Venue {
    pub fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation("venue name must not be empty"));
        }
        if self.capacity == Some(0) {
            return Err(StoreError::validation("venue capacity must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactRole {
    Booker,
    Promoter,
    Performer,
    VenueManager,
    Other,
}

/// A logged touchpoint with a contact. Appended by the domain service,
/// insertion order preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub medium: Option<String>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub due_at: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<u32>,

    pub name: String,
    #[serde(default)]
    pub role: Option<ContactRole>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl Contact {
    pub fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation("contact name must not be empty"));
        }
        if let Some(email) = &self.email {
            let shape_ok = email.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
            });
            if !shape_ok {
                return Err(StoreError::validation(format!(
                    "malformed contact email: {email}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RehearsalSession {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<u32>,

    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub note_ids: Vec<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<u32>,

    #[serde(default)]
    pub performed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub set_list_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// 1–5 when present.
    #[serde(default)]
    pub rating: Option<u8>,
}

impl Performance {
    pub fn validate(&self) -> StoreResult<()> {
        if self.rating.is_some_and(|r| !(1..=5).contains(&r)) {
            return Err(StoreError::validation(
                "performance rating must be between 1 and 5",
            ));
        }
        Ok(())
    }
}

impl_entity!(Note, Collection::Notes);
impl_entity!(SetList, Collection::SetLists);
impl_entity!(Venue, Collection::Venues);
impl_entity!(Contact, Collection::Contacts);
impl_entity!(RehearsalSession, Collection::RehearsalSessions);
impl_entity!(Performance, Collection::Performances);
