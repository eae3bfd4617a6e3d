//! Snapshot export/import and CSV export.
//!
//! The JSON snapshot covers the user-facing collections (notes, set lists,
//! venues, contacts) and is re-importable. Import can optionally skip rows
//! whose primary text field is a near-duplicate of an existing row, judged
//! by a character-level similarity ratio against a caller-supplied
//! threshold.
//!
//! CSV export emits one row per entity with a fixed header order per
//! collection and RFC 4180 quoting: fields containing a comma, quote or line
//! break are wrapped in double quotes with inner quotes doubled.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::TextDiff;

use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::StoreResult;
use crate::models::{Contact, Note, SetList, Venue};
use crate::store::LocalStore;

pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// A full snapshot of the user-facing collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub notes: Vec<Note>,
    pub setlists: Vec<SetList>,
    pub venues: Vec<Venue>,
    pub contacts: Vec<Contact>,
    pub exported_at: DateTime<Utc>,
    pub version: String,
}

impl Snapshot {
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> StoreResult<Snapshot> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Import behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// When set, a row whose primary text field (note content, otherwise
    /// name) has a similarity ratio at or above this threshold against any
    /// existing row of the collection is skipped. `None` imports everything.
    pub skip_duplicates_above: Option<f32>,
}

impl ImportOptions {
    pub fn skip_duplicates_above(threshold: f32) -> Self {
        ImportOptions {
            skip_duplicates_above: Some(threshold),
        }
    }
}

/// Counts of what an import actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

impl LocalStore {
    /// Builds a snapshot of notes, set lists, venues and contacts.
    pub fn export_snapshot(&self) -> StoreResult<Snapshot> {
        let options = crate::store::ListOptions::default();
        Ok(Snapshot {
            notes: self.list(&options)?,
            setlists: self.list(&options)?,
            venues: self.list(&options)?,
            contacts: self.list(&options)?,
            exported_at: Utc::now(),
            version: SNAPSHOT_VERSION.to_string(),
        })
    }

    /// Re-imports a snapshot. Ids are preserved, so re-importing over the
    /// same store overwrites rather than duplicates. With duplicate
    /// skipping disabled, per-collection counts restore exactly.
    pub fn import_snapshot(
        &self,
        snapshot: Snapshot,
        options: &ImportOptions,
    ) -> StoreResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        self.import_rows(snapshot.notes, options, |n: &Note| n.content.clone(), &mut summary)?;
        self.import_rows(snapshot.setlists, options, |s: &SetList| s.name.clone(), &mut summary)?;
        self.import_rows(snapshot.venues, options, |v: &Venue| v.name.clone(), &mut summary)?;
        self.import_rows(snapshot.contacts, options, |c: &Contact| c.name.clone(), &mut summary)?;
        info!(
            "snapshot import finished: {} imported, {} skipped",
            summary.imported, summary.skipped
        );
        Ok(summary)
    }

    fn import_rows<T: Entity>(
        &self,
        rows: Vec<T>,
        options: &ImportOptions,
        primary_text: impl Fn(&T) -> String,
        summary: &mut ImportSummary,
    ) -> StoreResult<()> {
        let mut existing: Vec<String> = self
            .list::<T>(&crate::store::ListOptions::default())?
            .iter()
            .map(&primary_text)
            .collect();

        for row in rows {
            let text = primary_text(&row);
            let near_duplicate = options.skip_duplicates_above.is_some_and(|threshold| {
                existing
                    .iter()
                    .any(|known| similarity(known, &text) >= threshold)
            });
            if near_duplicate {
                summary.skipped += 1;
                continue;
            }
            self.create(row)?;
            existing.push(text);
            summary.imported += 1;
        }
        Ok(())
    }

    /// One CSV document for a collection: fixed header order, one row per
    /// entity.
    pub fn export_csv(&self, collection: Collection) -> StoreResult<String> {
        let headers = csv_headers(collection);
        let mut out = String::new();
        out.push_str(&headers.join(","));
        out.push_str("\r\n");

        for row in self.scan(collection)? {
            let fields: Vec<String> = headers
                .iter()
                .map(|field| csv_escape(&field_to_string(row.get(*field))))
                .collect();
            out.push_str(&fields.join(","));
            out.push_str("\r\n");
        }
        Ok(out)
    }
}

/// Character-level similarity ratio in `0.0..=1.0`.
fn similarity(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

fn csv_headers(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Notes => &[
            "id",
            "content",
            "kind",
            "durationSeconds",
            "tags",
            "createdAt",
            "updatedAt",
        ],
        Collection::SetLists => &[
            "id",
            "name",
            "description",
            "noteIds",
            "totalDurationSeconds",
            "createdAt",
            "updatedAt",
        ],
        Collection::Venues => &[
            "id",
            "name",
            "city",
            "address",
            "capacity",
            "notes",
            "createdAt",
            "updatedAt",
        ],
        Collection::Contacts => &[
            "id",
            "name",
            "role",
            "email",
            "phone",
            "notes",
            "createdAt",
            "updatedAt",
        ],
        Collection::RehearsalSessions => &[
            "id",
            "scheduledAt",
            "focus",
            "noteIds",
            "durationSeconds",
            "notes",
            "createdAt",
            "updatedAt",
        ],
        Collection::Performances => &[
            "id",
            "performedAt",
            "venueId",
            "setListId",
            "rating",
            "notes",
            "createdAt",
            "updatedAt",
        ],
    }
}

fn field_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(";"),
        Some(other) => other.to_string(),
    }
}

/// RFC 4180 quoting.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
