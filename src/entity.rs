//! The entity abstraction shared by every collection.
//!
//! An entity is any serde-serializable record carrying the common header:
//! `id`, `createdAt`, `updatedAt` and an optional schema `version`. All four
//! are `Option` on the Rust side; `None` means "the store will populate this
//! at creation", never "missing key". The store itself treats the payload as
//! opaque JSON; domain semantics live in [`crate::service`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

use crate::collection::Collection;

/// A record stored in a named collection.
///
/// The `COLLECTION` constant binds each type to its table at compile time,
/// so store calls need no collection argument and cannot target the wrong
/// table.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn updated_at(&self) -> Option<DateTime<Utc>>;
    fn set_updated_at(&mut self, at: DateTime<Utc>);
    fn version(&self) -> Option<u32>;
    fn set_version(&mut self, version: u32);
}

/// Implements [`Entity`] for a struct with the standard header fields
/// (`id`, `created_at`, `updated_at`, `version`).
#[macro_export]
macro_rules! impl_entity {
    ($ty:ty, $collection:expr) => {
        impl $crate::entity::Entity for $ty {
            const COLLECTION: $crate::collection::Collection = $collection;

            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }
            fn set_id(&mut self, id: String) {
                self.id = Some(id);
            }
            fn created_at(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                self.created_at
            }
            fn set_created_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.created_at = Some(at);
            }
            fn updated_at(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                self.updated_at
            }
            fn set_updated_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.updated_at = Some(at);
            }
            fn version(&self) -> Option<u32> {
                self.version
            }
            fn set_version(&mut self, version: u32) {
                self.version = Some(version);
            }
        }
    };
}

/// Shallow-merges `patch` object fields onto `stored`.
///
/// `id` and `createdAt` are immutable and silently skipped; `updatedAt` is
/// managed by the store, not the patch.
pub(crate) fn merge_patch(stored: &mut Value, patch: &Value) {
    let (Some(target), Some(fields)) = (stored.as_object_mut(), patch.as_object()) else {
        return;
    };
    for (key, value) in fields {
        if key == "id" || key == "createdAt" || key == "updatedAt" {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Equality filter with array-membership semantics: matches when the row
/// field equals the filter value, or when the row field is an array that
/// contains the filter value as an element.
pub(crate) fn filter_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(actual) => actual == expected,
        None => false,
    }
}

/// Case-insensitive substring match against a string field, or against each
/// element of an array-of-strings field. `needle` must already be lowercased.
pub(crate) fn field_contains(field: Option<&Value>, needle: &str) -> bool {
    match field {
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.to_lowercase().contains(needle)),
        _ => false,
    }
}

/// Total order over JSON values for single-field sorting.
///
/// Null < booleans < numbers < strings < everything else. RFC 3339 timestamp
/// strings compare chronologically under plain string order, so sorting by
/// `createdAt` needs no special casing.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}
