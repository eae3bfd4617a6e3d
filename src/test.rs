//! Test suite for the store, outbox, blob store, migrations, domain
//! services and export surface.
//!
//! Categories:
//! 1. Entity store basics: CRUD, generated fields, timestamp rules
//! 2. Sync queue: ordering, acknowledgment, append-per-mutation
//! 3. List and search: filters, sort, pagination, substring matching
//! 4. Blob store: raw blobs, image compression, key ordering
//! 5. Domain services: cascading delete, derived durations, nested
//!    read-modify-write (including the documented lost-update limitation)
//! 6. Migrations: version bumps, fatal failures, contiguity
//! 7. Export: JSON snapshot round trips, duplicate skipping, CSV
//!
//! Each test opens its own store inside a fresh temp directory.

#[cfg(test)]
pub mod tests {
    use std::io::Cursor;
    use std::thread::sleep;
    use std::time::Duration;

    use chrono::Utc;
    use image::GenericImageView;
    use serde_json::json;

    use crate::blob_store::{generate_blob_key, BlobConfig, BlobKind};
    use crate::collection::Collection;
    use crate::error::StoreError;
    use crate::export::ImportOptions;
    use crate::migration::Migration;
    use crate::models::{Contact, Interaction, Note, Performance, Reminder, SetList, Venue};
    use crate::service::DomainService;
    use crate::store::{ListOptions, LocalStore, SearchQuery, SortOrder};
    use crate::sync_queue::SyncOperationKind;

    fn open_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open(dir.path().join("store.redb"), &[]).expect("open store");
        (dir, store)
    }

    fn note(content: &str, duration: Option<u32>) -> Note {
        Note {
            content: content.to_string(),
            duration_seconds: duration,
            ..Note::default()
        }
    }

    fn contact(name: &str) -> Contact {
        Contact {
            name: name.to_string(),
            ..Contact::default()
        }
    }

    fn interaction(summary: &str) -> Interaction {
        Interaction {
            occurred_at: Utc::now(),
            medium: None,
            summary: summary.to_string(),
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    // -- 1. entity store basics --

    #[test]
    fn create_populates_id_and_timestamps() {
        let (_dir, store) = open_store();
        let created = store.create(note("joke A", None)).unwrap();

        let id = created.id.as_deref().expect("generated id");
        assert!(!id.is_empty());
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.version, Some(0));

        let queue = store.sync_queue().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].kind, SyncOperationKind::Create);
        assert_eq!(queue[0].item_id, id);
    }

    #[test]
    fn create_preserves_caller_fields() {
        let (_dir, store) = open_store();
        let mut input = note("callback to the opener", Some(45));
        input.tags = vec!["crowd-work".to_string(), "closer".to_string()];
        input.id = Some("note-1".to_string());

        let created = store.create(input).unwrap();
        assert_eq!(created.id.as_deref(), Some("note-1"));

        let read: Note = store.read("note-1").unwrap().expect("stored note");
        assert_eq!(read.content, "callback to the opener");
        assert_eq!(read.duration_seconds, Some(45));
        assert_eq!(read.tags, vec!["crowd-work", "closer"]);
    }

    #[test]
    fn read_missing_returns_none() {
        let (_dir, store) = open_store();
        assert!(store.read::<Note>("ghost").unwrap().is_none());
    }

    #[test]
    fn create_delete_read_yields_absent() {
        let (_dir, store) = open_store();
        let created = store.create(note("short-lived", None)).unwrap();
        let id = created.id.unwrap();

        store.delete(Collection::Notes, &id).unwrap();
        assert!(store.read::<Note>(&id).unwrap().is_none());
    }

    #[test]
    fn update_merges_patch_and_bumps_updated_at() {
        let (_dir, store) = open_store();
        let created = store.create(note("joke A", Some(30))).unwrap();
        let id = created.id.clone().unwrap();

        sleep(Duration::from_millis(5));
        let updated: Note = store.update(&id, json!({ "content": "joke A, tightened" })).unwrap();

        assert_eq!(updated.content, "joke A, tightened");
        assert_eq!(updated.duration_seconds, Some(30));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[test]
    fn update_missing_is_not_found() {
        let (_dir, store) = open_store();
        let err = store
            .update::<Note>("ghost", json!({ "content": "x" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn update_cannot_overwrite_id_or_created_at() {
        let (_dir, store) = open_store();
        let created = store.create(note("immutable header", None)).unwrap();
        let id = created.id.clone().unwrap();

        let updated: Note = store
            .update(
                &id,
                json!({ "id": "hijacked", "createdAt": "1999-01-01T00:00:00Z" }),
            )
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn updated_at_never_regresses() {
        let (_dir, store) = open_store();
        let future = Utc::now() + chrono::Duration::hours(1);
        let mut input = note("time traveler", None);
        input.updated_at = Some(future);

        let created = store.create(input).unwrap();
        let id = created.id.unwrap();

        let updated: Note = store.update(&id, json!({ "content": "still ahead" })).unwrap();
        assert_eq!(updated.updated_at, Some(future));
    }

    #[test]
    fn delete_missing_is_idempotent() {
        let (_dir, store) = open_store();
        store.delete(Collection::Notes, "never-existed").unwrap();
        store.delete(Collection::Notes, "never-existed").unwrap();

        // Every delete call still appends an operation.
        assert_eq!(store.sync_queue().unwrap().len(), 2);
    }

    #[test]
    fn batch_calls_write_all_rows() {
        let (_dir, store) = open_store();
        let created = store
            .create_many(vec![
                note("bit one", None),
                note("bit two", None),
                note("bit three", None),
            ])
            .unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(store.count(Collection::Notes).unwrap(), 3);

        let ids: Vec<String> = created.into_iter().map(|n| n.id.unwrap()).collect();
        store.delete_many(Collection::Notes, &ids[..2]).unwrap();
        assert_eq!(store.count(Collection::Notes).unwrap(), 1);
    }

    // -- 2. sync queue --

    #[test]
    fn queue_has_one_entry_per_mutation_in_call_order() {
        let (_dir, store) = open_store();
        let created = store.create(note("tracked", None)).unwrap();
        let id = created.id.unwrap();
        store.update::<Note>(&id, json!({ "content": "tracked v2" })).unwrap();
        store.delete(Collection::Notes, &id).unwrap();

        let queue = store.sync_queue().unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue[0].kind, SyncOperationKind::Create);
        assert_eq!(queue[1].kind, SyncOperationKind::Update);
        assert_eq!(queue[2].kind, SyncOperationKind::Delete);
        assert!(queue.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(queue.iter().all(|op| op.item_id == id));
    }

    #[test]
    fn update_operation_carries_the_patch_not_the_row() {
        let (_dir, store) = open_store();
        let created = store.create(note("full row", Some(60))).unwrap();
        let id = created.id.unwrap();
        let patch = json!({ "content": "patched" });
        store.update::<Note>(&id, patch.clone()).unwrap();

        let queue = store.sync_queue().unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[1].data.as_ref(), Some(&patch));
    }

    #[test]
    fn batch_create_emits_one_operation_per_item() {
        let (_dir, store) = open_store();
        store
            .create_many(vec![note("a", None), note("b", None), note("c", None)])
            .unwrap();
        let queue = store.sync_queue().unwrap();
        assert_eq!(queue.len(), 3);
        assert!(queue.iter().all(|op| op.kind == SyncOperationKind::Create));
    }

    #[test]
    fn acknowledgment_removes_only_the_named_operation() {
        let (_dir, store) = open_store();
        store.create(note("one", None)).unwrap();
        store.create(note("two", None)).unwrap();

        let queue = store.sync_queue().unwrap();
        store.remove_sync_operation(&queue[0].id).unwrap();

        let remaining = store.sync_queue().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, queue[1].id);

        // Acknowledgment never touches the entity tables.
        assert_eq!(store.count(Collection::Notes).unwrap(), 2);

        store.clear_sync_queue().unwrap();
        assert!(store.sync_queue().unwrap().is_empty());
        assert_eq!(store.count(Collection::Notes).unwrap(), 2);
    }

    // -- 3. list and search --

    #[test]
    fn list_filters_by_equality_and_array_membership() {
        let (_dir, store) = open_store();
        let mut tagged = note("crowd work bit", None);
        tagged.tags = vec!["crowd-work".to_string(), "opener".to_string()];
        store.create(tagged).unwrap();
        store.create(note("untagged bit", None)).unwrap();

        let options = ListOptions::default().filter("tags", "crowd-work");
        let hits: Vec<Note> = store.list(&options).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "crowd work bit");

        let options = ListOptions::default().filter("content", "untagged bit");
        let hits: Vec<Note> = store.list(&options).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn list_sorts_newest_first_by_default() {
        let (_dir, store) = open_store();
        for (content, age_secs) in [("oldest", 30), ("middle", 20), ("newest", 10)] {
            let mut n = note(content, None);
            n.created_at = Some(Utc::now() - chrono::Duration::seconds(age_secs));
            store.create(n).unwrap();
        }

        let all: Vec<Note> = store.list(&ListOptions::default()).unwrap();
        let order: Vec<&str> = all.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(order, vec!["newest", "middle", "oldest"]);

        let ascending: Vec<Note> = store
            .list(&ListOptions::default().sort_by("createdAt", SortOrder::Ascending))
            .unwrap();
        assert_eq!(ascending[0].content, "oldest");

        let page: Vec<Note> = store
            .list(&ListOptions::default().offset(1).limit(1))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "middle");
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let (_dir, store) = open_store();
        store.create(note("Airline Food opener", None)).unwrap();
        let mut tagged = note("untitled", None);
        tagged.tags = vec!["Food-Adjacent".to_string()];
        store.create(tagged).unwrap();
        store.create(note("unrelated", None)).unwrap();

        let hits: Vec<Note> = store
            .search(&SearchQuery::new("food", &["content", "tags"]))
            .unwrap();
        assert_eq!(hits.len(), 2);

        let capped: Vec<Note> = store
            .search(&SearchQuery::new("food", &["content", "tags"]).limit(1))
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn search_applies_equality_filters_first() {
        let (_dir, store) = open_store();
        let mut keeper = note("riff on airports", Some(30));
        keeper.tags = vec!["travel".to_string()];
        store.create(keeper).unwrap();
        store.create(note("riff on airports, alt take", None)).unwrap();

        let hits: Vec<Note> = store
            .search(&SearchQuery::new("riff", &["content"]).filter("tags", "travel"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].duration_seconds, Some(30));
    }

    // -- 4. blob store --

    #[test]
    fn blob_roundtrip_and_metadata() {
        let (_dir, store) = open_store();
        store.store_blob("clip-1", b"abc", "audio/mp4").unwrap();

        assert_eq!(store.get_blob("clip-1").unwrap(), Some(b"abc".to_vec()));
        let record = store.get_blob_record("clip-1").unwrap().unwrap();
        assert_eq!(record.mime_type, "audio/mp4");
        assert_eq!(record.size, 3);

        // Overwrite is silent; delete is idempotent; absence is not an error.
        store.store_blob("clip-1", b"abcdef", "audio/mp4").unwrap();
        assert_eq!(store.get_blob("clip-1").unwrap().unwrap().len(), 6);
        store.delete_blob("clip-1").unwrap();
        store.delete_blob("clip-1").unwrap();
        assert!(store.get_blob("clip-1").unwrap().is_none());
    }

    #[test]
    fn audio_is_stored_unmodified() {
        let (_dir, store) = open_store();
        let bytes: Vec<u8> = (0..255).collect();
        let key = store.store_audio(&bytes, "audio/m4a").unwrap();
        assert_eq!(store.get_blob(&key).unwrap(), Some(bytes));
    }

    #[test]
    fn oversized_image_is_downscaled_to_max_width() {
        let (_dir, store) = open_store();
        let key = store
            .store_image(&png_bytes(4000, 3000), &BlobConfig::default())
            .unwrap();

        let stored = store.get_blob(&key).unwrap().expect("compressed blob");
        let decoded = image::load_from_memory(&stored).expect("valid jpeg");
        assert!(decoded.width() <= 1920);
        assert_eq!(decoded.width(), 1920);
        assert_eq!(decoded.height(), 1440);
    }

    #[test]
    fn small_image_keeps_its_dimensions() {
        let (_dir, store) = open_store();
        let key = store
            .store_image(&png_bytes(1000, 800), &BlobConfig::default())
            .unwrap();
        let decoded = image::load_from_memory(&store.get_blob(&key).unwrap().unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1000, 800));
    }

    #[test]
    fn unreadable_image_is_a_validation_failure() {
        let (_dir, store) = open_store();
        let err = store
            .store_image(b"definitely not pixels", &BlobConfig::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn generated_blob_keys_sort_by_creation_time() {
        let first = generate_blob_key(BlobKind::Image);
        sleep(Duration::from_millis(5));
        let second = generate_blob_key(BlobKind::Image);
        assert!(first < second);
        assert!(first.starts_with("img_"));
        assert!(generate_blob_key(BlobKind::Audio).starts_with("aud_"));
    }

    // -- 5. domain services --

    #[test]
    fn deleting_a_note_cascades_into_its_blobs() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);

        let created = service.create_note(note("voice memo bit", None)).unwrap();
        let id = created.id.clone().unwrap();
        service.attach_audio_to_note(&id, b"take-1", "audio/m4a").unwrap();
        let with_audio = service.attach_audio_to_note(&id, b"take-2", "audio/m4a").unwrap();

        let keys: Vec<String> = with_audio
            .attachments
            .iter()
            .map(|a| a.blob_key.clone())
            .collect();
        assert_eq!(keys.len(), 2);

        service.delete_note(&id).unwrap();
        assert!(store.read::<Note>(&id).unwrap().is_none());
        for key in keys {
            assert!(store.get_blob(&key).unwrap().is_none());
        }
    }

    #[test]
    fn image_attachment_records_original_dimensions() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);

        let created = service.create_note(note("poster shot", None)).unwrap();
        let id = created.id.clone().unwrap();
        let updated = service
            .attach_image_to_note(&id, &png_bytes(4000, 3000))
            .unwrap();

        let attachment = &updated.attachments[0];
        assert_eq!(attachment.width, Some(4000));
        assert_eq!(attachment.height, Some(3000));

        // The stored blob itself only knows the compressed form.
        let decoded =
            image::load_from_memory(&store.get_blob(&attachment.blob_key).unwrap().unwrap())
                .unwrap();
        assert_eq!(decoded.width(), 1920);
    }

    #[test]
    fn set_list_duration_is_recomputed_on_create_and_update() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);

        let a = service.create_note(note("bit a", Some(30))).unwrap();
        let b = service.create_note(note("bit b", Some(45))).unwrap();
        let (a_id, b_id) = (a.id.unwrap(), b.id.unwrap());

        let set_list = service
            .create_set_list(SetList {
                name: "Friday night".to_string(),
                note_ids: vec![a_id.clone(), b_id],
                total_duration_seconds: 9999, // never trusted from the caller
                ..SetList::default()
            })
            .unwrap();
        assert_eq!(set_list.total_duration_seconds, 75);

        let trimmed = service
            .update_set_list(
                set_list.id.as_deref().unwrap(),
                json!({ "noteIds": [a_id] }),
            )
            .unwrap();
        assert_eq!(trimmed.total_duration_seconds, 30);
    }

    #[test]
    fn set_list_tolerates_missing_member_notes() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);
        let a = service.create_note(note("survivor", Some(20))).unwrap();

        let set_list = service
            .create_set_list(SetList {
                name: "sparse".to_string(),
                note_ids: vec![a.id.unwrap(), "deleted-note".to_string()],
                ..SetList::default()
            })
            .unwrap();
        assert_eq!(set_list.total_duration_seconds, 20);
    }

    #[test]
    fn sequential_contact_appends_both_persist_in_order() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);
        let created = service.create_contact(contact("Sam Booker")).unwrap();
        let id = created.id.unwrap();

        service.add_interaction_to_contact(&id, interaction("booked March 3rd")).unwrap();
        let after = service
            .add_interaction_to_contact(&id, interaction("confirmed the slot"))
            .unwrap();

        assert_eq!(after.interactions.len(), 2);
        assert_eq!(after.interactions[0].summary, "booked March 3rd");
        assert_eq!(after.interactions[1].summary, "confirmed the slot");

        let with_reminder = service
            .add_reminder_to_contact(
                &id,
                Reminder {
                    due_at: Utc::now(),
                    message: "send the rider".to_string(),
                    done: false,
                },
            )
            .unwrap();
        assert_eq!(with_reminder.reminders.len(), 1);
    }

    #[test]
    fn interleaved_contact_appends_lose_an_update() {
        // Documented limitation, not a correctness failure: with no per-row
        // locking, two read-modify-write callers racing on the same contact
        // end with last-write-wins.
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);
        let created = service.create_contact(contact("Riley")).unwrap();
        let id = created.id.unwrap();

        let stale_a: Contact = store.read(&id).unwrap().unwrap();
        let stale_b: Contact = store.read(&id).unwrap().unwrap();

        let mut a = stale_a;
        a.interactions.push(interaction("first caller"));
        store
            .update::<Contact>(&id, json!({ "interactions": a.interactions }))
            .unwrap();

        let mut b = stale_b;
        b.interactions.push(interaction("second caller"));
        store
            .update::<Contact>(&id, json!({ "interactions": b.interactions }))
            .unwrap();

        let survivor: Contact = store.read(&id).unwrap().unwrap();
        assert_eq!(survivor.interactions.len(), 1);
        assert_eq!(survivor.interactions[0].summary, "second caller");
    }

    #[test]
    fn validation_rejects_bad_payloads() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);

        assert!(matches!(
            service.create_note(note("   ", None)).unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            service
                .create_contact(Contact {
                    name: "No At Sign".to_string(),
                    email: Some("not-an-email".to_string()),
                    ..Contact::default()
                })
                .unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            service
                .create_performance(Performance {
                    rating: Some(9),
                    ..Performance::default()
                })
                .unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            service
                .create_venue(Venue {
                    name: "Tiny Room".to_string(),
                    capacity: Some(0),
                    ..Venue::default()
                })
                .unwrap_err(),
            StoreError::Validation(_)
        ));

        // Update validation happens before anything is written.
        let stored = service.create_note(note("fine", None)).unwrap();
        let id = stored.id.unwrap();
        assert!(matches!(
            service.update_note(&id, json!({ "content": "" })).unwrap_err(),
            StoreError::Validation(_)
        ));
        let untouched: Note = store.read(&id).unwrap().unwrap();
        assert_eq!(untouched.content, "fine");
    }

    #[test]
    fn global_search_fans_out_without_ranking() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);

        service.create_note(note("open mic tips", None)).unwrap();
        service
            .create_venue(Venue {
                name: "The Mic Drop".to_string(),
                city: Some("Austin".to_string()),
                ..Venue::default()
            })
            .unwrap();
        service.create_contact(contact("Mickey Promoter")).unwrap();

        let results = service.global_search("mic", 10).unwrap();
        assert_eq!(results.notes.len(), 1);
        assert_eq!(results.venues.len(), 1);
        assert_eq!(results.contacts.len(), 1);
        assert!(results.set_lists.is_empty());
    }

    // -- 6. migrations --

    #[test]
    fn migrations_rewrite_rows_and_bump_the_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        {
            let store = LocalStore::open(&path, &[]).unwrap();
            store.create(note("legacy row", None)).unwrap();
            assert_eq!(store.schema_version(Collection::Notes), 0);
        }

        let migrations = [Migration {
            collection: Collection::Notes,
            from_version: 0,
            apply: |row| {
                if let Some(obj) = row.as_object_mut() {
                    obj.insert("archived".to_string(), serde_json::Value::Bool(false));
                }
                Ok(())
            },
        }];

        let store = LocalStore::open(&path, &migrations).unwrap();
        assert_eq!(store.schema_version(Collection::Notes), 1);
        assert_eq!(store.schema_version(Collection::Venues), 0);

        let rows = store.scan(Collection::Notes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["archived"], serde_json::Value::Bool(false));

        // New rows are stamped with the migrated version.
        let fresh = store.create(note("post-migration", None)).unwrap();
        assert_eq!(fresh.version, Some(1));

        // Reopening with the same steps is a no-op.
        drop(store);
        let store = LocalStore::open(&path, &migrations).unwrap();
        assert_eq!(store.schema_version(Collection::Notes), 1);
    }

    #[test]
    fn failing_migration_fails_the_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        {
            let store = LocalStore::open(&path, &[]).unwrap();
            store.create(note("doomed", None)).unwrap();
        }

        let migrations = [Migration {
            collection: Collection::Notes,
            from_version: 0,
            apply: |_| Err(StoreError::validation("bad row shape")),
        }];
        let err = LocalStore::open(&path, &migrations).unwrap_err();
        assert!(matches!(err, StoreError::Migration(_)));
    }

    #[test]
    fn non_contiguous_migrations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = [Migration {
            collection: Collection::Notes,
            from_version: 1, // nothing upgrades 0 -> 1
            apply: |_| Ok(()),
        }];
        let err = LocalStore::open(dir.path().join("store.redb"), &migrations).unwrap_err();
        assert!(matches!(err, StoreError::Migration(_)));
    }

    // -- 7. export --

    #[test]
    fn snapshot_restores_counts_into_a_fresh_store() {
        let (_dir, store) = open_store();
        let service = DomainService::new(&store);
        service.create_note(note("bit one", Some(30))).unwrap();
        service.create_note(note("bit two", None)).unwrap();
        service
            .create_set_list(SetList {
                name: "tight five".to_string(),
                ..SetList::default()
            })
            .unwrap();
        service
            .create_venue(Venue {
                name: "Basement Bar".to_string(),
                ..Venue::default()
            })
            .unwrap();
        service.create_contact(contact("Alex")).unwrap();

        let snapshot = store.export_snapshot().unwrap();
        assert_eq!(snapshot.version, crate::export::SNAPSHOT_VERSION);

        // JSON round trip, then import into an empty store.
        let snapshot = crate::export::Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        let (_dir2, fresh) = open_store();
        let summary = fresh
            .import_snapshot(snapshot, &ImportOptions::default())
            .unwrap();

        assert_eq!(summary.imported, 5);
        assert_eq!(summary.skipped, 0);
        assert_eq!(fresh.count(Collection::Notes).unwrap(), 2);
        assert_eq!(fresh.count(Collection::SetLists).unwrap(), 1);
        assert_eq!(fresh.count(Collection::Venues).unwrap(), 1);
        assert_eq!(fresh.count(Collection::Contacts).unwrap(), 1);
    }

    #[test]
    fn import_skips_near_duplicates_above_threshold() {
        let (_dir, store) = open_store();
        store.create(note("the airline food bit", None)).unwrap();
        let snapshot = store.export_snapshot().unwrap();

        let summary = store
            .import_snapshot(snapshot.clone(), &ImportOptions::skip_duplicates_above(0.9))
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.imported, 0);
        assert_eq!(store.count(Collection::Notes).unwrap(), 1);

        // Without the threshold the identical row is re-imported (same id,
        // so it overwrites rather than duplicates).
        let summary = store
            .import_snapshot(snapshot, &ImportOptions::default())
            .unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(store.count(Collection::Notes).unwrap(), 1);
    }

    #[test]
    fn csv_export_escapes_rfc4180_style() {
        let (_dir, store) = open_store();
        let mut tricky = note(r#"he said "hi", twice"#, None);
        tricky.tags = vec!["needs,comma".to_string()];
        store.create(tricky).unwrap();

        let csv = store.export_csv(Collection::Notes).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,content,kind,durationSeconds,tags,createdAt,updatedAt"
        );
        let row = lines.next().unwrap();
        assert!(row.contains(r#""he said ""hi"", twice""#));
        assert!(row.contains(r#""needs,comma""#));
        assert!(lines.next().is_none());
    }
}
