//! Key-addressed binary storage for media attachments.
//!
//! Blobs live beside the entity tables in the same database file: raw bytes
//! in `blobs`, metadata in `blob_meta`. A blob is owned independently of any
//! entity: an entity only stores the blob key as a string reference, and the
//! domain layer is responsible for cascading cleanup.
//!
//! Images are downscaled and re-encoded before storage to bound growth; the
//! blob store does not remember pre-compression dimensions. Audio is stored
//! unmodified.

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use log::debug;
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{LocalStore, BLOBS_TABLE, BLOB_META_TABLE};

/// Kind prefix for generated blob keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Image,
    Audio,
}

impl BlobKind {
    const fn prefix(self) -> &'static str {
        match self {
            BlobKind::Image => "img",
            BlobKind::Audio => "aud",
        }
    }
}

/// Metadata kept for every stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRecord {
    pub key: String,
    pub mime_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Image compression bounds. Width is capped at `max_image_width` pixels and
/// the result is re-encoded as JPEG at `image_quality` (0–100).
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub max_image_width: u32,
    pub image_quality: u8,
}

impl Default for BlobConfig {
    fn default() -> Self {
        BlobConfig {
            max_image_width: 1920,
            image_quality: 80,
        }
    }
}

/// Builds a globally unique blob key: kind prefix, then creation time, then a
/// random id. Keys of the same kind sort lexically by creation time.
pub fn generate_blob_key(kind: BlobKind) -> String {
    format!(
        "{}_{:013}_{}",
        kind.prefix(),
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

impl LocalStore {
    /// Stores raw bytes under `key`, silently overwriting any existing blob
    /// with the same key. Returns the key.
    pub fn store_blob(&self, key: &str, bytes: &[u8], mime_type: &str) -> StoreResult<String> {
        let record = BlobRecord {
            key: key.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
            created_at: Utc::now(),
        };
        let meta = serde_json::to_vec(&record)?;

        let txn = self.db.begin_write()?;
        {
            let mut data = txn.open_table(BLOBS_TABLE)?;
            data.insert(key, bytes)?;
            let mut meta_table = txn.open_table(BLOB_META_TABLE)?;
            meta_table.insert(key, meta.as_slice())?;
        }
        txn.commit()?;
        debug!("stored blob {key} ({} bytes, {mime_type})", bytes.len());
        Ok(key.to_string())
    }

    /// Raw bytes for `key`; `None` when absent (absence is not an error).
    pub fn get_blob(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BLOBS_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    /// Metadata for `key`; `None` when absent.
    pub fn get_blob_record(&self, key: &str) -> StoreResult<Option<BlobRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BLOB_META_TABLE)?;
        match table.get(key)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Removes a blob and its metadata. Idempotent.
    pub fn delete_blob(&self, key: &str) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut data = txn.open_table(BLOBS_TABLE)?;
            data.remove(key)?;
            let mut meta = txn.open_table(BLOB_META_TABLE)?;
            meta.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Compresses and stores an image, returning the generated key.
    ///
    /// The image is downscaled so its width is at most
    /// `config.max_image_width` (aspect ratio preserved) and re-encoded as
    /// JPEG at `config.image_quality`, trading fidelity for bounded storage.
    /// Callers that care about the original pixel dimensions must record them
    /// as entity metadata before calling this.
    pub fn store_image(&self, bytes: &[u8], config: &BlobConfig) -> StoreResult<String> {
        let img = image::load_from_memory(bytes)
            .map_err(|err| StoreError::validation(format!("unreadable image payload: {err}")))?;

        let (width, height) = img.dimensions();
        let img = if width > config.max_image_width {
            let scaled_height = ((height as u64 * config.max_image_width as u64) / width as u64)
                .max(1) as u32;
            debug!("downscaling image {width}x{height} -> {}x{scaled_height}", config.max_image_width);
            img.resize_exact(
                config.max_image_width,
                scaled_height,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            img
        };

        let rgb = img.to_rgb8();
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, config.image_quality)
            .encode_image(&rgb)
            .map_err(|err| StoreError::Storage(format!("jpeg encode failed: {err}")))?;

        let key = generate_blob_key(BlobKind::Image);
        self.store_blob(&key, &encoded, "image/jpeg")
    }

    /// Stores an audio clip unmodified (no transcoding) under a generated
    /// key.
    pub fn store_audio(&self, bytes: &[u8], mime_type: &str) -> StoreResult<String> {
        let key = generate_blob_key(BlobKind::Audio);
        self.store_blob(&key, bytes, mime_type)
    }
}
