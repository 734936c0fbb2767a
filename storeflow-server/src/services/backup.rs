//! Tenant backup and restore
//!
//! A backup is a ZIP in object storage: one `{collection}.json` array per
//! tenant-scoped collection plus `manifest.json` with row counts and SHA-256
//! checksums of each file.
//!
//! ```text
//! backups/{storeId}/{yyyyMMdd-HHmmss}.zip
//! ├── manifest.json
//! ├── reservations.json
//! ├── prepayCustomers.json
//! └── ...
//! ```

use std::io::{Cursor, Read, Write};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use zip::ZipArchive;
use zip::write::FileOptions;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::collections;
use shared::util::now_millis;

use super::ServiceContext;
use crate::auth::Capability;
use crate::docstore::{Document, Fields, Query, STORE_ID, WriteBatch};
use crate::storage::ObjectStorage;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// Ops per committed batch during restore
const RESTORE_BATCH_SIZE: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub name: String,
    pub file: String,
    pub count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub version: u32,
    pub store_id: String,
    pub store_name: String,
    pub created_at: i64,
    pub created_by: String,
    pub collections: Vec<CollectionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub key: String,
    pub url: String,
    pub manifest: BackupManifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestoreMode {
    /// Upsert archived documents, keep everything else
    Merge,
    /// Delete the store's current documents first
    Overwrite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub removed: usize,
}

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::with_message(ErrorCode::BackupInvalid, msg)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn to_json_row(doc: &Document) -> Value {
    let mut row = doc.data.clone();
    row.insert("id".into(), Value::String(doc.id.clone()));
    Value::Object(row)
}

/// Pack rows into a ZIP. Returns the archive and its manifest entries.
pub fn build_archive(
    mut manifest: BackupManifest,
    rows: &[(&str, Vec<Value>)],
) -> AppResult<(Vec<u8>, BackupManifest)> {
    let zip_err = |e: zip::result::ZipError| AppError::internal(format!("ZIP write failed: {e}"));
    let io_err = |e: std::io::Error| AppError::internal(format!("ZIP write failed: {e}"));

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        manifest.collections.clear();
        for (name, docs) in rows {
            let json = serde_json::to_vec_pretty(docs).map_err(|e| AppError::internal(e.to_string()))?;
            let file = format!("{name}.json");
            zip.start_file(file.as_str(), options).map_err(zip_err)?;
            zip.write_all(&json).map_err(io_err)?;
            manifest.collections.push(CollectionEntry {
                name: name.to_string(),
                file,
                count: docs.len(),
                sha256: sha256_hex(&json),
            });
        }

        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| AppError::internal(e.to_string()))?;
        zip.start_file(MANIFEST_FILE, options).map_err(zip_err)?;
        zip.write_all(&json).map_err(io_err)?;
        zip.finish().map_err(zip_err)?;
    }
    Ok((buf.into_inner(), manifest))
}

/// Unpack and verify an archive: manifest present, known collections only,
/// checksums and counts match.
pub fn read_archive(bytes: &[u8]) -> AppResult<(BackupManifest, Vec<(String, Vec<Document>)>)> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| invalid(format!("Invalid ZIP: {e}")))?;

    let mut read_file = |name: &str| -> AppResult<Vec<u8>> {
        let mut file = archive
            .by_name(name)
            .map_err(|_| invalid(format!("ZIP missing {name}")))?;
        let mut out = Vec::new();
        file.read_to_end(&mut out)
            .map_err(|e| invalid(format!("Unreadable {name}: {e}")))?;
        Ok(out)
    };

    let manifest: BackupManifest = serde_json::from_slice(&read_file(MANIFEST_FILE)?)
        .map_err(|e| invalid(format!("Invalid {MANIFEST_FILE}: {e}")))?;
    if manifest.version != BACKUP_FORMAT_VERSION {
        return Err(invalid(format!("Unsupported backup version {}", manifest.version)));
    }

    let mut out = Vec::with_capacity(manifest.collections.len());
    for entry in &manifest.collections {
        if !collections::TENANT_SCOPED.contains(&entry.name.as_str()) {
            return Err(invalid(format!("Unknown collection {}", entry.name)));
        }
        let bytes = read_file(&entry.file)?;
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(invalid(format!("Checksum mismatch for {}", entry.file)));
        }
        let rows: Vec<Fields> = serde_json::from_slice(&bytes)
            .map_err(|e| invalid(format!("Invalid {}: {e}", entry.file)))?;
        if rows.len() != entry.count {
            return Err(invalid(format!("Row count mismatch for {}", entry.file)));
        }
        let docs = rows
            .into_iter()
            .map(|mut data| match data.remove("id") {
                Some(Value::String(id)) if !id.is_empty() => Ok(Document::new(id, data)),
                _ => Err(invalid(format!("Row without id in {}", entry.file))),
            })
            .collect::<AppResult<Vec<_>>>()?;
        out.push((entry.name.clone(), docs));
    }
    Ok((manifest, out))
}

/// Export every tenant-scoped collection of the current store
pub async fn create_backup(ctx: &ServiceContext, storage: &dyn ObjectStorage) -> AppResult<BackupInfo> {
    ctx.require(Capability::ViewBackup)?;

    let rows = try_join_all(collections::TENANT_SCOPED.map(|name| async move {
        let docs = ctx.scope.query(name, Query::new()).await?;
        Ok::<_, AppError>((name, docs.iter().map(to_json_row).collect::<Vec<_>>()))
    }))
    .await?;

    let manifest = BackupManifest {
        version: BACKUP_FORMAT_VERSION,
        store_id: ctx.store_id().to_string(),
        store_name: ctx.store.name.clone(),
        created_at: now_millis(),
        created_by: ctx.actor_id().to_string(),
        collections: Vec::new(),
    };
    let (archive, manifest) = build_archive(manifest, &rows)?;

    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%3f");
    let key = format!("backups/{}/{stamp}.zip", ctx.store_id());
    let size = archive.len();
    let stored = storage.put(&key, archive, "application/zip").await?;

    tracing::info!(
        store_id = %ctx.store_id(),
        key = %stored.key,
        size = size,
        rows = manifest.collections.iter().map(|c| c.count).sum::<usize>(),
        "Backup created"
    );
    Ok(BackupInfo {
        key: stored.key,
        url: stored.url,
        manifest,
    })
}

/// Archive keys of the current store, oldest first
pub async fn list_backups(ctx: &ServiceContext, storage: &dyn ObjectStorage) -> AppResult<Vec<String>> {
    ctx.require(Capability::ViewBackup)?;
    storage.list(&format!("backups/{}", ctx.store_id())).await
}

/// Restore an archive into the current store. Rows are re-stamped with this
/// store's id; a row whose id belongs to another store aborts the restore
/// before anything is written.
pub async fn restore_backup(
    ctx: &ServiceContext,
    storage: &dyn ObjectStorage,
    key: &str,
    mode: RestoreMode,
) -> AppResult<RestoreReport> {
    ctx.require(Capability::RestoreBackup)?;
    let bytes = storage.get(key).await?;
    let (manifest, data) = read_archive(&bytes)?;

    let mut writes: Vec<(String, Document)> = Vec::new();
    for (collection, docs) in data {
        for mut doc in docs {
            // Fails with CrossTenantAccess for another store's document
            ctx.scope.get(&collection, &doc.id).await?;
            doc.data.insert(STORE_ID.into(), Value::String(ctx.store_id().to_string()));
            writes.push((collection.clone(), doc));
        }
    }

    let mut report = RestoreReport::default();
    if mode == RestoreMode::Overwrite {
        let mut deletes: Vec<(&str, String)> = Vec::new();
        for name in collections::TENANT_SCOPED {
            let docs = ctx.scope.query(name, Query::new()).await?;
            deletes.extend(docs.into_iter().map(|d| (name, d.id)));
        }
        for chunk in deletes.chunks(RESTORE_BATCH_SIZE) {
            let batch = chunk
                .iter()
                .fold(WriteBatch::new(), |batch, (name, id)| batch.delete(name, id));
            ctx.scope.commit(batch).await?;
        }
        report.removed = deletes.len();
    }

    for chunk in writes.chunks(RESTORE_BATCH_SIZE) {
        let batch = chunk.iter().fold(WriteBatch::new(), |batch, (name, doc)| {
            batch.set(name, &doc.id, doc.data.clone())
        });
        ctx.scope.commit(batch).await?;
    }
    report.restored = writes.len();

    tracing::info!(
        store_id = %ctx.store_id(),
        source_store = %manifest.store_id,
        key = key,
        mode = ?mode,
        restored = report.restored,
        removed = report.removed,
        "Backup restored"
    );
    Ok(report)
}
