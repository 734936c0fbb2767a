//! S3-backed object storage

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;

use shared::error::{AppError, AppResult, ErrorCode};

use super::{ObjectStorage, StoredObject, check_key};

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    /// Public URL prefix (bucket website or CDN)
    base_url: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn s3_failed(key: &str, e: impl std::fmt::Display) -> AppError {
    tracing::error!(key = key, error = %e, "S3 request failed");
    AppError::with_message(ErrorCode::FileStorageFailed, format!("Storage request failed: {e}"))
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<StoredObject> {
        check_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(bytes.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| s3_failed(key, e))?;

        tracing::info!(bucket = %self.bucket, key = key, "Object uploaded to S3");
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{}/{key}", self.base_url),
        })
    }

    async fn get(&self, key: &str) -> AppResult<Vec<u8>> {
        check_key(key)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    AppError::not_found(format!("object {key}"))
                } else {
                    s3_failed(key, e)
                }
            })?;
        let data = output.body.collect().await.map_err(|e| s3_failed(key, e))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| s3_failed(&prefix, e))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );
        }
        keys.sort();
        Ok(keys)
    }
}
