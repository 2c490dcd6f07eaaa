//! S3 backend for state storage

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use bytes::Bytes;

use crate::backend::{BackendConfig, BackendError, BackendResult, BlobStore, LockStore};
use crate::key::ResourceKey;
use crate::lock::LockInfo;

/// S3-based backend
///
/// State objects are stored at `{prefix}{key}` and lock records at
/// `{prefix}{key}.lock`.
pub struct S3Backend {
    /// S3 client
    client: Client,
    /// Bucket name
    bucket: String,
    /// Prefix prepended to every object key
    prefix: String,
    /// Whether to encrypt stored objects (default: true)
    encrypt: bool,
}

impl S3Backend {
    /// Create a new S3Backend from configuration
    pub async fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let bucket = config
            .get_string("bucket")
            .ok_or_else(|| BackendError::configuration("Missing required attribute: bucket"))?
            .to_string();

        let region = config
            .get_string("region")
            .ok_or_else(|| BackendError::configuration("Missing required attribute: region"))?
            .to_string();

        let prefix = normalize_prefix(config.get_string("prefix").unwrap_or_default());
        let encrypt = config.get_bool_or("encrypt", true);

        // Load AWS config with the specified region
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .load()
            .await;

        let client = Client::new(&aws_config);

        Ok(Self {
            client,
            bucket,
            prefix,
            encrypt,
        })
    }

    /// Fail early if the bucket is missing
    pub async fn init(&self) -> BackendResult<()> {
        let result = self.client.head_bucket().bucket(&self.bucket).send().await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                if is_not_found_error(&err) {
                    Err(BackendError::BucketNotFound(self.bucket.clone()))
                } else {
                    Err(BackendError::Aws(err.to_string()))
                }
            }
        }
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn lock_object_key(&self, key: &str) -> String {
        self.object_key(&ResourceKey::lock_key(key))
    }

    async fn get_object(&self, object_key: String) -> BackendResult<Option<Bytes>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| BackendError::Io(e.to_string()))?;
                Ok(Some(body.into_bytes()))
            }
            Err(err) => {
                // NoSuchKey is the normal "nothing stored yet" case
                if is_not_found_error(&err) {
                    Ok(None)
                } else {
                    Err(BackendError::Aws(err.to_string()))
                }
            }
        }
    }

    async fn put_object(&self, object_key: String, body: Bytes) -> BackendResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .body(ByteStream::from(body))
            .content_type("application/json");

        if self.encrypt {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request
            .send()
            .await
            .map_err(|e| BackendError::Aws(e.to_string()))?;

        Ok(())
    }

    async fn delete_object(&self, object_key: String) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|e| BackendError::Aws(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3Backend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        self.get_object(self.object_key(key)).await
    }

    async fn put(&self, key: &str, body: Bytes) -> BackendResult<()> {
        self.put_object(self.object_key(key), body).await
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.delete_object(self.object_key(key)).await
    }
}

#[async_trait]
impl LockStore for S3Backend {
    async fn load(&self, key: &str) -> BackendResult<Option<LockInfo>> {
        let Some(bytes) = self.get_object(self.lock_object_key(key)).await? else {
            return Ok(None);
        };

        let lock = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::InvalidLock(e.to_string()))?;
        Ok(Some(lock))
    }

    async fn save(&self, key: &str, lock: &LockInfo) -> BackendResult<()> {
        let body = serde_json::to_vec_pretty(lock)
            .map_err(|e| BackendError::Serialization(e.to_string()))?;

        self.put_object(self.lock_object_key(key), Bytes::from(body))
            .await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        self.delete_object(self.lock_object_key(key)).await
    }
}

/// Ensure a non-empty prefix ends with exactly one '/'
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Check if an S3 error is a "not found" error
fn is_not_found_error<E: std::fmt::Debug>(err: &aws_sdk_s3::error::SdkError<E>) -> bool {
    // Check the raw HTTP response status
    if let Some(raw) = err.raw_response() {
        return raw.status().as_u16() == 404;
    }
    false
}
