use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// StorageError
///
/// Failures surfaced by the object store. The message is passed through to
/// the admin action result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("remove failed: {0}")]
    Remove(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the cover-image bucket. The real S3 client backs it
/// in production; `MockStorageService` backs it in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Only called in `Env::Local`
    /// to provision MinIO.
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` under `key` and returns the object's public URL.
    async fn upload_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Deletes the object at `key`.
    async fn remove_object(&self, key: &str) -> Result<(), StorageError>;

    /// Name of the bucket objects live in.
    fn bucket(&self) -> &str;
}

// 2. The Real Implementation (S3/MinIO/Supabase)
/// S3StorageClient
///
/// Concrete implementation on the AWS SDK. Works against MinIO locally and
/// the Supabase storage S3 gateway in production. Path-style addressing is
/// required by both.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3StorageClient {
    /// new
    ///
    /// `public_base_url` is where objects are served from; the bucket and key
    /// are appended to build public URLs.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent for an existing bucket owned by us,
    /// so the error (already exists) is ignored.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn upload_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = sanitize_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        Ok(public_url(&self.public_base_url, &self.bucket_name, &key))
    }

    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .send()
            .await
            .map_err(|e| StorageError::Remove(e.to_string()))?;
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments from an object key so user-provided
/// file names cannot escape their prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// `{base}/{bucket}/{key}`
pub fn public_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

/// object_key_from_url
///
/// Recovers the object key from a public URL by taking everything after the
/// `/{bucket}/` path segment. Returns `None` for URLs that do not point into
/// the bucket (e.g. covers hosted elsewhere).
pub fn object_key_from_url(url: &str, bucket: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let marker = format!("/{}/", bucket);
    let path = parsed.path();
    let (_, key) = path.split_once(&marker)?;
    let key = sanitize_key(key);
    (!key.is_empty()).then_some(key)
}

/// cover_object_key
///
/// Layout of uploaded covers: `{user_id}/{unique}-{file_name}`.
pub fn cover_object_key(user_id: uuid::Uuid, unique: uuid::Uuid, file_name: &str) -> String {
    let file_name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    sanitize_key(&format!("{}/{}-{}", user_id, unique, file_name))
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory stand-in that records what was uploaded and removed so tests
/// can assert on it.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    uploaded: Arc<Mutex<Vec<String>>>,
    removed: Arc<Mutex<Vec<String>>>,
}

pub const MOCK_PUBLIC_BASE: &str = "http://localhost:9000";
pub const MOCK_BUCKET: &str = "covers";

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploaded.lock().map(|keys| keys.clone()).unwrap_or_default()
    }

    pub fn removed_keys(&self) -> Vec<String> {
        self.removed.lock().map(|keys| keys.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn upload_object(
        &self,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Upload("Mock Storage Error: Simulation requested".to_string()));
        }
        let key = sanitize_key(key);
        if let Ok(mut uploaded) = self.uploaded.lock() {
            uploaded.push(key.clone());
        }
        Ok(public_url(MOCK_PUBLIC_BASE, MOCK_BUCKET, &key))
    }

    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Remove("Mock Storage Error: Simulation requested".to_string()));
        }
        if let Ok(mut removed) = self.removed.lock() {
            removed.push(sanitize_key(key));
        }
        Ok(())
    }

    fn bucket(&self) -> &str {
        MOCK_BUCKET
    }
}

/// StorageState
///
/// The concrete type used to share storage access across the application state.
pub type StorageState = Arc<dyn StorageService>;
