//! Object-store backend with conversation/day partitioned keys.
//!
//! Keys look like `{chat_id}/{YYYY}/{MM}/{DD}/{id}.json`, using the UTC
//! date of the record's creation time. Reads only look at the trailing
//! retrieval window, so older objects stay stored but are never returned.

use crate::backend::{BackendKind, MessageBackend};
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::error::ArchiveError;
use crate::model::{ChatEventRecord, RecordId};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use futures_util::{StreamExt, TryStreamExt, stream};
use log::{debug, info, warn};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutOptions, PutPayload,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Partition used for records without a conversation id.
pub const UNASSIGNED_PARTITION: &str = "unassigned";

/// Default number of calendar days scanned on read, today included.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Default number of objects fetched concurrently on read.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// What a read does when one object cannot be listed, fetched or decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Abort the whole read with the first error.
    #[default]
    Strict,
    /// Log and skip the failing object or day.
    BestEffort,
}

/// Tuning for [`ObjectBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBackendOptions {
    /// Calendar days scanned on read, today included.
    pub window_days: u32,
    /// Error handling during reads.
    pub scan_policy: ScanPolicy,
    /// Objects fetched concurrently.
    pub fetch_concurrency: usize,
    /// Attach a `Content-Type` attribute on put. Stores without attribute
    /// support (local filesystem) need this off.
    pub tag_content_type: bool,
}

impl Default for ObjectBackendOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            scan_policy: ScanPolicy::Strict,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            tag_content_type: true,
        }
    }
}

/// Connection settings for an S3-compatible store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Options {
    /// Endpoint host, with or without scheme.
    pub endpoint: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Bucket name; must already exist.
    pub bucket: String,
    /// Signing region.
    pub region: String,
    /// Allow plain HTTP endpoints.
    pub allow_http: bool,
}

/// Message backend over an object store.
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    options: ObjectBackendOptions,
}

impl ObjectBackend {
    /// Create a backend over any object store.
    pub fn new(store: Arc<dyn ObjectStore>, options: ObjectBackendOptions) -> Self {
        Self::with_clock(store, options, Arc::new(SystemClock))
    }

    /// Create a backend with an explicit clock.
    pub fn with_clock(
        store: Arc<dyn ObjectStore>,
        options: ObjectBackendOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            options,
        }
    }

    /// In-process store, mostly for tests and dry runs.
    pub fn in_memory(options: ObjectBackendOptions) -> Self {
        Self::new(Arc::new(InMemory::new()), options)
    }

    /// Store objects as files under `root`.
    pub fn local(
        root: impl AsRef<std::path::Path>,
        mut options: ObjectBackendOptions,
    ) -> Result<Self, ArchiveError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(root)?;
        options.tag_content_type = false;
        info!("initialized local object store (root={})", root.display());
        Ok(Self::new(Arc::new(store), options))
    }

    /// Connect to an S3-compatible store and verify the bucket is reachable.
    #[cfg(feature = "s3")]
    pub async fn s3(s3: &S3Options, options: ObjectBackendOptions) -> Result<Self, ArchiveError> {
        if s3.endpoint.trim().is_empty() {
            return Err(ArchiveError::InvalidConfig(
                "object store endpoint is empty".to_string(),
            ));
        }
        if s3.bucket.trim().is_empty() {
            return Err(ArchiveError::InvalidConfig(
                "object store bucket is empty".to_string(),
            ));
        }
        let endpoint = endpoint_url(&s3.endpoint, s3.allow_http);
        let mut builder = object_store::aws::AmazonS3Builder::new()
            .with_endpoint(&endpoint)
            .with_bucket_name(&s3.bucket)
            .with_allow_http(s3.allow_http)
            .with_virtual_hosted_style_request(false);
        if !s3.region.is_empty() {
            builder = builder.with_region(&s3.region);
        }
        if !s3.access_key.is_empty() {
            builder = builder
                .with_access_key_id(&s3.access_key)
                .with_secret_access_key(&s3.secret_key);
        }
        let backend = Self::new(Arc::new(builder.build()?), options);
        backend.probe().await?;
        info!(
            "connected to object store (endpoint={}, bucket={})",
            endpoint, s3.bucket
        );
        Ok(backend)
    }

    /// Cheap reachability check against the bucket root.
    pub async fn probe(&self) -> Result<(), ArchiveError> {
        self.store.list_with_delimiter(None).await?;
        Ok(())
    }

    /// Active tuning.
    pub fn options(&self) -> &ObjectBackendOptions {
        &self.options
    }

    fn put_options(&self) -> PutOptions {
        let mut attributes = Attributes::new();
        if self.options.tag_content_type {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(codec::CONTENT_TYPE),
            );
        }
        PutOptions {
            attributes,
            ..Default::default()
        }
    }

    async fn list_day(&self, prefix: &Path) -> Result<Vec<ObjectMeta>, ArchiveError> {
        let objects: Vec<ObjectMeta> = self.store.list(Some(prefix)).try_collect().await?;
        Ok(objects)
    }

    async fn fetch(&self, location: Path) -> Result<ChatEventRecord, ArchiveError> {
        let bytes = self.store.get(&location).await?.bytes().await?;
        codec::decode(&bytes).map_err(|err| match err {
            ArchiveError::Decode(message) => ArchiveError::Decode(format!("{location}: {message}")),
            other => other,
        })
    }
}

#[async_trait]
impl MessageBackend for ObjectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Object
    }

    async fn write(&self, mut record: ChatEventRecord) -> Result<ChatEventRecord, ArchiveError> {
        let now = self.clock.now();
        let id = record.stamp(now.timestamp());
        let location = object_key(record.chat_id, now, &id);
        let bytes = codec::encode(&record)?;
        self.store
            .put_opts(&location, PutPayload::from(bytes), self.put_options())
            .await?;
        debug!("stored message object (key={})", location);
        Ok(record)
    }

    async fn read_by_conversation(
        &self,
        chat_id: i64,
    ) -> Result<Vec<ChatEventRecord>, ArchiveError> {
        let today = self.clock.now().date_naive();
        let mut locations = Vec::new();
        for date in window_dates(today, self.options.window_days) {
            let prefix = day_prefix(&chat_id.to_string(), date);
            match self.list_day(&prefix).await {
                Ok(objects) => locations.extend(objects.into_iter().map(|meta| meta.location)),
                Err(err) if self.options.scan_policy == ScanPolicy::BestEffort => {
                    warn!("skipping unreadable day (prefix={}, error={})", prefix, err);
                }
                Err(err) => return Err(err),
            }
        }

        let concurrency = self.options.fetch_concurrency.max(1);
        let fetched: Vec<(Path, Result<ChatEventRecord, ArchiveError>)> =
            stream::iter(locations)
                .map(|location| async move {
                    let result = self.fetch(location.clone()).await;
                    (location, result)
                })
                .buffered(concurrency)
                .collect()
                .await;

        let mut records = Vec::with_capacity(fetched.len());
        for (location, result) in fetched {
            match result {
                Ok(record) => records.push(record),
                Err(err) if self.options.scan_policy == ScanPolicy::BestEffort => {
                    warn!("skipping unreadable object (key={}, error={})", location, err);
                }
                Err(err) => return Err(err),
            }
        }
        records.sort_by_key(|record| record.created_at);
        debug!(
            "read message objects (chat_id={}, days={}, returned={})",
            chat_id,
            self.options.window_days,
            records.len()
        );
        Ok(records)
    }
}

/// Object key for a record created at `created`.
pub fn object_key(chat_id: Option<i64>, created: DateTime<Utc>, id: &RecordId) -> Path {
    let partition = chat_id
        .map(|chat_id| chat_id.to_string())
        .unwrap_or_else(|| UNASSIGNED_PARTITION.to_string());
    let date = created.date_naive();
    Path::from(format!(
        "{}/{id}.json",
        day_prefix_string(&partition, date)
    ))
}

/// Listing prefix for one conversation on one UTC day.
pub fn day_prefix(partition: &str, date: NaiveDate) -> Path {
    Path::from(day_prefix_string(partition, date))
}

fn day_prefix_string(partition: &str, date: NaiveDate) -> String {
    format!(
        "{partition}/{:04}/{:02}/{:02}",
        date.year(),
        date.month(),
        date.day()
    )
}

/// Days scanned on read, oldest first, ending with `today`.
pub fn window_dates(today: NaiveDate, window_days: u32) -> Vec<NaiveDate> {
    let span = u64::from(window_days.max(1));
    (0..span)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect()
}

#[cfg(feature = "s3")]
fn endpoint_url(endpoint: &str, allow_http: bool) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if allow_http {
        format!("http://{endpoint}")
    } else {
        format!("https://{endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectBackend, ObjectBackendOptions, ScanPolicy, object_key, window_dates};
    use crate::backend::MessageBackend;
    use crate::clock::FixedClock;
    use crate::error::ArchiveError;
    use crate::model::{ChatEventRecord, RecordId, UpdatePayload};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use object_store::memory::InMemory;
    use object_store::path::Path;
    use object_store::{ObjectStore, PutPayload};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn message(chat_id: i64, text: &str) -> ChatEventRecord {
        ChatEventRecord::from_update(UpdatePayload::new(json!({
            "message": { "chat": { "id": chat_id }, "text": text }
        })))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    #[test]
    fn keys_are_partitioned_by_chat_and_utc_day() {
        let created = Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).single().expect("ts");
        let key = object_key(Some(-100), created, &RecordId::new("abc"));
        assert_eq!(key.as_ref(), "-100/2024/01/05/abc.json");
        let key = object_key(None, created, &RecordId::new("abc"));
        assert_eq!(key.as_ref(), "unassigned/2024/01/05/abc.json");
    }

    #[test]
    fn window_covers_today_and_previous_six_days() {
        let days = window_dates(date(2024, 3, 2), 7);
        assert_eq!(days.first(), Some(&date(2024, 2, 25)));
        assert_eq!(days.last(), Some(&date(2024, 3, 2)));
        assert_eq!(days.len(), 7);
        assert_eq!(window_dates(date(2024, 3, 2), 0), vec![date(2024, 3, 2)]);
    }

    #[tokio::test]
    async fn reads_are_sorted_and_bounded_by_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).single().expect("ts");
        let clock = Arc::new(FixedClock::new(now));
        let backend = ObjectBackend::with_clock(
            Arc::new(InMemory::new()),
            ObjectBackendOptions::default(),
            clock.clone(),
        );

        clock.set(now - Duration::days(8));
        backend.write(message(7, "too old")).await.expect("write");
        clock.set(now - Duration::days(6));
        backend.write(message(7, "edge")).await.expect("write");
        clock.set(now);
        backend.write(message(7, "fresh")).await.expect("write");
        clock.set(now - Duration::hours(1));
        backend.write(message(7, "earlier")).await.expect("write");
        backend.write(message(8, "elsewhere")).await.expect("write");
        clock.set(now);

        let records = backend.read_by_conversation(7).await.expect("read");
        let texts: Vec<&str> = records.iter().filter_map(|r| r.text()).collect();
        assert_eq!(texts, vec!["edge", "earlier", "fresh"]);
    }

    #[tokio::test]
    async fn corrupt_object_depends_on_scan_policy() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).single().expect("ts");
        let store = Arc::new(InMemory::new());
        store
            .put(&Path::from("7/2024/06/10/broken.json"), PutPayload::from(b"{oops".to_vec()))
            .await
            .expect("put");

        let strict = ObjectBackend::with_clock(
            store.clone(),
            ObjectBackendOptions::default(),
            Arc::new(FixedClock::new(now)),
        );
        strict.write(message(7, "ok")).await.expect("write");
        let err = strict.read_by_conversation(7).await.expect_err("strict read fails");
        assert!(matches!(err, ArchiveError::Decode(message) if message.contains("broken.json")));

        let lenient = ObjectBackend::with_clock(
            store,
            ObjectBackendOptions {
                scan_policy: ScanPolicy::BestEffort,
                ..ObjectBackendOptions::default()
            },
            Arc::new(FixedClock::new(now)),
        );
        let records = lenient.read_by_conversation(7).await.expect("lenient read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text(), Some("ok"));
    }

    #[tokio::test]
    async fn local_store_round_trips_without_attributes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend =
            ObjectBackend::local(temp.path(), ObjectBackendOptions::default()).expect("local");
        assert!(!backend.options().tag_content_type);
        let stored = backend.write(message(3, "on disk")).await.expect("write");
        let records = backend.read_by_conversation(3).await.expect("read");
        assert_eq!(records, vec![stored]);
        assert!(backend.read_by_conversation(4).await.expect("read").is_empty());
    }
}
