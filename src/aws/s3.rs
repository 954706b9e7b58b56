// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::{load_aws_config, Arn};
use crate::common::{Error, OobConfig};
use crate::paginate::{ListPage, Page, Paginator, REMOTE_MAX_PAGE_SIZE};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::types::{Delete, ObjectIdentifier, RestoreRequest};
use aws_sdk_s3::Client;
use std::path::Path;
use urlencoding::encode;

/// A convenient alias for S3 client so consuming code doesn't need to add it to `Cargo.toml`
pub type S3Client = aws_sdk_s3::Client;

/// Creates an S3 client.
pub async fn new_s3_client(oob_config: &OobConfig) -> S3Client {
    let aws_config = load_aws_config(oob_config).await;
    Client::new(&aws_config)
}

/// An S3 bucket.
#[derive(Clone, Debug)]
pub struct S3Bucket {
    client: S3Client,
    name: String,
}

impl S3Bucket {
    /// A bucket identified by name.
    pub fn new(client: &S3Client, name: &str) -> Result<Self, Error> {
        if name.is_empty() || name.contains(['/', ':']) {
            return Err(Error::config(format!("{name}: invalid bucket name")));
        }
        Ok(Self {
            client: client.clone(),
            name: name.to_string(),
        })
    }

    /// A bucket identified by ARN, e.g. `arn:aws:s3:::my-bucket`.
    pub fn from_arn(client: &S3Client, arn: &str) -> Result<Self, Error> {
        let arn: Arn = arn.parse::<Arn>()?.expect_service("s3")?;
        Self::new(client, &arn.resource)
    }

    /// Bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket ARN.
    pub fn arn(&self) -> Arn {
        Arn::new("s3", "", "", &self.name)
    }

    /// Region the bucket lives in. Buckets in `us-east-1` report no location
    /// constraint, which is returned as `None`.
    pub async fn region(&self) -> Result<Option<String>, Error> {
        let output = self
            .client
            .get_bucket_location()
            .bucket(&self.name)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("get_bucket_location({})", self.name)))?;
        Ok(output
            .location_constraint
            .map(|constraint| constraint.as_str().to_string())
            .filter(|region| !region.is_empty()))
    }

    /// Checks that the bucket exists and is accessible.
    pub async fn head(&self) -> Result<(), Error> {
        self.client
            .head_bucket()
            .bucket(&self.name)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("head_bucket({})", self.name)))?;
        Ok(())
    }

    /// The object at `key`. No remote call is made.
    pub fn object(&self, key: &str) -> S3Object {
        S3Object::new(&self.client, &self.name, key)
    }

    /// Uploads a local file to `key`.
    pub async fn upload_file(&self, path: impl AsRef<Path>, key: &str) -> Result<S3Object, Error> {
        let path = path.as_ref();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("read({})", path.display())))?;
        self.client
            .put_object()
            .bucket(&self.name)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("upload_file({}, {key})", self.name)))?;
        Ok(self.object(key))
    }

    /// Puts bytes at `key`.
    pub async fn put_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<S3Object, Error> {
        self.client
            .put_object()
            .bucket(&self.name)
            .content_type(content_type)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("put_bytes({}, {key})", self.name)))?;
        Ok(self.object(key))
    }

    /// The `ListPage` capability for this bucket's keys.
    pub fn key_lister(&self) -> S3KeyLister {
        S3KeyLister {
            client: self.client.clone(),
            bucket: self.name.clone(),
        }
    }

    /// A paginator over keys starting with `prefix`, yielding pages of at most
    /// `page_size` keys and at most `max_keys` keys in total (`None` for all).
    pub fn list_keys_paginator(
        &self,
        prefix: &str,
        page_size: usize,
        max_keys: Option<usize>,
    ) -> Result<Paginator<S3KeyLister>, Error> {
        Ok(Paginator::new(self.key_lister(), page_size)?
            .max_items(max_keys)
            .filter(prefix))
    }

    /// Lists keys starting with `prefix`, at most `max_keys` of them (`None` for all).
    pub async fn list_keys(&self, prefix: &str, max_keys: Option<usize>) -> Result<Vec<String>, Error> {
        self.list_keys_paginator(prefix, REMOTE_MAX_PAGE_SIZE, max_keys)?
            .collect_items()
            .await
    }

    /// Deletes the object at `key`.
    pub async fn delete_object(&self, key: &str) -> Result<(), Error> {
        self.object(key).delete().await
    }

    /// Deletes every object whose key starts with `prefix`, one `DeleteObjects`
    /// call per listed page. Keys S3 refused to delete are reported in the summary.
    pub async fn delete_directory(&self, prefix: &str) -> Result<S3DeleteSummary, Error> {
        let mut paginator = self.list_keys_paginator(prefix, REMOTE_MAX_PAGE_SIZE, None)?;
        let mut summary = S3DeleteSummary::default();
        while let Some(page) = paginator.next_page().await {
            let keys = page?;
            if keys.is_empty() {
                continue;
            }
            let output = self
                .client
                .delete_objects()
                .bucket(&self.name)
                .delete(delete_request(&keys)?)
                .send()
                .await
                .map_err(|e| Error::Anyhow(e.into(), format!("delete_objects({}/{prefix})", self.name)))?;
            let failures = output
                .errors
                .unwrap_or_default()
                .into_iter()
                .map(|e| {
                    let reason = e.message.or(e.code).unwrap_or_default();
                    (e.key.unwrap_or_default(), reason)
                })
                .collect();
            summary.record(keys.len(), failures);
        }
        Ok(summary)
    }
}

/// Outcome of `S3Bucket::delete_directory`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct S3DeleteSummary {
    /// Objects deleted.
    pub deleted: usize,
    /// `(key, reason)` for every object S3 did not delete.
    pub failed: Vec<(String, String)>,
}

impl S3DeleteSummary {
    pub(crate) fn record(&mut self, requested: usize, failures: Vec<(String, String)>) {
        self.deleted += requested.saturating_sub(failures.len());
        self.failed.extend(failures);
    }

    /// Whether every listed object was deleted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Quiet `DeleteObjects` request body for one page of keys.
pub(crate) fn delete_request(keys: &[String]) -> Result<Delete, Error> {
    let objects = keys
        .iter()
        .map(|key| {
            ObjectIdentifier::builder()
                .key(key)
                .build()
                .map_err(|e| Error::Anyhow(e.into(), format!("object_identifier({key})")))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Delete::builder()
        .set_objects(Some(objects))
        .quiet(true)
        .build()
        .map_err(|e| Error::Anyhow(e.into(), "delete_request".to_string()))
}

/// Keys of one `ListObjectsV2` response. The continuation token is only
/// followed while S3 reports the listing as truncated.
pub(crate) fn key_page(output: ListObjectsV2Output) -> Page<String> {
    let items = output
        .contents
        .unwrap_or_default()
        .into_iter()
        .filter_map(|object| object.key)
        .collect();
    let next_token = if output.is_truncated.unwrap_or(false) {
        output.next_continuation_token
    } else {
        None
    };
    Page { items, next_token }
}

/// Lists object keys with `ListObjectsV2`. The paginator's filter is used as the key prefix.
#[derive(Clone, Debug)]
pub struct S3KeyLister {
    client: S3Client,
    bucket: String,
}

#[async_trait]
impl ListPage for S3KeyLister {
    type Item = String;
    type Error = Error;

    async fn list_page(
        &self,
        continuation_token: Option<&str>,
        page_size: usize,
        filter: Option<&str>,
    ) -> Result<Page<String>, Error> {
        let max_keys = i32::try_from(page_size.min(REMOTE_MAX_PAGE_SIZE)).unwrap_or(1000);
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(filter.map(str::to_owned))
            .max_keys(max_keys)
            .set_continuation_token(continuation_token.map(str::to_owned))
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("list_objects_v2({})", self.bucket)))?;
        Ok(key_page(output))
    }
}

/// Metadata returned by `HEAD` on an object.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct S3ObjectAttributes {
    /// Size in bytes.
    pub content_length: Option<i64>,
    /// MIME type.
    pub content_type: Option<String>,
    /// Entity tag.
    pub e_tag: Option<String>,
    /// Last modification, seconds since the Unix epoch.
    pub last_modified: Option<i64>,
    /// Storage class, e.g. `GLACIER`.
    pub storage_class: Option<String>,
}

/// An object (or folder marker) in an S3 bucket.
#[derive(Clone, Debug)]
pub struct S3Object {
    client: S3Client,
    bucket: String,
    key: String,
}

impl S3Object {
    /// The object at `bucket`/`key`. No remote call is made.
    pub fn new(client: &S3Client, bucket: &str, key: &str) -> Self {
        Self {
            client: client.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Bucket name.
    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    /// Object key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `s3://bucket/key`
    pub fn url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// Last path segment of the key (empty for folder markers).
    pub fn filename(&self) -> &str {
        key_filename(&self.key)
    }

    /// Path segments of the key before the filename.
    pub fn prefix(&self) -> Vec<&str> {
        key_prefix(&self.key)
    }

    /// Extension of the filename, or the whole filename if it has none.
    pub fn suffix(&self) -> &str {
        key_suffix(&self.key)
    }

    /// Whether the key is a folder marker (ends with `/`).
    pub fn is_folder(&self) -> bool {
        self.key.ends_with('/')
    }

    /// Fetches the object's metadata.
    pub async fn attributes(&self) -> Result<S3ObjectAttributes, Error> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("head_object({})", self.url())))?;
        Ok(S3ObjectAttributes {
            content_length: output.content_length,
            content_type: output.content_type,
            e_tag: output.e_tag,
            last_modified: output.last_modified.map(|t| t.secs()),
            storage_class: output.storage_class.map(|c| c.as_str().to_string()),
        })
    }

    /// Downloads the whole object into memory.
    pub async fn download_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("get_object({})", self.url())))?;

        let mut buf: Vec<u8> = Vec::new();
        while let Some(bytes) = object
            .body
            .try_next()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("s3_try_next({})", self.url())))?
        {
            buf.extend_from_slice(&bytes);
        }
        Ok(buf)
    }

    /// First line of the object (without its terminator), read with a ranged
    /// `GET` of at most `max_bytes`.
    pub async fn first_line(&self, max_bytes: usize) -> Result<String, Error> {
        let last = max_bytes.max(1) - 1;
        let mut object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .range(format!("bytes=0-{last}"))
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("get_object_range({})", self.url())))?;

        let mut buf: Vec<u8> = Vec::new();
        while let Some(bytes) = object
            .body
            .try_next()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("s3_try_next({})", self.url())))?
        {
            buf.extend_from_slice(&bytes);
            if buf.contains(&b'\n') {
                break;
            }
        }
        Ok(head_line(&buf))
    }

    /// Downloads the object to a local file.
    pub async fn download_to(&self, dest: impl AsRef<Path>) -> Result<(), Error> {
        let dest = dest.as_ref();
        let data = self.download_bytes().await?;
        tokio::fs::write(dest, data)
            .await
            .map_err(|e| Error::Io(e, format!("{}", dest.display())))
    }

    /// Server-side copy to `bucket`/`key`.
    pub async fn copy_to(&self, bucket: &str, key: &str) -> Result<S3Object, Error> {
        self.client
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(copy_source(&self.bucket, &self.key))
            .send()
            .await
            .map_err(|e| {
                Error::Anyhow(
                    e.into(),
                    format!("copy_object({} -> s3://{bucket}/{key})", self.url()),
                )
            })?;
        Ok(S3Object::new(&self.client, bucket, key))
    }

    /// Copy to `bucket`/`key`, then delete this object.
    pub async fn move_to(&self, bucket: &str, key: &str) -> Result<S3Object, Error> {
        let moved = self.copy_to(bucket, key).await?;
        self.delete().await?;
        Ok(moved)
    }

    /// Deletes the object.
    pub async fn delete(&self) -> Result<(), Error> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("delete_object({})", self.url())))?;
        Ok(())
    }

    /// Restores an archived object for `days` days.
    pub async fn restore(&self, days: i32) -> Result<(), Error> {
        self.client
            .restore_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .restore_request(RestoreRequest::builder().days(days).build())
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("restore_object({})", self.url())))?;
        Ok(())
    }
}

pub(crate) fn key_filename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or_default()
}

pub(crate) fn key_prefix(key: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = key.split('/').collect();
    segments.pop();
    segments
}

pub(crate) fn key_suffix(key: &str) -> &str {
    let filename = key_filename(key);
    filename.rsplit('.').next().unwrap_or(filename)
}

/// `CopySource` value: the bucket followed by the URL encoded key, keeping `/`.
pub(crate) fn copy_source(bucket: &str, key: &str) -> String {
    let key = key
        .split('/')
        .map(|segment| encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{key}")
}

/// Text before the first line break, without a UTF-8 byte order mark.
pub(crate) fn head_line(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
    let line = String::from_utf8_lossy(&bytes[..end]);
    line.trim_start_matches('\u{feff}')
        .trim_end_matches('\r')
        .to_string()
}
