use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;

use etl_core::report::object_location;

/// Where published report workbooks are listed and read from.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Short name used in log lines ("S3", "local directory").
    fn name(&self) -> &str;

    fn location(&self, key: &str) -> String;

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, String>;

    async fn read_object(&self, key: &str) -> Result<Vec<u8>, String>;
}

pub struct S3ReportSource {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl S3ReportSource {
    pub fn new(bucket: impl Into<String>, s3_client: aws_sdk_s3::Client) -> Self {
        Self {
            bucket: bucket.into(),
            s3_client,
        }
    }
}

#[async_trait]
impl ReportSource for S3ReportSource {
    fn name(&self) -> &str {
        "S3"
    }

    fn location(&self, key: &str) -> String {
        object_location(&self.bucket, key)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let mut pages = self
            .s3_client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|error| {
                format!(
                    "failed to list s3://{}/{prefix}: {}",
                    self.bucket,
                    DisplayErrorContext(&error)
                )
            })?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }
        Ok(keys)
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
        let output = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                format!(
                    "failed to read {}: {}",
                    self.location(key),
                    DisplayErrorContext(&error)
                )
            })?;
        let body = output
            .body
            .collect()
            .await
            .map_err(|error| format!("failed to read body of {}: {error}", self.location(key)))?;
        Ok(body.into_bytes().to_vec())
    }
}

/// Reads reports from a directory laid out with the same keys as the bucket.
pub struct LocalReportSource {
    root: PathBuf,
}

impl LocalReportSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ReportSource for LocalReportSource {
    fn name(&self) -> &str {
        "local directory"
    }

    fn location(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let directory = self.root.join(prefix);
        let mut entries = match tokio::fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(format!(
                    "failed to list {}: {error}",
                    directory.display()
                ))
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|error| format!("failed to list {}: {error}", directory.display()))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                keys.push(format!("{prefix}{name}"));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
        tokio::fs::read(self.root.join(key))
            .await
            .map_err(|error| format!("failed to read {}: {error}", self.location(key)))
    }
}
