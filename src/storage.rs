use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};

use crate::config::{S3Config, UploadConfig};

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "jpg", "jpeg", "png", "gif"];

/// Where uploaded supporting documents end up. Keys are bare file names.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn get_object(&self, key: &str) -> anyhow::Result<Bytes>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

pub async fn from_config(cfg: &UploadConfig) -> anyhow::Result<std::sync::Arc<dyn StorageClient>> {
    match &cfg.s3 {
        Some(s3) => {
            tracing::info!(bucket = %s3.bucket, "documents stored in s3");
            Ok(std::sync::Arc::new(S3Storage::new(s3).await?))
        }
        None => {
            tracing::info!(dir = %cfg.dir.display(), "documents stored on local disk");
            Ok(std::sync::Arc::new(LocalStorage::new(&cfg.dir).await?))
        }
    }
}

#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty() && !key.contains(&['/', '\\'][..]) && key != "." && key != "..",
            "invalid storage key {key:?}"
        );
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Bytes> {
        let path = self.path_for(key)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Bytes> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 get_object")?;
        let data = out.body.collect().await.context("s3 read body")?;
        Ok(data.into_bytes())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}

pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

pub fn allowed_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduces a client supplied file name to a safe ASCII name.
pub fn secure_filename(filename: &str) -> String {
    lazy_static! {
        static ref UNSAFE: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
    }

    let ascii: String = filename.chars().filter(char::is_ascii).collect();
    let spaced = ascii.replace(&['/', '\\'][..], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Storage key for an upload: `YYYYMMDD_HHMMSS_<sanitised name>`.
/// Falls back to `document.<ext>` when sanitising loses the stem or extension.
pub fn document_key(now: OffsetDateTime, filename: &str) -> anyhow::Result<String> {
    let stamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]_"
        ))
        .context("format upload timestamp")?;
    let mut name = secure_filename(filename);
    if let Some(ext) = extension_of(filename) {
        let keeps_ext = name
            .rsplit_once('.')
            .is_some_and(|(stem, e)| !stem.is_empty() && e.eq_ignore_ascii_case(&ext));
        if !keeps_ext {
            name = format!("document.{ext}");
        }
    }
    Ok(format!("{stamp}{name}"))
}

pub fn content_type_for(key: &str) -> &'static str {
    match extension_of(key).as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
