// SPDX-License-Identifier: Apache-2.0
//! file_ref
//!
//! Layer: Infrastructure
//! Purpose:
//! - `ResourceAcquirer` that stages URLs and inline payloads as files the
//!   host can read
//!
//! Notes:
//! - Local paths are handed over untouched and never removed.
//! - Staged names never overwrite: `photo.png`, `photo-1.png`, ...

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    ports::resource::{AcquiredFile, Locator, ResourceAcquirer},
};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/100.0.4896.127 Safari/537.36";

/// Fallback extension when neither the name nor the mime type gives one.
const DEFAULT_EXT: &str = "dat";

pub struct FileRefAcquirer {
    dir: PathBuf,
    http: reqwest::Client,
}

impl FileRefAcquirer {
    pub fn new(dir: PathBuf) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Resource(format!("cannot build http client: {e}")))?;
        Ok(Self { dir, http })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn stage_inline(
        &self,
        data: &[u8],
        name: Option<&str>,
        mime: Option<&str>,
    ) -> Result<PathBuf> {
        let (path, mut file) = create_unique(&self.dir, &file_name(name, mime)).await?;
        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            discard(&path).await;
            return Err(e.into());
        }
        Ok(path)
    }

    async fn download(&self, location: &str) -> Result<PathBuf> {
        let url = reqwest::Url::parse(location)
            .map_err(|e| Error::Resource(format!("invalid url {location:?}: {e}")))?;
        let fetch_err = |e: reqwest::Error| Error::Resource(format!("GET {url} failed: {e}"));

        let mut resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_err)?;

        let headers = resp.headers();
        let inferred = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_name)
            .or_else(|| url_basename(&url));
        let mime = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_string());
        let name = file_name(inferred.as_deref(), mime.as_deref());

        let (path, mut file) = create_unique(&self.dir, &name).await?;
        let copied: Result<u64> = async {
            let mut total = 0u64;
            while let Some(chunk) = resp.chunk().await.map_err(fetch_err)? {
                file.write_all(&chunk).await?;
                total += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(total)
        }
        .await;

        match copied {
            Ok(bytes) => {
                info!(%url, path=%path.display(), bytes, "resource downloaded");
                Ok(path)
            }
            Err(e) => {
                discard(&path).await;
                Err(e)
            }
        }
    }
}

impl ResourceAcquirer for FileRefAcquirer {
    fn acquire(&self, locator: Locator) -> BoxFuture<'_, Result<AcquiredFile>> {
        Box::pin(async move {
            let path = match locator {
                Locator::Path(path) => return Ok(AcquiredFile::borrowed(path)),
                Locator::Url(url) => {
                    tokio::fs::create_dir_all(&self.dir).await?;
                    self.download(&url).await?
                }
                Locator::Inline { data, name, mime } => {
                    tokio::fs::create_dir_all(&self.dir).await?;
                    self.stage_inline(&data, name.as_deref(), mime.as_deref())
                        .await?
                }
            };
            debug!(path=%path.display(), "resource staged");
            Ok(AcquiredFile::staged(path))
        })
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path=%path.display(), error=%e, "cannot remove partial file");
    }
}

/// Final file name: the given/inferred base name (or a fresh uuid), with an
/// extension from the mime type when it has none.
fn file_name(name: Option<&str>, mime: Option<&str>) -> String {
    let base = name
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if Path::new(&base).extension().is_some() {
        return base;
    }
    let ext = mime.and_then(extension_for).unwrap_or(DEFAULT_EXT);
    format!("{base}.{ext}")
}

/// Create `dir/name`, or `dir/stem-N.ext` for the first free N.
async fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let ext = as_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    for n in 0u32..10_000 {
        let candidate = if n == 0 {
            name.to_string()
        } else {
            format!("{stem}-{n}{ext}")
        };
        let path = dir.join(candidate);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Resource(format!(
        "no free file name for {name} in {}",
        dir.display()
    )))
}

/// `attachment; filename="report.pdf"` -> `report.pdf`
fn disposition_name(header: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();
    let start = lower.find("filename=")? + "filename=".len();
    let value = header[start..].split(';').next()?.trim().trim_matches('"');
    (!value.is_empty()).then(|| value.to_string())
}

fn url_basename(url: &reqwest::Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

fn extension_for(mime: &str) -> Option<&'static str> {
    let ext = match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/json" => "json",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        _ => return None,
    };
    Some(ext)
}
