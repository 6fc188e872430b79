// SPDX-License-Identifier: Apache-2.0
//! resource
//!
//! Layer: Ports
//! Purpose:
//! - turn a resource locator into a local file the host can read
//!
//! Notes:
//! - Path-based sends acquire, send, then always dispose.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::{Error, Result};

/// Where the bytes for a path-based send come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// Local file, handed to the host as-is.
    Path(PathBuf),
    /// `http://` or `https://` resource, downloaded first.
    Url(String),
    /// Inline payload, written to the staging directory first.
    Inline {
        data: Vec<u8>,
        name: Option<String>,
        mime: Option<String>,
    },
}

impl Locator {
    /// Classify a string locator: `http(s)://` URL, `data:<mime>;base64,`
    /// payload, otherwise a local path.
    pub fn parse(location: &str) -> Result<Self> {
        let lower = location.get(..8).unwrap_or(location).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Url(location.to_string()));
        }

        if let Some(rest) = location.strip_prefix("data:") {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| Error::Resource("data url without payload".into()))?;
            let mime = meta.strip_suffix(";base64").ok_or_else(|| {
                Error::Resource("only base64 data urls are supported".into())
            })?;
            let data = base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| Error::Resource(format!("invalid base64 payload: {e}")))?;
            return Ok(Self::Inline {
                data,
                name: None,
                mime: (!mime.is_empty()).then(|| mime.to_string()),
            });
        }

        Ok(Self::Path(PathBuf::from(location)))
    }

    pub fn inline(data: Vec<u8>, name: Option<String>) -> Self {
        Self::Inline {
            data,
            name,
            mime: None,
        }
    }
}

/// A materialized local file plus its disposal duty.
#[derive(Debug)]
pub struct AcquiredFile {
    path: PathBuf,
    staged: bool,
}

impl AcquiredFile {
    /// A caller-owned file; dispose leaves it alone.
    pub fn borrowed(path: PathBuf) -> Self {
        Self {
            path,
            staged: false,
        }
    }

    /// A file written into the staging directory; dispose removes it.
    pub fn staged(path: PathBuf) -> Self {
        Self { path, staged: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_staged(&self) -> bool {
        self.staged
    }

    pub async fn dispose(self) -> std::io::Result<()> {
        if !self.staged {
            return Ok(());
        }
        debug!(path=%self.path.display(), "removing staged file");
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Port for materializing send payloads.
pub trait ResourceAcquirer: Send + Sync {
    fn acquire(&self, locator: Locator) -> BoxFuture<'_, Result<AcquiredFile>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locators_are_classified() {
        assert_eq!(
            Locator::parse("https://example.com/a.png").unwrap(),
            Locator::Url("https://example.com/a.png".into())
        );
        assert_eq!(
            Locator::parse("C:\\Users\\me\\a.png").unwrap(),
            Locator::Path(PathBuf::from("C:\\Users\\me\\a.png"))
        );
        assert_eq!(
            Locator::parse("data:image/png;base64,AQID").unwrap(),
            Locator::Inline {
                data: vec![1, 2, 3],
                name: None,
                mime: Some("image/png".into()),
            }
        );
    }

    #[test]
    fn broken_data_urls_are_rejected() {
        assert!(Locator::parse("data:image/png;base64").is_err());
        assert!(Locator::parse("data:text/plain,hello").is_err());
        assert!(Locator::parse("data:image/png;base64,@@@").is_err());
    }

    #[tokio::test]
    async fn borrowed_files_survive_dispose() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        std::fs::write(&path, b"x").unwrap();

        AcquiredFile::borrowed(path.clone()).dispose().await.unwrap();
        assert!(path.exists());

        AcquiredFile::staged(path.clone()).dispose().await.unwrap();
        assert!(!path.exists());
    }
}
