//! Byte sources for payload data.
//!
//! A payload lives either in a local file (possibly the header's own file) or
//! behind an HTTP(S) locator. Remote fetches block until the full resource is
//! available or fail explicitly; retry and timeout policy belong to the
//! caller.

use crate::util::{Error, Result};
#[cfg(feature = "mmap")]
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files at or above this size are memory-mapped instead of read through a
/// buffered handle.
#[cfg(feature = "mmap")]
const MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// One resolvable payload byte source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    /// Local file path
    Local(PathBuf),
    /// HTTP/HTTPS URL
    #[cfg(feature = "network")]
    Http(String),
}

impl DataSource {
    /// Resolve a header locator string into a source.
    ///
    /// `http://` and `https://` locators become remote sources; anything else
    /// is a path, with relative paths resolved against `base_dir` (the
    /// directory holding the header file).
    pub fn resolve(locator: &str, base_dir: Option<&Path>) -> Result<Self> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            #[cfg(feature = "network")]
            return Ok(Self::Http(locator.to_string()));
            #[cfg(not(feature = "network"))]
            return Err(Error::UnresolvedPayload(format!(
                "{locator}: network support not compiled into this build"
            )));
        }
        let path = Path::new(locator);
        if path.is_absolute() {
            return Ok(Self::Local(path.to_path_buf()));
        }
        match base_dir {
            Some(dir) => Ok(Self::Local(dir.join(path))),
            None => Ok(Self::Local(path.to_path_buf())),
        }
    }

    /// Read the entire resource into memory.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            Self::Local(path) => read_local(path),
            #[cfg(feature = "network")]
            Self::Http(url) => fetch_remote(url),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            #[cfg(feature = "network")]
            Self::Http(url) => write!(f, "{url}"),
        }
    }
}

#[cfg(feature = "mmap")]
fn open_local(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

#[cfg(feature = "mmap")]
fn read_local(path: &Path) -> Result<Vec<u8>> {
    let file = open_local(path)?;
    let size = file.metadata()?.len();
    if size >= MMAP_THRESHOLD {
        debug!(path = %path.display(), size, "memory-mapping payload file");
        // Safety: file is opened read-only and unmapped before return
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| Error::UnresolvedPayload(format!("{}: mmap: {e}", path.display())))?;
        return Ok(mmap.to_vec());
    }
    std::fs::read(path).map_err(Error::Io)
}

#[cfg(not(feature = "mmap"))]
fn read_local(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

#[cfg(feature = "network")]
fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    use once_cell::sync::Lazy;

    static CLIENT: Lazy<std::result::Result<reqwest::blocking::Client, String>> =
        Lazy::new(|| {
            reqwest::blocking::Client::builder()
                .build()
                .map_err(|e| e.to_string())
        });

    debug!(url, "fetching remote payload");
    let client = CLIENT
        .as_ref()
        .map_err(|e| Error::UnresolvedPayload(format!("{url}: client: {e}")))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| Error::UnresolvedPayload(format!("{url}: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::UnresolvedPayload(format!(
            "{url}: HTTP {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .map_err(|e| Error::UnresolvedPayload(format!("{url}: {e}")))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_resolves_against_base() {
        let source = DataSource::resolve("data.raw", Some(Path::new("/scans/t1"))).unwrap();
        assert_eq!(source, DataSource::Local(PathBuf::from("/scans/t1/data.raw")));
    }

    #[test]
    fn test_absolute_path_kept() {
        let source = DataSource::resolve("/data/vol.raw", Some(Path::new("/other"))).unwrap();
        assert_eq!(source, DataSource::Local(PathBuf::from("/data/vol.raw")));
    }

    #[cfg(feature = "network")]
    #[test]
    fn test_http_locator() {
        let source = DataSource::resolve("https://example.org/vol.raw", None).unwrap();
        assert_eq!(
            source,
            DataSource::Http("https://example.org/vol.raw".to_string())
        );
    }

    #[test]
    fn test_missing_file_reported() {
        let source = DataSource::Local(PathBuf::from("/nonexistent/vol.raw"));
        assert!(matches!(
            source.read_all().unwrap_err(),
            Error::FileNotFound(_)
        ));
    }

    #[test]
    fn test_read_local_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"abc123").unwrap();
        let source = DataSource::Local(path);
        assert_eq!(source.read_all().unwrap(), b"abc123");
    }
}
