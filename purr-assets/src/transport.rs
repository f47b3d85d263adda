//! Sources of raw GIF bytes

use crate::TransportError;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Fetches the raw bytes behind a source string
pub trait Transport: Send + Sync {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(source)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(source)
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for the whole request, body included
    pub timeout: Duration,
    /// Responses larger than this are rejected
    pub max_body_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Downloads `http://` and `https://` sources
pub struct HttpTransport {
    agent: ureq::Agent,
    max_body_bytes: u64,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self {
            agent,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, TransportError> {
        if !is_remote(source) {
            return Err(TransportError::UnsupportedSource(source.to_string()));
        }

        debug!("GET {}", source);
        let mut response = self.agent.get(source).call()?;
        let bytes = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_vec()?;
        debug!("Received {} bytes from {}", bytes.len(), source);
        Ok(bytes)
    }
}

/// Reads local files, optionally relative to a base directory
#[derive(Debug, Clone, Default)]
pub struct FileTransport {
    base: Option<PathBuf>,
}

impl FileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative sources against `base`
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn resolve(&self, source: &str) -> Result<PathBuf, TransportError> {
        let path = source.strip_prefix("file://").unwrap_or(source);
        if path.is_empty() {
            return Err(TransportError::UnsupportedSource(source.to_string()));
        }

        let path = Path::new(path);
        Ok(match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl Transport for FileTransport {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, TransportError> {
        let path = self.resolve(source)?;
        debug!("Reading {}", path.display());
        Ok(std::fs::read(path)?)
    }
}

/// Sends `http://` and `https://` sources over HTTP and everything else to
/// the filesystem
#[derive(Default)]
pub struct AutoTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl AutoTransport {
    pub fn new(http: HttpConfig) -> Self {
        Self {
            http: HttpTransport::new(http),
            file: FileTransport::new(),
        }
    }

    /// Replaces the filesystem side
    pub fn with_file_transport(mut self, file: FileTransport) -> Self {
        self.file = file;
        self
    }
}

impl Transport for AutoTransport {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, TransportError> {
        if is_remote(source) {
            self.http.fetch(source)
        } else {
            self.file.fetch(source)
        }
    }
}

fn is_remote(source: &str) -> bool {
    let lower = source.get(..8).unwrap_or(source).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("http://example.com/cat.gif"));
        assert!(is_remote("HTTPS://example.com/cat.gif"));
        assert!(!is_remote("cat.gif"));
        assert!(!is_remote("/tmp/http://cat.gif"));
        assert!(!is_remote("file:///tmp/cat.gif"));
        assert!(!is_remote(""));
    }

    #[test]
    fn test_file_transport_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cat.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let transport = FileTransport::new();
        let source = path.to_str().unwrap();
        assert_eq!(transport.fetch(source).unwrap(), b"GIF89a");
        assert_eq!(
            transport.fetch(&format!("file://{}", source)).unwrap(),
            b"GIF89a"
        );
    }

    #[test]
    fn test_file_transport_base_dir() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("emotes")).unwrap();
        std::fs::write(dir.path().join("emotes/wave.gif"), b"wave").unwrap();

        let transport = FileTransport::with_base(dir.path());
        assert_eq!(transport.fetch("emotes/wave.gif").unwrap(), b"wave");
    }

    #[test]
    fn test_file_transport_missing_file() {
        let dir = tempdir().unwrap();
        let transport = FileTransport::with_base(dir.path());

        assert!(matches!(
            transport.fetch("missing.gif"),
            Err(TransportError::Io(_))
        ));
        assert!(matches!(
            transport.fetch(""),
            Err(TransportError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_http_transport_rejects_local_sources() {
        let transport = HttpTransport::default();
        assert!(matches!(
            transport.fetch("/tmp/cat.gif"),
            Err(TransportError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_auto_transport_uses_filesystem() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.gif"), b"abc").unwrap();

        let transport = AutoTransport::new(HttpConfig::default())
            .with_file_transport(FileTransport::with_base(dir.path()));
        assert_eq!(transport.fetch("a.gif").unwrap(), b"abc");
    }

    #[test]
    fn test_shared_transport() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.gif"), b"abc").unwrap();

        let transport: Arc<dyn Transport> = Arc::new(FileTransport::with_base(dir.path()));
        assert_eq!(transport.fetch("a.gif").unwrap(), b"abc");
    }
}
