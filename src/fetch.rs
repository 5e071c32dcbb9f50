use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Identity, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::types::Summary;

/// Path of the summary resource relative to the kubelet base URL.
pub const SUMMARY_PATH: &str = "/stats/summary";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {}: {source}", .path.display())]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load client cert/key: {0}")]
    Identity(#[source] reqwest::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("bad status from {endpoint}: {status}")]
    BadStatus { endpoint: String, status: StatusCode },
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("failed to decode response JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// Short, stable name used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Certificate { .. } | FetchError::Identity(_) => "certificate",
            FetchError::Client(_) => "client",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Request { .. } => "request",
            FetchError::BadStatus { .. } => "status",
            FetchError::Body(_) => "body",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// Joins the configured kubelet base URL with the summary resource path.
pub fn summary_endpoint(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), SUMMARY_PATH)
}

/// GET client for the kubelet summary API, authenticating with a client
/// certificate.
///
/// The certificate pair is re-read on every call so rotated kubelet client
/// certificates are picked up without a restart. The kubelet serves a
/// self-signed certificate on the node, so the server chain is not verified.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    endpoint: String,
    cert_file: PathBuf,
    key_file: PathBuf,
    timeout: Duration,
}

impl SummaryClient {
    pub fn new(
        endpoint: impl Into<String>,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self) -> Result<Summary, FetchError> {
        self.get_json().await
    }

    /// Performs one GET and decodes the body, requiring `200 OK`.
    pub async fn get_json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        let client = self.build_client().await?;

        let response = client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::BadStatus {
                endpoint: self.endpoint.clone(),
                status,
            });
        }

        // Drain the body before decoding so the connection is released either way.
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(e)
            } else {
                FetchError::Body(e)
            }
        })?;
        debug!(endpoint = %self.endpoint, bytes = body.len(), "received kubelet summary");

        Ok(serde_json::from_slice(&body)?)
    }

    async fn build_client(&self) -> Result<Client, FetchError> {
        let pem = load_identity_pem(&self.cert_file, &self.key_file).await?;
        let identity = Identity::from_pem(&pem).map_err(FetchError::Identity)?;

        Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .danger_accept_invalid_certs(true)
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
            .map_err(FetchError::Client)
    }

    fn request_error(&self, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                endpoint: self.endpoint.clone(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Request {
                endpoint: self.endpoint.clone(),
                source,
            }
        }
    }
}

/// Reads the certificate and key into one PEM buffer. The kubelet's own
/// client credentials keep both in a single file, which is read only once.
pub async fn load_identity_pem(cert_file: &Path, key_file: &Path) -> Result<Vec<u8>, FetchError> {
    let mut pem = read_pem(cert_file).await?;
    if cert_file != key_file {
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend(read_pem(key_file).await?);
    }
    Ok(pem)
}

async fn read_pem(path: &Path) -> Result<Vec<u8>, FetchError> {
    tokio::fs::read(path).await.map_err(|source| FetchError::Certificate {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_summary_endpoint() {
        assert_eq!(
            summary_endpoint("https://127.0.0.1:10250"),
            "https://127.0.0.1:10250/stats/summary"
        );
        assert_eq!(
            summary_endpoint("https://127.0.0.1:10250/"),
            "https://127.0.0.1:10250/stats/summary"
        );
    }

    #[test]
    fn test_error_kinds() {
        let err = FetchError::BadStatus {
            endpoint: "https://n1:10250/stats/summary".to_string(),
            status: StatusCode::UNAUTHORIZED,
        };
        assert_eq!(err.kind(), "status");
        assert!(err.to_string().contains("401"));
        assert!(!err.is_timeout());

        let err = FetchError::Timeout {
            endpoint: "https://n1:10250/stats/summary".to_string(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(err.kind(), "timeout");
        assert!(err.is_timeout());

        let decode = serde_json::from_str::<Summary>("{").unwrap_err();
        assert_eq!(FetchError::from(decode).kind(), "decode");
    }

    #[tokio::test]
    async fn test_load_identity_pem_same_file_read_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "CERT\nKEY\n").unwrap();

        let pem = load_identity_pem(file.path(), file.path()).await.unwrap();
        assert_eq!(pem, b"CERT\nKEY\n");
    }

    #[tokio::test]
    async fn test_load_identity_pem_separate_files() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        let mut key = tempfile::NamedTempFile::new().unwrap();
        write!(cert, "CERT").unwrap();
        write!(key, "KEY\n").unwrap();

        let pem = load_identity_pem(cert.path(), key.path()).await.unwrap();
        assert_eq!(pem, b"CERT\nKEY\n");
    }

    #[tokio::test]
    async fn test_load_identity_pem_missing_file() {
        let err = load_identity_pem(
            Path::new("/nonexistent/client.pem"),
            Path::new("/nonexistent/client-key.pem"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "certificate");
        assert!(err.to_string().contains("/nonexistent/client.pem"));
    }
}
