//! Reading manifests from URLs or local paths

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

/// Source of remote manifests and cluster templates
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<String>;
}

/// Fetches `http(s)://` URLs over the network and everything else from disk
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[async_trait]
impl ManifestFetcher for HttpFetcher {
    async fn fetch(&self, source: &str) -> Result<String> {
        let fail = |message: String| Error::Fetch {
            url: source.to_string(),
            message,
        };

        if !is_remote(source) {
            let path = source.strip_prefix("file://").unwrap_or(source);
            debug!(path = %path, "reading manifest from disk");
            return tokio::fs::read_to_string(path)
                .await
                .map_err(|e| fail(e.to_string()));
        }

        debug!(url = %source, "downloading manifest");
        let response = self
            .client
            .get(source)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| fail(e.to_string()))?;
        response.text().await.map_err(|e| fail(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/a.yaml"));
        assert!(is_remote("http://example.com/a.yaml"));
        assert!(!is_remote("file:///tmp/a.yaml"));
        assert!(!is_remote("./cluster-template.yaml"));
    }

    #[tokio::test]
    async fn test_fetch_local_file_and_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.yaml");
        std::fs::write(&path, "kind: Cluster\n").unwrap();

        let fetcher = HttpFetcher::new();
        let plain = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        let url = fetcher
            .fetch(&format!("file://{}", path.display()))
            .await
            .unwrap();
        assert_eq!(plain, "kind: Cluster\n");
        assert_eq!(url, plain);
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let err = HttpFetcher::new()
            .fetch("/nonexistent/knest/template.yaml")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
