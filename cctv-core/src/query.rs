//! Batch snapshot query.
//!
//! Fetches a handful of extracted frames from the backend for the
//! results view. Request/response only; this is not part of the
//! streaming path.
//!
//! Response body:
//! ```json
//! { "snaps": ["<base64 jpeg>", "<base64 jpeg>", "..."] }
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::StreamError;

/// Default snapshot endpoint of the backend.
pub const DEFAULT_SNAPS_URL: &str = "http://localhost:8000/ws/get_snaps";

#[derive(Debug, Deserialize)]
struct SnapsResponse {
    snaps: Vec<String>,
}

/// HTTP client for the snapshot endpoint.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http: reqwest::Client,
    url: String,
}

impl SnapshotClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the extracted frames for `query`.
    ///
    /// The query text is forwarded as the `q` parameter; the backend is
    /// free to ignore it.
    pub async fn fetch(&self, query: &str) -> Result<Vec<Bytes>, StreamError> {
        info!(url = %self.url, query, "fetching extracted frames");
        let body = self
            .http
            .get(&self.url)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let snaps = decode_snaps(&body)?;
        debug!(count = snaps.len(), "extracted frames received");
        Ok(snaps)
    }
}

/// Parse a snapshot response body into raw image bytes.
pub fn decode_snaps(body: &str) -> Result<Vec<Bytes>, StreamError> {
    let response: SnapsResponse = serde_json::from_str(body)?;
    response
        .snaps
        .iter()
        .map(|snap| -> Result<Bytes, StreamError> { Ok(Bytes::from(STANDARD.decode(snap)?)) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn decodes_snaps() {
        let body = r#"{"snaps": ["/9j/AA==", "aGVsbG8="]}"#;
        let snaps = assert_ok!(decode_snaps(body));
        assert_eq!(snaps.len(), 2);
        assert_eq!(&snaps[0][..], &[0xFF, 0xD8, 0xFF, 0x00]);
        assert_eq!(&snaps[1][..], b"hello");
    }

    #[test]
    fn empty_list_is_fine() {
        let snaps = assert_ok!(decode_snaps(r#"{"snaps": []}"#));
        assert!(snaps.is_empty());
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(matches!(
            assert_err!(decode_snaps(r#"{"snaps": ["%%%"]}"#)),
            StreamError::Base64(_)
        ));
        assert!(matches!(
            assert_err!(decode_snaps("not json")),
            StreamError::Json(_)
        ));
        assert!(matches!(
            assert_err!(decode_snaps(r#"{"frames": []}"#)),
            StreamError::Json(_)
        ));
    }

    /// Serve exactly one canned HTTP response and hand back the request line.
    async fn one_shot_server(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ws/get_snaps", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let text = String::from_utf8_lossy(&request).into_owned();
            text.lines().next().unwrap_or_default().to_string()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn fetch_forwards_query_and_decodes() {
        let (url, server) = one_shot_server("200 OK", r#"{"snaps": ["aGVsbG8="]}"#).await;
        let client = SnapshotClient::new(url);

        let snaps = client.fetch("person in red").await.unwrap();
        assert_eq!(snaps, vec![Bytes::from_static(b"hello")]);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /ws/get_snaps?q=person"), "{request_line}");
    }

    #[tokio::test]
    async fn fetch_reports_http_errors() {
        let (url, _server) = one_shot_server("500 Internal Server Error", "{}").await;
        let client = SnapshotClient::new(url);
        assert!(matches!(client.fetch("x").await, Err(StreamError::Http(_))));
    }
}
