use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, multipart, redirect, Client, Response, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::configuration::ClientConfig;
use crate::data_capture::RecordedBlob;
use crate::error_handling::types::UploadError;
use crate::storage::types::{Recording, DEFAULT_TITLE};
use crate::web_interface::types::{ErrorBody, HealthResponse};

const DEFAULT_FILE_STEM: &str = "recording";
const DEFAULT_EXTENSION: &str = "webm";

/// Sends a finished recording to the backend.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        blob: &RecordedBlob,
        title: Option<&str>,
    ) -> Result<Recording, UploadError>;
}

#[derive(Deserialize)]
struct CreatedBody {
    recording: Recording,
}

/// HTTP client for the recordings API.
pub struct ApiClient {
    base_url: String,
    http: Client,
    // Same pool settings, but surfaces 3xx responses instead of following them
    no_redirect: Client,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, UploadError> {
        Self::with_base_url(&config.api_url)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, UploadError> {
        let http = Client::builder().build()?;
        let no_redirect = Client::builder().redirect(redirect::Policy::none()).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            no_redirect,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<bool, UploadError> {
        let res = check(self.http.get(self.endpoint("/api/health")).send().await?).await?;
        let body: HealthResponse = res.json().await?;
        Ok(body.ok)
    }

    /// All recordings, newest first.
    pub async fn list(&self) -> Result<Vec<Recording>, UploadError> {
        let res = check(self.http.get(self.endpoint("/api/recordings")).send().await?).await?;
        let recordings: Vec<Recording> = res.json().await?;
        debug!("Fetched {} recording(s)", recordings.len());
        Ok(recordings)
    }

    /// Where `GET /api/recordings/:id` redirects to, `None` for an unknown id.
    pub async fn fetch_url(&self, id: Uuid) -> Result<Option<String>, UploadError> {
        let res = self
            .no_redirect
            .get(self.endpoint(&format!("/api/recordings/{}", id)))
            .send()
            .await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_redirection() {
            return Err(check(res).await.err().unwrap_or(UploadError::Decode(
                "expected a redirect".to_string(),
            )));
        }
        let location = res
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| UploadError::Decode("redirect without Location".to_string()))?;
        Ok(Some(location.to_string()))
    }

    /// Upload raw bytes as `<title or "recording">.<extension>`.
    ///
    /// The server keeps the extension of the part's file name, so it decides
    /// how `/uploads` labels the file later.
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        title: Option<&str>,
        extension: &str,
    ) -> Result<Recording, UploadError> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let extension = upload_extension(extension);
        let file_name = format!("{}.{}", title.unwrap_or(DEFAULT_FILE_STEM), extension);
        let mime = mime_guess::from_ext(&extension).first_or_octet_stream();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.as_ref())?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("title", title.unwrap_or(DEFAULT_TITLE).to_string());

        let res = self
            .http
            .post(self.endpoint("/api/recordings"))
            .multipart(form)
            .send()
            .await?;
        let body: CreatedBody = check(res).await?.json().await?;
        Ok(body.recording)
    }
}

#[async_trait]
impl Uploader for ApiClient {
    async fn upload(
        &self,
        blob: &RecordedBlob,
        title: Option<&str>,
    ) -> Result<Recording, UploadError> {
        self.upload_bytes(blob.bytes().to_vec(), title, blob.extension())
            .await
    }
}

/// Lowercased alphanumeric extension, `webm` when unusable.
fn upload_extension(raw: &str) -> String {
    let ext = raw.trim().trim_start_matches('.');
    if !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        ext.to_ascii_lowercase()
    } else {
        DEFAULT_EXTENSION.to_string()
    }
}

/// Turn non-2xx responses into `UploadError::Status`, logging the API's
/// error message when there is one.
async fn check(res: Response) -> Result<Response, UploadError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    match res.json::<ErrorBody>().await {
        Ok(body) => warn!("API answered {}: {}", status, body.error),
        Err(_) => warn!("API answered {}", status),
    }
    Err(UploadError::Status(status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer exactly one request with a canned response and hand back the
    /// raw request bytes.
    async fn serve_once(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (url, handle)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let head = text[..head_end].to_ascii_lowercase();
        let body_len = buf.len() - head_end - 4;
        match head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            Some(len) => body_len >= len,
            None if head.contains("transfer-encoding: chunked") => text.ends_with("0\r\n\r\n"),
            None => true,
        }
    }

    fn http_response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            extra_headers,
            body
        )
    }

    const RECORDING_JSON: &str = r#"{"id":"6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f","title":"demo","filename":"6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f.webm","size":10,"url":"http://localhost:4000/uploads/6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f.webm","createdAt":"2025-10-19T08:00:00.000000Z"}"#;

    #[tokio::test]
    async fn upload_sends_file_and_title_parts() {
        let body = format!(r#"{{"message":"Uploaded","recording":{}}}"#, RECORDING_JSON);
        let (url, server) = serve_once(http_response("201 Created", "", &body)).await;
        let client = ApiClient::with_base_url(&url).unwrap();
        let blob = RecordedBlob::new(Bytes::from_static(b"0123456789"), "video/webm;codecs=vp9,opus");

        let rec = client.upload(&blob, Some("demo")).await.unwrap();
        assert_eq!(rec.size, 10);
        assert_eq!(rec.title.as_deref(), Some("demo"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/recordings "));
        assert!(request.contains(r#"name="file"; filename="demo.webm""#));
        assert!(request.contains("content-type: video/webm") || request.contains("Content-Type: video/webm"));
        assert!(request.contains("0123456789"));
        assert!(request.contains(r#"name="title""#));
    }

    #[tokio::test]
    async fn untitled_upload_uses_default_names() {
        let body = format!(r#"{{"message":"Uploaded","recording":{}}}"#, RECORDING_JSON);
        let (url, server) = serve_once(http_response("201 Created", "", &body)).await;
        let client = ApiClient::with_base_url(&url).unwrap();
        client.upload_bytes(b"x".to_vec(), Some("  "), "w/e").await.unwrap();

        let request = server.await.unwrap();
        assert!(request.contains(r#"filename="recording.webm""#));
        assert!(request.contains("\r\n\r\nUntitled\r\n"));
    }

    #[tokio::test]
    async fn upload_keeps_the_container_extension() {
        let body = format!(r#"{{"message":"Uploaded","recording":{}}}"#, RECORDING_JSON);
        let (url, server) = serve_once(http_response("201 Created", "", &body)).await;
        let client = ApiClient::with_base_url(&url).unwrap();
        let blob = RecordedBlob::new(Bytes::from_static(b"mp4data"), "video/mp4");
        client.upload(&blob, Some("clip")).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.contains(r#"filename="clip.mp4""#));
        assert!(request.contains("content-type: video/mp4") || request.contains("Content-Type: video/mp4"));
        assert!(!request.contains("clip.webm"));
    }

    #[test]
    fn upload_extension_is_sanitized() {
        assert_eq!(upload_extension("MP4"), "mp4");
        assert_eq!(upload_extension(".mkv"), "mkv");
        assert_eq!(upload_extension(""), "webm");
        assert_eq!(upload_extension("a/b"), "webm");
    }

    #[tokio::test]
    async fn server_error_is_a_status_error() {
        let (url, _server) = serve_once(http_response(
            "500 Internal Server Error",
            "",
            r#"{"error":"Upload failed"}"#,
        ))
        .await;
        let client = ApiClient::with_base_url(&url).unwrap();
        let res = client.upload_bytes(b"x".to_vec(), None, "webm").await;
        assert!(matches!(res, Err(UploadError::Status(500))));
    }

    #[tokio::test]
    async fn list_decodes_recordings() {
        let body = format!("[{}]", RECORDING_JSON);
        let (url, server) = serve_once(http_response("200 OK", "", &body)).await;
        let client = ApiClient::with_base_url(&format!("{}/", url)).unwrap();
        let list = client.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].display_title(), "demo");
        assert!(server.await.unwrap().starts_with("GET /api/recordings "));
    }

    #[tokio::test]
    async fn fetch_url_reads_location() {
        let target = "http://localhost:4000/uploads/a.webm";
        let (url, _server) = serve_once(http_response(
            "302 Found",
            &format!("location: {}\r\n", target),
            "",
        ))
        .await;
        let client = ApiClient::with_base_url(&url).unwrap();
        let found = client.fetch_url(Uuid::new_v4()).await.unwrap();
        assert_eq!(found.as_deref(), Some(target));
    }

    #[tokio::test]
    async fn fetch_url_unknown_id() {
        let (url, _server) =
            serve_once(http_response("404 Not Found", "", r#"{"error":"Not found"}"#)).await;
        let client = ApiClient::with_base_url(&url).unwrap();
        assert_eq!(client.fetch_url(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (url, _server) = serve_once(http_response("200 OK", "", r#"{"ok":true}"#)).await;
        let client = ApiClient::with_base_url(&url).unwrap();
        assert!(client.health().await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let client = ApiClient::with_base_url(&url).unwrap();
        assert!(matches!(client.list().await, Err(UploadError::Transport(_))));
    }
}
