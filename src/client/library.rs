//! Read-only listing of uploaded recordings.

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::Local;
use log::error;

use super::api_client::ApiClient;
use crate::error_handling::types::UploadError;
use crate::storage::types::Recording;

pub const EMPTY_MESSAGE: &str = "No recordings yet.";
pub const FAILED_MESSAGE: &str = "Failed to load";

/// Anything able to produce the recordings list.
#[async_trait]
pub trait RecordingSource: Send + Sync {
    async fn fetch_recordings(&self) -> Result<Vec<Recording>, UploadError>;
}

#[async_trait]
impl RecordingSource for ApiClient {
    async fn fetch_recordings(&self) -> Result<Vec<Recording>, UploadError> {
        self.list().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryState {
    Loaded(Vec<Recording>),
    Failed,
}

/// One snapshot of the library, fetched once.
#[derive(Debug, Clone)]
pub struct LibraryView {
    state: LibraryState,
}

impl LibraryView {
    pub async fn load<S: RecordingSource + ?Sized>(source: &S) -> Self {
        let state = match source.fetch_recordings().await {
            Ok(recordings) => LibraryState::Loaded(recordings),
            Err(e) => {
                error!("Loading the library failed: {}", e);
                LibraryState::Failed
            }
        };
        Self { state }
    }

    pub fn state(&self) -> &LibraryState {
        &self.state
    }

    pub fn recordings(&self) -> &[Recording] {
        match &self.state {
            LibraryState::Loaded(list) => list,
            LibraryState::Failed => &[],
        }
    }

    pub fn render_text(&self) -> String {
        let list = match &self.state {
            LibraryState::Failed => return format!("{}\n", FAILED_MESSAGE),
            LibraryState::Loaded(list) if list.is_empty() => return format!("{}\n", EMPTY_MESSAGE),
            LibraryState::Loaded(list) => list,
        };
        let width = list
            .iter()
            .map(|r| r.display_title().chars().count())
            .max()
            .unwrap_or(0)
            .max("Title".len());

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<width$}  {:>9}  {:<19}  URL",
            "Title",
            "Size (MB)",
            "Created",
            width = width
        );
        for rec in list {
            let _ = writeln!(
                out,
                "{:<width$}  {:>9}  {:<19}  {}",
                rec.display_title(),
                size_mb(rec.size),
                local_time(rec),
                rec.url,
                width = width
            );
        }
        out
    }

    /// Standalone HTML page with an inline player per recording.
    pub fn render_html(&self) -> String {
        let mut out = String::from(
            "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>Library</title></head>\n<body>\n<h1>Library</h1>\n",
        );
        match &self.state {
            LibraryState::Failed => {
                let _ = writeln!(out, "<p>{}</p>", FAILED_MESSAGE);
            }
            LibraryState::Loaded(list) if list.is_empty() => {
                let _ = writeln!(out, "<p>{}</p>", EMPTY_MESSAGE);
            }
            LibraryState::Loaded(list) => {
                out.push_str("<table>\n<thead><tr><th>Title</th><th>Size (MB)</th><th>Created</th><th>Play</th></tr></thead>\n<tbody>\n");
                for rec in list {
                    let _ = writeln!(
                        out,
                        "<tr><td>{}</td><td>{}</td><td>{}</td><td><video src=\"{}\" controls width=\"320\"></video></td></tr>",
                        escape_html(rec.display_title()),
                        size_mb(rec.size),
                        escape_html(&local_time(rec)),
                        escape_html(&rec.url)
                    );
                }
                out.push_str("</tbody>\n</table>\n");
            }
        }
        out.push_str("</body>\n</html>\n");
        out
    }
}

pub fn size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

fn local_time(rec: &Recording) -> String {
    rec.created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    struct StaticSource(Option<Vec<Recording>>);

    #[async_trait]
    impl RecordingSource for StaticSource {
        async fn fetch_recordings(&self) -> Result<Vec<Recording>, UploadError> {
            self.0
                .clone()
                .ok_or_else(|| UploadError::Transport("offline".into()))
        }
    }

    fn rec(title: Option<&str>, size: u64) -> Recording {
        let filename = format!("{}.webm", Uuid::new_v4());
        Recording {
            id: Uuid::new_v4(),
            title: title.map(str::to_string),
            url: format!("http://localhost:4000/uploads/{}", filename),
            filename,
            size,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_library() {
        let view = LibraryView::load(&StaticSource(Some(vec![]))).await;
        assert_eq!(view.state(), &LibraryState::Loaded(vec![]));
        assert_eq!(view.render_text(), "No recordings yet.\n");
        assert!(view.render_html().contains("<p>No recordings yet.</p>"));
    }

    #[tokio::test]
    async fn failed_load() {
        let view = LibraryView::load(&StaticSource(None)).await;
        assert_eq!(view.state(), &LibraryState::Failed);
        assert!(view.recordings().is_empty());
        assert_eq!(view.render_text(), "Failed to load\n");
        assert!(view.render_html().contains("<p>Failed to load</p>"));
    }

    #[tokio::test]
    async fn text_table_lists_every_recording() {
        let list = vec![rec(Some("demo"), 3 * 1024 * 1024 / 2), rec(None, 0)];
        let view = LibraryView::load(&StaticSource(Some(list.clone()))).await;
        let text = view.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Title"));
        assert!(lines[1].starts_with("demo"));
        assert!(lines[1].contains("1.50"));
        assert!(lines[1].ends_with(&list[0].url));
        assert!(lines[2].starts_with("Untitled"));
        assert!(lines[2].contains("0.00"));
    }

    #[tokio::test]
    async fn html_escapes_values() {
        let view =
            LibraryView::load(&StaticSource(Some(vec![rec(Some("<b>\"x\" & y</b>"), 10)]))).await;
        let html = view.render_html();
        assert!(html.contains("&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("controls width=\"320\""));
        assert!(html.contains("<th>Size (MB)</th>"));
    }

    #[test]
    fn sizes_use_two_decimals() {
        assert_eq!(size_mb(0), "0.00");
        assert_eq!(size_mb(1024 * 1024), "1.00");
        assert_eq!(size_mb(10), "0.00");
    }
}
