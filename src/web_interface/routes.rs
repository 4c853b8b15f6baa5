use std::convert::Infallible;
use std::sync::Arc;

use bytes::BufMut;
use futures_util::TryStreamExt;
use log::{debug, error, warn};
use uuid::Uuid;
use warp::http::{StatusCode, Uri};
use warp::multipart::{FormData, Part};
use warp::{reply, Filter, Rejection, Reply};

use super::types::{CreatedResponse, ErrorBody, HealthResponse};
use crate::error_handling::types::{ApiError, FileStoreError};
use crate::storage::file_storage::{FileStorage, StoredFile};
use crate::storage::storage_trait::RecordingStore;
use crate::storage::types::{normalize_title, NewRecording, Recording};

/// Slack on top of the file limit for multipart boundaries and text fields.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Shared dependencies of every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordingStore>,
    pub files: Arc<FileStorage>,
    /// Base URL overriding the request's scheme and host
    pub public_url: Option<String>,
    /// Host used when a request carries no `Host` header
    pub fallback_host: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordingStore>,
        files: Arc<FileStorage>,
        public_url: Option<String>,
        fallback_host: String,
    ) -> Self {
        Self {
            store,
            files,
            public_url: public_url.map(|u| u.trim_end_matches('/').to_string()),
            fallback_host,
        }
    }

    /// Absolute origin for stored URLs, e.g. `http://localhost:4000`.
    fn base_url(&self, host: Option<String>, forwarded_proto: Option<String>) -> String {
        if let Some(ref url) = self.public_url {
            return url.clone();
        }
        let scheme = forwarded_proto
            .as_deref()
            .and_then(|p| p.split(',').next())
            .map(str::trim)
            .filter(|p| *p == "http" || *p == "https")
            .unwrap_or("http")
            .to_string();
        let host = host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| self.fallback_host.clone());
        format!("{}://{}", scheme, host)
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_error(status: StatusCode, message: impl Into<String>) -> reply::Response {
    reply::with_status(
        reply::json(&ErrorBody {
            error: message.into(),
        }),
        status,
    )
    .into_response()
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> reply::Response {
        json_error(self.status(), self.to_string())
    }
}

/// Full API: recordings, health and the uploads directory, with JSON errors.
pub fn api(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let uploads = uploads_route(&state.files);
    health_route()
        .or(list_recordings_route(state.clone()))
        .or(get_recording_route(state.clone()))
        .or(create_recording_route(state))
        .or(uploads)
        .recover(handle_rejection)
}

/// GET /api/health
pub fn health_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "health")
        .and(warp::get())
        .map(|| reply::json(&HealthResponse { ok: true }))
}

/// GET /api/recordings
pub fn list_recordings_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "recordings")
        .and(warp::get())
        .and(with_state(state))
        .and_then(|state: AppState| async move {
            match state.store.list_recordings().await {
                Ok(list) => Ok::<_, Rejection>(
                    reply::with_status(reply::json(&list), StatusCode::OK).into_response(),
                ),
                Err(e) => {
                    error!("Listing recordings failed: {}", e);
                    Ok::<_, Rejection>(json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to load recordings",
                    ))
                }
            }
        })
}

/// GET /api/recordings/:id, redirecting to the stored file URL
pub fn get_recording_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "recordings" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(|id_str: String, state: AppState| async move {
            let res = match resolve_recording(&state, &id_str).await {
                Ok(rec) => match rec.url.parse::<Uri>() {
                    Ok(uri) => warp::redirect::found(uri).into_response(),
                    Err(e) => {
                        error!("Stored URL of {} is invalid: {}", rec.id, e);
                        ApiError::Persistence("Fetch failed".into()).into_response()
                    }
                },
                Err(e) => e.into_response(),
            };
            Ok::<_, Rejection>(res)
        })
}

async fn resolve_recording(state: &AppState, id_str: &str) -> Result<Recording, ApiError> {
    let id = Uuid::parse_str(id_str).map_err(|_| ApiError::NotFound)?;
    match state.store.get_recording(id).await {
        Ok(Some(rec)) => Ok(rec),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => {
            error!("Fetching recording {} failed: {}", id, e);
            Err(ApiError::Persistence("Fetch failed".into()))
        }
    }
}

/// POST /api/recordings, multipart with a `file` part and an optional `title` part
pub fn create_recording_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let max_length = state.files.max_bytes().saturating_add(MULTIPART_OVERHEAD);
    warp::path!("api" / "recordings")
        .and(warp::post())
        .and(warp::header::optional::<String>("host"))
        .and(warp::header::optional::<String>("x-forwarded-proto"))
        .and(warp::multipart::form().max_length(max_length))
        .and(with_state(state))
        .and_then(
            |host: Option<String>,
             proto: Option<String>,
             form: FormData,
             state: AppState| async move {
                let base = state.base_url(host, proto);
                let res = match create_recording(&state, &base, form).await {
                    Ok(rec) => reply::with_status(
                        reply::json(&CreatedResponse {
                            message: "Uploaded",
                            recording: rec,
                        }),
                        StatusCode::CREATED,
                    )
                    .into_response(),
                    Err(e) => e.into_response(),
                };
                Ok::<_, Rejection>(res)
            },
        )
}

/// Persist the file first, then insert the row. An insert failure leaves the
/// file behind as an orphan; a row never points at a missing file.
async fn create_recording(
    state: &AppState,
    base: &str,
    form: FormData,
) -> Result<Recording, ApiError> {
    futures_util::pin_mut!(form);
    let mut stored: Option<StoredFile> = None;
    let mut title: Option<String> = None;

    while let Some(part) = form.try_next().await.map_err(|e| {
        warn!("Invalid multipart body: {}", e);
        ApiError::Validation("Invalid multipart body".into())
    })? {
        let name = part.name().to_string();
        match name.as_str() {
            "file" if stored.is_none() => {
                let original = part.filename().map(str::to_string);
                let saved = state
                    .files
                    .persist(original.as_deref(), part.stream())
                    .await
                    .map_err(|e| match e {
                        FileStoreError::TooLarge { .. } => ApiError::PayloadTooLarge,
                        FileStoreError::Stream(e) => {
                            warn!("Upload stream aborted: {}", e);
                            ApiError::Validation("Invalid multipart body".into())
                        }
                        FileStoreError::Io(e) => {
                            error!("Writing upload failed: {}", e);
                            ApiError::Persistence("Upload failed".into())
                        }
                    })?;
                stored = Some(saved);
            }
            "file" => warn!("Ignoring additional file part"),
            "title" => title = Some(read_text(part).await?),
            other => debug!("Ignoring unexpected form part {:?}", other),
        }
    }

    let stored = stored.ok_or_else(|| ApiError::Validation("No file uploaded".into()))?;
    let new = NewRecording {
        title: normalize_title(title.as_deref()),
        url: format!("{}/uploads/{}", base, stored.filename),
        filename: stored.filename,
        size: stored.size,
    };
    state.store.insert_recording(new).await.map_err(|e| {
        error!(
            "Recording row insert failed, {} is orphaned: {}",
            stored.path.display(),
            e
        );
        ApiError::Persistence("Upload failed".into())
    })
}

async fn read_text(part: Part) -> Result<String, ApiError> {
    let bytes: Vec<u8> = part
        .stream()
        .try_fold(Vec::new(), |mut acc, buf| async move {
            acc.put(buf);
            Ok(acc)
        })
        .await
        .map_err(|e| {
            warn!("Unreadable text part: {}", e);
            ApiError::Validation("Invalid multipart body".into())
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// GET /uploads/<filename>
pub fn uploads_route(
    files: &FileStorage,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("uploads")
        .and(warp::get())
        .and(warp::fs::dir(files.base_path().to_path_buf()))
}

/// Turn unmatched routes and filter failures into JSON errors.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let res = if err.is_not_found() {
        json_error(StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::PayloadTooLarge.into_response()
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        json_error(StatusCode::LENGTH_REQUIRED, "Length required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        debug!("Rejected request: {:?}", err);
        json_error(StatusCode::BAD_REQUEST, "Bad request")
    };
    Ok(res)
}
