use serde::{Deserialize, Serialize};

use crate::storage::types::Recording;

/// Body of every error response.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

/// `201 Created` body of the upload endpoint.
#[derive(Serialize)]
pub struct CreatedResponse {
    pub message: &'static str,
    pub recording: Recording,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub ok: bool,
}
