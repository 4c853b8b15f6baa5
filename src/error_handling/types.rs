use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadAddress(String),
    BadUrl(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadAddress(e) => write!(f, "Address formatting error: {}", e),
            ConfigError::BadUrl(e) => write!(f, "URL formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Metadata store failures.
#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed,
    MigrationFailed,
    /// The schema is behind; `screenrec-server migrate` has not been run.
    PendingMigrations(usize),
    WriteFailed,
    ReadFailed,
    /// A stored row could not be mapped back to a `Recording`.
    Corrupt(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::MigrationFailed => write!(f, "Storage migration failed"),
            StorageError::PendingMigrations(n) => {
                write!(f, "Storage schema has {} pending migration(s)", n)
            }
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::Corrupt(e) => write!(f, "Storage row corrupt: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// Upload directory failures.
#[derive(Debug)]
pub enum FileStoreError {
    TooLarge { limit: u64 },
    Io(std::io::Error),
    Stream(String),
}

impl fmt::Display for FileStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStoreError::TooLarge { limit } => {
                write!(f, "Payload exceeds the {} byte limit", limit)
            }
            FileStoreError::Io(e) => write!(f, "File store IO error: {}", e),
            FileStoreError::Stream(e) => write!(f, "Upload stream error: {}", e),
        }
    }
}

impl std::error::Error for FileStoreError {}

impl From<std::io::Error> for FileStoreError {
    fn from(err: std::io::Error) -> Self {
        FileStoreError::Io(err)
    }
}

/// Errors surfaced by the HTTP API.
///
/// The `Display` output is what callers see in the `error` field, so no
/// variant carries internal details.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound,
    PayloadTooLarge,
    Persistence(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(e) => write!(f, "{}", e),
            ApiError::NotFound => write!(f, "Not found"),
            ApiError::PayloadTooLarge => write!(f, "File too large"),
            ApiError::Persistence(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
    StorageError(StorageError),
    FileStoreError(FileStoreError),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
            WebError::StorageError(e) => write!(f, "Web server storage error: {}", e),
            WebError::FileStoreError(e) => write!(f, "Web server file store error: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

impl From<StorageError> for WebError {
    fn from(err: StorageError) -> Self {
        WebError::StorageError(err)
    }
}

impl From<FileStoreError> for WebError {
    fn from(err: FileStoreError) -> Self {
        WebError::FileStoreError(err)
    }
}

/// Client-side capture failures. None of these trigger a network call.
#[derive(Debug)]
pub enum CaptureError {
    PermissionDenied(String),
    NoDevices(String),
    Platform(String),
    AlreadyActive,
    InvalidState(&'static str),
    Encoder(String),
    Io(std::io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::PermissionDenied(e) => write!(f, "Capture permission denied: {}", e),
            CaptureError::NoDevices(e) => write!(f, "No capture device available: {}", e),
            CaptureError::Platform(e) => write!(f, "Capture platform error: {}", e),
            CaptureError::AlreadyActive => write!(f, "A capture session is already active"),
            CaptureError::InvalidState(e) => write!(f, "Invalid capture state: {}", e),
            CaptureError::Encoder(e) => write!(f, "Encoder error: {}", e),
            CaptureError::Io(e) => write!(f, "Capture IO error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

/// Network or API failure while talking to the recordings backend.
#[derive(Debug)]
pub enum UploadError {
    Transport(String),
    Status(u16),
    Decode(String),
    InvalidState(&'static str),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Transport(e) => write!(f, "Upload transport error: {}", e),
            UploadError::Status(code) => write!(f, "Upload rejected with status {}", code),
            UploadError::Decode(e) => write!(f, "Upload response decode error: {}", e),
            UploadError::InvalidState(e) => write!(f, "Nothing to upload: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UploadError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            UploadError::Status(status.as_u16())
        } else {
            UploadError::Transport(err.to_string())
        }
    }
}
