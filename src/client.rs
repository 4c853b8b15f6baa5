//! Client side of the recordings API: HTTP access and the library listing.

pub mod api_client;
pub mod library;

pub use api_client::{ApiClient, Uploader};
pub use library::{LibraryState, LibraryView, RecordingSource};
