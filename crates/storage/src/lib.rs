//! Object storage backends for artifact payloads.
//!
//! The deployment core only needs existence checks and pre-signed
//! read/write capabilities; payload bytes flow between devices and the
//! backend directly.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use backends::s3::S3Backend;
pub use error::{StorageError, StorageResult};
pub use traits::ObjectStore;
