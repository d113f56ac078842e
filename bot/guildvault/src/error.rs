pub use crate::commands::CommandError;
pub use crate::models::SnapshotError;
pub use crate::platform::PlatformError;
use thiserror::Error as ErrorTrait;

pub type Result<T> = std::result::Result<T, Error>;

/// The sum type of all errors that might result from a backup or restore.
#[derive(ErrorTrait, Debug)]
pub enum Error {
    #[error("IO error: {:?}", .0)]
    Io(#[from] std::io::Error),
    #[error("JSON error: {:?}", .0)]
    Json(#[from] serde_json::Error),
    #[error("Snapshot error: {}", .0)]
    Snapshot(#[from] SnapshotError),
    #[error("Discord error: {}", .0)]
    Platform(#[from] PlatformError),
    #[error("Command error: {}", .0)]
    Command(#[from] CommandError),
    #[error("Restore did not finish within {:?}", .0)]
    DeadlineExceeded(std::time::Duration),
}
