use crate::clipboard::ClipboardError;
use crate::codec::CodecError;
use crate::snapshot::SnapshotError;
use crate::store::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}
