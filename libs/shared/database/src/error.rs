use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dataset unavailable: {}", .0.display())]
    Unavailable(PathBuf),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
