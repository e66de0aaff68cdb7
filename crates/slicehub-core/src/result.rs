//! Convenience result type alias for SliceHub.

use crate::error::AppError;

/// A specialized `Result` type for SliceHub operations.
pub type AppResult<T> = Result<T, AppError>;
