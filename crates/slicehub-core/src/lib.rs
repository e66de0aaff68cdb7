//! # slicehub-core
//!
//! Core crate for SliceHub. Contains the unified error system, the layered
//! configuration loader, and the read-only settings capability that the
//! slicing plugins are constructed with.
//!
//! This crate has **no** internal dependencies on other SliceHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
pub use traits::SettingsProvider;
