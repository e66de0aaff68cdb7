//! Core traits defined in `slicehub-core` and implemented by other crates.

pub mod settings;

pub use settings::{OverlaySettings, SettingsProvider, StaticSettings};
