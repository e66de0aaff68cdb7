//! Slicing profile persistence.
//!
//! A profile is a JSON object of engine settings. Two optional top-level
//! keys carry metadata (`_display_name`, `_description`) and are lifted out
//! of the settings body on load. Entries under
//! `metadata.octoprint_settings` become per-setting engine overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::SliceError;

/// Document key holding the display name.
pub const DISPLAY_NAME_KEY: &str = "_display_name";
/// Document key holding the description.
pub const DESCRIPTION_KEY: &str = "_description";

/// File extensions recognised as profiles when listing a directory.
const PROFILE_EXTENSIONS: &[&str] = &["profile", "json"];

/// A stored set of engine settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlicingProfile {
    /// Identifier, also used as the file stem.
    pub name: String,
    /// Optional human-readable name.
    pub display_name: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Engine settings. Never contains the metadata keys.
    pub data: Map<String, Value>,
}

impl SlicingProfile {
    /// Build a profile from a parsed document, lifting out the metadata keys.
    pub fn from_document(name: impl Into<String>, mut data: Map<String, Value>) -> Self {
        let mut take_str = |key: &str| match data.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        };
        let display_name = take_str(DISPLAY_NAME_KEY);
        let description = take_str(DESCRIPTION_KEY);

        Self {
            name: name.into(),
            display_name,
            description,
            data,
        }
    }

    /// The full document as persisted, with metadata keys written back.
    pub fn to_document(&self) -> Map<String, Value> {
        let mut doc = self.data.clone();
        if let Some(display_name) = &self.display_name {
            doc.insert(DISPLAY_NAME_KEY.to_string(), Value::String(display_name.clone()));
        }
        if let Some(description) = &self.description {
            doc.insert(DESCRIPTION_KEY.to_string(), Value::String(description.clone()));
        }
        doc
    }

    /// Per-setting overrides from `metadata.octoprint_settings`, sorted by key.
    ///
    /// Anything other than a mapping at either level yields no overrides.
    /// String values are used verbatim; everything else in its JSON form.
    pub fn override_settings(&self) -> BTreeMap<String, String> {
        self.data
            .get("metadata")
            .and_then(Value::as_object)
            .and_then(|meta| meta.get("octoprint_settings"))
            .and_then(Value::as_object)
            .map(|settings| {
                settings
                    .iter()
                    .map(|(k, v)| (k.clone(), render_setting(v)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn render_setting(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A profile found while listing a directory.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileEntry {
    /// Where the profile was loaded from.
    pub path: PathBuf,
    /// The loaded profile.
    pub profile: SlicingProfile,
}

/// Profile loading, saving, and naming.
pub struct ProfileStore;

impl ProfileStore {
    /// Load a profile document from disk.
    ///
    /// The profile name comes from the file stem.
    pub async fn load(path: &Path) -> Result<SlicingProfile, SliceError> {
        let load_err = |reason: String, malformed: bool| SliceError::ProfileLoad {
            path: path.to_path_buf(),
            reason,
            malformed,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(e.to_string(), false))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| load_err(format!("invalid JSON: {e}"), true))?;
        let Value::Object(data) = value else {
            return Err(load_err("document is not a JSON object".to_string(), true));
        };

        let name = Self::name_from_path(path);
        debug!(path = %path.display(), name = %name, keys = data.len(), "Loaded profile");
        Ok(SlicingProfile::from_document(name, data))
    }

    /// Persist a profile as 4-space indented JSON with sorted keys.
    pub async fn save(
        path: &Path,
        profile: &SlicingProfile,
        allow_overwrite: bool,
    ) -> Result<(), SliceError> {
        if !allow_overwrite && tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(SliceError::ProfileExists {
                path: path.to_path_buf(),
            });
        }

        let save_err = |reason: String| SliceError::ProfileSave {
            path: path.to_path_buf(),
            reason,
        };

        let mut bytes = to_json_4space(&profile.to_document()).map_err(&save_err)?;
        bytes.push(b'\n');

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| save_err(e.to_string()))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| save_err(e.to_string()))?;

        debug!(path = %path.display(), name = %profile.name, "Saved profile");
        Ok(())
    }

    /// Copy a profile document into `dir` under a sanitized name.
    ///
    /// The name defaults to the source file stem. A source without a display
    /// name gets the unsanitized name as one. Returns the written path.
    pub async fn import(
        source: &Path,
        dir: &Path,
        name: Option<&str>,
        allow_overwrite: bool,
    ) -> Result<PathBuf, SliceError> {
        let mut profile = Self::load(source).await?;

        let raw_name = match name {
            Some(n) => n.to_string(),
            None => source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| profile.name.clone()),
        };
        profile.name = sanitize_name(&raw_name)?;
        if profile.display_name.is_none() {
            profile.display_name = Some(raw_name);
        }

        let target = dir.join(format!("{}.profile", profile.name));
        Self::save(&target, &profile, allow_overwrite).await?;
        Ok(target)
    }

    /// Load every profile in a directory, sorted by name.
    ///
    /// Files that fail to load are skipped with a warning.
    pub async fn list(dir: &Path) -> Result<Vec<ProfileEntry>, SliceError> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let is_profile = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| PROFILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if !is_profile || !entry.file_type().await?.is_file() {
                continue;
            }

            match Self::load(&path).await {
                Ok(profile) => entries.push(ProfileEntry { path, profile }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable profile"),
            }
        }

        entries.sort_by(|a, b| a.profile.name.cmp(&b.profile.name));
        Ok(entries)
    }

    /// Profile name for a path: its sanitized file stem, or the raw stem
    /// when sanitizing leaves nothing.
    pub fn name_from_path(path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        sanitize_name(&stem).unwrap_or(stem)
    }
}

/// Turn a user-supplied name into a filesystem-safe profile identifier.
///
/// Names containing `/` or `\` are rejected. Everything outside Unicode
/// alphanumerics and `-_.() ` is dropped, spaces become `_`, and the
/// result is lower-cased.
pub fn sanitize_name(name: &str) -> Result<String, SliceError> {
    if name.contains('/') || name.contains('\\') {
        return Err(SliceError::InvalidProfileName {
            name: name.to_string(),
            reason: "must not contain / or \\",
        });
    }

    let sanitized: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')' | ' '))
        .flat_map(|c| if c == ' ' { '_'.to_lowercase() } else { c.to_lowercase() })
        .collect();

    if sanitized.is_empty() {
        return Err(SliceError::InvalidProfileName {
            name: name.to_string(),
            reason: "no usable characters",
        });
    }
    Ok(sanitized)
}

fn to_json_4space<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(|e| e.to_string())?;
    Ok(buf)
}
