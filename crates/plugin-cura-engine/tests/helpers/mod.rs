//! Shared helpers for engine integration tests.
//!
//! A fake engine is a small `/bin/sh` script written into a temp directory.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use plugin_cura_engine::{CuraEngineSlicer, EngineInvocation, ProcessSupervisor, ProgressUpdate};
use slicehub_core::traits::StaticSettings;
use tempfile::TempDir;

/// Poll tick used by tests; short so exits are noticed quickly.
pub const TEST_POLL: Duration = Duration::from_millis(50);

/// A scratch directory holding a fake engine script.
pub struct FakeEngine {
    pub dir: TempDir,
    pub script: PathBuf,
}

impl FakeEngine {
    /// Write `body` as an executable shell script.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("CuraEngine");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        Self { dir, script }
    }

    /// Scratch directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Invocation running the script through `/bin/sh`.
    pub fn invocation(&self) -> EngineInvocation {
        self.invocation_with_env(BTreeMap::new())
    }

    /// Invocation running the script through `/bin/sh` with extra variables.
    pub fn invocation_with_env(&self, env: BTreeMap<String, String>) -> EngineInvocation {
        EngineInvocation {
            executable: PathBuf::from("/bin/sh"),
            argv: vec!["/bin/sh".to_string(), self.script.display().to_string()],
            env,
            working_dir: Some(self.path().to_path_buf()),
        }
    }

    /// Slicer configured to use this script as the engine.
    pub fn slicer(&self, extra: &[(&str, &str)]) -> CuraEngineSlicer {
        let mut settings = StaticSettings::new()
            .with(
                "plugins.cura_engine.cura_engine",
                self.script.display().to_string(),
            )
            .with("plugins.cura_engine.poll_interval_ms", "50");
        for (key, value) in extra {
            settings.set(format!("plugins.cura_engine.{key}"), *value);
        }
        CuraEngineSlicer::new(Arc::new(settings))
    }

    /// Write a file into the scratch directory.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(&path, contents).expect("write file");
        path
    }
}

/// Supervisor with the test poll tick.
pub fn supervisor() -> ProcessSupervisor {
    ProcessSupervisor::new(TEST_POLL)
}

/// Collects forwarded progress fractions.
#[derive(Debug, Default)]
pub struct ProgressLog {
    pub fractions: Vec<f64>,
}

impl ProgressLog {
    pub fn callback(&mut self) -> impl FnMut(ProgressUpdate) + Send + '_ {
        move |update: ProgressUpdate| self.fractions.push(update.fraction)
    }
}
