//! Integration tests for full slicing jobs.

#![cfg(unix)]

mod helpers;

use std::time::Duration;

use helpers::{FakeEngine, ProgressLog};
use plugin_cura_engine::{SliceError, SliceRequest};
use tokio_util::sync::CancellationToken;

/// Records its arguments and search path, reports progress and analysis,
/// and writes a G-code file to the `-o` path.
const RECORDING_ENGINE: &str = r#"dir=$(dirname "$0")
printf '%s\n' "$@" > "$dir/argv.txt"
printf '%s' "$CURA_ENGINE_SEARCH_PATH" > "$dir/search_path.txt"
pwd > "$dir/cwd.txt"
out=""
prev=""
model=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  if [ "$prev" = "-l" ]; then model="$a"; fi
  prev="$a"
done
if [ ! -f "$model" ]; then
  echo "model not found: $model" >&2
  exit 1
fi
echo "Progress:inset:1:2  50.0000%" >&2
echo "Progress:inset:1:2  25.0000%" >&2
echo "Filament used: 2.5m" >&2
echo "Print time: 600" >&2
echo "" >&2
echo "G1 X0 Y0" > "$out"
exit 0"#;

const PROFILE: &str = r#"{
    "_display_name": "Test",
    "layer_height": 0.2,
    "metadata": {"octoprint_settings": {"b": "2", "a": "1"}}
}"#;

#[tokio::test]
async fn test_slice_end_to_end() {
    let engine = FakeEngine::new(RECORDING_ENGINE);
    let profile = engine.write("profiles/test.profile", PROFILE);
    let model = engine.write("models/part.stl", "solid part\nendsolid part\n");
    let defs = engine.path().join("defs");
    let slicer = engine.slicer(&[("settings_json_path", defs.to_str().expect("utf8"))]);

    let request = SliceRequest::new(&model).with_profile(&profile);
    let mut log = ProgressLog::default();
    let mut cb = log.callback();
    let outcome = slicer
        .slice(&request, Some(&mut cb), CancellationToken::new())
        .await
        .expect("slice");
    drop(cb);

    let expected_output = engine.path().join("models/part.gcode");
    assert_eq!(outcome.output_path, expected_output);
    assert!(expected_output.exists());
    assert_eq!(log.fractions, vec![0.5]);

    let analysis = outcome.analysis.expect("analysis");
    assert_eq!(analysis.filament_length_mm("tool0"), Some(2500.0));
    assert_eq!(analysis.estimated_print_time_minutes, Some(10));

    let argv = std::fs::read_to_string(engine.path().join("argv.txt")).expect("argv");
    let args: Vec<&str> = argv.lines().collect();
    assert_eq!(args[0], "slice");
    assert_eq!(args[1], "-j");
    assert_eq!(args[2], profile.display().to_string());
    assert_eq!(args[3..5], ["-v", "-p"]);
    assert!(args[5].starts_with("-m"));
    assert_eq!(
        args[6..],
        [
            "-s",
            "a=1",
            "-s",
            "b=2",
            "-o",
            expected_output.to_str().expect("utf8"),
            "-l",
            model.to_str().expect("utf8"),
        ]
    );

    let search_path = std::fs::read_to_string(engine.path().join("search_path.txt"))
        .expect("search path");
    let dirs: Vec<_> = std::env::split_paths(&search_path).collect();
    assert_eq!(
        dirs,
        ["definitions", "extruders", "quality", "variants"]
            .iter()
            .map(|d| defs.join(d))
            .collect::<Vec<_>>()
    );

    let cwd = std::fs::read_to_string(engine.path().join("cwd.txt")).expect("cwd");
    assert_eq!(
        std::fs::canonicalize(cwd.trim()).expect("canonical cwd"),
        std::fs::canonicalize(engine.path().join("models")).expect("canonical models")
    );

    let snap = slicer.metrics_snapshot();
    assert_eq!(snap.jobs_started, 1);
    assert_eq!(snap.jobs_succeeded, 1);
    assert!(snap.gcode_bytes_written > 0);
}

#[tokio::test]
async fn test_slice_relative_paths() {
    let engine = FakeEngine::new(RECORDING_ENGINE);
    let cwd = std::env::current_dir().expect("cwd");
    let scratch = tempfile::tempdir_in(&cwd).expect("tempdir under cwd");
    let rel = scratch.path().strip_prefix(&cwd).expect("relative scratch dir");
    std::fs::create_dir_all(scratch.path().join("models")).expect("mkdir");
    std::fs::write(scratch.path().join("models/part.stl"), "solid\n").expect("write model");
    std::fs::write(scratch.path().join("fast.profile"), PROFILE).expect("write profile");
    let slicer = engine.slicer(&[]);

    let request = SliceRequest::new(rel.join("models/part.stl"))
        .with_profile(rel.join("fast.profile"));
    let outcome = slicer.slice_simple(&request).await.expect("slice");

    let expected_output = scratch.path().join("models/part.gcode");
    assert_eq!(outcome.output_path, expected_output);
    assert!(expected_output.exists());
    assert!(slicer.metrics_snapshot().gcode_bytes_written > 0);

    let argv = std::fs::read_to_string(engine.path().join("argv.txt")).expect("argv");
    let args: Vec<&str> = argv.lines().collect();
    assert_eq!(args[2], scratch.path().join("fast.profile").display().to_string());
}

#[tokio::test]
async fn test_slice_creates_output_directory() {
    let engine = FakeEngine::new(RECORDING_ENGINE);
    let profile = engine.write("test.profile", PROFILE);
    let model = engine.write("part.stl", "solid\n");
    let output = engine.path().join("out/nested/result.gcode");
    let slicer = engine.slicer(&[]);

    let request = SliceRequest::new(&model)
        .with_profile(&profile)
        .with_output(&output);
    let outcome = slicer.slice_simple(&request).await.expect("slice");

    assert_eq!(outcome.output_path, output);
    assert!(output.exists());
}

#[tokio::test]
async fn test_slice_with_default_profile_setting() {
    let engine = FakeEngine::new(RECORDING_ENGINE);
    let profile = engine.write("configured.profile", r#"{"layer_height": 0.1}"#);
    let model = engine.write("part.stl", "solid\n");
    let slicer = engine.slicer(&[("default_profile", profile.to_str().expect("utf8"))]);

    slicer
        .slice_simple(&SliceRequest::new(&model))
        .await
        .expect("slice");

    let argv = std::fs::read_to_string(engine.path().join("argv.txt")).expect("argv");
    let args: Vec<&str> = argv.lines().collect();
    assert_eq!(args[2], profile.display().to_string());
    assert!(!args.contains(&"-s"));
}

#[tokio::test]
async fn test_engine_failure_is_reported() {
    let engine = FakeEngine::new("echo 'Error: mesh is not manifold' >&2\nexit 1");
    let profile = engine.write("test.profile", PROFILE);
    let model = engine.write("part.stl", "solid\n");
    let slicer = engine.slicer(&[]);

    let err = slicer
        .slice_simple(&SliceRequest::new(&model).with_profile(&profile))
        .await
        .expect_err("must fail");

    match err {
        SliceError::SliceEngineFailed { code, stderr_tail } => {
            assert_eq!(code, Some(1));
            assert!(stderr_tail.contains("not manifold"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(slicer.metrics_snapshot().jobs_failed, 1);
}

#[tokio::test]
async fn test_engine_timeout_from_settings() {
    let engine = FakeEngine::new("exec sleep 10");
    let profile = engine.write("test.profile", PROFILE);
    let model = engine.write("part.stl", "solid\n");
    let slicer = engine.slicer(&[("timeout_seconds", "1")]);

    let err = slicer
        .slice_simple(&SliceRequest::new(&model).with_profile(&profile))
        .await
        .expect_err("must time out");

    assert!(matches!(err, SliceError::Timeout { timeout_seconds: 1 }));
    let snap = slicer.metrics_snapshot();
    assert_eq!(snap.jobs_timed_out, 1);
    assert_eq!(snap.jobs_failed, 1);
}

#[tokio::test]
async fn test_slice_cancelled() {
    let engine = FakeEngine::new("exec sleep 10");
    let profile = engine.write("test.profile", PROFILE);
    let model = engine.write("part.stl", "solid\n");
    let slicer = engine.slicer(&[]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = slicer
        .slice(
            &SliceRequest::new(&model).with_profile(&profile),
            None,
            cancel,
        )
        .await
        .expect_err("must be cancelled");

    assert!(matches!(err, SliceError::Cancelled));
    assert_eq!(slicer.metrics_snapshot().jobs_cancelled, 1);
}

#[tokio::test]
async fn test_non_executable_engine_rejected() {
    use std::os::unix::fs::PermissionsExt;

    let engine = FakeEngine::new(RECORDING_ENGINE);
    std::fs::set_permissions(&engine.script, std::fs::Permissions::from_mode(0o644))
        .expect("chmod");
    let profile = engine.write("test.profile", PROFILE);
    let model = engine.write("part.stl", "solid\n");
    let slicer = engine.slicer(&[]);

    assert!(!slicer.is_engine_configured());
    let err = slicer
        .slice_simple(&SliceRequest::new(&model).with_profile(&profile))
        .await
        .expect_err("must fail");
    assert!(matches!(err, SliceError::EngineLaunch { .. }));
    assert!(!engine.path().join("argv.txt").exists());
}

#[tokio::test]
async fn test_missing_profile_is_load_error() {
    let engine = FakeEngine::new(RECORDING_ENGINE);
    let model = engine.write("part.stl", "solid\n");
    let slicer = engine.slicer(&[]);

    let err = slicer
        .slice_simple(&SliceRequest::new(&model).with_profile(engine.path().join("nope.profile")))
        .await
        .expect_err("must fail");
    assert!(matches!(err, SliceError::ProfileLoad { .. }));
}
