//! Engine command-line construction.
//!
//! Argument order is fixed: slice mode, job settings, verbosity, progress,
//! concurrency hint, sorted `-s key=value` overrides, output, input.

use std::collections::BTreeMap;
use std::path::Path;

/// Build the full argument vector for one engine run.
///
/// Element 0 is the executable. Overrides land directly before `-o`, in key
/// order. No I/O happens here.
pub fn build_arguments(
    executable: &Path,
    job_settings: &Path,
    output: &Path,
    input: &Path,
    concurrency_hint: usize,
    overrides: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut argv = Vec::with_capacity(10 + overrides.len() * 2);
    argv.push(executable.display().to_string());
    argv.push("slice".to_string());
    argv.push("-j".to_string());
    argv.push(job_settings.display().to_string());
    argv.push("-v".to_string());
    argv.push("-p".to_string());
    argv.push(format!("-m{}", concurrency_hint.max(1)));

    for (key, value) in overrides {
        argv.push("-s".to_string());
        argv.push(format!("{key}={value}"));
    }

    argv.push("-o".to_string());
    argv.push(output.display().to_string());
    argv.push("-l".to_string());
    argv.push(input.display().to_string());
    argv
}

/// Number of processing units available to this process, at least 1.
pub fn concurrency_hint() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
