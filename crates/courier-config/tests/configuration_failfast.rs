//! Malformed sources stop loading; well-formed but unrunnable values load and
//! are caught by validation instead.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use ortho_config::{OrthoConfig, OrthoError};
use rstest::rstest;
use tempfile::TempDir;

use courier_config::{Config, ConfigError};

static ENVIRONMENT: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Sets `COURIER_*` variables for one test and restores them afterwards.
struct ScopedEnvironment {
    saved: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnvironment {
    fn with(vars: &[(&'static str, &str)]) -> Self {
        let lock = ENVIRONMENT.lock().unwrap_or_else(PoisonError::into_inner);
        let saved = vars
            .iter()
            .map(|&(key, value)| {
                let previous = std::env::var_os(key);
                unsafe { std::env::set_var(key, value) };
                (key, previous)
            })
            .collect();
        Self { saved, _lock: lock }
    }
}

impl Drop for ScopedEnvironment {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..) {
            match previous {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

fn load(flags: &[&str]) -> Result<Config, std::sync::Arc<OrthoError>> {
    let args = std::iter::once("courier-demo")
        .chain(flags.iter().copied())
        .map(OsString::from)
        .collect::<Vec<_>>();
    Config::load_from_iter(args)
}

fn failing_files(error: &OrthoError) -> Vec<PathBuf> {
    match error {
        OrthoError::File { path, .. } => vec![path.clone()],
        OrthoError::Aggregate(aggregate) => aggregate.iter().flat_map(failing_files).collect(),
        _ => Vec::new(),
    }
}

fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write config file");
    path
}

#[test]
fn every_broken_file_is_reported() {
    let dir = TempDir::new().expect("temp dir");
    let from_flag = write_config(
        dir.path(),
        "flag.toml",
        r#"request_destination = "a" reply_destination = "b""#,
    );
    let from_env = write_config(dir.path(), "env.toml", "concurrent_consumers = several");
    let from_env_text = from_env.to_string_lossy().into_owned();
    let _env = ScopedEnvironment::with(&[("COURIER_CONFIG_PATH", from_env_text.as_str())]);

    let flag_text = from_flag.to_string_lossy().into_owned();
    let error = load(&["--config-path", flag_text.as_str()]).expect_err("both files are broken");

    let mut reported = failing_files(&error);
    reported.sort();
    let mut expected = vec![from_flag, from_env];
    expected.sort();
    assert_eq!(reported, expected, "{error}");
}

#[rstest]
#[case::consumer_count_flag(&["--concurrent-consumers", "several"], &[])]
#[case::timeout_flag(&["--receive-timeout-ms", "-5"], &[])]
#[case::consumer_count_variable(&[], &[("COURIER_CONCURRENT_CONSUMERS", "many")])]
#[case::priority_variable(&[], &[("COURIER_PRIORITY", "urgent")])]
fn unparsable_values_stop_loading(
    #[case] flags: &[&str],
    #[case] vars: &[(&'static str, &str)],
) {
    let _env = ScopedEnvironment::with(vars);
    assert!(load(flags).is_err(), "flags {flags:?} and vars {vars:?} must not load");
}

#[rstest]
#[case::no_consumers(&["--concurrent-consumers", "0"], &[], ConfigError::NoConsumers)]
#[case::priority_above_nine(
    &[],
    &[("COURIER_PRIORITY", "12")],
    ConfigError::PriorityOutOfRange { priority: 12 }
)]
#[case::workers_without_queue(
    &["--worker-threads", "2", "--worker-queue-capacity", "0"],
    &[],
    ConfigError::EmptyWorkerQueue { workers: 2 }
)]
fn unrunnable_values_load_then_fail_validation(
    #[case] flags: &[&str],
    #[case] vars: &[(&'static str, &str)],
    #[case] expected: ConfigError,
) {
    let _env = ScopedEnvironment::with(vars);
    let config = load(flags).expect("values are well-formed");
    assert_eq!(config.validate(), Err(expected));
}
