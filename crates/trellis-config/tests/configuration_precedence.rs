//! Behavioural coverage for configuration layering.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use trellis_config::{
    Config, DEFAULT_CONCURRENCY, ListenEndpoint, default_listen_endpoint, default_log_filter,
    default_log_format,
};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const LISTEN_VAR: &str = "TRELLIS_LISTEN";

struct Harness {
    temp_dir: TempDir,
    file_lines: RefCell<Vec<String>>,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(&'static str, Option<OsString>)>>,
    loaded: RefCell<Option<Result<Config, String>>>,
    _guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let temp_dir = TempDir::new().expect("create temporary directory");
        let harness = Self {
            temp_dir,
            file_lines: RefCell::new(Vec::new()),
            cli_args: RefCell::new(vec![OsString::from("trellisd")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            _guard: guard,
        };
        harness.clear_env(LISTEN_VAR);
        harness.clear_env("TRELLIS_CONCURRENCY");
        harness
    }

    fn remember(&self, key: &'static str) {
        let previous = std::env::var_os(key);
        self.env_overrides.borrow_mut().push((key, previous));
    }

    fn clear_env(&self, key: &'static str) {
        self.remember(key);
        // Environment mutation is serialised by ENV_MUTEX and undone in Drop.
        unsafe { std::env::remove_var(key) };
    }

    fn set_env(&self, key: &'static str, value: &str) {
        self.remember(key);
        unsafe { std::env::set_var(key, value) };
    }

    fn add_file_line(&self, line: String) {
        self.file_lines.borrow_mut().push(line);
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() {
            return;
        }
        let mut args = self.cli_args.borrow().clone();
        let lines = self.file_lines.borrow();
        if !lines.is_empty() {
            let path = self.temp_dir.path().join("trellis.toml");
            fs::write(&path, lines.join("\n")).expect("write configuration file");
            args.insert(1, OsString::from("--config-path"));
            args.insert(2, path.into_os_string());
        }
        let result = Config::load_from_iter(args).map_err(|error| error.to_string());
        *self.loaded.borrow_mut() = Some(result);
    }

    fn config(&self) -> Config {
        self.load();
        match self.loaded.borrow().as_ref() {
            Some(Ok(config)) => config.clone(),
            Some(Err(error)) => panic!("configuration failed to load: {error}"),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            match value {
                Some(previous) => unsafe { std::env::set_var(key, previous) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the listen address to \"{address}\"")]
fn given_file_listen(harness: &Harness, address: String) {
    harness.add_file_line(format!("listen = \"{address}\""));
}

#[given("a configuration file setting the worker concurrency to {count}")]
fn given_file_concurrency(harness: &Harness, count: usize) {
    harness.add_file_line(format!("concurrency = {count}"));
}

#[given("the environment overrides the listen address to \"{address}\"")]
fn given_env_listen(harness: &Harness, address: String) {
    harness.set_env(LISTEN_VAR, &address);
}

#[when("the CLI sets the listen address to \"{address}\"")]
fn when_cli_listen(harness: &Harness, address: String) {
    let mut args = harness.cli_args.borrow_mut();
    args.push(OsString::from("--listen"));
    args.push(OsString::from(address));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults(harness: &Harness) {
    let config = harness.config();
    assert_eq!(config.listen(), &default_listen_endpoint());
    assert_eq!(config.concurrency(), DEFAULT_CONCURRENCY);
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert_eq!(config.write_timeout(), None);
}

#[then("loading the configuration resolves the listen address to \"{address}\"")]
fn then_listen(harness: &Harness, address: String) {
    let expected: ListenEndpoint = address.parse().expect("valid expected address");
    assert_eq!(harness.config().listen(), &expected);
}

#[then("loading the configuration resolves the worker concurrency to {count}")]
fn then_concurrency(harness: &Harness, count: usize) {
    assert_eq!(harness.config().concurrency(), count);
}

#[then("loading the configuration fails")]
fn then_fails(harness: &Harness) {
    harness.load();
    assert!(
        matches!(harness.loaded.borrow().as_ref(), Some(Err(_))),
        "expected configuration loading to fail"
    );
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn defaults_apply(harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The environment overrides the configuration file"
)]
fn environment_beats_file(harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Command-line flags override the environment"
)]
fn cli_beats_environment(harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Queue sizing comes from the configuration file"
)]
fn file_sets_concurrency(harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "An unsupported listen scheme is rejected"
)]
fn unsupported_scheme_rejected(harness: Harness) {
    drop(harness);
}
