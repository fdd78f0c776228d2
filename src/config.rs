use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

const APP_DIR: &str = "ticktock";
const DATA_FILE: &str = "timesheets.ledger";
const CONFIG_FILE: &str = "config.toml";
const LOG_FILE: &str = "ticktock.log";

pub const PAGE_SIZES: [usize; 3] = [5, 10, 20];
const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	Local,
	Remote,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
	backend: Option<BackendKind>,
	api_url: Option<String>,
	page_size: Option<usize>,
	request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub backend: BackendKind,
	pub api_url: String,
	pub page_size: usize,
	pub request_timeout: Duration,
	pub data_path: PathBuf,
	pub state_dir: PathBuf,
}

/// Flag values that win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
	pub data: Option<PathBuf>,
	pub backend: Option<BackendKind>,
	pub api_url: Option<String>,
	pub page_size: Option<usize>,
}

impl Settings {
	pub fn load(config: Option<PathBuf>, overrides: Overrides) -> AppResult<Self> {
		let state_dir = state_dir();
		let config_path = resolve_config_path(config, &state_dir);
		let file = read_config_file(&config_path)?;
		let data_path = resolve_data_path(overrides.data.clone());
		Self::from_parts(file, overrides, data_path, state_dir)
	}

	fn from_parts(file: ConfigFile, overrides: Overrides, data_path: PathBuf, state_dir: PathBuf) -> AppResult<Self> {
		let page_size = overrides.page_size.or(file.page_size).unwrap_or(PAGE_SIZES[0]);
		if !PAGE_SIZES.contains(&page_size) {
			return Err(AppError::Config(format!(
				"page size must be one of 5, 10 or 20, got {page_size}"
			)));
		}

		let timeout_secs = file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
		if timeout_secs == 0 {
			return Err(AppError::Config("request_timeout_secs must be positive".to_string()));
		}

		Ok(Self {
			backend: overrides.backend.or(file.backend).unwrap_or(BackendKind::Local),
			api_url: overrides
				.api_url
				.or(file.api_url)
				.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
			page_size,
			request_timeout: Duration::from_secs(timeout_secs),
			data_path,
			state_dir,
		})
	}

	pub fn log_path(&self) -> PathBuf {
		self.state_dir.join(LOG_FILE)
	}
}

fn read_config_file(path: &Path) -> AppResult<ConfigFile> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ConfigFile::default()),
		Err(err) => return Err(err.into()),
	};

	toml::from_str(&raw).map_err(|err| AppError::Config(format!("{}: {err}", path.display())))
}

fn resolve_config_path(cli_path: Option<PathBuf>, state_dir: &Path) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = non_empty_var("TICKTOCK_CONFIG") {
		return absolutize(path);
	}

	state_dir.join(CONFIG_FILE)
}

pub fn resolve_data_path(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = non_empty_var("TICKTOCK_DATA") {
		return absolutize(path);
	}

	data_dir().join(DATA_FILE)
}

pub fn state_dir() -> PathBuf {
	if let Some(path) = non_empty_var("TICKTOCK_STATE_DIR") {
		return path;
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".local").join("state").join(APP_DIR);
	}

	PathBuf::from(".ticktock")
}

fn data_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("APPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_DATA_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".local").join("share").join(APP_DIR);
	}

	PathBuf::from(".ticktock")
}

fn non_empty_var(key: &str) -> Option<PathBuf> {
	env::var_os(key)
		.map(PathBuf::from)
		.filter(|path| !path.as_os_str().is_empty())
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}
