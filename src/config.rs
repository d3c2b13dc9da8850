//! Layered configuration.
//!
//! Command-line flags win over `VCON_*` environment variables (both
//! handled by clap), which win over the YAML file, which wins over the
//! built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vcon_vsphere::types::VsphereConfig;
use vcon_vsphere::{SessionOptions, VsphereError};

use crate::cli::GlobalArgs;
use crate::error::{AppError, AppResult};
use crate::output::OutputFormat;

pub const CONFIG_FILE_NAME: &str = ".vcon.yaml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 443;

/// Contents of `~/.vcon.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(rename = "prompt-for-password", skip_serializing_if = "Option::is_none")]
    pub prompt_for_password: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

/// Load the config file.
///
/// An explicitly requested file that does not exist is reported and the
/// default location is used instead. A missing default file is an empty
/// config.
pub fn load(requested: Option<&Path>) -> AppResult<FileConfig> {
    let path = match requested {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => {
            warn!("Could not use requested config file {}; using the default", path.display());
            default_config_path()
        }
        None => default_config_path(),
    };

    match path {
        Some(path) if path.is_file() => {
            debug!("Using config file {}", path.display());
            load_from(&path)
        }
        _ => Ok(FileConfig::default()),
    }
}

pub fn load_from(path: &Path) -> AppResult<FileConfig> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&text)
        .map_err(|e| AppError::Config(format!("Failed to parse config file {}: {e}", path.display())))
}

pub fn save(path: &Path, config: &FileConfig) -> AppResult<()> {
    fs::write(path, serde_yaml::to_string(config)?)?;
    Ok(())
}

/// Fully resolved settings of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub prompt_for_password: bool,
    pub datacenter: String,
    pub datastore: String,
    pub timeout: Duration,
    pub insecure: bool,
    pub verbose: bool,
    pub output: OutputFormat,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs, file: FileConfig) -> Self {
        let vsphere = args.vsphere.clone().or(file.vsphere).unwrap_or_default();
        let (host, port) = split_address(&vsphere);
        Self {
            host,
            port,
            username: args.username.clone().or(file.username).unwrap_or_default(),
            password: args.password.clone().or(file.password).unwrap_or_default(),
            prompt_for_password: args.prompt_for_password.or(file.prompt_for_password).unwrap_or(true),
            datacenter: args.datacenter.clone().or(file.datacenter).unwrap_or_default(),
            datastore: args.datastore.clone().or(file.datastore).unwrap_or_default(),
            timeout: Duration::from_secs(args.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS)),
            insecure: args.insecure.or(file.insecure).unwrap_or(false),
            verbose: args.verbose,
            output: args.output,
        }
    }

    /// Ask for the password when none is configured and prompting is on.
    pub fn ensure_password(&mut self) -> AppResult<()> {
        if !self.password.is_empty() || !self.prompt_for_password {
            return Ok(());
        }
        self.password = Password::new()
            .with_prompt(format!("Password for {}", self.username))
            .allow_empty_password(true)
            .interact()?;
        Ok(())
    }

    /// Missing connection settings fail like an unreachable host (exit 1).
    pub fn check(&self) -> AppResult<()> {
        let missing: Vec<&str> = [
            ("vsphere", self.host.is_empty()),
            ("username", self.username.is_empty()),
            ("datacenter", self.datacenter.is_empty()),
            ("datastore", self.datastore.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            let message = format!("Missing required settings: {}", missing.join(", "));
            Err(VsphereError::connection(message).into())
        }
    }

    pub fn vsphere_config(&self) -> VsphereConfig {
        VsphereConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            insecure: self.insecure,
            datacenter: self.datacenter.clone(),
            datastore: self.datastore.clone(),
            timeout_secs: self.timeout.as_secs(),
            ..VsphereConfig::default()
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions { timeout: self.timeout, ..SessionOptions::default() }
    }
}

/// Accepts `host`, `host:port`, or a URL such as `https://host/sdk`.
pub fn split_address(address: &str) -> (String, u16) {
    let trimmed = address.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let authority = without_scheme.split('/').next().unwrap_or_default();

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') || host.ends_with(']') => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (authority.to_string(), DEFAULT_PORT),
        },
        _ => (authority.to_string(), DEFAULT_PORT),
    }
}

/// Interactively build a config file.
pub fn prompt_file_config() -> AppResult<FileConfig> {
    let username: String = Input::new()
        .with_prompt("vSphere username")
        .allow_empty(true)
        .interact_text()?;

    let mut password = None;
    if !username.is_empty() {
        eprintln!("The password is stored in plain text; leave it empty to be prompted on each run.");
        let entered = Password::new()
            .with_prompt("vSphere password")
            .allow_empty_password(true)
            .interact()?;
        if !entered.is_empty() {
            password = Some(entered);
        }
    }

    let ask = |prompt: &str| -> AppResult<Option<String>> {
        let value: String = Input::new().with_prompt(prompt).allow_empty(true).interact_text()?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    };

    Ok(FileConfig {
        username: Some(username).filter(|u| !u.is_empty()),
        password,
        vsphere: ask("vSphere address")?,
        datacenter: ask("vSphere datacenter")?,
        datastore: ask("vSphere datastore")?,
        ..FileConfig::default()
    })
}
