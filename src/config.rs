//! Settings file handling and the resolved per-run configuration.
//!
//! The settings file doubles as the ledger store: it is a single JSON object
//! holding the feed location, the RPC URL and the list of submitted hashes.

use crate::ledger::DedupLedger;
use crate::types::{FetchConfig, Result, RpcConfig, ShowTransmissionError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DEFAULT_CONFIG_NAME: &str = ".showtransmission";

/// `~/.showtransmission`, or the bare file name when no home directory is known.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(DEFAULT_CONFIG_NAME),
        _ => PathBuf::from(DEFAULT_CONFIG_NAME),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub rss_location: Option<String>,
    #[serde(default)]
    pub transmission_rpc_url: Option<String>,
    #[serde(default)]
    pub hashes: DedupLedger,
}

impl StateFile {
    /// Missing or unreadable files yield defaults; a file that is not valid JSON is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unreadable, using defaults");
                return Ok(Self::default());
            }
        };

        serde_json::from_str(&contents).map_err(|e| {
            ShowTransmissionError::Config(format!("malformed state file {}: {}", path.display(), e))
        })
    }

    /// Overwrites `path` with this state (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let buf = serde_json::to_string(self)?;
        write_atomic(path, &buf)
    }

    /// This state with command-line settings layered on top. Nothing is written.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(rss_location) = &overrides.rss_location {
            self.rss_location = Some(rss_location.clone());
        }
        if let Some(rpc_url) = &overrides.transmission_rpc_url {
            self.transmission_rpc_url = Some(rpc_url.clone());
        }
        self
    }

    pub fn to_json(&self, include_hashes: bool) -> Result<String> {
        if include_hashes {
            return Ok(serde_json::to_string(self)?);
        }
        Ok(serde_json::to_string(&serde_json::json!({
            "rss_location": self.rss_location,
            "transmission_rpc_url": self.transmission_rpc_url,
        }))?)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.file_name().map(OsString::from).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Values supplied on the command line; they win over the state file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rss_location: Option<String>,
    pub transmission_rpc_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Loads the state at `path` and applies the startup flags.
///
/// `forget` empties the stored hashes but leaves the file's settings alone; only
/// `write_config` stores the command-line settings. Returns the effective state.
pub fn prepare_state(
    path: &Path,
    overrides: &Overrides,
    write_config: bool,
    forget: bool,
) -> Result<StateFile> {
    let mut state = StateFile::load(path)?;

    if forget {
        info!(path = %path.display(), "Forgetting {} previously submitted episodes", state.hashes.len());
        DedupLedger::reset().save(path)?;
        state.hashes = DedupLedger::reset();
    }

    let state = state.with_overrides(overrides);
    if write_config {
        state.save(path)?;
    }
    Ok(state)
}

/// Everything one poll run needs, fixed before it starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub rss_location: String,
    pub transmission_rpc_url: String,
    pub ledger_path: PathBuf,
    pub fetch: FetchConfig,
    pub rpc: RpcConfig,
}

impl RunConfig {
    pub fn resolve(state: &StateFile, overrides: &Overrides, ledger_path: PathBuf) -> Result<Self> {
        let rss_location = overrides
            .rss_location
            .clone()
            .or_else(|| state.rss_location.clone())
            .ok_or_else(|| ShowTransmissionError::Config("no RSS location configured".to_string()))?;
        let transmission_rpc_url = overrides
            .transmission_rpc_url
            .clone()
            .or_else(|| state.transmission_rpc_url.clone())
            .ok_or_else(|| {
                ShowTransmissionError::Config("no Transmission RPC URL configured".to_string())
            })?;

        let mut fetch = FetchConfig::default();
        let mut rpc = RpcConfig {
            username: overrides.username.clone(),
            password: overrides.password.clone(),
            ..RpcConfig::default()
        };
        if let Some(seconds) = overrides.timeout_seconds {
            fetch.timeout_seconds = seconds;
            rpc.call_timeout = std::time::Duration::from_secs(seconds);
        }

        Ok(Self {
            rss_location,
            transmission_rpc_url,
            ledger_path,
            fetch,
            rpc,
        })
    }
}
