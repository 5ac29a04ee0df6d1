// MIT License
// Copyright 2026--present ipidrv developers

//! TOML configuration for the `ipidrv` binary.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! lenient harmonic driver connecting to `127.0.0.1:31415`:
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 31415
//! connect_timeout_secs = 10.0
//! read_timeout_secs = 60.0
//! policy = "strict"
//! reconnect = true
//!
//! [evaluator]
//! kind = "gaussian"
//! template = "water.gjf"
//! atoms = ["O", "H", "H"]
//! executable = "g16"
//! workdir = "/scratch/run"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::ConnectOptions;
use crate::error::{DriverError, Result};
use crate::evaluator::{Evaluator, Gaussian, Harmonic};
use crate::session::Policy;

/// Top-level driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f64,
    /// Per-header wait; absent means block indefinitely.
    #[serde(default)]
    pub read_timeout_secs: Option<f64>,
    #[serde(default)]
    pub policy: Policy,
    /// Reconnect after EXIT or a dropped connection.
    #[serde(default)]
    pub reconnect: bool,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

/// Which evaluator to build, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EvaluatorConfig {
    /// Spring constant `k` in kJ/mol.
    Harmonic {
        #[serde(default = "default_k")]
        k: f64,
    },
    Gaussian {
        /// Input deck containing a `[coord]` line.
        template: PathBuf,
        /// Element symbols in orchestrator order.
        atoms: Vec<String>,
        #[serde(default = "default_gaussian_executable")]
        executable: PathBuf,
        #[serde(default = "default_workdir")]
        workdir: PathBuf,
    },
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    31415
}

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_k() -> f64 {
    100.0
}

fn default_gaussian_executable() -> PathBuf {
    PathBuf::from("g09")
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: None,
            policy: Policy::default(),
            reconnect: false,
            evaluator: EvaluatorConfig::default(),
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::Harmonic { k: default_k() }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl DriverConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DriverError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Socket and protocol settings for [`crate::driver`].
    pub fn connect_options(&self) -> Result<ConnectOptions> {
        let connect_timeout = secs("connect_timeout_secs", self.connect_timeout_secs)?;
        let header_timeout = self
            .read_timeout_secs
            .map(|s| secs("read_timeout_secs", s))
            .transpose()?;
        Ok(ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            connect_timeout,
            header_timeout,
            policy: self.policy,
        })
    }

    /// Build a fresh evaluator; called once per connection.
    pub fn build_evaluator(&self) -> Result<Box<dyn Evaluator + Send>> {
        match &self.evaluator {
            EvaluatorConfig::Harmonic { k } => Ok(Box::new(Harmonic::new(*k))),
            EvaluatorConfig::Gaussian {
                template,
                atoms,
                executable,
                workdir,
            } => {
                if atoms.is_empty() {
                    return Err(DriverError::Config(
                        "gaussian evaluator needs at least one atom symbol".into(),
                    ));
                }
                Ok(Box::new(Gaussian::from_template_file(
                    template,
                    atoms.clone(),
                    executable.clone(),
                    workdir.clone(),
                )?))
            }
        }
    }
}

fn secs(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        DriverError::Config(format!("{field} must be finite and non-negative, got {value}"))
    })
}
