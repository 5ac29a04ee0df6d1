// MIT License
// Copyright 2026--present ipidrv developers

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use ipidrv_core::config::{DriverConfig, EvaluatorConfig};
use ipidrv_core::Policy;

#[derive(Debug, Parser)]
#[command(
    name = "ipidrv",
    about = "i-PI socket force driver",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// TOML configuration file; command-line flags override its values
    #[arg(short, long, value_name = "FILE", env = "IPIDRV_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Evaluator to serve with (default: from the config file, else harmonic)
    #[command(subcommand)]
    pub evaluator: Option<EvaluatorCommand>,
}

/// Socket and protocol options.
#[derive(Debug, Args)]
#[command(next_help_heading = "Connection")]
pub struct ConnectionArgs {
    /// Orchestrator host
    #[arg(long, env = "IPIDRV_HOST")]
    pub host: Option<String>,

    /// Orchestrator port
    #[arg(short, long, env = "IPIDRV_PORT")]
    pub port: Option<u16>,

    /// Seconds to wait for the orchestrator to accept
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<f64>,

    /// Seconds to wait for each command header
    #[arg(long, value_name = "SECS")]
    pub read_timeout: Option<f64>,

    /// Fail on unknown commands and unexpected POSDATA
    #[arg(long)]
    pub strict: bool,

    /// Reconnect after EXIT until the orchestrator goes away
    #[arg(long)]
    pub reconnect: bool,
}

#[derive(Debug, Subcommand)]
pub enum EvaluatorCommand {
    /// Harmonic spring to the origin
    Harmonic {
        /// Spring constant in kJ/mol
        #[arg(short, long, default_value_t = 100.0)]
        k: f64,
    },

    /// Run Gaussian for every configuration
    Gaussian {
        /// Input deck containing a `[coord]` line
        #[arg(short, long, value_name = "FILE")]
        template: PathBuf,

        /// Element symbols in orchestrator order, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        atoms: Vec<String>,

        /// Gaussian executable
        #[arg(long, default_value = "g09")]
        executable: PathBuf,

        /// Directory the input and log files are written to
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
    },
}

impl Cli {
    /// Fold the command-line flags into `cfg`.
    pub fn apply(self, cfg: &mut DriverConfig) {
        let c = self.connection;
        if let Some(host) = c.host {
            cfg.host = host;
        }
        if let Some(port) = c.port {
            cfg.port = port;
        }
        if let Some(secs) = c.connect_timeout {
            cfg.connect_timeout_secs = secs;
        }
        if c.read_timeout.is_some() {
            cfg.read_timeout_secs = c.read_timeout;
        }
        if c.strict {
            cfg.policy = Policy::Strict;
        }
        if c.reconnect {
            cfg.reconnect = true;
        }
        if let Some(ev) = self.evaluator {
            cfg.evaluator = match ev {
                EvaluatorCommand::Harmonic { k } => EvaluatorConfig::Harmonic { k },
                EvaluatorCommand::Gaussian {
                    template,
                    atoms,
                    executable,
                    workdir,
                } => EvaluatorConfig::Gaussian {
                    template,
                    atoms,
                    executable,
                    workdir,
                },
            };
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
