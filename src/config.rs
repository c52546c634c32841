//! Locations and simulator settings resolved from the environment.

use crate::simulation::{Backend, BatchNgspice, SharedNgspice};
use clap::ValueEnum;
use std::{env, path::PathBuf, time::Duration};

pub const ENV_IN_CONTAINER: &str = "IN_CONTAINER";
pub const ENV_LIBRARIES: &str = "ELEKTRON_LIBRARIES";
pub const ENV_RESULTS: &str = "ELEKTRON_RESULTS";
pub const ENV_NGSPICE: &str = "ELEKTRON_NGSPICE";
pub const ENV_DEBUG: &str = "ELEKTRON_DEBUG";

/// Which ngspice integration runs the simulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// The ngspice shared library.
    #[default]
    Shared,
    /// The `ngspice` executable in batch mode.
    Batch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub libraries: PathBuf,
    pub results: PathBuf,
    pub backend: BackendKind,
    pub ngspice: PathBuf,
    pub timeout: Duration,
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Resolve from `var`, which looks up one environment variable.
    pub fn from_vars<F: Fn(&str) -> Option<String>>(var: F) -> Self {
        let container = var(ENV_IN_CONTAINER).as_deref() == Some("Yes");
        let (libraries, results) = if container {
            (PathBuf::from("/root/libraries"), PathBuf::from("/root/results"))
        } else {
            (PathBuf::from("libraries"), PathBuf::from("results"))
        };
        Self {
            libraries: var(ENV_LIBRARIES).map(PathBuf::from).unwrap_or(libraries),
            results: var(ENV_RESULTS).map(PathBuf::from).unwrap_or(results),
            backend: BackendKind::default(),
            ngspice: var(ENV_NGSPICE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ngspice")),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn backend(&self) -> Box<dyn Backend> {
        match self.backend {
            BackendKind::Shared => Box::new(SharedNgspice::new()),
            BackendKind::Batch => Box::new(BatchNgspice::new(&self.ngspice, self.timeout)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}
