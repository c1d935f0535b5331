use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{ApplicationError, ConfigLoadSnafu};

pub fn load() -> Result<Config, ApplicationError> {
    envy::from_env::<Config>().context(ConfigLoadSnafu)
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,

    /// Which counting strategy this deployment uses. Not switchable at runtime.
    #[serde(rename = "counter_mode", default)]
    pub mode: CounterMode,

    /// Directory the documentation pages are served from.
    #[serde(rename = "docs_dir", default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    #[serde(rename = "log_dir", default = "default_log_dir")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CounterMode {
    /// Counts come from a third-party counting script that publishes its
    /// numbers into this service.
    #[default]
    Script,
    /// Counts are kept in the remote view store.
    Backend,
}

fn default_host() -> SocketAddr {
    ([0, 0, 0, 0], 3000).into()
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("site")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
