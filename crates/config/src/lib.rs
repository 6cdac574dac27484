//! Configuration loading for lectern.
//!
//! Sources are merged in order, later sources overriding earlier ones:
//!
//! 1. built-in defaults,
//! 2. `lectern.{toml,yaml,yml,json}` in the platform configuration directory,
//! 3. an explicit file passed by the caller (format chosen by extension),
//! 4. environment variables prefixed with `LECTERN_`, using `__` to address
//!    nested keys (`LECTERN_POLL__INTERVAL_SECS=600`).
//!
//! The merged result is passed through [`Config::validated`], so a loaded
//! configuration is always usable.

pub mod error;
mod model;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
pub use crate::model::{CacheConfig, Config, FetchConfig, NotifyConfig, PollConfig};

const ENV_PREFIX: &str = "LECTERN_";
const FILE_STEM: &str = "lectern";

/// Directory searched for an implicit configuration file.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "lectern").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Build the provider chain without extracting it.
///
/// Exposed so that callers (and tests) can add providers of their own before
/// extraction.
pub fn figment(explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(dir) = config_dir() {
        figment = figment
            .merge(Toml::file(dir.join(format!("{FILE_STEM}.toml"))))
            .merge(Yaml::file(dir.join(format!("{FILE_STEM}.yaml"))))
            .merge(Yaml::file(dir.join(format!("{FILE_STEM}.yml"))))
            .merge(Json::file(dir.join(format!("{FILE_STEM}.json"))));
    }
    if let Some(path) = explicit {
        figment = merge_file(figment, path);
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

/// Load, merge and validate the configuration.
///
/// Returns [`ErrorKind::NotFound`] if `explicit` points to a missing file
/// (implicit files are optional), and [`ErrorKind::Load`] if any source is
/// malformed.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit
        && !path.is_file()
    {
        exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
    }
    extract(figment(explicit))
}

/// Extract and validate a configuration from an arbitrary provider chain.
pub fn extract(figment: Figment) -> Result<Config> {
    let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
    Ok(config.validated())
}
