//! Location of the pvrlink profile (`config.toml` with the account).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// File name of the profile inside its directory.
const CONFIG_FILE: &str = "config.toml";

/// Directory name under the XDG config home.
const APP_DIR: &str = "pvrlink";

/// Returns the profile path for this process.
///
/// An explicit `--dir` wins. Otherwise the profile lives under
/// `$XDG_CONFIG_HOME/pvrlink/`, falling back to `~/.config/pvrlink/`.
///
/// # Errors
///
/// Returns an error when neither `--dir`, `XDG_CONFIG_HOME` nor `HOME`
/// gives a location.
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    profile_path(
        dir.map(PathBuf::as_path),
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
}

fn profile_path(
    dir: Option<&Path>,
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir.join(CONFIG_FILE));
    }
    let base = match (
        xdg_config_home.filter(|v| !v.is_empty()),
        home.filter(|v| !v.is_empty()),
    ) {
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => PathBuf::from(home).join(".config"),
        (None, None) => bail!("cannot locate the profile: pass --dir or set HOME"),
    };
    Ok(base.join(APP_DIR).join(CONFIG_FILE))
}
