use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirError {
    #[error("Directory not found: {0}")]
    DirNotFound(String),
    #[error("Config file does not exist: {0}")]
    MissingConfig(PathBuf),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type DirResult<T> = Result<T, DirError>;

/// Application name used to namespace directories.
pub static APP_NAME: &str = "reddim";

/// File name of the metric settings inside the config directory.
pub static CONFIG_FILE: &str = "config.json";

/// Environment variable pointing directly at a settings file.
pub static CONFIG_ENV: &str = "REDDIM_CONFIG";

/// Config directory from `XDG_CONFIG_HOME`, falling back to `~/.config`.
pub fn config_dir() -> DirResult<PathBuf> {
    config_dir_from(
        env::var_os("XDG_CONFIG_HOME"),
        env::home_dir().or_else(|| env::var_os("USERPROFILE").map(PathBuf::from)),
    )
}

fn config_dir_from(xdg: Option<OsString>, home: Option<PathBuf>) -> DirResult<PathBuf> {
    if let Some(dir) = xdg.filter(|d| !d.is_empty()) {
        Ok(PathBuf::from(dir).join(APP_NAME))
    } else if let Some(home) = home {
        Ok(home.join(".config").join(APP_NAME))
    } else {
        Err(DirError::DirNotFound(format!("~/.config/{}", APP_NAME)))
    }
}

/// Where the settings file lives when nothing was passed explicitly.
///
/// `REDDIM_CONFIG` wins over the XDG config directory.
pub fn default_config_file() -> DirResult<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Pick the settings file to read.
///
/// An explicit path must exist. The default location is optional, so
/// `Ok(None)` means "run with built-in defaults".
pub fn resolve_config_file(explicit: Option<&Path>) -> DirResult<Option<PathBuf>> {
    match explicit {
        Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
        Some(path) => Err(DirError::MissingConfig(path.to_path_buf())),
        None => {
            let path = default_config_file()?;
            Ok(path.is_file().then_some(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_prefers_xdg_over_home() {
        let home = PathBuf::from("/home/user");
        assert_eq!(
            config_dir_from(Some(OsString::from("/xdg")), Some(home.clone())).unwrap(),
            PathBuf::from("/xdg/reddim")
        );
        assert_eq!(
            config_dir_from(Some(OsString::new()), Some(home)).unwrap(),
            PathBuf::from("/home/user/.config/reddim")
        );
        assert!(matches!(
            config_dir_from(None, None),
            Err(DirError::DirNotFound(_))
        ));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            resolve_config_file(Some(&missing)),
            Err(DirError::MissingConfig(p)) if p == missing
        ));

        let present = dir.path().join("config.json");
        std::fs::write(&present, "{}").unwrap();
        assert_eq!(
            resolve_config_file(Some(&present)).unwrap(),
            Some(present.clone())
        );
    }
}
