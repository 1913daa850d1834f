//! Session configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_CAPACITY;
use crate::error::{Result, ToupcamError};

/// Overrides the directory the SDK library is loaded from.
pub const ENV_DRIVER_DIR: &str = "AMSCOPE_DRIVER_DIR";
/// Overrides the capacity of the buffer a session creates for itself.
pub const ENV_BUFFER_CAPACITY: &str = "AMSCOPE_BUFFER_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the SDK shared library. Defaults to `~/PyAmScope`.
    pub driver_dir: Option<PathBuf>,
    /// File name of the SDK shared library. Defaults to the platform's name.
    pub library_name: Option<String>,
    /// Capacity of the frame buffer created when none is supplied.
    pub buffer_capacity: usize,
    /// Camera id passed to `Toupcam_Open`; `None` opens the first camera found.
    pub device_id: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver_dir: None,
            library_name: None,
            buffer_capacity: DEFAULT_CAPACITY,
            device_id: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    /// Defaults overlaid with `AMSCOPE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DRIVER_DIR).filter(|s| !s.is_empty()) {
            self.driver_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_BUFFER_CAPACITY) {
            self.buffer_capacity = raw.trim().parse().map_err(|_| {
                ToupcamError::InvalidConfiguration(format!("{ENV_BUFFER_CAPACITY}={raw:?} is not a number"))
            })?;
        }
        Ok(self)
    }

    pub fn with_driver_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.driver_dir = Some(dir.into());
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    /// Full path of the SDK library for the running platform.
    pub fn library_path(&self) -> Result<PathBuf> {
        self.library_path_for(std::env::consts::OS)
    }

    /// Full path of the SDK library for `os` (an `std::env::consts::OS` value).
    ///
    /// Fails with [`ToupcamError::UnsupportedPlatform`] when the vendor ships no
    /// library for `os`, even if `library_name` is set.
    pub fn library_path_for(&self, os: &str) -> Result<PathBuf> {
        let default_name = toupcam_sys::library_file_name_for(os)
            .ok_or_else(|| ToupcamError::UnsupportedPlatform(os.to_string()))?;
        let name = self.library_name.as_deref().unwrap_or(default_name);
        let dir = match &self.driver_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or(ToupcamError::HomeDirNotFound)?
                .join(toupcam_sys::DRIVER_DIR_NAME),
        };
        Ok(dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SessionConfig::from_json_str(r#"{ "device_id": "tp-1" }"#).unwrap();
        assert_eq!(config.device_id.as_deref(), Some("tp-1"));
        assert_eq!(config.buffer_capacity, DEFAULT_CAPACITY);
        assert!(config.driver_dir.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = SessionConfig::from_json_str("{ buffer_capacity: }").unwrap_err();
        assert!(matches!(err, ToupcamError::Json(_)));
    }

    #[test]
    fn environment_overrides() {
        let config = SessionConfig::default()
            .with_overrides(|key| match key {
                ENV_DRIVER_DIR => Some("/opt/toupcam".into()),
                ENV_BUFFER_CAPACITY => Some(" 4 ".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.driver_dir, Some(PathBuf::from("/opt/toupcam")));
        assert_eq!(config.buffer_capacity, 4);

        let err = SessionConfig::default()
            .with_overrides(|key| (key == ENV_BUFFER_CAPACITY).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ToupcamError::InvalidConfiguration(_)));
    }

    #[test]
    fn library_path_per_platform() {
        let config = SessionConfig::default().with_driver_dir("/drivers");
        assert_eq!(
            config.library_path_for("linux").unwrap(),
            PathBuf::from("/drivers/libtoupcam.so")
        );
        assert_eq!(
            config.library_path_for("windows").unwrap(),
            PathBuf::from("/drivers").join("toupcam.dll")
        );
        assert!(matches!(
            config.library_path_for("plan9"),
            Err(ToupcamError::UnsupportedPlatform(os)) if os == "plan9"
        ));
    }

    #[test]
    fn default_driver_dir_is_under_home() {
        if let Some(home) = dirs::home_dir() {
            let path = SessionConfig::default().library_path_for("linux").unwrap();
            assert_eq!(path, home.join("PyAmScope").join("libtoupcam.so"));
        }
    }
}
