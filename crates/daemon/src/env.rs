// SPDX-License-Identifier: MIT

//! Centralized environment variable access, mirroring the state-directory
//! resolution order the rest of the workspace's template uses.

use crate::config::ConfigError;
use std::path::PathBuf;

/// State directory: `LDREPL_STATE_DIR` > `XDG_STATE_HOME/ldrepl` >
/// `~/.local/state/ldrepl`.
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("LDREPL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ldrepl"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/ldrepl"))
}

/// Config file path override: `LDREPL_CONFIG`, else `<state_dir>/ldrepl.toml`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("LDREPL_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    Ok(state_dir()?.join("ldrepl.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn state_dir_prefers_ldrepl_state_dir_override() {
        std::env::set_var("LDREPL_STATE_DIR", "/tmp/ldrepl-override");
        std::env::remove_var("XDG_STATE_HOME");
        assert_eq!(state_dir().unwrap(), PathBuf::from("/tmp/ldrepl-override"));
        std::env::remove_var("LDREPL_STATE_DIR");
    }

    #[test]
    #[serial]
    fn state_dir_falls_back_to_xdg_state_home() {
        std::env::remove_var("LDREPL_STATE_DIR");
        std::env::set_var("XDG_STATE_HOME", "/tmp/xdg-state");
        assert_eq!(state_dir().unwrap(), PathBuf::from("/tmp/xdg-state/ldrepl"));
        std::env::remove_var("XDG_STATE_HOME");
    }

    #[test]
    #[serial]
    fn config_path_honors_ldrepl_config_override() {
        std::env::set_var("LDREPL_CONFIG", "/etc/ldrepl/custom.toml");
        assert_eq!(config_path().unwrap(), PathBuf::from("/etc/ldrepl/custom.toml"));
        std::env::remove_var("LDREPL_CONFIG");
    }
}
