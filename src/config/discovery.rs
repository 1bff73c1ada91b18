//! Data and config path discovery
//!
//! The classic layout puts the data directory at `~/.task` and the
//! configuration at `~/.taskrc`; XDG locations are honored when
//! present, and the `TASKDATA`/`TASKRC` environment variables override
//! everything.

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Discover the default data directory.
pub fn discover_data_dir() -> Result<PathBuf, ConfigError> {
    // Priority order:
    // 1. TASKDATA environment variable
    // 2. XDG_DATA_HOME/task
    // 3. ~/.task (legacy default)

    if let Ok(taskdata) = env::var("TASKDATA") {
        let path = PathBuf::from(taskdata);
        if path.is_absolute() {
            return Ok(path);
        }
        return Err(ConfigError::Discovery {
            message: "TASKDATA must be an absolute path".to_string(),
        });
    }

    if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
        let xdg_path = PathBuf::from(&xdg_data);
        if xdg_path.is_absolute() {
            let candidate = xdg_path.join("task");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    if let Some(home_dir) = dirs::home_dir() {
        Ok(home_dir.join(".task"))
    } else {
        Err(ConfigError::Discovery {
            message: "Could not determine home directory for the data path".to_string(),
        })
    }
}

/// Discover the default taskrc file location.
pub fn discover_taskrc() -> Result<PathBuf, ConfigError> {
    // Priority order:
    // 1. TASKRC environment variable
    // 2. XDG_CONFIG_HOME/task/taskrc
    // 3. ~/.taskrc (legacy default)

    if let Ok(taskrc) = env::var("TASKRC") {
        let path = PathBuf::from(taskrc);
        if path.is_absolute() {
            return Ok(path);
        }
        return Err(ConfigError::Discovery {
            message: "TASKRC must be an absolute path".to_string(),
        });
    }

    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        let xdg_path = PathBuf::from(&xdg_config);
        if xdg_path.is_absolute() {
            let candidate = xdg_path.join("task").join("taskrc");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    if let Some(home_dir) = dirs::home_dir() {
        Ok(home_dir.join(".taskrc"))
    } else {
        Err(ConfigError::Discovery {
            message: "Could not determine home directory for the taskrc location".to_string(),
        })
    }
}

/// All discovered paths.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPaths {
    pub data_dir: PathBuf,
    pub taskrc: PathBuf,
}

/// Resolve the data directory and taskrc location.
pub fn discover_all_paths() -> Result<DiscoveredPaths, ConfigError> {
    Ok(DiscoveredPaths {
        data_dir: discover_data_dir()?,
        taskrc: discover_taskrc()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

    #[test]
    fn test_discover_data_dir_default() {
        let _guard = ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap();
        env::remove_var("TASKDATA");
        env::remove_var("XDG_DATA_HOME");

        let data_dir = discover_data_dir().unwrap();
        assert!(data_dir.is_absolute());
        assert!(data_dir.to_string_lossy().contains("task"));
    }

    #[test]
    fn test_taskdata_env_override() {
        let _guard = ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap();
        let temp_path = "/tmp/test_taskdata";
        env::set_var("TASKDATA", temp_path);

        let data_dir = discover_data_dir().unwrap();
        env::remove_var("TASKDATA");
        assert_eq!(data_dir, PathBuf::from(temp_path));
    }

    #[test]
    fn test_taskdata_relative_path_error() {
        let _guard = ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap();
        env::set_var("TASKDATA", "relative/path");

        let result = discover_data_dir();
        env::remove_var("TASKDATA");

        assert!(matches!(result, Err(ConfigError::Discovery { .. })));
    }

    #[test]
    fn test_discover_all_paths() {
        let _guard = ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap();
        env::remove_var("TASKDATA");
        env::remove_var("TASKRC");

        let paths = discover_all_paths().unwrap();
        assert!(paths.data_dir.is_absolute());
        assert!(paths.taskrc.is_absolute());
    }
}
