//! Configuration management system
//!
//! Configuration is a flat key=value file (`.taskrc` style) with `#`
//! comments and `include` directives, plus per-invocation `rc.<key>=<value>`
//! overrides. Values are strings; typed accessors coerce on read. The
//! UDA schema and urgency coefficients are both read from here.

pub mod discovery;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Weekday;
use log::warn;

use crate::duration::Duration;
use crate::error::ConfigError;
use crate::task::RESERVED_ATTRIBUTES;
use discovery::discover_all_paths;

/// Maximum `include` nesting depth.
const MAX_INCLUDE_DEPTH: usize = 10;

/// Declared type of a user-defined attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdaType {
    Text,
    Date,
    Duration,
    Numeric,
}

impl UdaType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(UdaType::Text),
            "date" => Some(UdaType::Date),
            "duration" => Some(UdaType::Duration),
            "numeric" => Some(UdaType::Numeric),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UdaType::Text => "string",
            UdaType::Date => "date",
            UdaType::Duration => "duration",
            UdaType::Numeric => "numeric",
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Data directory path
    pub data_dir: PathBuf,
    /// Configuration file path
    pub config_file: PathBuf,
    /// All configuration key-value pairs
    pub settings: HashMap<String, String>,
    /// Whether to create missing directories
    pub create_dirs: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".task"),
            config_file: PathBuf::from(".taskrc"),
            settings: HashMap::new(),
            create_dirs: true,
        }
    }
}

impl Configuration {
    /// Create configuration from discovered paths
    pub fn from_discovery() -> Result<Self, ConfigError> {
        let paths = discover_all_paths()?;
        let mut config = Self {
            data_dir: paths.data_dir,
            config_file: paths.taskrc.clone(),
            settings: HashMap::new(),
            create_dirs: true,
        };

        if config.config_file.exists() {
            config.load_from_file(&paths.taskrc)?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Configuration {
            config_file: path.to_path_buf(),
            ..Default::default()
        };
        config.load_from_file(path)?;
        Ok(config)
    }

    /// Load settings from a taskrc file
    fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let mut visited: HashSet<PathBuf> = HashSet::new();
        self.load_from_file_inner(path.as_ref(), &mut visited, 0)
    }

    // Internal helper that tracks visited files and include depth
    fn load_from_file_inner(
        &mut self,
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        depth: usize,
    ) -> Result<(), ConfigError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(ConfigError::IncludeTooDeep {
                path: path.to_path_buf(),
                depth: MAX_INCLUDE_DEPTH,
            });
        }

        // Prevent include cycles
        let canon = path.to_path_buf();
        if visited.contains(&canon) {
            return Ok(());
        }
        visited.insert(canon);

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let parent = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // `include <path>` directive
            if let Some(rest) = line.strip_prefix("include ") {
                let inc_path = PathBuf::from(rest.trim());
                let resolved = if inc_path.is_relative() {
                    parent.join(inc_path)
                } else {
                    inc_path
                };
                if !resolved.exists() {
                    warn!("include not found, skipping: {}", resolved.display());
                    continue;
                }
                self.load_from_file_inner(&resolved, visited, depth + 1)?;
                continue;
            }

            if let Some((raw_key, raw_value)) = line.split_once('=') {
                let key = raw_key.trim().to_string();
                let value = raw_value.trim().to_string();

                if key == "data.location" {
                    self.data_dir = PathBuf::from(&value);
                }
                self.settings.insert(key, value);
            } else {
                return Err(ConfigError::ParseError {
                    line: line_num + 1,
                    content: line.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Apply a command-line `rc.<key>=<value>` override. Returns false
    /// when the argument is not an override.
    pub fn apply_override(&mut self, arg: &str) -> bool {
        let Some(rest) = arg.strip_prefix("rc.") else {
            return false;
        };
        let Some((key, value)) = rest.split_once('=') else {
            return false;
        };
        if key == "data.location" {
            self.data_dir = PathBuf::from(value);
        }
        self.settings.insert(key.to_string(), value.to_string());
        true
    }

    /// Get a configuration value
    pub fn get(&self, key: &str) -> Option<&String> {
        self.settings.get(key)
    }

    /// Get a configuration value with default
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.settings
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Set a configuration value
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.settings.insert(key.into(), value.into());
    }

    // -- Typed accessors -----------------------------------------------------

    /// Boolean coercion: on/off, true/false, yes/no, 1/0.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.settings.get(key).map(|v| v.as_str()) {
            Some("on" | "true" | "yes" | "1") => true,
            Some("off" | "false" | "no" | "0") => false,
            _ => default,
        }
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.settings.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_real(&self, key: &str) -> Option<f64> {
        self.settings.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.settings.get(key).and_then(|v| Duration::parse(v).ok())
    }

    /// Whether file locking is enabled (`locking`, default on).
    pub fn locking(&self) -> bool {
        self.get_bool("locking", true)
    }

    /// Whether destructive bulk commands need confirmation
    /// (`confirmation`, default on).
    pub fn confirmation(&self) -> bool {
        self.get_bool("confirmation", true)
    }

    /// Whether recurring parents materialize children (`recurrence`,
    /// default on).
    pub fn recurrence(&self) -> bool {
        self.get_bool("recurrence", true)
    }

    /// Whether completing a blocker shifts dependent due dates
    /// (`dependency.shift`, default off).
    pub fn dependency_shift(&self) -> bool {
        self.get_bool("dependency.shift", false)
    }

    /// The `dateformat` setting, defaulting to `m/d/Y`.
    pub fn date_format(&self) -> String {
        self.get_or("dateformat", "m/d/Y")
    }

    /// First day of the week (`weekstart`, default Sunday).
    pub fn weekstart(&self) -> Weekday {
        match self
            .get_or("weekstart", "sunday")
            .to_lowercase()
            .as_str()
        {
            "monday" | "mon" => Weekday::Mon,
            "tuesday" | "tue" => Weekday::Tue,
            "wednesday" | "wed" => Weekday::Wed,
            "thursday" | "thu" => Weekday::Thu,
            "friday" | "fri" => Weekday::Fri,
            "saturday" | "sat" => Weekday::Sat,
            _ => Weekday::Sun,
        }
    }

    /// Urgency coefficient for a component, with its documented default.
    pub fn urgency_coefficient(&self, component: &str, default: f64) -> f64 {
        self.get_real(&format!("urgency.{component}.coefficient"))
            .unwrap_or(default)
    }

    /// The declared UDA schema: every `uda.<name>.type` setting,
    /// validated against the reserved attribute names.
    pub fn uda_schema(&self) -> Result<BTreeMap<String, UdaType>, ConfigError> {
        let mut schema = BTreeMap::new();
        for (key, value) in &self.settings {
            let Some(rest) = key.strip_prefix("uda.") else {
                continue;
            };
            let Some(name) = rest.strip_suffix(".type") else {
                continue;
            };

            if RESERVED_ATTRIBUTES.contains(&name) {
                return Err(ConfigError::ReservedUdaName {
                    name: name.to_string(),
                });
            }
            let uda_type =
                UdaType::from_name(value).ok_or_else(|| ConfigError::InvalidUdaType {
                    name: name.to_string(),
                    declared: value.clone(),
                })?;
            schema.insert(name.to_string(), uda_type);
        }
        Ok(schema)
    }

    // -- Data files ----------------------------------------------------------

    pub fn pending_data_file(&self) -> PathBuf {
        self.data_dir.join("pending.data")
    }

    pub fn completed_data_file(&self) -> PathBuf {
        self.data_dir.join("completed.data")
    }

    pub fn undo_data_file(&self) -> PathBuf {
        self.data_dir.join("undo.data")
    }

    pub fn backlog_data_file(&self) -> PathBuf {
        self.data_dir.join("backlog.data")
    }

    /// Ensure data directory exists
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        if !self.data_dir.exists() && self.create_dirs {
            fs::create_dir_all(&self.data_dir).map_err(|e| ConfigError::Io {
                path: self.data_dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Configuration builder for programmatic setup
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    data_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    overrides: HashMap<String, String>,
    create_dirs: bool,
}

impl ConfigurationBuilder {
    /// Create new configuration builder
    pub fn new() -> Self {
        Self {
            create_dirs: true,
            ..Default::default()
        }
    }

    /// Set custom data directory
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Set custom config file
    pub fn config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Add configuration override
    pub fn set<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Set whether to create missing directories
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.create_dirs = create;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Configuration, ConfigError> {
        let mut config = if let Some(config_file) = self.config_file {
            Configuration::from_file(config_file)?
        } else {
            Configuration::from_discovery()?
        };

        // Apply overrides
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }

        config.create_dirs = self.create_dirs;

        for (key, value) in self.overrides {
            config.set(key, value);
        }

        // Surface schema problems at startup rather than first use.
        config.uda_schema()?;
        config.ensure_data_dir()?;

        Ok(config)
    }
}
