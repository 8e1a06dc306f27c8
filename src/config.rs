use crate::error::FilederError;
use crate::options::{MB, SearchOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::formats::CommaSeparator;
use serde_with::{StringWithSeparator, serde_as};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "fileder";
const CONFIG_FILE_NAME: &str = "config.toml";
const HOME_CONFIG_NAME: &str = ".fileder.toml";
const LOCAL_CONFIG_NAME: &str = "fileder.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub filters: FilterConfig,
    pub output: OutputConfig,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub context_chars: usize,
    pub max_file_size_mb: u64,
    pub search_hidden_files: bool,
    pub timeout_seconds: u64,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            context_chars: 20,
            max_file_size_mb: 100,
            search_hidden_files: false,
            timeout_seconds: 10,
            log_level: "info".to_string(),
        }
    }
}

/// Extension and path lists are stored as comma-separated strings.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, String>")]
    pub excluded_extensions: Vec<String>,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, String>")]
    pub included_extensions: Vec<String>,
    pub max_depth: usize,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, String>")]
    pub excluded_paths: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_extensions: [".exe", ".dll", ".bin", ".iso", ".img", ".zip", ".tar.gz", ".7z"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            included_extensions: Vec::new(),
            max_depth: 5,
            excluded_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub save_results: bool,
    pub results_folder: PathBuf,
    pub highlight_matches: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_results: true,
            results_folder: PathBuf::from("search_results"),
            highlight_matches: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            filters: FilterConfig::default(),
            output: OutputConfig::default(),
            source: None,
        }
    }
}

impl Config {
    /// Loads `explicit` if given, else the first configuration file found,
    /// else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if path.exists() {
                return Some(path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(HOME_CONFIG_NAME);
            if path.exists() {
                return Some(path);
            }
        }

        let local = Path::new(LOCAL_CONFIG_NAME);
        local.exists().then(|| local.to_path_buf())
    }

    /// Where `save` writes when no file was loaded.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_NAME))
    }

    /// The file this configuration came from, or [`default_path`](Self::default_path).
    pub fn target_path(&self) -> PathBuf {
        self.source.clone().unwrap_or_else(Self::default_path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Back to defaults; the source file is kept so a later save overwrites it.
    pub fn reset(&mut self) {
        let source = self.source.take();
        *self = Self {
            source,
            ..Self::default()
        };
    }

    pub fn search_options(&self) -> crate::error::Result<SearchOptions> {
        if self.general.max_file_size_mb == 0 {
            return Err(FilederError::Config(
                "max_file_size_mb must be greater than 0".to_string(),
            ));
        }
        let options = SearchOptions {
            context_chars: self.general.context_chars,
            max_file_size_bytes: self.general.max_file_size_mb.saturating_mul(MB),
            search_hidden_files: self.general.search_hidden_files,
            timeout_seconds: self.general.timeout_seconds,
            max_depth: self.filters.max_depth,
            ..SearchOptions::default()
        }
        .with_excluded_extensions(&self.filters.excluded_extensions)
        .with_included_extensions(&self.filters.included_extensions)
        .with_excluded_paths(&self.filters.excluded_paths);
        options.validate()?;
        Ok(options)
    }

    /// System locations that are rarely worth searching on this platform.
    pub fn suggested_excluded_paths() -> Vec<String> {
        let paths: &[&str] = if cfg!(target_os = "macos") {
            &[
                "/System",
                "/private/var/vm",
                "/Library/Caches",
                "/Library/Updates",
                "~/Library/Caches",
                "~/Library/Containers",
                "~/Library/Application Support/MobileSync",
            ]
        } else if cfg!(windows) {
            &[
                "C:\\Windows\\System32",
                "C:\\Windows\\SysWOW64",
                "C:\\Windows\\WinSxS",
                "C:\\$Recycle.Bin",
                "C:\\ProgramData\\Microsoft",
            ]
        } else if cfg!(target_os = "linux") {
            &[
                "/proc",
                "/sys",
                "/dev",
                "/run",
                "/tmp",
                "/var/cache",
                "/var/tmp",
            ]
        } else {
            &[]
        };
        paths.iter().map(|p| p.to_string()).collect()
    }

    /// Appends paths not yet excluded; returns how many were added.
    pub fn add_excluded_paths<I, S>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() || self.filters.excluded_paths.iter().any(|p| p.trim() == path) {
                continue;
            }
            self.filters.excluded_paths.push(path.to_string());
            added += 1;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.general.context_chars, 20);
        assert_eq!(config.general.max_file_size_mb, 100);
        assert_eq!(config.general.timeout_seconds, 10);
        assert_eq!(config.filters.max_depth, 5);
        assert!(config.filters.excluded_extensions.contains(&".tar.gz".to_string()));
        assert!(config.output.save_results);
        assert_eq!(config.output.results_folder, PathBuf::from("search_results"));
    }

    #[test]
    fn comma_lists_are_plain_strings_on_disk() {
        let toml_text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_text.contains("excluded_extensions = \".exe,.dll,.bin,.iso,.img,.zip,.tar.gz,.7z\""));
        assert!(toml_text.contains("included_extensions = \"\""));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[general]\ncontext_chars = 7\n\n[filters]\nincluded_extensions = \".rs, .toml\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.general.context_chars, 7);
        assert_eq!(config.general.timeout_seconds, 10);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));

        let opts = config.search_options().unwrap();
        assert_eq!(opts.context_chars, 7);
        assert_eq!(opts.included_extensions, vec![".rs", ".toml"]);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.general.search_hidden_files = true;
        config.filters.excluded_paths = vec!["/proc".into(), "/sys".into()];
        config.save(&path).unwrap();

        let mut loaded = Config::load_from(&path).unwrap();
        loaded.source = None;
        assert_eq!(loaded, config);
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general\ncontext_chars = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn zero_file_size_is_rejected() {
        let mut config = Config::default();
        config.general.max_file_size_mb = 0;
        assert!(config.search_options().is_err());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut config = Config::default();
        config.general.context_chars = 99;
        config.source = Some(PathBuf::from("/tmp/x.toml"));
        config.reset();
        assert_eq!(config.general.context_chars, 20);
        assert_eq!(config.source, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn excluded_paths_are_merged_without_duplicates() {
        let mut config = Config::default();
        assert_eq!(config.add_excluded_paths(["/proc", "/sys", "/proc", " "]), 2);
        assert_eq!(config.add_excluded_paths(["/sys"]), 0);
        assert_eq!(config.filters.excluded_paths, vec!["/proc", "/sys"]);
    }
}
