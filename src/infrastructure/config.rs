use crate::domain::{
    config::LinkTermConfig,
    error::{LinkTermError, LinkTermResult},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "linkterm";
const PROJECT_DIR: &str = ".linkterm";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> LinkTermResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager over explicit file locations
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration; project keys override global keys
    pub fn load_config(&self) -> LinkTermResult<LinkTermConfig> {
        let mut merged = toml::Table::new();

        if self.global_config_path.exists() {
            debug!("Loading global config from {}", self.global_config_path.display());
            merge_tables(&mut merged, read_table(&self.global_config_path)?);
        }

        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                debug!("Loading project config from {}", project_path.display());
                merge_tables(&mut merged, read_table(project_path)?);
            }
        }

        let config: LinkTermConfig =
            toml::Value::Table(merged)
                .try_into()
                .map_err(|e: toml::de::Error| LinkTermError::Config {
                    message: format!("Failed to apply config: {}", e),
                })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the global file
    pub fn save_config(&self, config: &LinkTermConfig) -> LinkTermResult<()> {
        if let Some(parent) = self.global_config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| LinkTermError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        self.save_config_to_path(&self.global_config_path, config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> LinkTermResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| LinkTermError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join(APP_DIR).join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        Self::find_project_config_from(&current_dir)
    }

    fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        let mut path = start;

        loop {
            let config_path = path.join(PROJECT_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> LinkTermResult<LinkTermConfig> {
        let content = fs::read_to_string(path).map_err(|e| LinkTermError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: LinkTermConfig = toml::from_str(&content).map_err(|e| LinkTermError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &LinkTermConfig) -> LinkTermResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| LinkTermError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| LinkTermError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create default project configuration under `path`
    pub fn init_project_config(&self, path: &Path) -> LinkTermResult<PathBuf> {
        let config_dir = path.join(PROJECT_DIR);
        let config_file = config_dir.join(CONFIG_FILE);

        if config_file.exists() {
            return Err(LinkTermError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        fs::create_dir_all(&config_dir).map_err(|e| LinkTermError::Config {
            message: format!("Failed to create {} directory: {}", PROJECT_DIR, e),
        })?;

        self.save_config_to_path(&config_file, &LinkTermConfig::default())?;
        Ok(config_file)
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}

fn read_table(path: &Path) -> LinkTermResult<toml::Table> {
    let content = fs::read_to_string(path).map_err(|e| LinkTermError::Config {
        message: format!("Failed to read config file {}: {}", path.display(), e),
    })?;

    content.parse::<toml::Table>().map_err(|e| LinkTermError::Config {
        message: format!("Failed to parse config file {}: {}", path.display(), e),
    })
}

/// Recursive key-wise merge; `overlay` wins on conflicts
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
