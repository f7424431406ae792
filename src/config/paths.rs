use std::path::{Path, PathBuf};

/// Overrides the config file location
pub const CONFIG_FILE_ENV: &str = "FORGESYNC_CONFIG_FILE";

/// Overrides the backup directory
pub const BACKUP_DIR_ENV: &str = "FORGESYNC_BACKUP_DIR";

/// Filesystem locations used by forgesync
#[derive(Debug, Clone)]
pub struct ForgesyncPaths {
    pub config_dir: PathBuf,
}

impl ForgesyncPaths {
    /// `~/.config/forgesync`, or `./.forgesync` when no home directory is known
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|home| home.join(".config").join("forgesync"))
            .unwrap_or_else(|| PathBuf::from(".forgesync"));
        Self { config_dir }
    }

    pub fn default_config_file(&self) -> PathBuf {
        self.config_dir.join("config.yaml")
    }

    /// Stable anonymous id used by telemetry
    pub fn device_id_file(&self) -> PathBuf {
        self.config_dir.join(".device-id")
    }

    /// Resolve the config file: flag, then env value, then the default location
    pub fn config_file(&self, flag: Option<&Path>, env: Option<String>) -> PathBuf {
        if let Some(path) = flag {
            tracing::debug!("Using config file: {}", path.display());
            return expand_tilde(path);
        }

        if let Some(path) = env.filter(|p| !p.is_empty()) {
            tracing::debug!("Using {}: {}", CONFIG_FILE_ENV, path);
            return expand_tilde(Path::new(&path));
        }

        let path = self.default_config_file();
        tracing::debug!("Using default config file: {}", path.display());
        path
    }

    /// Resolve the backup directory: flag, env value, config file, then `~/git-backups`
    pub fn backup_dir(flag: Option<&Path>, env: Option<String>, from_config: &Path) -> PathBuf {
        if let Some(path) = flag {
            return expand_tilde(path);
        }

        if let Some(path) = env.filter(|p| !p.is_empty()) {
            return expand_tilde(Path::new(&path));
        }

        if !from_config.as_os_str().is_empty() {
            return expand_tilde(from_config);
        }

        default_backup_dir()
    }
}

impl Default for ForgesyncPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn default_backup_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("git-backups"))
        .unwrap_or_else(|| PathBuf::from("git-backups"))
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}
