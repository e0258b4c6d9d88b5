use crate::manifest;
use anyhow::Context;
use anyhow_source_location::{format_context, format_error};
use std::path::PathBuf;
use std::sync::Arc;

/// Overrides the cache directory used for wrapper downloads.
pub const ARAGON_HOME_ENV_VAR: &str = "ARAGON_HOME";

const LOGS_DIRECTORY: &str = ".aragon/logs";
const BUILD_DIRECTORY: &str = "build";

/// Home cache directory for downloads that outlive a single project
/// (`~/.aragon` unless overridden).
pub fn get_aragon_home() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var(ARAGON_HOME_ENV_VAR) {
        return Ok(PathBuf::from(home));
    }
    let home = homedir::my_home()
        .ok()
        .flatten()
        .ok_or(format_error!("Failed to locate the home directory"))?;
    Ok(home.join(".aragon"))
}

/// The developer's app project: the directory holding `arapp.json`.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub manifest: manifest::Manifest,
}

impl Project {
    pub fn load() -> anyhow::Result<Self> {
        let root = std::env::current_dir()
            .context(format_context!("Failed to get current working directory"))?;
        let manifest_path = root.join(manifest::MANIFEST_FILE_NAME);
        if !manifest_path.exists() {
            return Err(format_error!(
                "No {} found in {}; run this command from an app directory",
                manifest::MANIFEST_FILE_NAME,
                root.display()
            ));
        }
        let manifest = manifest::Manifest::load(&manifest_path)
            .context(format_context!("while loading the project manifest"))?;
        Ok(Self { root, manifest })
    }

    pub fn get_build_directory(&self) -> PathBuf {
        self.root.join(BUILD_DIRECTORY)
    }

    pub fn get_network_config_path(&self) -> PathBuf {
        self.root.join(manifest::NETWORK_CONFIG_FILE_NAME)
    }

    /// Per-task subprocess log file under `.aragon/logs`, creating the
    /// directory on first use.
    pub fn get_log_file(&self, name: &str) -> anyhow::Result<Arc<str>> {
        let logs = self.root.join(LOGS_DIRECTORY);
        std::fs::create_dir_all(&logs).context(format_context!(
            "Failed to create log directory {}",
            logs.display()
        ))?;
        Ok(logs.join(format!("{name}.log")).to_string_lossy().into())
    }
}
