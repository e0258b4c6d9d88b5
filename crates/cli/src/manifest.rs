use anyhow::Context;
use anyhow_source_location::format_context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MANIFEST_FILE_NAME: &str = "arapp.json";
pub const NETWORK_CONFIG_FILE_NAME: &str = "truffle.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Human readable role name shown in the wrapper.
    pub name: Arc<str>,
    /// Identifier hashed into the ACL role, e.g. `INCREMENT_ROLE`.
    pub id: Arc<str>,
    #[serde(default)]
    pub params: Vec<Arc<str>>,
}

fn get_default_version() -> Arc<str> {
    "1.0.0".into()
}

/// The project module descriptor (`arapp.json`). Read-only input; the CLI
/// never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Fully qualified APM name, e.g. `counter.aragonpm.eth`.
    #[serde(rename = "appName")]
    pub app_name: Arc<str>,
    /// Path to the app entry contract.
    pub path: Arc<str>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default = "get_default_version")]
    pub version: Arc<str>,
}

impl Manifest {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path).context(format_context!(
            "Failed to read project manifest {}",
            path.display()
        ))?;
        let manifest: Manifest = serde_json::from_str(contents.as_str()).context(
            format_context!("Failed to parse project manifest {}", path.display()),
        )?;
        Ok(manifest)
    }

    /// `counter.aragonpm.eth` publishes under the `counter` repo name.
    pub fn repo_name(&self) -> Arc<str> {
        self.app_name
            .split('.')
            .next()
            .unwrap_or(self.app_name.as_ref())
            .into()
    }
}

/// The truffle-style network configuration file. Mutated exactly once per
/// successful run to record the resolved registry address.
pub struct NetworkConfig {}

impl NetworkConfig {
    pub fn record_registry(path: &std::path::Path, registry: &str) -> anyhow::Result<()> {
        let mut config: serde_json::Value = if path.exists() {
            let contents = std::fs::read_to_string(path).context(format_context!(
                "Failed to read network config {}",
                path.display()
            ))?;
            serde_json::from_str(contents.as_str()).context(format_context!(
                "Failed to parse network config {}",
                path.display()
            ))?
        } else {
            serde_json::json!({})
        };

        if config["networks"]["development"].is_null() {
            config["networks"]["development"] = serde_json::json!({
                "host": "localhost",
                "network_id": "*",
            });
        }
        config["networks"]["development"]["registry"] = serde_json::json!(registry);

        let contents = serde_json::to_string_pretty(&config)
            .context(format_context!("Failed to serialize network config"))?;
        std::fs::write(path, contents).context(format_context!(
            "Failed to write network config {}",
            path.display()
        ))?;
        Ok(())
    }

    pub fn get_registry(path: &std::path::Path) -> Option<Arc<str>> {
        let contents = std::fs::read_to_string(path).ok()?;
        let config: serde_json::Value = serde_json::from_str(contents.as_str()).ok()?;
        config["networks"]["development"]["registry"]
            .as_str()
            .map(|registry| registry.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE_MANIFEST: &str = r#"{
        "appName": "counter.aragonpm.eth",
        "path": "contracts/CounterApp.sol",
        "roles": [
            { "name": "Increment the counter", "id": "INCREMENT_ROLE" },
            { "name": "Decrement the counter", "id": "DECREMENT_ROLE", "params": ["by"] }
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest: Manifest = serde_json::from_str(SAMPLE_MANIFEST).unwrap();
        assert_eq!(manifest.app_name.as_ref(), "counter.aragonpm.eth");
        assert_eq!(manifest.repo_name().as_ref(), "counter");
        assert_eq!(manifest.roles.len(), 2);
        assert_eq!(manifest.roles[1].params.len(), 1);
        assert_eq!(manifest.version.as_ref(), "1.0.0");
    }

    #[test]
    fn test_record_registry_creates_config() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(NETWORK_CONFIG_FILE_NAME);
        NetworkConfig::record_registry(&path, "0x1234").unwrap();
        let registry = NetworkConfig::get_registry(&path).unwrap();
        assert_eq!(registry.as_ref(), "0x1234");
    }

    #[test]
    fn test_record_registry_preserves_existing_fields() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(NETWORK_CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{ "networks": { "development": { "host": "127.0.0.1", "port": 8545 } } }"#,
        )
        .unwrap();
        NetworkConfig::record_registry(&path, "0xabcd").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let config: serde_json::Value = serde_json::from_str(contents.as_str()).unwrap();
        assert_eq!(config["networks"]["development"]["port"], 8545);
        assert_eq!(config["networks"]["development"]["registry"], "0xabcd");
    }

    #[test]
    fn test_get_registry_missing_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(NETWORK_CONFIG_FILE_NAME);
        assert!(NetworkConfig::get_registry(&path).is_none());
    }
}
