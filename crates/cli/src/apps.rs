use crate::manifest;
use anyhow::Context;
use anyhow_source_location::{format_context, format_error};
use chain::abi;
use std::sync::Arc;

/// Default domain for bare DAO names: `mydao` looks up `mydao.aragonid.eth`.
const DAO_DOMAIN: &str = "aragonid.eth";

/// `SetApp(bytes32 indexed namespace, bytes32 indexed appId, address app)`
/// emitted by the kernel whenever an application is installed or upgraded.
fn set_app_topic() -> String {
    format!(
        "0x{}",
        hex::encode(abi::keccak256(b"SetApp(bytes32,bytes32,address)"))
    )
}

#[derive(Debug, Clone)]
struct InstalledApp {
    app_id: Arc<str>,
    address: Arc<str>,
}

/// Extracts (appId, app address) from one SetApp log entry. Later entries
/// for the same appId supersede earlier ones.
fn parse_set_app_log(log: &serde_json::Value) -> anyhow::Result<InstalledApp> {
    let app_id = log["topics"]
        .get(2)
        .and_then(|topic| topic.as_str())
        .ok_or(format_error!("SetApp log is missing the appId topic"))?;
    let data = log["data"]
        .as_str()
        .ok_or(format_error!("SetApp log is missing the app address"))?;
    let address = abi::address_from_word(data)
        .context(format_context!("while parsing the app address"))?;
    Ok(InstalledApp {
        app_id: app_id.into(),
        address,
    })
}

fn collect_installed_apps(logs: &[serde_json::Value]) -> anyhow::Result<Vec<InstalledApp>> {
    let mut apps: Vec<InstalledApp> = Vec::new();
    for log in logs {
        let app = parse_set_app_log(log)
            .context(format_context!("while parsing kernel logs"))?;
        if let Some(existing) = apps.iter_mut().find(|entry| entry.app_id == app.app_id) {
            existing.address = app.address;
        } else {
            apps.push(app);
        }
    }
    Ok(apps)
}

fn resolve_dao_address(
    progress_bar: &mut printer::MultiProgressBar,
    provider: &chain::Provider,
    dao: &str,
) -> anyhow::Result<Arc<str>> {
    if dao.starts_with("0x") {
        return Ok(dao.into());
    }

    let name = if dao.contains('.') {
        dao.to_string()
    } else {
        format!("{dao}.{DAO_DOMAIN}")
    };

    console::Logger::new_progress(progress_bar, "apps".into())
        .debug(format!("resolving {name}").as_str());

    let network_config = std::env::current_dir()
        .context(format_context!("Failed to get current working directory"))?
        .join(manifest::NETWORK_CONFIG_FILE_NAME);
    let registry = manifest::NetworkConfig::get_registry(&network_config).ok_or(format_error!(
        "No registry recorded in {}; pass a DAO address or run `aragon run` first",
        manifest::NETWORK_CONFIG_FILE_NAME
    ))?;

    chain::ens::resolve(provider, registry.as_ref(), name.as_str())
        .context(format_context!("while resolving {name}"))?
        .ok_or(format_error!("{name} does not resolve to a DAO"))
}

/// The `apps` command: fetches the applications installed in a DAO and
/// renders them as a table.
pub fn execute(printer: &mut printer::Printer, dao: &str, port: u16) -> anyhow::Result<()> {
    let logs = {
        let mut multi_progress = printer::MultiProgress::new(printer);
        let mut progress_bar = multi_progress.add_progress("apps", Some(100), Some("Complete"));

        let provider = chain::Provider::new(format!("http://localhost:{port}").as_str())
            .context(format_context!("while creating the chain provider"))?;
        if !provider.is_reachable() {
            return Err(format_error!(
                "No chain is reachable at {}; start one with `aragon run`",
                provider.endpoint
            ));
        }

        let dao_address = resolve_dao_address(&mut progress_bar, &provider, dao)
            .context(format_context!("while resolving the DAO"))?;

        console::Logger::new_progress(&mut progress_bar, "apps".into())
            .message(format!("inspecting {dao_address}").as_str());

        provider
            .get_logs(dao_address.as_ref(), set_app_topic().as_str())
            .context(format_context!("while fetching installed apps"))?
    };

    let apps = collect_installed_apps(&logs)
        .context(format_context!("while collecting installed apps"))?;

    let mut table = console::Table::new(vec!["App Id".into(), "Address".into()]);
    for app in apps.iter() {
        table.add_row(vec![app.app_id.clone(), app.address.clone()]);
    }

    if table.is_empty() {
        printer.log(printer::Level::Message, "No apps are installed")?;
        return Ok(());
    }
    table.show(printer);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_log(app_id: &str, address_word: &str) -> serde_json::Value {
        serde_json::json!({
            "topics": [
                set_app_topic(),
                "0x0000000000000000000000000000000000000000000000000000000000000001",
                app_id,
            ],
            "data": address_word,
        })
    }

    #[test]
    fn test_parse_set_app_log() {
        let log = sample_log(
            "0xaabb000000000000000000000000000000000000000000000000000000000000",
            "0x0000000000000000000000005b1869d9a4c187f2eaa108f3062412ecf0526b24",
        );
        let app = parse_set_app_log(&log).unwrap();
        assert!(app.app_id.as_ref().starts_with("0xaabb"));
        assert_eq!(
            app.address.as_ref(),
            "0x5b1869d9a4c187f2eaa108f3062412ecf0526b24"
        );
    }

    #[test]
    fn test_parse_set_app_log_rejects_missing_topics() {
        let log = serde_json::json!({ "topics": [set_app_topic()], "data": "0x00" });
        assert!(parse_set_app_log(&log).is_err());
    }

    #[test]
    fn test_collect_latest_app_wins() {
        let app_id = "0xaabb000000000000000000000000000000000000000000000000000000000000";
        let logs = vec![
            sample_log(
                app_id,
                "0x0000000000000000000000000000000000000000000000000000000000000001",
            ),
            sample_log(
                app_id,
                "0x0000000000000000000000000000000000000000000000000000000000000002",
            ),
        ];
        let apps = collect_installed_apps(&logs).unwrap();
        assert_eq!(apps.len(), 1);
        assert!(apps[0].address.as_ref().ends_with("0002"));
    }
}
