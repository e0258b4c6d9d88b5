use crate::{deploy, manifest, project};
use anyhow::Context;
use anyhow_source_location::{format_context, format_error};
use chain::abi;
use std::sync::Arc;

fn publish_logger(progress_bar: &mut printer::MultiProgressBar) -> console::Logger<'_> {
    console::Logger::new_progress(progress_bar, "publish".into())
}

/// `1.2.3` as the three on-chain version components.
pub fn parse_version(version: &str) -> anyhow::Result<[u16; 3]> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 {
        return Err(format_error!(
            "Version must be `major.minor.patch`: {version}"
        ));
    }
    let mut components = [0u16; 3];
    for (index, part) in parts.iter().enumerate() {
        components[index] = part
            .parse()
            .map_err(|_| format_error!("Invalid version component `{part}` in {version}"))?;
    }
    Ok(components)
}

/// Contract artifact name for the app entry path, e.g.
/// `contracts/CounterApp.sol` compiles to `CounterApp.json`.
fn entry_contract_name(manifest: &manifest::Manifest) -> anyhow::Result<Arc<str>> {
    let path = std::path::Path::new(manifest.path.as_ref());
    let stem = path
        .file_stem()
        .ok_or(format_error!(
            "Manifest path {} does not name a contract file",
            manifest.path
        ))?
        .to_string_lossy();
    Ok(stem.into())
}

/// Pushes the built artifacts to IPFS, deploys the app entry contract, and
/// registers the version in the APM registry. Returns the content hash.
pub fn execute_with(
    progress_bar: &mut printer::MultiProgressBar,
    provider: &chain::Provider,
    apm: &str,
    project: &project::Project,
) -> anyhow::Result<Arc<str>> {
    let build_directory = project.get_build_directory();
    if !build_directory.exists() {
        return Err(format_error!(
            "No build output at {}; did the compile step run?",
            build_directory.display()
        ));
    }

    let content_hash = ipfs::add_recursive(progress_bar, &project.root, &build_directory)
        .context(format_context!("while pushing artifacts to ipfs"))?;
    let content_uri = format!("ipfs:{content_hash}");

    let contract_name = entry_contract_name(&project.manifest)
        .context(format_context!("while locating the app entry contract"))?;
    let artifact = deploy::Artifact::load(project, contract_name.as_ref())
        .context(format_context!("while loading the app contract artifact"))?;
    let app_address = provider
        .deploy_contract(
            progress_bar,
            contract_name.as_ref(),
            artifact.bytecode.as_ref(),
            &[],
        )
        .context(format_context!("while deploying the app contract"))?;

    let accounts = provider
        .get_accounts()
        .context(format_context!("while fetching the developer account"))?;
    let developer = accounts
        .first()
        .ok_or(format_error!("No unlocked accounts available on the chain"))?;

    let version = parse_version(project.manifest.version.as_ref())
        .context(format_context!("while parsing the manifest version"))?;

    provider
        .transact(
            progress_bar,
            apm,
            "newRepoWithVersion(string,address,uint16[3],address,bytes)",
            &[
                abi::Token::Str(project.manifest.repo_name()),
                abi::Token::Address(developer.clone()),
                abi::Token::Uint(version[0] as u128),
                abi::Token::Uint(version[1] as u128),
                abi::Token::Uint(version[2] as u128),
                abi::Token::Address(app_address),
                abi::Token::Bytes(content_uri.clone().into_bytes()),
            ],
        )
        .context(format_context!(
            "while registering {} in the package registry",
            project.manifest.app_name
        ))?;

    publish_logger(progress_bar).message(
        format!(
            "published {} {} as {content_uri}",
            project.manifest.app_name, project.manifest.version
        )
        .as_str(),
    );

    Ok(content_hash)
}

/// The standalone `publish` command: locates the registry through the
/// recorded network configuration and the local ENS deployment.
pub fn execute(printer: &mut printer::Printer, endpoint: &str) -> anyhow::Result<()> {
    let project = project::Project::load().context(format_context!("while loading the project"))?;

    let mut multi_progress = printer::MultiProgress::new(printer);
    let mut progress_bar = multi_progress.add_progress("publish", Some(100), Some("Complete"));

    ipfs::ensure_daemon(&mut progress_bar, &project.root, ipfs::DEFAULT_API_PORT)
        .context(format_context!("while preparing ipfs"))?;

    let provider = chain::Provider::new(endpoint)
        .context(format_context!("while creating the chain provider"))?;
    if !provider.is_reachable() {
        return Err(format_error!(
            "No chain is reachable at {}; start one with `aragon run`",
            provider.endpoint
        ));
    }

    let registry = manifest::NetworkConfig::get_registry(&project.get_network_config_path())
        .ok_or(format_error!(
            "No registry recorded in {}; run `aragon run` first",
            manifest::NETWORK_CONFIG_FILE_NAME
        ))?;

    let apm = chain::ens::resolve(&provider, registry.as_ref(), deploy::APM_DOMAIN)
        .context(format_context!("while resolving the package registry"))?
        .ok_or(format_error!(
            "{} does not resolve through the registry at {registry}",
            deploy::APM_DOMAIN
        ))?;

    execute_with(&mut progress_bar, &provider, apm.as_ref(), &project)
        .context(format_context!("while publishing"))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.2.3").unwrap(), [1, 2, 3]);
        assert_eq!(parse_version("0.0.1").unwrap(), [0, 0, 1]);
    }

    #[test]
    fn test_parse_version_rejects_bad_shapes() {
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("1.2.3.4").is_err());
        assert!(parse_version("1.2.x").is_err());
    }

    #[test]
    fn test_entry_contract_name() {
        let manifest: manifest::Manifest = serde_json::from_str(
            r#"{ "appName": "counter.aragonpm.eth", "path": "contracts/CounterApp.sol" }"#,
        )
        .unwrap();
        assert_eq!(entry_contract_name(&manifest).unwrap().as_ref(), "CounterApp");
    }
}
