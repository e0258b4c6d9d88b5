use crate::project;
use anyhow::Context;
use anyhow_source_location::{format_context, format_error};
use chain::abi;
use serde::Deserialize;
use std::sync::Arc;

/// In-memory mapping from contract name to deployed address, built
/// incrementally during the run and discarded at process exit. Order is
/// preserved for the final summary table.
#[derive(Debug, Default)]
pub struct DeploymentContext {
    entries: Vec<(Arc<str>, Arc<str>)>,
}

impl DeploymentContext {
    pub fn insert(&mut self, name: &str, address: Arc<str>) -> anyhow::Result<()> {
        if self.entries.iter().any(|(entry, _)| entry.as_ref() == name) {
            return Err(format_error!("Contract {name} was deployed twice"));
        }
        self.entries.push((name.into(), address));
        Ok(())
    }

    /// Every address must be populated before any step consumes it; the
    /// fixed task order guarantees this, so a miss is a sequencing bug.
    pub fn get(&self, name: &str) -> anyhow::Result<Arc<str>> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.as_ref() == name)
            .map(|(_, address)| address.clone())
            .ok_or(format_error!(
                "Contract {name} was consumed before it was deployed"
            ))
    }

    pub fn to_table(&self) -> console::Table {
        let mut table = console::Table::new(vec!["Contract".into(), "Address".into()]);
        for (name, address) in self.entries.iter() {
            table.add_row(vec![name.clone(), address.clone()]);
        }
        table
    }
}

/// A truffle build artifact. Only the bytecode matters here; the ABI stays
/// with the compiler toolchain.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    #[serde(rename = "contractName")]
    pub contract_name: Arc<str>,
    pub bytecode: Arc<str>,
}

impl Artifact {
    /// Looks in the project build output first, then in the framework
    /// package shipped through node_modules.
    pub fn load(project: &project::Project, name: &str) -> anyhow::Result<Self> {
        let file_name = format!("{name}.json");
        let candidates = [
            project.get_build_directory().join("contracts").join(&file_name),
            project
                .root
                .join("node_modules/@aragon/os/build/contracts")
                .join(&file_name),
        ];

        for candidate in candidates.iter() {
            if candidate.exists() {
                let contents = std::fs::read_to_string(candidate).context(format_context!(
                    "Failed to read artifact {}",
                    candidate.display()
                ))?;
                return Self::parse(contents.as_str()).context(format_context!(
                    "Failed to parse artifact {}",
                    candidate.display()
                ));
            }
        }

        Err(format_error!(
            "No build artifact found for {name}; did the compile step run?"
        ))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let artifact: Artifact = serde_json::from_str(contents)
            .context(format_context!("Artifact is not valid truffle output"))?;
        if abi::strip_hex_prefix(artifact.bytecode.as_ref()).is_empty() {
            return Err(format_error!(
                "Artifact {} has no bytecode (is it an interface?)",
                artifact.contract_name
            ));
        }
        Ok(artifact)
    }
}

/// The fixed framework deployment order: registry, factory, kernel, ACL.
/// Each entry names the constructor dependencies it wires in from the
/// context.
const FRAMEWORK_CONTRACTS: &[(&str, &str, &[&str])] = &[
    ("ens", "ENSRegistry", &[]),
    ("resolver", "PublicResolver", &["ens"]),
    ("apm", "APMRegistry", &["ens"]),
    ("daoFactory", "DAOFactory", &[]),
    ("kernel", "Kernel", &["daoFactory"]),
    ("acl", "ACL", &["kernel"]),
];

pub const APM_DOMAIN: &str = "aragonpm.eth";

pub fn deploy_framework(
    progress_bar: &mut printer::MultiProgressBar,
    provider: &chain::Provider,
    project: &project::Project,
) -> anyhow::Result<DeploymentContext> {
    let mut deployment = DeploymentContext::default();

    for (name, artifact_name, dependencies) in FRAMEWORK_CONTRACTS {
        let artifact = Artifact::load(project, artifact_name)
            .context(format_context!("while preparing to deploy {artifact_name}"))?;

        let mut constructor_args = Vec::new();
        for dependency in dependencies.iter() {
            let address = deployment
                .get(dependency)
                .context(format_context!("while wiring {artifact_name}"))?;
            constructor_args.push(abi::Token::Address(address));
        }

        let address = provider
            .deploy_contract(
                progress_bar,
                artifact_name,
                artifact.bytecode.as_ref(),
                &constructor_args,
            )
            .context(format_context!("while deploying {artifact_name}"))?;

        deployment
            .insert(name, address)
            .context(format_context!("while recording {artifact_name}"))?;
        progress_bar.increment(10);
    }

    Ok(deployment)
}

/// Registers `aragonpm.eth` in the local ENS registry and points it at the
/// APM registry, so later `publish` and `apps` invocations can resolve it
/// from the recorded registry address alone.
pub fn wire_ens(
    progress_bar: &mut printer::MultiProgressBar,
    provider: &chain::Provider,
    deployment: &DeploymentContext,
) -> anyhow::Result<()> {
    let accounts = provider
        .get_accounts()
        .context(format_context!("while fetching the developer account"))?;
    let developer = accounts
        .first()
        .ok_or(format_error!("No unlocked accounts available on the chain"))?;

    let ens = deployment.get("ens")?;
    let resolver = deployment.get("resolver")?;
    let apm = deployment.get("apm")?;

    let set_subnode_owner = "setSubnodeOwner(bytes32,bytes32,address)";
    provider
        .transact(
            progress_bar,
            ens.as_ref(),
            set_subnode_owner,
            &[
                abi::Token::Bytes32([0u8; 32]),
                abi::Token::Bytes32(abi::keccak256(b"eth")),
                abi::Token::Address(developer.clone()),
            ],
        )
        .context(format_context!("while claiming the eth node"))?;
    provider
        .transact(
            progress_bar,
            ens.as_ref(),
            set_subnode_owner,
            &[
                abi::Token::Bytes32(abi::namehash("eth")),
                abi::Token::Bytes32(abi::keccak256(b"aragonpm")),
                abi::Token::Address(developer.clone()),
            ],
        )
        .context(format_context!("while claiming the aragonpm.eth node"))?;

    let node = abi::namehash(APM_DOMAIN);
    provider
        .transact(
            progress_bar,
            ens.as_ref(),
            "setResolver(bytes32,address)",
            &[abi::Token::Bytes32(node), abi::Token::Address(resolver.clone())],
        )
        .context(format_context!("while setting the aragonpm.eth resolver"))?;
    provider
        .transact(
            progress_bar,
            resolver.as_ref(),
            "setAddr(bytes32,address)",
            &[abi::Token::Bytes32(node), abi::Token::Address(apm)],
        )
        .context(format_context!("while pointing aragonpm.eth at the registry"))?;

    Ok(())
}

/// Grants the developer account the app manager role on the kernel so the
/// wrapper can install apps.
pub fn grant_permissions(
    progress_bar: &mut printer::MultiProgressBar,
    provider: &chain::Provider,
    deployment: &DeploymentContext,
) -> anyhow::Result<()> {
    let accounts = provider
        .get_accounts()
        .context(format_context!("while fetching the developer account"))?;
    let developer = accounts
        .first()
        .ok_or(format_error!("No unlocked accounts available on the chain"))?;

    let kernel = deployment.get("kernel")?;
    let acl = deployment.get("acl")?;

    provider
        .transact(
            progress_bar,
            acl.as_ref(),
            "createPermission(address,address,bytes32,address)",
            &[
                abi::Token::Address(developer.clone()),
                abi::Token::Address(kernel),
                abi::Token::Bytes32(abi::role_hash("APP_MANAGER_ROLE")),
                abi::Token::Address(developer.clone()),
            ],
        )
        .context(format_context!("while granting the app manager role"))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_context_preserves_insertion_order() {
        let mut deployment = DeploymentContext::default();
        deployment.insert("ens", "0x1".into()).unwrap();
        deployment.insert("kernel", "0x2".into()).unwrap();
        let table = deployment.to_table();
        let lines = table.render();
        assert!(lines[2].starts_with("ens"));
        assert!(lines[3].starts_with("kernel"));
    }

    #[test]
    fn test_context_rejects_duplicate_deployments() {
        let mut deployment = DeploymentContext::default();
        deployment.insert("ens", "0x1".into()).unwrap();
        assert!(deployment.insert("ens", "0x2".into()).is_err());
    }

    #[test]
    fn test_context_rejects_consume_before_deploy() {
        let deployment = DeploymentContext::default();
        assert!(deployment.get("kernel").is_err());
    }

    #[test]
    fn test_parse_artifact() {
        let artifact = Artifact::parse(
            r#"{ "contractName": "Kernel", "bytecode": "0x6060", "abi": [] }"#,
        )
        .unwrap();
        assert_eq!(artifact.contract_name.as_ref(), "Kernel");
        assert_eq!(artifact.bytecode.as_ref(), "0x6060");
    }

    #[test]
    fn test_parse_artifact_rejects_empty_bytecode() {
        assert!(Artifact::parse(r#"{ "contractName": "IKernel", "bytecode": "0x" }"#).is_err());
    }

    #[test]
    fn test_framework_order_has_no_forward_references() {
        let mut seen: Vec<&str> = Vec::new();
        for (name, _, dependencies) in FRAMEWORK_CONTRACTS {
            for dependency in dependencies.iter() {
                assert!(seen.contains(dependency), "{name} depends on {dependency}");
            }
            seen.push(name);
        }
    }
}
