use crate::{deploy, manifest, project, publish, wrapper};
use anyhow::Context;
use anyhow_source_location::{format_context, format_error};

#[derive(Debug, Clone, Copy, PartialEq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
enum Step {
    Compile,
    Chain,
    Ipfs,
    Deploy,
    Permissions,
    Record,
    Publish,
    Wrapper,
    Browser,
}

const STEPS: &[Step] = &[
    Step::Compile,
    Step::Chain,
    Step::Ipfs,
    Step::Deploy,
    Step::Permissions,
    Step::Record,
    Step::Publish,
    Step::Wrapper,
    Step::Browser,
];

/// State threaded through the pipeline. Each step fills in what later steps
/// consume; a step finding its output missing is a pipeline ordering bug.
struct RunContext {
    port: u16,
    project: project::Project,
    provider: Option<chain::Provider>,
    deployment: deploy::DeploymentContext,
}

impl RunContext {
    fn get_provider(&self) -> anyhow::Result<&chain::Provider> {
        self.provider
            .as_ref()
            .ok_or(format_error!("The chain step has not run yet"))
    }
}

fn compile(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    let binary = resolver::require("truffle", &context.project.root)
        .context(format_context!("while locating the contract compiler"))?;

    console::Logger::new_progress(progress_bar, "compile".into())
        .message(format!("compiling contracts with {}", binary.display()).as_str());

    let options = printer::ExecuteOptions {
        arguments: vec!["compile".into(), "--all".into()],
        working_directory: Some(context.project.root.to_string_lossy().to_string().into()),
        log_file_path: Some(
            context
                .project
                .get_log_file("truffle-compile")
                .context(format_context!("while preparing the compile log"))?,
        ),
        ..Default::default()
    };
    progress_bar
        .execute_process(binary.to_string_lossy().as_ref(), options)
        .context(format_context!("while compiling the contracts"))?;
    Ok(())
}

fn start_chain(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    let provider =
        chain::devchain::connect_or_start(progress_bar, &context.project.root, context.port)
            .context(format_context!("while bringing up the development chain"))?;
    context.provider = Some(provider);
    Ok(())
}

fn start_ipfs(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    ipfs::ensure_daemon(
        progress_bar,
        &context.project.root,
        ipfs::DEFAULT_API_PORT,
    )
    .context(format_context!("while bringing up the ipfs daemon"))
}

fn deploy_contracts(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    let provider = context.get_provider()?;
    let deployment = deploy::deploy_framework(progress_bar, provider, &context.project)
        .context(format_context!("while deploying the framework contracts"))?;
    deploy::wire_ens(progress_bar, provider, &deployment)
        .context(format_context!("while wiring the name registry"))?;
    context.deployment = deployment;
    Ok(())
}

fn grant_permissions(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    deploy::grant_permissions(progress_bar, context.get_provider()?, &context.deployment)
        .context(format_context!("while granting developer permissions"))
}

fn record_registry(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    let registry = context.deployment.get("ens")?;
    let path = context.project.get_network_config_path();
    manifest::NetworkConfig::record_registry(&path, registry.as_ref())
        .context(format_context!("while recording the registry address"))?;
    console::Logger::new_progress(progress_bar, "record".into())
        .message(format!("recorded registry {registry} in {}", path.display()).as_str());
    Ok(())
}

fn publish_app(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    let apm = context.deployment.get("apm")?;
    let content_hash = publish::execute_with(
        progress_bar,
        context.get_provider()?,
        apm.as_ref(),
        &context.project,
    )
    .context(format_context!("while publishing the app"))?;
    context.deployment.insert("content", content_hash)?;
    Ok(())
}

fn start_wrapper(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    let ens = context.deployment.get("ens")?;
    let log_file = context
        .project
        .get_log_file("wrapper")
        .context(format_context!("while preparing the wrapper log"))?;
    wrapper::start(
        progress_bar,
        context.port,
        ens.as_ref(),
        Some(log_file.as_ref()),
    )
    .context(format_context!("while starting the wrapper client"))
}

fn open_browser(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
) -> anyhow::Result<()> {
    let dao = context.deployment.get("kernel")?;
    let url = wrapper::get_dao_url(dao.as_ref());
    console::Logger::new_progress(progress_bar, "browser".into())
        .message(format!("opening {url}").as_str());
    wrapper::open_browser(url);
    Ok(())
}

fn execute_step(
    progress_bar: &mut printer::MultiProgressBar,
    context: &mut RunContext,
    step: Step,
) -> anyhow::Result<()> {
    match step {
        Step::Compile => compile(progress_bar, context),
        Step::Chain => start_chain(progress_bar, context),
        Step::Ipfs => start_ipfs(progress_bar, context),
        Step::Deploy => deploy_contracts(progress_bar, context),
        Step::Permissions => grant_permissions(progress_bar, context),
        Step::Record => record_registry(progress_bar, context),
        Step::Publish => publish_app(progress_bar, context),
        Step::Wrapper => start_wrapper(progress_bar, context),
        Step::Browser => open_browser(progress_bar, context),
    }
}

/// The `run` command: compiles the app, brings up the devchain and ipfs,
/// deploys the framework, publishes the app, and launches the wrapper. The
/// pipeline is strictly sequential; the first failing step aborts the run.
pub fn execute(printer: &mut printer::Printer, port: u16) -> anyhow::Result<()> {
    let project = project::Project::load().context(format_context!("while loading the project"))?;

    printer.log(
        printer::Level::Message,
        format!("Running {} on port {port}", project.manifest.app_name).as_str(),
    )?;

    let mut context = RunContext {
        port,
        project,
        provider: None,
        deployment: deploy::DeploymentContext::default(),
    };

    {
        let mut multi_progress = printer::MultiProgress::new(printer);
        for step in STEPS {
            let name = step.to_string();
            let mut progress_bar =
                multi_progress.add_progress(name.as_str(), Some(100), Some("Complete"));
            execute_step(&mut progress_bar, &mut context, *step)
                .context(format_context!("while running the {name} step"))?;
        }
    }

    context.deployment.to_table().show(printer);
    printer.log(
        printer::Level::Message,
        format!(
            "The wrapper is available at {}",
            wrapper::get_dao_url(context.deployment.get("kernel")?.as_ref())
        )
        .as_str(),
    )?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_order_deploys_before_publishing() {
        let deploy = STEPS.iter().position(|step| *step == Step::Deploy).unwrap();
        let publish = STEPS
            .iter()
            .position(|step| *step == Step::Publish)
            .unwrap();
        let browser = STEPS
            .iter()
            .position(|step| *step == Step::Browser)
            .unwrap();
        assert!(deploy < publish);
        assert_eq!(browser, STEPS.len() - 1);
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(Step::Ipfs.to_string(), "ipfs");
        assert_eq!(Step::Permissions.to_string(), "permissions");
    }
}
