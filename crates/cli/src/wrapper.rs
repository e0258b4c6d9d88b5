use crate::project;
use anyhow::Context;
use anyhow_source_location::{format_context, format_error};
use std::path::{Path, PathBuf};

const WRAPPER_GIT_URL: &str = "https://github.com/aragon/aragon";

/// Pinned wrapper release. Newer revisions expect registry deployments the
/// local devchain does not carry.
const WRAPPER_REF: &str = "v0.5.4";

const WRAPPER_PORT: u16 = 3000;

fn get_wrapper_directory() -> anyhow::Result<PathBuf> {
    Ok(project::get_aragon_home()
        .context(format_context!("while locating the wrapper cache"))?
        .join("wrapper"))
}

fn clone_wrapper(
    progress_bar: &mut printer::MultiProgressBar,
    directory: &Path,
) -> anyhow::Result<()> {
    if directory.join(".git").exists() {
        console::Logger::new_progress(progress_bar, "wrapper".into())
            .debug(format!("{} is already cloned", directory.display()).as_str());
        return Ok(());
    }

    let parent = directory
        .parent()
        .ok_or(format_error!("Invalid wrapper directory"))?;
    std::fs::create_dir_all(parent).context(format_context!(
        "Failed to create wrapper cache {}",
        parent.display()
    ))?;

    console::Logger::new_progress(progress_bar, "wrapper".into())
        .message(format!("cloning {WRAPPER_GIT_URL} ({WRAPPER_REF})").as_str());

    let options = printer::ExecuteOptions {
        arguments: vec![
            "clone".into(),
            "--depth".into(),
            "1".into(),
            "--branch".into(),
            WRAPPER_REF.into(),
            WRAPPER_GIT_URL.into(),
            directory.to_string_lossy().to_string().into(),
        ],
        ..Default::default()
    };
    progress_bar
        .execute_process("git", options)
        .context(format_context!("while cloning the wrapper client"))?;
    Ok(())
}

fn install_dependencies(
    progress_bar: &mut printer::MultiProgressBar,
    directory: &Path,
    log_file: Option<&str>,
) -> anyhow::Result<()> {
    if directory.join("node_modules").exists() {
        console::Logger::new_progress(progress_bar, "wrapper".into())
            .debug("wrapper dependencies are already installed");
        return Ok(());
    }

    console::Logger::new_progress(progress_bar, "wrapper".into())
        .message("installing wrapper dependencies (this can take a while)");

    let options = printer::ExecuteOptions {
        arguments: vec!["install".into()],
        working_directory: Some(directory.to_string_lossy().to_string().into()),
        log_file_path: log_file.map(|value| value.into()),
        ..Default::default()
    };
    progress_bar
        .execute_process("npm", options)
        .context(format_context!("while installing wrapper dependencies"))?;
    Ok(())
}

/// Downloads the wrapper client into the home cache (skipping the clone and
/// install when they are already present) and starts its dev server pointed
/// at the local chain and DAO. The server is left running.
pub fn start(
    progress_bar: &mut printer::MultiProgressBar,
    port: u16,
    ens_registry: &str,
    log_file: Option<&str>,
) -> anyhow::Result<()> {
    let directory = get_wrapper_directory()?;
    clone_wrapper(progress_bar, &directory)?;
    install_dependencies(progress_bar, &directory, log_file)?;

    console::Logger::new_progress(progress_bar, "wrapper".into())
        .message(format!("starting the wrapper on port {WRAPPER_PORT}").as_str());

    std::process::Command::new("npm")
        .args(["start"])
        .current_dir(&directory)
        .env("REACT_APP_ENS_REGISTRY_ADDRESS", ens_registry)
        .env(
            "REACT_APP_DEFAULT_ETH_NODE",
            format!("http://localhost:{port}"),
        )
        .env(
            "REACT_APP_IPFS_GATEWAY",
            format!("http://localhost:{}/ipfs", ipfs::DEFAULT_GATEWAY_PORT),
        )
        .env("BROWSER", "none")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context(format_context!("Failed to start the wrapper dev server"))?;

    Ok(())
}

pub fn get_dao_url(dao: &str) -> String {
    format!("http://localhost:{WRAPPER_PORT}/#/{dao}")
}

/// Fire-and-forget browser launch. The dev server needs a moment to come up,
/// so the open happens on a helper thread after a short delay.
pub fn open_browser(url: String) {
    std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_secs(5));
        let command = if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        let _ = std::process::Command::new(command)
            .arg(url)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dao_url_embeds_address() {
        let url = get_dao_url("0x1234");
        assert_eq!(url, "http://localhost:3000/#/0x1234");
    }

    #[test]
    fn test_wrapper_directory_honors_home_override() {
        let directory = tempfile::tempdir().unwrap();
        std::env::set_var(project::ARAGON_HOME_ENV_VAR, directory.path());
        let wrapper = get_wrapper_directory().unwrap();
        std::env::remove_var(project::ARAGON_HOME_ENV_VAR);
        assert!(wrapper.starts_with(directory.path()));
        assert!(wrapper.ends_with("wrapper"));
    }
}
