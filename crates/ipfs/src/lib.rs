//! IPFS availability check and daemon launcher. The daemon itself is an
//! external collaborator; this crate only detects, installs, and starts
//! it, and delegates `ipfs add` for publishing.

use anyhow::Context;
use anyhow_source_location::{format_context, format_error};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_API_PORT: u16 = 5001;
pub const DEFAULT_GATEWAY_PORT: u16 = 8080;

const BOOT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);
const BOOT_POLL_ATTEMPTS: usize = 60;

fn ipfs_logger(progress_bar: &mut printer::MultiProgressBar) -> console::Logger<'_> {
    console::Logger::new_progress(progress_bar, "ipfs".into())
}

/// Probes the daemon HTTP API. The version endpoint requires POST.
pub fn is_daemon_running(api_port: u16) -> bool {
    let client = match reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(_) => return false,
    };
    client
        .post(format!("http://localhost:{api_port}/api/v0/version"))
        .send()
        .map(|response| response.status().is_success())
        .unwrap_or(false)
}

/// Locates the `ipfs` binary: a project-local install first, then the
/// developer's PATH, and as a last resort a project-local npm install of
/// the go-ipfs distribution.
fn locate_binary(
    progress_bar: &mut printer::MultiProgressBar,
    working_directory: &Path,
) -> anyhow::Result<PathBuf> {
    if let Some(binary) = resolver::resolve("ipfs", working_directory) {
        return Ok(binary);
    }
    if let Ok(binary) = which::which("ipfs") {
        return Ok(binary);
    }

    ipfs_logger(progress_bar).message("installing go-ipfs");
    let options = printer::ExecuteOptions {
        arguments: vec!["install".into(), "--no-save".into(), "go-ipfs".into()],
        working_directory: Some(working_directory.to_string_lossy().to_string().into()),
        ..Default::default()
    };
    progress_bar
        .execute_process("npm", options)
        .context(format_context!("Failed to install go-ipfs with npm"))?;

    resolver::require("ipfs", working_directory)
        .context(format_context!("go-ipfs install did not provide an ipfs binary"))
}

fn initialize_repository(
    progress_bar: &mut printer::MultiProgressBar,
    binary: &Path,
) -> anyhow::Result<()> {
    let repo_path = std::env::var("IPFS_PATH")
        .map(PathBuf::from)
        .ok()
        .or_else(|| {
            homedir::my_home()
                .ok()
                .flatten()
                .map(|home| home.join(".ipfs"))
        });

    if let Some(repo_path) = repo_path {
        if repo_path.exists() {
            return Ok(());
        }
    }

    ipfs_logger(progress_bar).message("initializing the ipfs repository");
    let options = printer::ExecuteOptions {
        arguments: vec!["init".into()],
        ..Default::default()
    };
    progress_bar
        .execute_process(binary.to_string_lossy().as_ref(), options)
        .context(format_context!("Failed to initialize the ipfs repository"))?;
    Ok(())
}

/// Detects an already-running daemon or starts one. The spawned daemon is
/// left running when the CLI exits.
pub fn ensure_daemon(
    progress_bar: &mut printer::MultiProgressBar,
    working_directory: &Path,
    api_port: u16,
) -> anyhow::Result<()> {
    if is_daemon_running(api_port) {
        ipfs_logger(progress_bar).debug("daemon is already running");
        return Ok(());
    }

    let binary = locate_binary(progress_bar, working_directory)
        .context(format_context!("while locating the ipfs binary"))?;

    initialize_repository(progress_bar, &binary)
        .context(format_context!("while preparing the ipfs repository"))?;

    ipfs_logger(progress_bar).message(format!("starting {}", binary.display()).as_str());
    std::process::Command::new(&binary)
        .arg("daemon")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context(format_context!("Failed to start {}", binary.display()))?;

    for _ in 0..BOOT_POLL_ATTEMPTS {
        if is_daemon_running(api_port) {
            ipfs_logger(progress_bar).info("daemon is ready");
            return Ok(());
        }
        progress_bar.increment(1);
        std::thread::sleep(BOOT_POLL_INTERVAL);
    }

    Err(format_error!(
        "The ipfs daemon did not become ready within {} attempts",
        BOOT_POLL_ATTEMPTS
    ))
}

/// Adds a directory recursively and returns the root content hash.
pub fn add_recursive(
    progress_bar: &mut printer::MultiProgressBar,
    working_directory: &Path,
    path: &Path,
) -> anyhow::Result<Arc<str>> {
    let binary = locate_binary(progress_bar, working_directory)
        .context(format_context!("while locating the ipfs binary"))?;

    let options = printer::ExecuteOptions {
        arguments: vec![
            "add".into(),
            "--recursive".into(),
            "--quieter".into(),
            path.to_string_lossy().to_string().into(),
        ],
        is_return_stdout: true,
        ..Default::default()
    };

    let stdout = progress_bar
        .execute_process(binary.to_string_lossy().as_ref(), options)
        .context(format_context!("Failed to add {} to ipfs", path.display()))?;

    let hash = stdout
        .as_ref()
        .map(|output| output.trim())
        .filter(|hash| !hash.is_empty())
        .ok_or(format_error!(
            "ipfs add produced no content hash for {}",
            path.display()
        ))?;

    ipfs_logger(progress_bar).info(format!("published {} as {hash}", path.display()).as_str());
    Ok(hash.into())
}
