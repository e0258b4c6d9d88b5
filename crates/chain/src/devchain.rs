//! Boots a local development chain when the configured endpoint is not
//! reachable.

use crate::Provider;
use anyhow::Context;
use anyhow_source_location::{format_context, format_error};

/// Deterministic accounts so deployed addresses are stable across runs.
pub const MNEMONIC: &str =
    "explain tackle mirror kit van hammer degree position ginger unfair soup boat zone";

const BOOT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);
const BOOT_POLL_ATTEMPTS: usize = 60;

fn devchain_logger(progress_bar: &mut printer::MultiProgressBar) -> console::Logger<'_> {
    console::Logger::new_progress(progress_bar, "devchain".into())
}

/// Locates `ganache-cli` through the binary resolver and spawns it in the
/// background. The child is intentionally left running when the CLI exits;
/// the developer owns its lifetime.
pub fn start(
    progress_bar: &mut printer::MultiProgressBar,
    working_directory: &std::path::Path,
    port: u16,
) -> anyhow::Result<Provider> {
    let binary = resolver::require("ganache-cli", working_directory)
        .context(format_context!("while locating the development chain binary"))?;

    devchain_logger(progress_bar)
        .message(format!("starting {} on port {port}", binary.display()).as_str());

    std::process::Command::new(&binary)
        .arg("--port")
        .arg(port.to_string())
        .arg("--mnemonic")
        .arg(MNEMONIC)
        .current_dir(working_directory)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context(format_context!(
            "Failed to start development chain {}",
            binary.display()
        ))?;

    let provider = Provider::new(format!("http://localhost:{port}").as_str())
        .context(format_context!("while connecting to the development chain"))?;

    wait_until_ready(progress_bar, &provider)
        .context(format_context!("while waiting for the development chain"))?;

    Ok(provider)
}

pub fn wait_until_ready(
    progress_bar: &mut printer::MultiProgressBar,
    provider: &Provider,
) -> anyhow::Result<()> {
    for _ in 0..BOOT_POLL_ATTEMPTS {
        if provider.is_reachable() {
            devchain_logger(progress_bar).info(format!("{} is ready", provider.endpoint).as_str());
            return Ok(());
        }
        progress_bar.increment(1);
        std::thread::sleep(BOOT_POLL_INTERVAL);
    }

    Err(format_error!(
        "Chain at {} did not become ready within {} attempts",
        provider.endpoint,
        BOOT_POLL_ATTEMPTS
    ))
}

/// "Attempt primary endpoint, on failure start and connect to a local
/// chain" — the connector never assumes a chain is already running.
pub fn connect_or_start(
    progress_bar: &mut printer::MultiProgressBar,
    working_directory: &std::path::Path,
    port: u16,
) -> anyhow::Result<Provider> {
    let provider = Provider::new(format!("http://localhost:{port}").as_str())
        .context(format_context!("while creating the chain provider"))?;

    if provider.is_reachable() {
        devchain_logger(progress_bar)
            .debug(format!("reusing chain at {}", provider.endpoint).as_str());
        return Ok(provider);
    }

    start(progress_bar, working_directory, port)
        .context(format_context!("while starting a local development chain"))
}
