use crate::{apps, publish, run};
use anyhow::Context;
use anyhow_source_location::format_context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

pub const DEFAULT_CHAIN_PORT: u16 = 8545;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Level {
    Trace,
    Debug,
    Message,
    Info,
    Warning,
    Error,
}

impl From<Level> for printer::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => printer::Level::Trace,
            Level::Debug => printer::Level::Debug,
            Level::Message => printer::Level::Message,
            Level::Info => printer::Level::Info,
            Level::Warning => printer::Level::Warning,
            Level::Error => printer::Level::Error,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    /// The verbosity level of the output.
    #[arg(short, long, default_value = "message")]
    pub verbosity: Level,
    #[command(subcommand)]
    commands: Commands,
}

pub fn execute() -> anyhow::Result<()> {
    let args = Arguments::parse();
    let mut printer = printer::Printer::new_stdout();

    match args {
        Arguments {
            verbosity,
            commands: Commands::Run { port },
        } => {
            printer.verbosity.level = verbosity.into();

            run::execute(&mut printer, port)
                .context(format_context!("while running the app"))?;
        }

        Arguments {
            verbosity,
            commands: Commands::Apps { dao, port },
        } => {
            printer.verbosity.level = verbosity.into();

            apps::execute(&mut printer, dao.as_str(), port)
                .context(format_context!("while inspecting the DAO"))?;
        }

        Arguments {
            verbosity,
            commands: Commands::Publish { provider, port },
        } => {
            printer.verbosity.level = verbosity.into();

            let endpoint = provider.unwrap_or_else(|| format!("http://localhost:{port}"));
            publish::execute(&mut printer, endpoint.as_str())
                .context(format_context!("while publishing the app"))?;
        }

        Arguments {
            verbosity,
            commands: Commands::Completions { shell },
        } => {
            let _verbosity = verbosity;
            clap_complete::generate(
                shell,
                &mut Arguments::command(),
                "aragon",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compiles the app, starts a local chain and ipfs, deploys the
    /// framework, publishes the app, and opens the wrapper.
    Run {
        /// The port the local development chain listens on.
        #[arg(long, default_value_t = DEFAULT_CHAIN_PORT)]
        port: u16,
    },
    /// Lists the applications installed in a DAO.
    Apps {
        /// The DAO address or ENS name to inspect.
        dao: String,
        /// The port of the chain to query.
        #[arg(long, default_value_t = DEFAULT_CHAIN_PORT)]
        port: u16,
    },
    /// Publishes the current app version to the package registry.
    Publish {
        /// A chain RPC endpoint to publish through, overriding the port.
        #[arg(long)]
        provider: Option<String>,
        /// The port of the chain to publish to.
        #[arg(long, default_value_t = DEFAULT_CHAIN_PORT)]
        port: u16,
    },
    /// Generates shell completions for the aragon command.
    Completions {
        /// The shell to generate the completions for
        #[arg(long, value_enum)]
        shell: clap_complete::Shell,
    },
}
