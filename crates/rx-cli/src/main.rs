mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rx_telemetry::logging::LogFormat;
use uuid::Uuid;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// repo-xml CLI -- fetch repository context, queue AI change requests and
/// stage the answers as pull requests.
#[derive(Parser)]
#[command(name = "rx", version, about)]
struct Cli {
    /// Config file (default: ~/.repo-xml/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository URL, overriding `[repository] url`.
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the repository tree and show highlights and the auto-selection.
    Fetch {
        /// Branch to fetch instead of the default.
        #[arg(short, long)]
        branch: Option<String>,
        /// URL route whose page file becomes the primary highlight.
        #[arg(short, long)]
        route: Option<String>,
        /// Treat this as a manual retry.
        #[arg(long)]
        retry: bool,
    },

    /// Build a request from the selected files and queue it for the AI worker.
    Ask {
        /// What should change.
        task: String,
        /// URL route whose page file becomes the primary highlight.
        #[arg(short, long)]
        route: Option<String>,
        /// Extra files to include besides the auto-selection.
        #[arg(short, long = "file")]
        files: Vec<String>,
        /// Only print the request text (manual copy path); queue nothing.
        #[arg(long)]
        print: bool,
        /// Seconds to wait for the worker's answer.
        #[arg(long, default_value_t = 300)]
        wait: u64,
    },

    /// Parse an AI response into file blocks.
    Parse {
        /// Response file; reads stdin when omitted or `-`.
        input: Option<PathBuf>,
    },

    /// Parse an AI response and open a pull request with its files.
    Stage {
        /// Response file; reads stdin when omitted or `-`.
        input: Option<PathBuf>,
        /// Pull request title (default: first line of the response).
        #[arg(short, long)]
        title: Option<String>,
        /// Only stage these paths.
        #[arg(long = "only")]
        only: Vec<String>,
        /// Commit to this existing branch instead of a new one.
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Worker-side access to queued AI requests.
    Request {
        #[command(subcommand)]
        action: RequestAction,
    },

    /// Show or initialise the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum RequestAction {
    /// List pending requests, oldest first.
    Pending {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one request.
    Show { id: Uuid },
    /// Mark a request as being processed.
    Start { id: Uuid },
    /// Complete a request with the response read from a file or stdin.
    Complete { id: Uuid, response: Option<PathBuf> },
    /// Fail a request.
    Fail {
        id: Uuid,
        #[arg(short, long)]
        message: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file path.
    Path,
    /// Write the default configuration if none exists.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config commands must work before a valid config file exists.
    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigAction::Path => commands::config::path(cli.config.as_deref()),
            ConfigAction::Init { force } => commands::config::init(cli.config.as_deref(), *force)?,
            ConfigAction::Show => {
                let config = commands::load_config(cli.config.as_deref())?;
                commands::config::show(&config)?;
            }
        }
        return Ok(());
    }

    let mut config = commands::load_config(cli.config.as_deref())?;
    if let Some(repo) = cli.repo {
        config.repository.url = repo;
    }

    let format: LogFormat = config.general.log_format.parse().unwrap_or_default();
    rx_telemetry::logging::init_with_format("rx", &config.general.log_level, format);

    match cli.command {
        Commands::Fetch {
            branch,
            route,
            retry,
        } => commands::fetch::run(&config, branch, route, retry, cli.json).await?,
        Commands::Ask {
            task,
            route,
            files,
            print,
            wait,
        } => {
            let opts = commands::ask::AskOptions {
                task,
                route,
                files,
                print_only: print,
                wait_secs: wait,
            };
            commands::ask::run(&config, opts, cli.json).await?
        }
        Commands::Parse { input } => commands::parse::run(input.as_deref(), cli.json)?,
        Commands::Stage {
            input,
            title,
            only,
            branch,
        } => {
            commands::stage::run(&config, input.as_deref(), title, only, branch, cli.json)
                .await?
        }
        Commands::Request { action } => match action {
            RequestAction::Pending { limit } => {
                commands::request::pending(&config, limit, cli.json).await?
            }
            RequestAction::Show { id } => commands::request::show(&config, id, cli.json).await?,
            RequestAction::Start { id } => commands::request::start(&config, id).await?,
            RequestAction::Complete { id, response } => {
                commands::request::complete(&config, id, response.as_deref()).await?
            }
            RequestAction::Fail { id, message } => {
                commands::request::fail(&config, id, message).await?
            }
        },
        Commands::Config { .. } => {}
    }

    Ok(())
}
