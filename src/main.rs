use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use jira_orchestrator::commands::connect::ConnectArgs;
use jira_orchestrator::commands::doctor::DoctorArgs;
use jira_orchestrator::commands::handle::HandleArgs;
use jira_orchestrator::commands::preview::PromptArgs;
use jira_orchestrator::config::Settings;
use jira_orchestrator::error::ExitError;
use jira_orchestrator::{commands, telemetry};

#[derive(Debug, Parser)]
#[command(
    name = "jira-orchestrator",
    version,
    about = "Turn Jira issue webhooks into coding-agent runs"
)]
struct Cli {
    /// Dotenv file to load (default: ./.env if present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process one webhook event and dispatch an agent run
    Handle(HandleArgs),
    /// Show the prompt an event would produce, without dispatching
    Prompt(PromptArgs),
    /// Connect the Atlassian tool provider on the agent backend
    Connect(ConnectArgs),
    /// Validate configuration, launcher and backend
    Doctor(DoctorArgs),
    /// Print the JSON Schema for the webhook body
    Schema,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Handle(_) => "handle",
            Self::Prompt(_) => "prompt",
            Self::Connect(_) => "connect",
            Self::Doctor(_) => "doctor",
            Self::Schema => "schema",
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Schema = cli.command {
        return commands::schema::run_schema();
    }

    let settings = Settings::load(cli.env_file.as_deref())?;
    match cli.command {
        Commands::Handle(args) => args.execute(&settings),
        Commands::Prompt(args) => args.execute(&settings),
        Commands::Connect(args) => args.execute(&settings),
        Commands::Doctor(args) => args.execute(&settings),
        Commands::Schema => commands::schema::run_schema(),
    }
}

fn main() -> ExitCode {
    telemetry::init();

    let cli = Cli::parse();

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<ExitError>() {
                eprintln!("error: {exit_err}");
                exit_err.exit_code()
            } else {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
