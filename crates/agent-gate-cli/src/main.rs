// crates/agent-gate-cli/src/main.rs
// ============================================================================
// Module: Agent Gate CLI Entry Point
// Description: Command dispatcher for serving, one-shot authorization, and config.
// Purpose: Provide an operator CLI over the trust and authorization engine.
// Dependencies: agent-gate-config, agent-gate-server, clap, serde, thiserror, tokio.
// ============================================================================

//! ## Overview
//! `agent-gate serve` runs the security event webhook until Ctrl-C.
//! `agent-gate authorize` runs one authorization and prints a JSON verdict;
//! the exit code is 0 when permitted and 1 otherwise. `agent-gate config`
//! validates a configuration file or prints a complete example.
//!
//! Security posture: configuration files are untrusted input and are
//! validated before any component is built.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use agent_gate_config::AgentGateConfig;
use agent_gate_config::config_toml_example;
use agent_gate_core::AgentId;
use agent_gate_core::AuthorizeError;
use agent_gate_server::AgentGateServer;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted agent identifier length.
const MAX_AGENT_ID_LENGTH: usize = 256;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "agent-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the security event webhook and health check until Ctrl-C.
    Serve(ConfigArgs),
    /// Run one authorization decision and print the verdict as JSON.
    Authorize(AuthorizeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Shared `--config` argument.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Optional config file path (defaults to agent-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the `authorize` command.
#[derive(Args, Debug)]
struct AuthorizeCommand {
    /// Agent identifier to authorize.
    #[arg(value_name = "AGENT")]
    agent: String,
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate an Agent Gate configuration file.
    Validate(ConfigArgs),
    /// Print a complete example configuration.
    Example,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// JSON verdict printed by `authorize`.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct Verdict {
    /// Agent identifier.
    agent: String,
    /// True when every gate and provider permitted.
    permitted: bool,
    /// Denial or failure description.
    error: Option<String>,
}

impl Verdict {
    /// Builds a verdict from an authorization result.
    fn from_result(agent: &AgentId, result: &Result<(), AuthorizeError>) -> Self {
        Self {
            agent: agent.as_str().to_string(),
            permitted: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }

    /// Returns the process exit code for this verdict.
    const fn exit_code(&self) -> ExitCode {
        if self.permitted { ExitCode::SUCCESS } else { ExitCode::FAILURE }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(args) => command_serve(&args).await,
        Commands::Authorize(command) => command_authorize(&command).await,
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let bind = config.server.bind.clone();
    let webhook_path = config.server.webhook_path.clone();
    let pipeline_enabled = config.security_events.enabled;
    let server = AgentGateServer::from_config(config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    let banner = if pipeline_enabled {
        format!("agent-gate serving {webhook_path} and /healthz on {bind}")
    } else {
        format!("agent-gate serving /healthz on {bind}; security events disabled")
    };
    write_stderr_line(&banner).map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Authorize Command
// ============================================================================

/// Executes the `authorize` command.
async fn command_authorize(command: &AuthorizeCommand) -> CliResult<ExitCode> {
    let agent = parse_agent_id(&command.agent)?;
    let config = load_config(&command.config)?;
    let server = AgentGateServer::from_config(config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    let result = server.authorizer().authorize(&agent).await;
    let verdict = Verdict::from_result(&agent, &result);
    let line = serde_json::to_string(&verdict)
        .map_err(|err| CliError::new(format!("failed to encode verdict: {err}")))?;
    write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(verdict.exit_code())
}

/// Validates a command-line agent identifier.
fn parse_agent_id(value: &str) -> CliResult<AgentId> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CliError::new("agent id must be non-empty".to_string()));
    }
    if trimmed.len() > MAX_AGENT_ID_LENGTH {
        return Err(CliError::new(format!(
            "agent id must be at most {MAX_AGENT_ID_LENGTH} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CliError::new("agent id must not contain control characters".to_string()));
    }
    Ok(AgentId::new(trimmed))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => {
            load_config(args)?;
            write_stdout_line("config ok")
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        ConfigCommand::Example => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Loads and validates the selected configuration file.
fn load_config(args: &ConfigArgs) -> CliResult<AgentGateConfig> {
    AgentGateConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
