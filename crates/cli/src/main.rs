mod backend;
mod commands;
mod config;
mod serve;

use std::future::Future;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use planta_coordinator::{Operator, PowerState, Readings};
use tracing_subscriber::EnvFilter;

use crate::backend::SharedCoordinator;
use crate::commands::{CommandError, SetStateArgs};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Shift and equipment state coordinator for the biogas plant log.
#[derive(Parser)]
#[command(
    name = "planta",
    version,
    about = "Shift and equipment state coordinator for the biogas plant log"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./planta.toml if present)
    #[arg(long, global = true, env = "PLANTA_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "planta_coordinator=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// List the startup checklist items
    Checklist,

    /// Open, close, or inspect shifts
    Shift {
        #[command(subcommand)]
        command: ShiftCommands,
    },

    /// Inspect equipment or change its power state
    Equipment {
        #[command(subcommand)]
        command: EquipmentCommands,
    },

    /// Record or inspect monitoring intervals
    Monitor {
        #[command(subcommand)]
        command: MonitorCommands,
    },

    /// Report startups that have no checklist record
    Reconcile {
        /// Only scan this equipment
        #[arg(long)]
        equipment: Option<String>,
    },
}

#[derive(Subcommand)]
enum ShiftCommands {
    /// Open a shift owned by the given operator
    Open {
        #[command(flatten)]
        operator: OperatorArgs,
    },
    /// Close a shift (only its owner may)
    Close {
        /// Shift record id
        shift_id: String,
        #[command(flatten)]
        operator: OperatorArgs,
    },
    /// Show the active shift
    Active,
}

#[derive(Subcommand)]
enum EquipmentCommands {
    /// List registered equipment
    List,
    /// Show the current power state
    State {
        equipment_id: String,
    },
    /// Record a power state change
    Set {
        equipment_id: String,
        /// Encendido/on or Apagado/off
        state: PowerState,
        /// JSON file with {"answers": {...}, "notes": "..."} (required for on)
        #[arg(long, conflicts_with = "all_yes")]
        checklist: Option<PathBuf>,
        /// Answer every checklist item "Sí"
        #[arg(long)]
        all_yes: bool,
        /// Answer this checklist item "No" (repeatable)
        #[arg(long = "no", value_name = "ITEM")]
        negative: Vec<String>,
        /// Free-text notes for the state record
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        operator: OperatorArgs,
    },
}

#[derive(Subcommand)]
enum MonitorCommands {
    /// Close the open interval and open a new one at these readings
    Record {
        equipment_id: String,
        #[arg(long)]
        horometer: f64,
        #[arg(long)]
        starts: f64,
        #[arg(long)]
        m3: f64,
        #[arg(long)]
        kw: f64,
        #[command(flatten)]
        operator: OperatorArgs,
    },
    /// Show the interval ledger and its continuity
    Ledger {
        equipment_id: String,
    },
}

/// The operator performing the command, as vouched for by the caller.
#[derive(Args)]
struct OperatorArgs {
    #[arg(long, env = "PLANTA_OPERATOR_ID")]
    operator_id: String,
    #[arg(long, env = "PLANTA_OPERATOR_NAME")]
    operator_name: String,
    #[arg(long, env = "PLANTA_OPERATOR_ROLE", default_value = "Operador")]
    role: String,
}

impl OperatorArgs {
    fn operator(&self) -> Operator {
        Operator::new(&self.operator_id, &self.operator_name, &self.role)
    }
}

fn main() {
    let cli = Cli::parse();
    let is_serve = matches!(cli.command, Commands::Serve { .. });
    init_tracing(cli.log_level.as_deref(), is_serve, cli.quiet);

    let config = match config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let (output, quiet) = (cli.output, cli.quiet);

    match cli.command {
        Commands::Serve {
            port,
            tls_cert,
            tls_key,
        } => {
            // Both TLS flags or neither
            if tls_cert.is_some() != tls_key.is_some() {
                report_error(
                    "error: --tls-cert and --tls-key must both be provided",
                    output,
                    quiet,
                );
                process::exit(1);
            }
            let port = port.unwrap_or(config.server.port);
            let rt = runtime(output, quiet);
            if let Err(e) = rt.block_on(serve::start_server(config, port, tls_cert, tls_key)) {
                report_error(&format!("server error: {}", e), output, quiet);
                process::exit(1);
            }
        }
        Commands::Checklist => commands::cmd_checklist(output),
        Commands::Shift { command } => {
            let coordinator = coordinator(&config, output, quiet);
            let result = block_on(output, quiet, async {
                match command {
                    ShiftCommands::Open { operator } => {
                        commands::cmd_shift_open(&coordinator, &operator.operator(), output).await
                    }
                    ShiftCommands::Close { shift_id, operator } => {
                        commands::cmd_shift_close(
                            &coordinator,
                            &shift_id,
                            &operator.operator(),
                            output,
                        )
                        .await
                    }
                    ShiftCommands::Active => commands::cmd_shift_active(&coordinator, output).await,
                }
            });
            exit_on_error(result, output, quiet);
        }
        Commands::Equipment { command } => {
            let coordinator = coordinator(&config, output, quiet);
            let result: Result<(), CommandError> = block_on(output, quiet, async {
                match command {
                    EquipmentCommands::List => {
                        commands::cmd_equipment_list(&coordinator, output).await
                    }
                    EquipmentCommands::State { equipment_id } => {
                        commands::cmd_equipment_state(&coordinator, &equipment_id, output).await
                    }
                    EquipmentCommands::Set {
                        equipment_id,
                        state,
                        checklist,
                        all_yes,
                        negative,
                        notes,
                        operator,
                    } => {
                        let checklist =
                            commands::load_checklist(checklist.as_deref(), all_yes, &negative)?;
                        let operator = operator.operator();
                        let args = SetStateArgs {
                            equipment_id: &equipment_id,
                            state,
                            operator: &operator,
                            checklist,
                            notes: notes.as_deref(),
                        };
                        commands::cmd_equipment_set(&coordinator, args, output, quiet).await
                    }
                }
            });
            exit_on_error(result, output, quiet);
        }
        Commands::Monitor { command } => {
            let coordinator = coordinator(&config, output, quiet);
            let result = block_on(output, quiet, async {
                match command {
                    MonitorCommands::Record {
                        equipment_id,
                        horometer,
                        starts,
                        m3,
                        kw,
                        operator,
                    } => {
                        let readings = Readings {
                            horometer,
                            starts,
                            m3,
                            kw,
                        };
                        commands::cmd_monitor_record(
                            &coordinator,
                            &equipment_id,
                            &operator.operator(),
                            readings,
                            output,
                        )
                        .await
                    }
                    MonitorCommands::Ledger { equipment_id } => {
                        commands::cmd_monitor_ledger(&coordinator, &equipment_id, output).await
                    }
                }
            });
            exit_on_error(result, output, quiet);
        }
        Commands::Reconcile { equipment } => {
            let coordinator = coordinator(&config, output, quiet);
            let result = block_on(
                output,
                quiet,
                commands::cmd_reconcile(&coordinator, equipment.as_deref(), output),
            );
            match result {
                Ok(true) => {}
                Ok(false) => process::exit(2),
                Err(e) => exit_on_error(Err(e), output, quiet),
            }
        }
    }
}

/// Install the global subscriber. `--log-level` wins over `RUST_LOG`; the
/// server logs at info by default, one-shot commands only warn.
fn init_tracing(level: Option<&str>, is_serve: bool, quiet: bool) {
    let default = match (is_serve, quiet) {
        (_, true) => "error",
        (true, false) => "info",
        (false, false) => "warn",
    };
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("error: failed to create tokio runtime: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

fn block_on<F: Future>(output: OutputFormat, quiet: bool, fut: F) -> F::Output {
    runtime(output, quiet).block_on(fut)
}

fn coordinator(
    config: &config::PlantaConfig,
    output: OutputFormat,
    quiet: bool,
) -> SharedCoordinator {
    match backend::build_coordinator(config) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn exit_on_error(result: Result<(), CommandError>, output: OutputFormat, quiet: bool) {
    if let Err(e) = result {
        report_error(&e.to_string(), output, quiet);
        process::exit(1);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
