use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cctvsentinel::config::SentinelConfig;
use cctvsentinel::detect::IncidentRecord;

#[derive(Parser)]
#[command(
    name = "cctvsentinel",
    about = "Debounced incident confirmation for CCTV detection streams",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a JSON-lines frame stream through the confirmation pipeline
    Replay {
        /// Frame stream file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Inspect the long-term incident history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Export the incident history as a JSON document
    Export {
        /// Output file path
        #[arg(long, default_value = "incident_export.json")]
        output: PathBuf,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recorded incidents
    List {
        /// Only incidents of this anomaly category
        #[arg(long = "type")]
        kind: Option<String>,
    },

    /// Show one incident with its actions
    Show {
        /// Incident ID
        #[arg(long)]
        id: u64,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_incident_table(incidents: &[IncidentRecord]) {
    println!(
        "{:<5} | {:<10} | {:<10} | {:<32} | Actions",
        "ID", "Type", "Confidence", "Timestamp"
    );
    println!("{:-<5}-|-{:-<10}-|-{:-<10}-|-{:-<32}-|-{:-<7}", "", "", "", "", "");
    for incident in incidents {
        println!(
            "{:<5} | {:<10} | {:<10.2} | {:<32} | {}",
            incident.id,
            incident.kind,
            incident.confidence,
            incident.timestamp.to_rfc3339(),
            incident.actions.len()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = SentinelConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay { input, json } => {
            tracing::info!(camera_id = %config.session.camera_id, "Starting cctvsentinel");
            let summary = cctvsentinel::replay(&config, &input).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n=== cctvsentinel Replay ===");
                println!("Frames processed: {}", summary.frames_processed);
                if summary.interrupted {
                    println!("Stopped by user before end of stream.");
                }
                match &summary.incident {
                    Some(incident) => {
                        println!("Confirmed incident #{}: {}", incident.id, incident.kind);
                        println!("Confidence: {:.2}", incident.confidence);
                        println!("Camera:     {} ({})", incident.camera_id, incident.location);
                        println!("Snapshot:   {}", incident.snapshot_reference);
                        println!("\nActions:");
                        for action in &incident.actions {
                            println!(" - {}", action.action);
                        }
                    }
                    None => println!("No incident confirmed."),
                }
                println!("===========================\n");
            }
            tracing::info!("System shutdown");
        }
        Commands::History { action } => {
            let store = cctvsentinel::pipeline::open_store(&config)?;
            match action {
                HistoryAction::List { kind } => {
                    let incidents = match kind.as_deref() {
                        Some(kind) => store.get_by_type(kind),
                        None => store.get_all(),
                    };
                    if incidents.is_empty() {
                        println!("No incidents found.");
                    } else {
                        print_incident_table(&incidents);
                    }
                }
                HistoryAction::Show { id } => {
                    let incident = store
                        .get_by_id(id)
                        .with_context(|| format!("no incident with id {id}"))?;
                    println!("{}", serde_json::to_string_pretty(&incident)?);
                }
            }
        }
        Commands::Export { output } => {
            let store = cctvsentinel::pipeline::open_store(&config)?;
            cctvsentinel::evidence::export_history(&store.get_all(), &output).await?;
            println!("Exported {} incidents to {}", store.len(), output.display());
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
