mod commands;
mod settings;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use settings::Settings;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Translate content written for one form into the fields of another.
#[derive(Parser)]
#[command(
    name = "formtrans",
    version,
    about = "Translate content written for one form into the fields of another"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Settings file (default: ./formtrans.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate source text from one form into another
    Translate {
        /// Source form id
        #[arg(long)]
        from: String,
        /// Target form id
        #[arg(long)]
        to: String,
        /// Source text (reads --file, or stdin, when omitted)
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// File holding the source text
        #[arg(long)]
        file: Option<PathBuf>,
        /// Correlation id recorded with the translation
        #[arg(long)]
        request_id: Option<String>,
    },

    /// Inspect the form registry
    Forms {
        #[command(subcommand)]
        command: FormsCommand,
    },

    /// List past translations, most stars first, then newest first
    History {
        /// Only translations from this source form
        #[arg(long)]
        source: Option<String>,
        /// Only translations into this target form
        #[arg(long)]
        target: Option<String>,
        /// Only translations with this outcome (ok, partial, failed, cancelled)
        #[arg(long)]
        outcome: Option<String>,
        /// Maximum number of entries (0 = all)
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Rate a past translation up (or down with --down)
    Star {
        /// History record id
        record_id: String,
        /// Remove a star instead of adding one
        #[arg(long)]
        down: bool,
    },

    /// Summarize usage: unique days and sessions
    Sessions {
        /// Minutes of inactivity that start a new session
        #[arg(long, default_value_t = 60)]
        gap_minutes: u32,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Translate { .. } => "translate",
            Commands::Forms { .. } => "forms",
            Commands::History { .. } => "history",
            Commands::Star { .. } => "star",
            Commands::Sessions { .. } => "sessions",
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum FormsCommand {
    /// List every registered form
    List,
    /// Show one form's fields
    Show {
        /// Form id
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("error: {}", e), cli.output);
            process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("error: failed to start runtime: {}", e), cli.output);
            process::exit(1);
        }
    };

    let output = cli.output;
    let command = cli.command.name();
    tracing::debug!(
        command,
        registry = %settings.registry.path.display(),
        history = %settings.history.path.display(),
        "dispatching"
    );
    let result = rt.block_on(async {
        match cli.command {
            Commands::Translate {
                from,
                to,
                text,
                file,
                request_id,
            } => {
                let args = commands::translate::TranslateArgs {
                    from,
                    to,
                    text,
                    file,
                    request_id,
                };
                commands::translate::cmd_translate(&settings, args, output).await
            }
            Commands::Forms { command } => commands::forms::cmd_forms(&settings, command, output).await,
            Commands::History {
                source,
                target,
                outcome,
                limit,
            } => {
                commands::history::cmd_history(&settings, source, target, outcome.as_deref(), limit, output)
                    .await
            }
            Commands::Star { record_id, down } => {
                commands::history::cmd_star(&settings, &record_id, down, output).await
            }
            Commands::Sessions { gap_minutes } => {
                commands::sessions::cmd_sessions(&settings, gap_minutes, output).await
            }
        }
    });

    if let Err(msg) = result {
        tracing::debug!(command, error = %msg, "command failed");
        report_error(&format!("error: {}", msg), output);
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for results.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formtrans=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Print a serializable value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| format!("could not render JSON: {}", e))?;
    println!("{}", rendered);
    Ok(())
}
