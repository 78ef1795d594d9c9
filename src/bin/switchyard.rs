//! switchyard: command-line front end for a configured registry
//!
//! Loads `config.toml`, builds the model registry and runs one call
//! against it.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use switchyard::config::Config;
use switchyard::streaming::{DEFAULT_STREAM_BUFFER, spawn_completion};
use switchyard::tool::ToolSet;
use switchyard::types::{CompleteOptions, Message, RerankOptions};
use switchyard::{ModelRegistry, version_string};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Switchyard CLI
#[derive(Parser)]
#[command(name = "switchyard")]
#[command(version = switchyard::PKG_VERSION)]
#[command(about = "Vendor-neutral completion gateway")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered models
    Models,

    /// Complete a prompt
    Complete {
        /// Prompt (or omit to read from stdin)
        prompt: Option<String>,
        /// Completer id (default: the first configured completer)
        #[arg(short, long, default_value = "")]
        model: String,
        /// System prompt
        #[arg(short, long)]
        system: Option<String>,
        #[arg(short, long)]
        temperature: Option<f32>,
        /// Print deltas as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Generate an embedding for text
    Embed {
        /// Text to embed (or omit to read from stdin)
        text: Option<String>,
        #[arg(short, long, default_value = "")]
        model: String,
    },

    /// Rank texts by relevance to a query
    Rerank {
        query: String,
        /// Candidate texts
        #[arg(required = true)]
        texts: Vec<String>,
        #[arg(short, long, default_value = "")]
        model: String,
        /// Keep only the best N results
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    info!(version = version_string(), "starting switchyard");

    let config = Config::load(args.config.as_deref())?;
    let secrets = config.secrets()?;
    let registry = config.build_registry(&secrets, &ToolSet::new())?;

    match args.command {
        Command::Models => print_models(&registry),

        Command::Complete {
            prompt,
            model,
            system,
            temperature,
            stream,
        } => {
            let prompt = resolve_text(prompt, "complete")?;
            let completer = registry.require_completer(&model)?;

            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(Message::system(system));
            }
            messages.push(Message::user(prompt));

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let mut options = CompleteOptions::new().cancel(cancel);
            if let Some(temperature) = temperature {
                options = options.temperature(temperature);
            }

            if stream {
                let mut deltas = spawn_completion(
                    Arc::clone(&completer),
                    messages,
                    options,
                    DEFAULT_STREAM_BUFFER,
                );
                let mut stdout = io::stdout();
                while let Some(delta) = deltas.next().await {
                    write!(stdout, "{}", delta.message.content)?;
                    stdout.flush()?;
                }
                let completion = deltas.finish().await?;
                println!();
                print_footer(&completion);
            } else {
                let completion = completer.complete(&messages, options).await?;
                println!("{}", completion.message.content);
                print_footer(&completion);
            }
        }

        Command::Embed { text, model } => {
            let text = resolve_text(text, "embed")?;
            let embedding = registry.require_embedder(&model)?.embed(&text).await?;
            println!("model: {}", embedding.model);
            println!("dimensions: {}", embedding.dimensions);
            println!(
                "values: [{:.4}, {:.4}, ... ({} total)]",
                embedding.values.first().unwrap_or(&0.0),
                embedding.values.get(1).unwrap_or(&0.0),
                embedding.values.len()
            );
        }

        Command::Rerank {
            query,
            texts,
            model,
            limit,
        } => {
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            let rankings = registry
                .require_reranker(&model)?
                .rerank(&query, &texts, &RerankOptions { limit })
                .await?;
            for ranking in rankings {
                println!("{:.4}  [{}] {}", ranking.score, ranking.index, ranking.text);
            }
        }
    }

    Ok(())
}

fn print_models(registry: &ModelRegistry) {
    let entries = registry.list();
    if entries.is_empty() {
        println!("no models configured");
        return;
    }
    for entry in entries {
        let marker = if entry.default { " (default)" } else { "" };
        println!(
            "{:<12} {} [{}]{marker}",
            entry.capability.as_str(), entry.id, entry.provider
        );
    }
}

fn print_footer(completion: &switchyard::types::Completion) {
    let reason = completion.reason.map(|r| r.as_str()).unwrap_or("none");
    match completion.usage {
        Some(usage) => eprintln!(
            "[{reason}, {} in / {} out tokens]",
            usage.input_tokens, usage.output_tokens
        ),
        None => eprintln!("[{reason}]"),
    }
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
