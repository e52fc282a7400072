//! Shopbot CLI - Command-line interface
//!
//! Usage:
//!   shopbot index [--file products.json]
//!   shopbot status
//!   shopbot search <query> [--top-k 5]
//!   shopbot chat [message]
//!   shopbot delete <id>
//!   shopbot clear

use anyhow::Context;
use clap::{Parser, Subcommand};
use shopbot_api::state::AppState;
use shopbot_core::config::AppConfig;
use shopbot_core::{ConversationTurn, ProductId, ProductRecord, SearchFilter};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shopbot")]
#[command(about = "Catalog indexing and product chat CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed and index products
    Index {
        /// JSON array of products; reads the catalog service when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show how many products are indexed
    Status,
    /// Semantic search over the index
    Search {
        /// Free-text query
        query: String,
        /// Number of results
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
        /// Restrict to one category
        #[arg(short, long)]
        category: Option<String>,
        /// Only products with stock
        #[arg(long)]
        in_stock_only: bool,
    },
    /// Ask the assistant; starts an interactive session without a message
    Chat {
        /// Single message to send
        message: Option<String>,
    },
    /// Remove one product from the index
    Delete {
        /// Product id
        id: String,
    },
    /// Remove every product from the index
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state = AppState::from_config(config)?;
    state.sync.prepare().await?;

    match cli.command {
        Commands::Index { file } => {
            let products = match file {
                Some(path) => Some(read_products(&path)?),
                None => None,
            };
            let report = state.sync.reindex(products).await?;
            println!(
                "Indexed {} products from {} ({} in collection)",
                report.indexed, report.source, report.total_indexed
            );
        }
        Commands::Status => {
            let status = state.sync.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Search {
            query,
            top_k,
            category,
            in_stock_only,
        } => {
            let filter = SearchFilter {
                category,
                in_stock_only,
            };
            let results = state
                .chat
                .retrieve(&query, top_k.max(1), Some(&filter))
                .await?;

            if results.is_empty() {
                println!("No matching products");
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{:>2}. [{:.3}] {} (id {})",
                    i + 1,
                    result.score,
                    result.product.name,
                    result.product.id
                );
            }
        }
        Commands::Chat { message } => match message {
            Some(message) => {
                let reply = state.chat.chat(&message, Vec::new()).await?;
                println!("{}", reply.response);
            }
            None => chat_session(&state).await?,
        },
        Commands::Delete { id } => {
            let id = ProductId::from(id.as_str());
            state.sync.remove_product(&id).await?;
            println!("Removed product {id}");
        }
        Commands::Clear => {
            state.sync.clear().await?;
            println!("Index cleared");
        }
    }

    Ok(())
}

fn read_products(path: &Path) -> anyhow::Result<Vec<ProductRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid product JSON in {}", path.display()))
}

/// Read messages from stdin until EOF or `exit`, carrying history between turns
async fn chat_session(state: &AppState) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut history: Vec<ConversationTurn> = state.chat.reset();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        match message {
            "" => continue,
            "exit" | "quit" => break,
            "reset" => {
                history = state.chat.reset();
                println!("Conversation reset");
                continue;
            }
            _ => {}
        }

        match state.chat.chat(message, history.clone()).await {
            Ok(reply) => {
                println!("{}", reply.response);
                for product in &reply.products {
                    println!("  - {} ({})", product.name, product.id);
                }
                history = reply.conversation_history;
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
