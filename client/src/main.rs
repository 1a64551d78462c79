mod catalog;
mod commands;
mod core;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{pill, search, upload};
use crate::core::api::{ApiClient, TextQuery};

#[derive(Parser)]
#[command(name = "pillid")]
#[command(about = "Pill identification client - search and maintain the pill catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search pills by imprint, shape and color
    Search {
        /// Printed or embossed imprint
        #[arg(short, long)]
        imprint: Option<String>,

        /// Shape, e.g. 원형
        #[arg(short, long)]
        shape: Option<String>,

        /// Comma separated colors, primary first
        #[arg(short, long)]
        color: Option<String>,

        /// Maximum results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Output as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Upload catalog files (.json / .jsonl) found under a directory
    Upload {
        /// Directory or file to upload
        #[arg(default_value = ".")]
        path: String,
    },

    /// Show a catalog entry
    Show { item_seq: String },

    /// Delete a catalog entry
    Delete { item_seq: String },

    /// Check that the search service is up
    Health,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print the configuration file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            imprint,
            shape,
            color,
            top_k,
            json,
        } => {
            let query = TextQuery {
                imprint,
                drug_shape: shape,
                color_classes: color,
                top_k,
            };
            search::run(query, json).await?;
        }
        Commands::Upload { path } => {
            upload::run(&path).await?;
        }
        Commands::Show { item_seq } => {
            pill::show(&item_seq).await?;
        }
        Commands::Delete { item_seq } => {
            pill::delete(&item_seq).await?;
        }
        Commands::Health => {
            let config = crate::core::config::load_config()?;
            let client = ApiClient::new(&config.backend_url);
            if client.health_check().await {
                println!("{} is healthy", config.backend_url);
            } else {
                anyhow::bail!("{} is not reachable", config.backend_url);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let c = crate::core::config::load_config()?;
                println!("{:#?}", c);
            }
            ConfigAction::Path => println!("{}", crate::core::config::config_path().display()),
        },
    }

    Ok(())
}
