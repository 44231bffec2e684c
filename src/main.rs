use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use storefront_assistant::client::AssistantClient;
use storefront_assistant::config::BackendConfig;
use storefront_assistant::listing::{dedupe_by_id, products_markdown_summary};

#[derive(Debug, Parser)]
#[command(name = "storefront_assistant")]
#[command(about = "AI shopping assistant chat client", long_about = None)]
struct Cli {
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    mode: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Health,
    Chat { message: String },
}

fn resolve_config(cli: &Cli) -> BackendConfig {
    match (&cli.backend_url, &cli.mode) {
        (Some(url), _) => BackendConfig::with_base_url(url.as_str()),
        (None, Some(mode)) => BackendConfig::from_mode(Some(mode.as_str())),
        (None, None) => BackendConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);
    let mut client = AssistantClient::new(&config);

    match cli.command {
        Commands::Health => {
            client.connect().await?;
            println!("backend healthy: {}", config.base_url);
            if let Some(session_id) = client.session_id() {
                println!("session: {}", session_id);
            }
        }
        Commands::Chat { message } => {
            client.ensure_connected().await?;
            let outcome = client.send_chat_message(&message).await?;
            println!("{}", outcome.narrative);
            if !outcome.products.is_empty() {
                let products = dedupe_by_id(outcome.products);
                println!("\n{}", products_markdown_summary(&products));
            }
        }
    }
    Ok(())
}
