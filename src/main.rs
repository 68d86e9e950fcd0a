mod cli;
mod config;
mod gateway_client;

use std::io;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::render::MarkdownRenderer;
use crate::cli::chat::ChatContext;
use crate::config::Config;
use crate::gateway_client::GatewayClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Args, Clone, Default)]
struct ChatArgs {
    /// Assignment instructions to send once, without starting the prompt
    #[arg(short, long)]
    input: Option<String>,

    /// Completion endpoint (overrides GRADEFLOW_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Print answers without terminal styling
    #[arg(long)]
    plain: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    // Default to chat if no subcommand is provided
    let args = match cli.command {
        Some(Commands::Chat(args)) => args,
        None => cli.chat,
    };

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load(args.endpoint.as_deref(), args.plain)?;
    let gateway = GatewayClient::new(config.endpoint);
    info!("Starting GradeFlow against {}", gateway.endpoint());

    let interactive = args.input.is_none();
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        args.input,
        interactive,
        Box::new(gateway),
        MarkdownRenderer::new(config.styled),
    );
    chat_context.run().await
}
