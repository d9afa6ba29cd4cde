pub mod cli;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod relay;
pub mod render;
pub mod server;

use cli::{ Args, AskArgs, Command, ServeArgs };
use llm::LlmConfig;
use llm::chat::new_client as new_chat_client;
use log::{ info, warn };
use pipeline::{ ChatPipeline, HttpRelayClient, RetryPolicy, TerminalSurface };
use relay::Relay;
use server::Server;
use server::api::ApiOptions;
use std::error::Error;
use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, BufReader };

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Ask(ask_args) => ask(ask_args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Relay Configuration ---");
    info!("Listen Address: {}:{}", args.host, args.port);
    info!("Model: {}", args.model);
    info!("Model API Base URL: {}", args.base_url);
    info!("CORS Origin: {}", args.cors_origin);
    match &args.public_dir {
        Some(dir) => info!("Public Directory: {}", dir.display()),
        None => info!("Public Directory: (none)"),
    }
    info!("---------------------------");

    if args.cors_origin.trim() == "*" {
        warn!("CORS allows any origin.");
    }

    let config = LlmConfig {
        api_key: Some(args.api_key.clone()),
        completion_model: Some(args.model.clone()),
        base_url: Some(args.base_url.clone()),
    };
    let chat_client = new_chat_client(&config)?;
    info!(
        "Chat client configured: Model={}, BaseURL={}",
        chat_client.get_model(),
        chat_client.get_base_url()
    );
    let relay = Relay::new(chat_client);

    let options = ApiOptions {
        cors_origin: args.cors_origin,
        public_dir: args.public_dir,
    };
    Server::new(args.host, args.port, relay, options).run().await
}

async fn ask(args: AskArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let transport = HttpRelayClient::new(&args.relay_url)?;
    info!("Chatting with relay at {}", transport.endpoint());

    let policy = RetryPolicy::new(args.max_retries, Duration::from_millis(args.retry_delay_ms));
    let pipeline = ChatPipeline::new(transport, TerminalSurface::new(), policy);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        pipeline.submit(&line).await?;
    }

    Ok(())
}
