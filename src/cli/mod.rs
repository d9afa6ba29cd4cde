use clap::{ Args as ClapArgs, Parser, Subcommand };
use secrecy::SecretString;
use std::path::PathBuf;
use url::Url;

use crate::llm::{ DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP relay in front of the model API.
    Serve(ServeArgs),
    /// Chat with a running relay from the terminal.
    Ask(AskArgs),
}

fn parse_secret(value: &str) -> Result<SecretString, String> {
    if value.trim().is_empty() {
        return Err("API key must not be empty".to_string());
    }
    Ok(SecretString::new(value.trim().to_string()))
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Port for the HTTP server to listen on.
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// API key for the Gemini API.
    #[arg(long, env = "GEMINI_API_KEY", value_parser = parse_secret, hide_env_values = true)]
    pub api_key: SecretString,

    /// Model used for every completion.
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    pub model: String,

    /// Base URL of the Gemini REST API.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    pub base_url: String,

    /// Origin allowed by CORS; `*` allows any origin.
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,

    /// Optional directory with the chat page, served at `/`.
    #[arg(long, env = "PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AskArgs {
    /// Root URL of a running relay.
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:3000")]
    pub relay_url: Url,

    /// Retries after an overloaded reply before giving up.
    #[arg(long, default_value = "2")]
    pub max_retries: u32,

    /// Fixed wait before each retry, in milliseconds.
    #[arg(long, default_value = "2000")]
    pub retry_delay_ms: u64,
}
