use std::env;
use std::path::PathBuf;

use clap::Parser;

/// Deployment inputs: CLI flags win, environment variables (loaded from a
/// `.env` file by `dotenvy` before this runs) fill the gaps.
#[derive(Debug, Parser)]
#[command(name = "duochat", about = "Two-party realtime chat client")]
struct Args {
    /// WebSocket URL of the store gateway; omit to run against the
    /// in-process sandbox store.
    #[arg(long)]
    gateway_url: Option<String>,
    /// Deployment namespace every document path lives under.
    #[arg(long)]
    app_id: Option<String>,
    /// Pre-issued auth token; wins over a saved session.
    #[arg(long)]
    auth_token: Option<String>,
    /// Directory holding the session file.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Force the in-process sandbox store even when a gateway is configured.
    #[arg(long)]
    sandbox: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_url: Option<String>,
    pub app_id: String,
    pub auth_token: Option<String>,
    pub data_dir: PathBuf,
    pub sandbox: bool,
}

impl Config {
    pub fn load() -> Self {
        let args = Args::parse();
        let gateway_url = args.gateway_url.or_else(|| env_var("DUOCHAT_GATEWAY_URL"));
        let app_id = args
            .app_id
            .or_else(|| env_var("DUOCHAT_APP_ID"))
            .unwrap_or_else(|| "default-app-id".to_string());
        let auth_token = args.auth_token.or_else(|| env_var("DUOCHAT_AUTH_TOKEN"));
        let data_dir = args
            .data_dir
            .or_else(|| env_var("DUOCHAT_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("data"));
        let sandbox = args.sandbox || gateway_url.is_none();

        Self {
            gateway_url,
            app_id,
            auth_token,
            data_dir,
            sandbox,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
