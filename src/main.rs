use std::sync::Arc;

use dotenvy::dotenv;
use tokio::sync::mpsc;

use duochat::client::{ChatClient, ClientSettings};
use duochat::config::Config;
use duochat::store::{GatewayStore, MemoryStore, RealtimeStore, StorePaths};
use duochat::ui::ChatApp;

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenv().ok();
    env_logger::init();

    let config = Config::load();
    let store = build_store(&config);

    // UI -> client
    let (command_sender, command_receiver) = mpsc::channel(100);
    // client -> UI
    let (event_sender, event_receiver) = mpsc::channel(100);

    let settings = ClientSettings {
        paths: StorePaths::new(config.app_id.clone()),
        data_dir: config.data_dir.clone(),
        auth_token: config.auth_token.clone(),
    };
    let client = ChatClient::new(store, settings, command_receiver, event_sender);
    tokio::spawn(client.run());

    let options = eframe::NativeOptions::default();
    let mut event_receiver = Some(event_receiver);

    eframe::run_native(
        "Duochat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_receiver
                .take()
                .expect("ChatApp should only be initialized once");

            log::info!("UI started (app id: {})", config.app_id);

            Ok(Box::new(ChatApp::new(
                cc,
                command_sender.clone(),
                event_receiver,
            )))
        }),
    )
}

fn build_store(config: &Config) -> Arc<dyn RealtimeStore> {
    match &config.gateway_url {
        Some(url) if !config.sandbox => {
            log::info!("Using store gateway at {url}");
            Arc::new(GatewayStore::new(url.clone()))
        }
        _ => {
            log::warn!("No gateway configured; using the in-process sandbox store");
            Arc::new(MemoryStore::new())
        }
    }
}
