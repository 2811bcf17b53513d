//! End-to-end demo: runs the whole pipeline in one process.
//!
//! Enables devtools, starts a broker, a content relay, and a panel
//! connector for one tab, then drives a demo bridge and prints what the
//! panel sees.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;

use statewire::{
    enable_devtools, util, Bridge, BridgeConfig, Broker, Config, ContentRelay, EventBus,
    KeyValueStore, PanelConnector, RemoteInfo, TabId, TypedSchema,
};

#[derive(Debug, Parser)]
#[command(name = "statewire", about = "Cross-fragment state bridge demo pipeline")]
struct Args {
    /// Config file path (defaults to ~/.statewire/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the data directory (defaults to ~/.statewire)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Tab id to run the demo pipeline under
    #[arg(long, default_value_t = 1)]
    tab: TabId,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CartState {
    #[serde(default)]
    items: Vec<CartItem>,
    #[serde(default)]
    total: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CartItem {
    id: String,
    name: String,
    quantity: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    util::init_data_dir(args.data_dir);

    let config = Config::load(&args.config.unwrap_or_else(util::config_path))?;

    // Log to file (~/.statewire/logs/statewire.log) so the demo output on
    // stdout stays readable.
    fs::create_dir_all(util::logs_dir())?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    // Devtools first, so the bridge below registers itself.
    let hook = enable_devtools();
    hook.register_remote(RemoteInfo {
        name: "cart".to_string(),
        url: "http://localhost:5001/remoteEntry.js".to_string(),
        loaded: true,
    });

    let broker = Broker::spawn();
    let content = ContentRelay::spawn(broker.clone(), args.tab, &config);
    let panel = PanelConnector::connect(&broker, args.tab, config.event_log_capacity);

    let cart = Bridge::new(
        BridgeConfig::new("cart", Arc::new(TypedSchema::<CartState>::new()))
            .with_initial_state(json!({"items": [], "total": 0.0})),
    )?;

    let _logger = cart.subscribe(|state, _prev| {
        tracing::info!(total = state["total"].as_f64(), "cart changed");
    })?;
    let _restock = cart.on_action("ADD_ITEM", |payload| {
        tracing::info!(item = %payload["name"], "item added");
    })?;

    let mut patch = serde_json::Map::new();
    patch.insert(
        "items".to_string(),
        json!([{"id": "1", "name": "Widget", "quantity": 2}]),
    );
    patch.insert("total".to_string(), json!(50.0));
    cart.set_state(patch)?;
    cart.dispatch(
        "ADD_ITEM",
        Some(json!({"id": "1", "name": "Widget", "quantity": 2})),
    )?;

    let bus = EventBus::new();
    bus.emit("user:login", Some(json!({"id": "42", "name": "Ada"})));

    // Persisted scratch state, shared across runs.
    let store = KeyValueStore::persistent(
        config
            .store_path
            .clone()
            .unwrap_or_else(util::store_snapshot_path),
    );
    store.set("last-run-tab", json!(args.tab));

    // Let the relay drain across its channel hops.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let view = panel.view();
    println!(
        "panel: connected={} has_hook={} bridges={} remotes={}",
        view.connected,
        view.has_hook,
        view.bridges.len(),
        view.remotes.len()
    );
    for bridge in &view.bridges {
        println!(
            "  bridge {} (actions: {}): {}",
            bridge.namespace, bridge.action_count, bridge.state
        );
    }
    println!("event log ({} entries, newest first):", view.events.len());
    for entry in &view.events {
        println!("  #{} {}", entry.id, serde_json::to_string(&entry.record)?);
    }

    panel.disconnect().await;
    content.shutdown().await;

    Ok(())
}
