//! LoRaWAN router CLI
//!
//! # Usage
//!
//! ```bash
//! # Using configuration file
//! lora-router --config router.toml
//!
//! # Brokers from the command line
//! lora-router --listen 0.0.0.0:1700 --broker b0=10.0.0.10:1800 --broker b1=10.0.0.11:1800
//!
//! # Write an example configuration
//! lora-router gen-config --output router.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lora_router::broker::{Broker, UdpBroker};
use lora_router::config::{BrokerConfig, ConfigError, RouterConfig};
use lora_router::constants::DEFAULT_CONFIG_PATH;
use lora_router::dutycycle::MemoryDutyManager;
use lora_router::stats::{CountingMeter, FileMeter, Meter, Meters};
use lora_router::storage::MemoryStorage;
use lora_router::{GatewayBridge, Router};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

/// LoRaWAN uplink router
#[derive(Parser, Debug)]
#[command(name = "lora-router")]
#[command(about = "Routes LoRaWAN uplinks from gateways to brokers")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway-facing UDP address
    #[arg(short, long)]
    listen: Option<std::net::SocketAddr>,

    /// Broker as name=host:port (can repeat, order gives the broker index)
    #[arg(short, long)]
    broker: Vec<String>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    // Initialize logging
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let storage = match &config.address_index {
        Some(path) => {
            let storage = MemoryStorage::load(path).await?;
            tracing::info!(
                "loaded {} address index entries from {}",
                storage.len().await,
                path.display()
            );
            storage
        }
        None => MemoryStorage::new(),
    };
    let manager = MemoryDutyManager::new(config.duty_cycle.cycle_length());

    let brokers: Vec<Arc<dyn Broker>> = config
        .brokers
        .iter()
        .map(|b| Arc::new(UdpBroker::new(b.name.clone(), b.address)) as Arc<dyn Broker>)
        .collect();

    let counters = Arc::new(CountingMeter::new());
    let mut meters: Vec<Arc<dyn Meter>> = vec![counters.clone()];
    if let Some(path) = &config.meter_log {
        meters.push(Arc::new(FileMeter::new(path)?));
    }

    let router = Arc::new(Router::new(
        Arc::new(storage),
        Arc::new(manager),
        brokers,
        Arc::new(Meters(meters)),
        (&config.timeouts).into(),
    ));

    let bridge =
        GatewayBridge::bind(config.listen, router.clone(), config.timeouts.request()).await?;

    tracing::info!(
        "{} v{} listening on {}",
        config.name,
        env!("CARGO_PKG_VERSION"),
        bridge.local_addr()?
    );
    for (i, broker) in router.brokers().iter().enumerate() {
        tracing::info!("broker [{}] {}", i, broker.name());
    }

    // Stats reporting task
    if config.stats_interval_secs > 0 {
        let counters = counters.clone();
        let period = Duration::from_secs(config.stats_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                print_stats(&counters);
            }
        });
    }

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    ctrlc::set_handler(move || signal.notify_one())?;

    bridge.run(shutdown.notified()).await?;

    tracing::info!("final statistics");
    print_stats(&counters);
    Ok(())
}

fn build_config(args: &Args) -> Result<RouterConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RouterConfig::default(),
    };

    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    for broker in &args.broker {
        config.add_broker(BrokerConfig::parse(broker)?);
    }
    if let Some(secs) = args.stats_interval {
        config.stats_interval_secs = secs;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(&RouterConfig::example())?;

    let content = format!(
        r#"# LoRaWAN Router Configuration
# Generated by lora-router gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match RouterConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Router: {}", config.name);
            println!("Listen: {}", config.listen);
            println!("Brokers: {}", config.brokers.len());
            for (i, broker) in config.brokers.iter().enumerate() {
                println!("  [{}] {} at {}", i, broker.name, broker.address);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_stats(counters: &CountingMeter) {
    let snapshot = counters.snapshot();
    if snapshot.is_empty() {
        tracing::info!("no traffic yet");
        return;
    }
    for (name, count) in snapshot {
        tracing::info!("{name}: {count}");
    }
}
