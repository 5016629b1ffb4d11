use clap::Parser;
use log::{error, info};
use matter_accessory_bridge::config::{self, Config, load_dotenv};
use matter_accessory_bridge::device::DeviceRegistry;
use matter_accessory_bridge::error::BridgeError;
use matter_accessory_bridge::matter;
use matter_accessory_bridge::simulation::run_simulation;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "matter-accessory-bridge")]
#[command(about = "Expose lights, plugs, fans, blinds and buttons as Matter devices")]
struct Args {
    /// JSON file listing the devices to expose
    #[arg(long, env = "DEVICES_FILE")]
    devices: Option<PathBuf>,

    /// Network interface to serve Matter on
    #[arg(long)]
    interface: Option<String>,

    /// Do not press the simulated accessories
    #[arg(long)]
    no_simulation: bool,

    /// Expose every device as its own endpoint, without an aggregator
    #[arg(long)]
    standalone: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn load_config(args: &Args) -> Result<Config, BridgeError> {
    let mut config = Config::from_env();

    if let Some(interface) = &args.interface {
        config.matter.interface = Some(interface.clone());
    }
    if args.no_simulation {
        config.simulation.enabled = false;
    }
    if args.standalone {
        config.bridge.aggregate = false;
    }
    if let Some(path) = &args.devices {
        info!("Loading devices from {:?}", path);
        config.devices = config::load_devices(path)?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() {
    // .env is applied before clap reads env-backed arguments
    load_dotenv();
    let args = Args::parse();

    init_logger();
    info!("Starting Matter Accessory Bridge");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded:");
    info!("  Device Name: {}", config.matter.device_name);
    info!("  Vendor ID: 0x{:04X}", config.matter.vendor_id);
    info!("  Product ID: 0x{:04X}", config.matter.product_id);
    info!("  Discriminator: {}", config.matter.discriminator);
    info!("  Aggregator: {}", config.bridge.aggregate);

    let registry = match DeviceRegistry::from_config(&config.devices, config.bridge.aggregate) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to create devices: {}", e);
            std::process::exit(1);
        }
    };
    info!("{} devices ready", registry.len());

    let simulation = if config.simulation.enabled {
        run_simulation(
            registry.simulated().to_vec(),
            Duration::from_secs(config.simulation.interval_secs),
            Duration::from_millis(config.simulation.blind_tick_ms),
        )
    } else {
        info!("[Sim] Simulation disabled");
        Vec::new()
    };

    // rs-matter runs on embassy primitives and async-io sockets, so it gets
    // its own thread instead of the tokio runtime
    let matter_config = config.matter.clone();
    let matter_registry = registry.clone();
    let spawned = std::thread::Builder::new()
        .name("matter-stack".into())
        .stack_size(550 * 1024)
        .spawn(move || {
            if let Err(e) = futures_lite::future::block_on(matter::run_matter_stack(
                &matter_config,
                matter_registry,
            )) {
                error!("{}", BridgeError::from(e));
            }
        });
    if let Err(e) = spawned {
        error!("{}", BridgeError::MatterInitFailed(e.to_string()));
        std::process::exit(1);
    }

    info!("Matter Accessory Bridge is running");
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    for task in simulation {
        task.abort();
    }

    info!("Matter Accessory Bridge stopped");
}
