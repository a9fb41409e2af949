mod config;
mod console;
mod eeprom;
mod link;
mod sim_reader;

use tagbuddy_core::{Device, Ports};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ReaderKind};
use crate::eeprom::FileStore;
use crate::sim_reader::SimReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout belongs to the console channel
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagbuddy_station=debug,tagbuddy_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::debug!("configuration: {config:?}");

    // Open the EEPROM image
    let store = FileStore::open(&config.store_path)?;
    tracing::info!("EEPROM image at {}", store.path().display());

    // Simulated antenna, fed from the console
    let (antenna, antenna_rx) = watch::channel(None);
    let reader = match config.reader {
        ReaderKind::Sim => SimReader::present(antenna_rx),
        ReaderKind::None => SimReader::absent(antenna_rx),
    };

    // Identify the reader before any transport starts queuing input
    let mut device = match Device::start(reader, store, config.device) {
        Ok(device) => device,
        Err(fault) => fault.halt(),
    };

    // Channels
    let console = console::spawn(antenna);
    let wireless = link::serve("wireless", &config.wireless_addr, true).await?;
    let forward = link::serve("forward", &config.forward_addr, false).await?;
    let mut ports = Ports::new(console, wireless, forward);

    // The device loop polls the reader synchronously
    tokio::task::spawn_blocking(move || {
        device.run(&mut ports);
    })
    .await?;

    Ok(())
}
