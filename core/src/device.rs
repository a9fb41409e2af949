//! Device bootstrap and the cooperative control loop.
//!
//! One iteration: poll the reader (blocks up to `poll_timeout`), dispatch any
//! edge event, then apply at most one pending line from the console and one
//! from the wireless channel. Nothing runs concurrently with an iteration.

use core::time::Duration;

use log::{error, info};
use thiserror::Error;

use crate::channel::{LineSink, LineSource, Ports};
use crate::dispatch::{Dispatcher, OutputMode};
use crate::presence::PresenceDetector;
use crate::protocol::ConfigProtocol;
use crate::reader::{ChipInfo, TokenReader};
use crate::registry::{Registry, RegistryError};
use crate::store::PersistentStore;

/// Reader poll window used when nothing else is configured.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub poll_timeout: Duration,
    pub output_mode: OutputMode,
    /// Extra console diagnostics and wireless echo.
    pub verbose: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            output_mode: OutputMode::Local,
            verbose: false,
        }
    }
}

/// Startup failures. There is no way back from any of these short of a
/// power cycle.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("no tag reader answered at startup")]
    ReaderNotFound,

    #[error("persistent store unusable: {0}")]
    Store(#[from] RegistryError),
}

impl Fault {
    /// Stop processing for good.
    pub fn halt(self) -> ! {
        error!("Halted: {self}");
        loop {
            std::thread::park();
        }
    }
}

pub struct Device<R, S> {
    reader: R,
    registry: Registry<S>,
    presence: PresenceDetector,
    dispatcher: Dispatcher,
    protocol: ConfigProtocol,
    config: DeviceConfig,
    chip: ChipInfo,
}

impl<R: TokenReader, S: PersistentStore> Device<R, S> {
    /// Load the registry and identify the reader.
    pub fn start(mut reader: R, store: S, config: DeviceConfig) -> Result<Self, Fault> {
        let registry = Registry::load(store)?;
        info!(
            "Registry loaded: {} active slots, remove command {:?}",
            registry.capacity(),
            registry.remove_command()
        );

        let Some(version) = reader.firmware_version() else {
            return Err(Fault::ReaderNotFound);
        };
        let chip = ChipInfo::from_version_word(version);
        info!("Found chip PN5{:X}", chip.chip);
        info!("Firmware ver. {}.{}", chip.major, chip.minor);
        info!("Waiting for an ISO14443A card ...");

        Ok(Self {
            reader,
            registry,
            presence: PresenceDetector::new(),
            dispatcher: Dispatcher::new(config.output_mode, config.verbose),
            protocol: ConfigProtocol::new(),
            config,
            chip,
        })
    }

    /// Run one loop iteration.
    pub fn step<C, W, F>(&mut self, ports: &mut Ports<C, W, F>)
    where
        C: LineSource + LineSink,
        W: LineSource + LineSink,
        F: LineSink,
    {
        if let Some(event) = self.presence.poll(&mut self.reader, self.config.poll_timeout) {
            self.dispatcher.handle(&event, &self.registry, ports);
        }

        if let Some(line) = ports.console.read_line() {
            self.apply(&line, ports);
        }

        if let Some(line) = ports.wireless.read_line() {
            self.apply(&line, ports);
            if self.config.verbose {
                ports.wireless.write_line(&line);
            }
        }
    }

    /// Loop until the power goes.
    pub fn run<C, W, F>(&mut self, ports: &mut Ports<C, W, F>) -> !
    where
        C: LineSource + LineSink,
        W: LineSource + LineSink,
        F: LineSink,
    {
        loop {
            self.step(ports);
        }
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceDetector {
        &self.presence
    }

    pub fn chip(&self) -> ChipInfo {
        self.chip
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn into_parts(self) -> (R, S) {
        (self.reader, self.registry.into_store())
    }

    fn apply<C, W, F>(&mut self, line: &str, ports: &mut Ports<C, W, F>)
    where
        C: LineSink,
        W: LineSink,
        F: LineSink,
    {
        if let Err(e) = self
            .protocol
            .handle_line(line, &mut self.registry, self.presence.state(), ports)
        {
            error!("Commit failed while applying {line:?}: {e}");
        }
    }
}
