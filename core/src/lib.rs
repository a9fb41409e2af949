//! # TagBuddy Core
//!
//! Turns an NFC tag placed on (or lifted off) a reader into a command string.
//!
//! The device runs one cooperative loop. Each iteration polls the reader once,
//! turns the result into placement/removal edges, looks the tag up in a small
//! slot table and writes the matching command to the active output channel.
//! The same iteration then reads at most one configuration line from each of
//! the console and wireless channels and applies it to the table, which is
//! persisted in a 512-byte EEPROM-style store.
//!
//! ## Layers
//!
//! 1. **Reader** ([`reader`]) - hardware seam, `poll(timeout)` returns a raw UID
//! 2. **Presence** ([`presence`]) - absent/present state machine, edge events
//! 3. **Registry** ([`registry`]) - tag id to command table backed by [`store`]
//! 4. **Dispatch** ([`dispatch`]) - edge events to output lines
//! 5. **Protocol** ([`protocol`]) - `N`/`T`/`C`/`R`/`HELP` configuration lines
//! 6. **Device** ([`device`]) - startup, terminal fault and the loop itself

pub mod channel;
pub mod device;
pub mod dispatch;
pub mod presence;
pub mod protocol;
pub mod reader;
pub mod registry;
pub mod store;
pub mod token;

pub use channel::{LineBuffer, LineSink, LineSource, Ports};
pub use device::{Device, DeviceConfig, Fault};
pub use dispatch::{Dispatcher, OutputMode};
pub use presence::{PresenceDetector, PresenceEvent, PresenceState};
pub use protocol::{ConfigCommand, ConfigProtocol};
pub use reader::{ChipInfo, TokenReader};
pub use registry::{DEFAULT_CAPACITY, MAX_CAPACITY, Registry, RegistryError, Slot};
pub use store::{MemoryStore, PersistentStore, StoreError};
pub use token::{RawId, TokenId, TokenIdError, parse_uid};
